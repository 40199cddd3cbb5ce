use std::ops::{Deref, DerefMut};

use super::{context::SimContext, indices::ModuleId};

/// The behaviour of a node in the design hierarchy.
///
/// `eval` runs whenever something the module is sensitized to changes, and
/// possibly several times in one cycle. It must read only what it is
/// sensitized to (or its children's outputs) and write only what it drives,
/// so that re-running it from the same clocked state gives the same result.
pub trait Module: 'static {
    fn eval(&mut self, cx: &mut EvalContext<'_>);
}

impl<F> Module for F
where
    F: FnMut(&mut EvalContext<'_>) + 'static,
{
    fn eval(&mut self, cx: &mut EvalContext<'_>) {
        self(cx)
    }
}

/// The view of the [`SimContext`] handed to [`Module::eval`]. It derefs to
/// the context and additionally knows which module is being evaluated.
pub struct EvalContext<'a> {
    cx: &'a mut SimContext,
    this: ModuleId,
}

impl<'a> EvalContext<'a> {
    pub(crate) fn new(cx: &'a mut SimContext, this: ModuleId) -> Self {
        Self { cx, this }
    }

    /// The module being evaluated.
    pub fn this(&self) -> ModuleId {
        self.this
    }
}

impl Deref for EvalContext<'_> {
    type Target = SimContext;

    fn deref(&self) -> &Self::Target {
        self.cx
    }
}

impl DerefMut for EvalContext<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.cx
    }
}
