use std::any::Any;

use crate::{
    trace::TraceValue,
    values::{SignalValue, format_bits},
};

/// Whether committing a pending state onto a committed state must trigger
/// the register's dependents.
///
/// | committed unknown | pending unknown | values differ | triggers |
/// |---|---|---|---|
/// | no  | no  | no  | no  |
/// | no  | no  | yes | yes |
/// | no  | yes | -   | yes |
/// | yes | no  | -   | yes |
/// | yes | yes | -   | no  |
pub fn commit_triggers(
    committed_unknown: bool,
    pending_unknown: bool,
    values_differ: bool,
) -> bool {
    if committed_unknown {
        !pending_unknown
    } else {
        pending_unknown || values_differ
    }
}

/// A two-stage storage cell. Writes land in the pending stage and become
/// visible through the committed stage only on a clock edge.
#[derive(Debug, Clone)]
pub(crate) struct RegisterCell<T> {
    pending: T,
    pending_unknown: bool,
    committed: T,
    committed_unknown: bool,
    init_value: T,
    init_unknown: bool,
}

impl<T: SignalValue> RegisterCell<T> {
    pub fn new(init: Option<T>) -> Self {
        let unknown = init.is_none();
        let value = init.unwrap_or_default();
        Self {
            pending: value.clone(),
            committed: value.clone(),
            init_value: value,
            pending_unknown: unknown,
            committed_unknown: unknown,
            init_unknown: unknown,
        }
    }

    pub fn committed(&self) -> &T {
        &self.committed
    }

    pub fn committed_unknown(&self) -> bool {
        self.committed_unknown
    }

    pub fn pending(&self) -> &T {
        &self.pending
    }

    pub fn pending_unknown(&self) -> bool {
        self.pending_unknown
    }

    pub fn assign(&mut self, value: T) {
        self.pending = value;
        self.pending_unknown = false;
    }

    /// Marks the pending stage unknown, keeping its value.
    pub fn assign_unknown(&mut self) {
        self.pending_unknown = true;
    }
}

/// The type-erased view of a [`RegisterCell`] used by the scheduler.
pub(crate) trait ErasedRegister: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Moves pending onto committed. Returns whether dependents must be
    /// triggered.
    fn commit(&mut self) -> bool;

    /// Discards pending writes by copying committed back onto pending.
    fn restore_replica(&mut self);

    /// Marks both stages unknown. Returns whether the committed stage was
    /// known before.
    fn force_unknown(&mut self) -> bool;

    fn trace_value(&self, width: u32) -> TraceValue;

    fn reset_to_init(&mut self);
}

impl<T: SignalValue> ErasedRegister for RegisterCell<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn commit(&mut self) -> bool {
        let trigger = commit_triggers(
            self.committed_unknown,
            self.pending_unknown,
            self.committed != self.pending,
        );
        self.committed = self.pending.clone();
        self.committed_unknown = self.pending_unknown;
        trigger
    }

    fn restore_replica(&mut self) {
        self.pending = self.committed.clone();
        self.pending_unknown = self.committed_unknown;
    }

    fn force_unknown(&mut self) -> bool {
        let was_known = !self.committed_unknown;
        self.pending_unknown = true;
        self.committed_unknown = true;
        was_known
    }

    fn trace_value(&self, width: u32) -> TraceValue {
        if self.committed_unknown {
            TraceValue::Unknown
        } else {
            TraceValue::Known(format_bits(self.committed.to_bits(), width))
        }
    }

    fn reset_to_init(&mut self) {
        self.pending = self.init_value.clone();
        self.committed = self.init_value.clone();
        self.pending_unknown = self.init_unknown;
        self.committed_unknown = self.init_unknown;
    }
}
