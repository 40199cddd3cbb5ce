use std::any::Any;

use crate::{
    trace::TraceValue,
    values::{SignalValue, format_bits},
};

/// The three-state storage behind a [`Signal`](super::Signal).
///
/// `old_value`/`was_unknown` hold the state the signal had when it was first
/// written in the current cycle. They are refreshed when the cycle settles.
#[derive(Debug, Clone)]
pub(crate) struct SignalCell<T> {
    value: T,
    unknown: bool,
    old_value: T,
    was_unknown: bool,
    init_value: T,
    init_unknown: bool,
}

impl<T: SignalValue> SignalCell<T> {
    pub fn new(init: Option<T>) -> Self {
        let unknown = init.is_none();
        let value = init.unwrap_or_default();
        Self {
            old_value: value.clone(),
            init_value: value.clone(),
            value,
            unknown,
            was_unknown: unknown,
            init_unknown: unknown,
        }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn is_unknown(&self) -> bool {
        self.unknown
    }

    pub fn old_value(&self) -> &T {
        &self.old_value
    }

    pub fn was_unknown(&self) -> bool {
        self.was_unknown
    }

    /// Writes a known value and reports whether the observable state changed.
    pub fn write(&mut self, value: T) -> bool {
        let changed = self.unknown || self.value != value;
        self.value = value;
        self.unknown = false;
        changed
    }

    /// Marks the value unknown and reports whether it was known before.
    pub fn write_unknown(&mut self) -> bool {
        let changed = !self.unknown;
        self.unknown = true;
        changed
    }
}

/// The type-erased view of a [`SignalCell`] used by the scheduler.
pub(crate) trait ErasedSignal: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Captures the current state as the cycle-start state.
    fn snapshot(&mut self);

    /// Whether the state differs from the cycle-start state.
    fn differs_from_snapshot(&self) -> bool;

    fn trace_value(&self, width: u32) -> TraceValue;

    /// Restores the construction-time state, including the snapshot.
    fn reset_to_init(&mut self);
}

impl<T: SignalValue> ErasedSignal for SignalCell<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn snapshot(&mut self) {
        self.old_value = self.value.clone();
        self.was_unknown = self.unknown;
    }

    fn differs_from_snapshot(&self) -> bool {
        match (self.was_unknown, self.unknown) {
            (true, true) => false,
            (false, false) => self.old_value != self.value,
            _ => true,
        }
    }

    fn trace_value(&self, width: u32) -> TraceValue {
        if self.unknown {
            TraceValue::Unknown
        } else {
            TraceValue::Known(format_bits(self.value.to_bits(), width))
        }
    }

    fn reset_to_init(&mut self) {
        self.value = self.init_value.clone();
        self.unknown = self.init_unknown;
        self.snapshot();
    }
}
