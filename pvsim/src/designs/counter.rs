use crate::{
    errors::ConstructionError,
    simulation::Testbench,
    structures::{EvalContext, Module, ModuleId, Register, SimContext, Signal},
};

/// A 4-bit counter with an active-low synchronous reset and an enable.
///
/// `value` shows the count that will be committed on the next edge, so the
/// output of cycle `n` with `enable` held high and no reset is `n mod 16`.
#[derive(Debug, Clone, Copy)]
pub struct Counter {
    pub module: ModuleId,
    pub reset_n: Signal<bool>,
    pub enable: Signal<bool>,
    pub value: Signal<u8>,
    counter: Register<u8>,
}

impl Counter {
    pub const WIDTH: u32 = 4;
    const MODULUS: u8 = 1 << Self::WIDTH;

    /// Declares a counter named `name` inside `parent` and installs it.
    pub fn build(
        cx: &mut SimContext,
        parent: ModuleId,
        name: &str,
    ) -> Result<Self, ConstructionError> {
        let module = cx.module(parent, name)?;
        let reset_n = cx.input(module, "reset_n", None)?;
        let enable = cx.input(module, "enable", None)?;
        let value = cx.output(module, "value", None)?;
        let counter = cx.register(module, "counter", Some(0))?;
        cx.set_signal_width(value, Self::WIDTH)?;
        cx.set_register_width(counter, Self::WIDTH)?;

        let this = Self {
            module,
            reset_n,
            enable,
            value,
            counter,
        };
        cx.install(module, this)?;
        Ok(this)
    }

    /// The committed count.
    pub fn count(&self, cx: &SimContext) -> Option<u8> {
        (!cx.register_is_unknown(self.counter)).then(|| cx.q(self.counter))
    }
}

impl Module for Counter {
    fn eval(&mut self, cx: &mut EvalContext<'_>) {
        let next = if cx.is_unknown(self.reset_n) {
            None
        } else if !cx.get(self.reset_n) {
            Some(0)
        } else if cx.is_unknown(self.enable) {
            None
        } else if cx.get(self.enable) {
            (!cx.register_is_unknown(self.counter))
                .then(|| (cx.q(self.counter) + 1) % Self::MODULUS)
        } else {
            (!cx.register_is_unknown(self.counter)).then(|| cx.q(self.counter))
        };

        match next {
            Some(next) => {
                cx.assign_next(self.counter, next);
                cx.set(self.value, next);
            }
            None => {
                cx.assign_unknown(self.counter);
                cx.set_unknown(self.value);
            }
        }
    }
}

/// Drives a [`Counter`]: `reset_n` is held low for the first
/// `reset_cycles` cycles, `enable` is always high.
#[derive(Debug)]
pub struct CounterBench {
    pub counter: Counter,
    reset_cycles: u64,
    /// `value` after every cycle, `None` while unknown
    pub history: Vec<Option<u8>>,
}

impl CounterBench {
    pub fn build(
        cx: &mut SimContext,
        root: ModuleId,
        reset_cycles: u64,
    ) -> Result<Self, ConstructionError> {
        let counter = Counter::build(cx, root, "counter")?;
        Ok(Self {
            counter,
            reset_cycles,
            history: vec![],
        })
    }

    pub fn last_value(&self) -> Option<u8> {
        self.history.last().copied().flatten()
    }
}

impl Module for CounterBench {
    fn eval(&mut self, _cx: &mut EvalContext<'_>) {}
}

impl Testbench for CounterBench {
    fn pre_clock(&mut self, cycle: u64, cx: &mut SimContext) {
        cx.set(self.counter.reset_n, cycle > self.reset_cycles);
        cx.set(self.counter.enable, true);
    }

    fn post_clock(&mut self, _cycle: u64, cx: &mut SimContext) {
        let value = self.counter.value;
        self.history
            .push((!cx.is_unknown(value)).then(|| cx.get(value)));
    }
}
