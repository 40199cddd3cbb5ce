mod counter;
mod limits;
mod propagation;

#[cfg(test)]
pub(crate) use support::*;

#[cfg(test)]
mod support {
    use std::{cell::Cell, rc::Rc};

    use crate::{
        Simulation, Testbench,
        configuration::SimConfig,
        errors::SimResult,
        logging,
        structures::{EvalContext, Module, ModuleId, SimContext, Signal},
    };

    type EvalHook = Box<dyn FnMut(&mut EvalContext<'_>)>;
    type ClockHook = Box<dyn FnMut(u64, &mut SimContext)>;

    /// A testbench assembled from closures.
    pub(crate) struct ScriptedBench {
        on_eval: Option<EvalHook>,
        on_pre_clock: Option<ClockHook>,
        on_post_clock: Option<ClockHook>,
        pub evals: u32,
        pub post_clocks: u32,
    }

    impl ScriptedBench {
        pub fn new() -> Self {
            Self {
                on_eval: None,
                on_pre_clock: None,
                on_post_clock: None,
                evals: 0,
                post_clocks: 0,
            }
        }

        pub fn on_eval<F>(mut self, f: F) -> Self
        where
            F: FnMut(&mut EvalContext<'_>) + 'static,
        {
            self.on_eval = Some(Box::new(f));
            self
        }

        pub fn on_pre_clock<F>(mut self, f: F) -> Self
        where
            F: FnMut(u64, &mut SimContext) + 'static,
        {
            self.on_pre_clock = Some(Box::new(f));
            self
        }

        pub fn on_post_clock<F>(mut self, f: F) -> Self
        where
            F: FnMut(u64, &mut SimContext) + 'static,
        {
            self.on_post_clock = Some(Box::new(f));
            self
        }
    }

    impl Module for ScriptedBench {
        fn eval(&mut self, cx: &mut EvalContext<'_>) {
            self.evals += 1;
            if let Some(f) = &mut self.on_eval {
                f(cx)
            }
        }
    }

    impl Testbench for ScriptedBench {
        fn pre_clock(&mut self, cycle: u64, cx: &mut SimContext) {
            if let Some(f) = &mut self.on_pre_clock {
                f(cycle, cx)
            }
        }

        fn post_clock(&mut self, cycle: u64, cx: &mut SimContext) {
            self.post_clocks += 1;
            if let Some(f) = &mut self.on_post_clock {
                f(cycle, cx)
            }
        }
    }

    /// Pins a closure to the signature modules are evaluated with.
    pub fn behaviour<F>(f: F) -> F
    where
        F: FnMut(&mut EvalContext<'_>) + 'static,
    {
        f
    }

    /// Elaborates a design with logging discarded.
    pub fn simulate<B, F>(config: SimConfig, build: F) -> Simulation<B>
    where
        B: Testbench,
        F: FnOnce(&mut SimContext, ModuleId) -> SimResult<B>,
    {
        Simulation::with_logger("tb", config, logging::discard(), build)
            .unwrap()
    }

    /// A module copying its input to its output, counting evaluations.
    #[derive(Clone)]
    pub(crate) struct Buffer {
        pub module: ModuleId,
        pub a: Signal<bool>,
        pub y: Signal<bool>,
        pub evals: Rc<Cell<u32>>,
    }

    impl Buffer {
        pub fn build(
            cx: &mut SimContext,
            parent: ModuleId,
            name: &str,
        ) -> SimResult<Self> {
            let module = cx.module(parent, name)?;
            let this = Self {
                module,
                a: cx.input(module, "a", Some(false))?,
                y: cx.output(module, "y", Some(false))?,
                evals: Rc::new(Cell::new(0)),
            };
            cx.install(module, this.clone())?;
            Ok(this)
        }
    }

    impl Module for Buffer {
        fn eval(&mut self, cx: &mut EvalContext<'_>) {
            self.evals.set(self.evals.get() + 1);
            let a = cx.get(self.a);
            cx.set(self.y, a);
        }
    }

    /// A module driving the negation of its input.
    #[derive(Clone, Copy)]
    pub(crate) struct Inverter {
        pub a: Signal<bool>,
        pub y: Signal<bool>,
    }

    impl Inverter {
        pub fn build(
            cx: &mut SimContext,
            parent: ModuleId,
            name: &str,
        ) -> SimResult<Self> {
            let module = cx.module(parent, name)?;
            let this = Self {
                a: cx.input(module, "a", Some(false))?,
                y: cx.output(module, "y", Some(false))?,
            };
            cx.install(module, this)?;
            Ok(this)
        }
    }

    impl Module for Inverter {
        fn eval(&mut self, cx: &mut EvalContext<'_>) {
            let a = cx.get(self.a);
            cx.set(self.y, !a);
        }
    }
}
