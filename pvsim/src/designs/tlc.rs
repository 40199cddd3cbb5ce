use std::fmt;

use crate::{
    errors::ConstructionError,
    simulation::Testbench,
    structures::{EvalContext, Module, ModuleId, Register, SimContext, Signal},
    values::SignalValue,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Color {
    #[default]
    Red,
    Yellow,
    Green,
}

impl SignalValue for Color {
    const WIDTH: u32 = 2;

    fn to_bits(&self) -> u64 {
        match self {
            Color::Red => 0,
            Color::Yellow => 1,
            Color::Green => 2,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Color::Red => "red",
            Color::Yellow => "yellow",
            Color::Green => "green",
        })
    }
}

/// A traffic light controller for a crossing of an east-west and a
/// north-south road. Each direction runs green for `delay + 1` cycles, then
/// yellow for one, then red while the other direction runs.
#[derive(Debug, Clone, Copy)]
pub struct TrafficLight {
    pub module: ModuleId,
    /// active low
    pub reset_x: Signal<bool>,
    pub delay: Signal<u32>,
    pub east_west: Signal<Color>,
    pub north_south: Signal<Color>,
    ew_state: Register<Color>,
    ns_state: Register<Color>,
    timer: Register<u32>,
    ns_cycle: Register<bool>,
}

impl TrafficLight {
    pub fn build(
        cx: &mut SimContext,
        parent: ModuleId,
        name: &str,
    ) -> Result<Self, ConstructionError> {
        let module = cx.module(parent, name)?;
        let reset_x = cx.input(module, "reset_x", None)?;
        let delay = cx.input(module, "delay", None)?;
        let east_west = cx.output(module, "east_west", None)?;
        let north_south = cx.output(module, "north_south", None)?;
        let ew_state = cx.register(module, "ew_state", None)?;
        let ns_state = cx.register(module, "ns_state", None)?;
        let timer = cx.register(module, "timer", None)?;
        let ns_cycle = cx.register(module, "ns_cycle", None)?;
        cx.set_signal_width(delay, 8)?;
        cx.set_register_width(timer, 8)?;

        let this = Self {
            module,
            reset_x,
            delay,
            east_west,
            north_south,
            ew_state,
            ns_state,
            timer,
            ns_cycle,
        };
        cx.install(module, this)?;
        Ok(this)
    }

    /// Runs one direction's green-yellow-red sequence. Returns true once the
    /// light is red and the other direction should take over.
    fn advance(
        &self,
        cx: &mut EvalContext<'_>,
        state: Register<Color>,
    ) -> bool {
        match cx.q(state) {
            Color::Green => {
                let timer = cx.q(self.timer);
                if timer == 0 {
                    cx.assign_next(state, Color::Yellow);
                    let delay = cx.get(self.delay);
                    cx.assign_next(self.timer, delay);
                } else {
                    cx.assign_next(self.timer, timer - 1);
                }
                false
            }
            Color::Yellow => {
                cx.assign_next(state, Color::Red);
                false
            }
            Color::Red => true,
        }
    }
}

impl Module for TrafficLight {
    fn eval(&mut self, cx: &mut EvalContext<'_>) {
        if !cx.get(self.reset_x) {
            cx.assign_next(self.ew_state, Color::Green);
            cx.assign_next(self.ns_state, Color::Red);
            cx.assign_next(self.timer, 0);
            cx.assign_next(self.ns_cycle, false);
            cx.set(self.east_west, Color::Green);
            cx.set(self.north_south, Color::Red);
            return;
        }

        if cx.q(self.ns_cycle) {
            if self.advance(cx, self.ns_state) {
                cx.assign_next(self.ns_cycle, false);
                cx.assign_next(self.ew_state, Color::Green);
            }
        } else if self.advance(cx, self.ew_state) {
            cx.assign_next(self.ns_cycle, true);
            cx.assign_next(self.ns_state, Color::Green);
        }

        let ns = cx.q(self.ns_state);
        let ew = cx.q(self.ew_state);
        cx.set(self.north_south, ns);
        cx.set(self.east_west, ew);
    }
}

/// Resets a [`TrafficLight`] during the first cycle, sequenced by a register
/// of its own, and records the lights after every cycle.
#[derive(Debug)]
pub struct TrafficLightBench {
    pub tlc: TrafficLight,
    timer_ticks: u32,
    reset_done: Register<bool>,
    /// (east-west, north-south) after every cycle
    pub history: Vec<(Color, Color)>,
}

impl TrafficLightBench {
    pub fn build(
        cx: &mut SimContext,
        root: ModuleId,
        timer_ticks: u32,
    ) -> Result<Self, ConstructionError> {
        let tlc = TrafficLight::build(cx, root, "tlc")?;
        let reset_done = cx.register(root, "reset_done", Some(false))?;
        Ok(Self {
            tlc,
            timer_ticks,
            reset_done,
            history: vec![],
        })
    }
}

impl Module for TrafficLightBench {
    fn eval(&mut self, cx: &mut EvalContext<'_>) {
        if !cx.q(self.reset_done) {
            cx.assign_next(self.reset_done, true);
            cx.set(self.tlc.delay, self.timer_ticks.saturating_sub(1));
            cx.set(self.tlc.reset_x, false);
        } else {
            cx.set(self.tlc.reset_x, true);
        }
    }
}

impl Testbench for TrafficLightBench {
    fn post_clock(&mut self, _cycle: u64, cx: &mut SimContext) {
        let lights = (cx.get(self.tlc.east_west), cx.get(self.tlc.north_south));
        self.history.push(lights);
    }
}
