//! Waveform tracing.
//!
//! The scheduler reports the design to a [`TraceSink`] in a fixed order:
//! the scoped definitions of the whole hierarchy, an initial dump of every
//! value at tick zero, and then per cycle a rising bracket holding the
//! register commits followed by a falling bracket holding the settled signal
//! changes.

mod log_sink;
mod vcd;

pub use log_sink::LogSink;
pub use vcd::{VcdWriter, check_clock_window};

use std::{fmt, io};

use ahash::{HashMap, HashMapExt};
use serde::{Deserialize, Serialize};

use crate::{
    structures::{ModuleIdx, NetRef, RegisterIdx, SignalIdx, SimContext},
    values::format_unknown,
};

/// Identifies one traced signal or register within a sink.
pub type TraceId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceKind {
    Wire,
    Register,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockEdge {
    Rising,
    Falling,
}

/// A formatted value handed to a sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceValue {
    /// Binary digits, most significant first, exactly `width` of them
    Known(String),
    Unknown,
}

impl TraceValue {
    /// The binary digits, or `width` copies of `x` for an unknown value.
    pub fn render(&self, width: u32) -> String {
        match self {
            TraceValue::Known(bits) => bits.clone(),
            TraceValue::Unknown => format_unknown(width),
        }
    }
}

impl fmt::Display for TraceValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceValue::Known(bits) => f.write_str(bits),
            TraceValue::Unknown => f.write_str("x"),
        }
    }
}

/// The clock-edge change of a register marked with
/// [`SimContext::trace_register`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRecord {
    /// Hierarchical name of the register
    pub path: String,
    pub width: u32,
    /// Committed state before the edge
    pub start: TraceValue,
    /// Committed state after the edge
    pub end: TraceValue,
}

impl fmt::Display for ChangeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "R {} {} -> {}",
            self.path,
            self.start.render(self.width),
            self.end.render(self.width)
        )
    }
}

/// The consumer of value changes. Every call may fail with an I/O error,
/// which aborts the simulation run.
pub trait TraceSink {
    fn enter_scope(&mut self, name: &str) -> io::Result<()>;

    fn exit_scope(&mut self) -> io::Result<()>;

    fn define(
        &mut self,
        id: TraceId,
        name: &str,
        kind: TraceKind,
        width: u32,
    ) -> io::Result<()>;

    fn end_definitions(&mut self) -> io::Result<()>;

    fn begin_cycle(&mut self, tick: u64, edge: ClockEdge) -> io::Result<()>;

    fn emit_change(
        &mut self,
        id: TraceId,
        width: u32,
        value: &TraceValue,
    ) -> io::Result<()>;

    fn end_cycle(&mut self) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Magnitude {
    #[serde(rename = "1")]
    One,
    #[serde(rename = "10")]
    Ten,
    #[serde(rename = "100")]
    Hundred,
}

impl Magnitude {
    fn factor(&self) -> f64 {
        match self {
            Magnitude::One => 1.0,
            Magnitude::Ten => 10.0,
            Magnitude::Hundred => 100.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    S,
    Ms,
    Us,
    Ns,
    Ps,
    Fs,
}

impl TimeUnit {
    fn seconds(&self) -> f64 {
        match self {
            TimeUnit::S => 1.0,
            TimeUnit::Ms => 1e-3,
            TimeUnit::Us => 1e-6,
            TimeUnit::Ns => 1e-9,
            TimeUnit::Ps => 1e-12,
            TimeUnit::Fs => 1e-15,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            TimeUnit::S => "s",
            TimeUnit::Ms => "ms",
            TimeUnit::Us => "us",
            TimeUnit::Ns => "ns",
            TimeUnit::Ps => "ps",
            TimeUnit::Fs => "fs",
        }
    }
}

/// The length of one trace tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeScale {
    pub magnitude: Magnitude,
    pub unit: TimeUnit,
}

impl TimeScale {
    pub fn seconds(&self) -> f64 {
        self.magnitude.factor() * self.unit.seconds()
    }
}

impl fmt::Display for TimeScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let magnitude = match self.magnitude {
            Magnitude::One => "1",
            Magnitude::Ten => "10",
            Magnitude::Hundred => "100",
        };
        write!(f, "{magnitude} {}", self.unit.as_str())
    }
}

/// Clock frequency and tick length, which together fix how many ticks one
/// clock cycle spans.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OperatingPoint {
    pub frequency_hz: f64,
    pub timescale: TimeScale,
}

impl OperatingPoint {
    pub fn new(frequency_hz: f64, timescale: TimeScale) -> Self {
        Self {
            frequency_hz,
            timescale,
        }
    }

    /// `max(2, round(1 / (frequency * timescale)))`
    pub fn ticks_per_clock(&self) -> u64 {
        let ticks = (1.0 / (self.frequency_hz * self.timescale.seconds())).round();
        if ticks.is_finite() && ticks > 2.0 {
            ticks as u64
        } else {
            2
        }
    }

    /// The tick of the rising or falling edge of `cycle`.
    pub fn tick(&self, cycle: u64, edge: ClockEdge) -> u64 {
        edge_tick(self.ticks_per_clock(), cycle, edge)
    }
}

impl Default for OperatingPoint {
    /// 100 MHz with a 1 ns tick
    fn default() -> Self {
        Self::new(
            100e6,
            TimeScale {
                magnitude: Magnitude::One,
                unit: TimeUnit::Ns,
            },
        )
    }
}

fn edge_tick(ticks_per_clock: u64, cycle: u64, edge: ClockEdge) -> u64 {
    let rising = cycle * ticks_per_clock;
    match edge {
        ClockEdge::Rising => rising,
        ClockEdge::Falling => rising + ticks_per_clock / 2,
    }
}

/// A sink attached to a simulation together with the ids it was given.
pub(crate) struct TraceAttachment {
    sink: Box<dyn TraceSink>,
    ids: HashMap<NetRef, TraceId>,
    defined: bool,
    ticks_per_clock: u64,
    /// cycles of earlier fresh runs on this sink, keeps ticks monotonic
    cycle_offset: u64,
    last_cycle: u64,
}

impl TraceAttachment {
    pub fn new(sink: Box<dyn TraceSink>) -> Self {
        Self {
            sink,
            ids: HashMap::new(),
            defined: false,
            ticks_per_clock: 2,
            cycle_offset: 0,
            last_cycle: 0,
        }
    }

    pub fn into_sink(self) -> Box<dyn TraceSink> {
        self.sink
    }

    fn tick(&self, cycle: u64, edge: ClockEdge) -> u64 {
        edge_tick(self.ticks_per_clock, cycle + self.cycle_offset, edge)
    }

    /// Writes the definitions if this is the first run on the sink, then
    /// dumps every value.
    pub fn start_fresh_run(
        &mut self,
        cx: &SimContext,
        ticks_per_clock: u64,
    ) -> io::Result<()> {
        self.ticks_per_clock = ticks_per_clock;
        if self.defined {
            self.cycle_offset = self.last_cycle + 1;
        } else {
            self.define_module(cx, cx.root())?;
            self.sink.end_definitions()?;
            self.defined = true;
        }

        self.sink.begin_cycle(self.tick(0, ClockEdge::Rising), ClockEdge::Falling)?;
        let mut entries = self.ids.iter().map(|(n, i)| (*i, *n)).collect::<Vec<_>>();
        entries.sort_unstable();
        for (id, net) in entries {
            let (width, value) = match net {
                NetRef::Signal(s) => {
                    (cx.signal_slot(s).width, cx.signal_trace_value(s))
                }
                NetRef::Register(r) => {
                    (cx.register_slot(r).width, cx.register_trace_value(r))
                }
            };
            self.sink.emit_change(id, width, &value)?;
        }
        self.sink.end_cycle()?;
        self.last_cycle = self.cycle_offset;
        Ok(())
    }

    fn define_module(
        &mut self,
        cx: &SimContext,
        module: ModuleIdx,
    ) -> io::Result<()> {
        self.sink.enter_scope(cx.name(module))?;
        for net in cx.graph().owned_by(module) {
            let id = self.ids.len() as TraceId;
            match *net {
                NetRef::Signal(s) => {
                    let slot = cx.signal_slot(s);
                    self.sink.define(id, &slot.name, TraceKind::Wire, slot.width)?;
                }
                NetRef::Register(r) => {
                    let slot = cx.register_slot(r);
                    self.sink.define(id, &slot.name, TraceKind::Register, slot.width)?;
                }
            }
            self.ids.insert(*net, id);
        }
        for child in cx.children(module) {
            self.define_module(cx, *child)?;
        }
        self.sink.exit_scope()
    }

    pub fn rising(
        &mut self,
        cx: &SimContext,
        cycle: u64,
        committed: &[RegisterIdx],
    ) -> io::Result<()> {
        self.sink.begin_cycle(self.tick(cycle, ClockEdge::Rising), ClockEdge::Rising)?;
        for r in committed {
            if let Some(id) = self.ids.get(&NetRef::Register(*r)) {
                let width = cx.register_slot(*r).width;
                self.sink.emit_change(*id, width, &cx.register_trace_value(*r))?;
            }
        }
        self.sink.end_cycle()
    }

    pub fn falling(
        &mut self,
        cx: &SimContext,
        cycle: u64,
        settled: &[SignalIdx],
    ) -> io::Result<()> {
        self.sink.begin_cycle(self.tick(cycle, ClockEdge::Falling), ClockEdge::Falling)?;
        for s in settled {
            if let Some(id) = self.ids.get(&NetRef::Signal(*s)) {
                let width = cx.signal_slot(*s).width;
                self.sink.emit_change(*id, width, &cx.signal_trace_value(*s))?;
            }
        }
        self.last_cycle = cycle + self.cycle_offset;
        self.sink.end_cycle()
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.sink.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(frequency_hz: f64, magnitude: Magnitude, unit: TimeUnit) -> OperatingPoint {
        OperatingPoint::new(frequency_hz, TimeScale { magnitude, unit })
    }

    #[test]
    fn ticks_per_clock() {
        assert_eq!(OperatingPoint::default().ticks_per_clock(), 10);
        assert_eq!(point(1e9, Magnitude::One, TimeUnit::Ns).ticks_per_clock(), 2);
        assert_eq!(point(1.0, Magnitude::One, TimeUnit::S).ticks_per_clock(), 2);
        assert_eq!(point(1e6, Magnitude::Ten, TimeUnit::Ns).ticks_per_clock(), 100);
        assert_eq!(point(3e6, Magnitude::One, TimeUnit::Us).ticks_per_clock(), 2);
    }

    #[test]
    fn edges() {
        let op = OperatingPoint::default();
        assert_eq!(op.tick(3, ClockEdge::Rising), 30);
        assert_eq!(op.tick(3, ClockEdge::Falling), 35);
    }

    #[test]
    fn timescale_display() {
        let ts = TimeScale {
            magnitude: Magnitude::Hundred,
            unit: TimeUnit::Ps,
        };
        assert_eq!(ts.to_string(), "100 ps");
        let json = serde_json::to_string(&ts).unwrap();
        assert_eq!(json, r#"{"magnitude":"100","unit":"ps"}"#);
    }

    #[test]
    fn change_record_display() {
        let record = ChangeRecord {
            path: "tb.dut.acc".into(),
            width: 3,
            start: TraceValue::Unknown,
            end: TraceValue::Known("101".into()),
        };
        assert_eq!(record.to_string(), "R tb.dut.acc xxx -> 101");
    }

    #[test]
    fn unknown_rendering() {
        assert_eq!(TraceValue::Unknown.render(3), "xxx");
        assert_eq!(TraceValue::Known("01".into()).render(2), "01");
    }
}
