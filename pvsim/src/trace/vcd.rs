use std::io::{self, Write};

use super::{ClockEdge, OperatingPoint, TraceId, TraceKind, TraceSink, TraceValue};
use crate::errors::{SimError, SimResult};

/// Converts an index to a VCD identifier. VCD allows the printable ASCII
/// range 33-126, longer identifiers use bijective base-94.
fn idx_to_vcd_id(idx: usize) -> String {
    const BASE: usize = 94;
    const OFFSET: u8 = b'!';

    let mut result = Vec::new();
    let mut n = idx;
    loop {
        result.push(OFFSET + (n % BASE) as u8);
        n /= BASE;
        if n == 0 {
            break;
        }
        n -= 1;
    }
    result.reverse();
    String::from_utf8_lossy(&result).into_owned()
}

/// Rejects a clock window that does not stop after it starts.
pub fn check_clock_window(start: Option<u64>, stop: Option<u64>) -> SimResult<()> {
    match (start, stop) {
        (Some(start), Some(stop)) if start >= stop => Err(SimError::Config(
            format!("VCD start clock ({start}) must be less than stop clock ({stop})"),
        )),
        _ => Ok(()),
    }
}

/// Writes a Value Change Dump.
///
/// Trace id `n` is written as VCD identifier `n + 1`; identifier `!` is the
/// synthetic `clk` variable, declared in the outermost scope and toggled by
/// every clock edge.
///
/// With a clock window, the cycles outside `start..stop` are written as
/// `$dumpoff` (every variable `x`) and entering the window re-dumps the
/// current value of every variable in a `$dumpon` block.
pub struct VcdWriter<W: Write> {
    out: W,
    operating_point: OperatingPoint,
    depth: usize,
    clock_defined: bool,
    /// inside the initial `$dumpvars` block
    dumping: bool,
    dumped: bool,
    start_clock: Option<u64>,
    stop_clock: Option<u64>,
    active: bool,
    tick: u64,
    /// width and latest value of every defined variable, by trace id
    vars: Vec<(u32, TraceValue)>,
}

fn write_value<W: Write>(
    out: &mut W,
    id: TraceId,
    width: u32,
    value: &TraceValue,
) -> io::Result<()> {
    let code = idx_to_vcd_id(id as usize + 1);
    let value = value.render(width);
    if width == 1 {
        writeln!(out, "{value}{code}")
    } else {
        writeln!(out, "b{value} {code}")
    }
}

impl<W: Write> VcdWriter<W> {
    /// Creates the writer and emits the header.
    pub fn new(mut out: W, operating_point: OperatingPoint) -> io::Result<Self> {
        writeln!(out, "$version")?;
        writeln!(out, "  pvsim {}", env!("CARGO_PKG_VERSION"))?;
        writeln!(out, "$end")?;
        writeln!(out, "$timescale {} $end", operating_point.timescale)?;
        Ok(Self {
            out,
            operating_point,
            depth: 0,
            clock_defined: false,
            dumping: false,
            dumped: false,
            start_clock: None,
            stop_clock: None,
            active: true,
            tick: 0,
            vars: Vec::new(),
        })
    }

    /// Restricts value changes to the cycles `start..stop`. The initial dump
    /// is always written.
    pub fn with_clock_window(
        mut self,
        start: Option<u64>,
        stop: Option<u64>,
    ) -> Self {
        self.start_clock = start;
        self.stop_clock = stop;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn clock_id() -> String {
        idx_to_vcd_id(0)
    }

    fn in_window(&self, tick: u64) -> bool {
        let cycle = tick / self.operating_point.ticks_per_clock();
        self.start_clock.is_none_or(|start| cycle >= start)
            && self.stop_clock.is_none_or(|stop| cycle < stop)
    }

    /// `$dumpon` with the clock at `level` and every current value, or
    /// `$dumpoff` with everything unknown when `level` is `None`.
    fn dump_block(&mut self, level: Option<char>) -> io::Result<()> {
        let keyword = if level.is_some() { "$dumpon" } else { "$dumpoff" };
        writeln!(self.out, "{keyword}")?;
        writeln!(self.out, "{}{}", level.unwrap_or('x'), Self::clock_id())?;
        let unknown = TraceValue::Unknown;
        for (id, (width, value)) in self.vars.iter().enumerate() {
            let value = if level.is_some() { value } else { &unknown };
            write_value(&mut self.out, id as TraceId, *width, value)?;
        }
        self.active = level.is_some();
        writeln!(self.out, "$end")
    }
}

impl<W: Write> TraceSink for VcdWriter<W> {
    fn enter_scope(&mut self, name: &str) -> io::Result<()> {
        writeln!(self.out, "$scope module {name} $end")?;
        if !self.clock_defined {
            writeln!(self.out, "$var wire 1 {} clk $end", Self::clock_id())?;
            self.clock_defined = true;
        }
        self.depth += 1;
        Ok(())
    }

    fn exit_scope(&mut self) -> io::Result<()> {
        self.depth = self.depth.saturating_sub(1);
        writeln!(self.out, "$upscope $end")
    }

    fn define(
        &mut self,
        id: TraceId,
        name: &str,
        kind: TraceKind,
        width: u32,
    ) -> io::Result<()> {
        let slot = id as usize;
        if slot >= self.vars.len() {
            self.vars.resize(slot + 1, (1, TraceValue::Unknown));
        }
        self.vars[slot] = (width, TraceValue::Unknown);

        let kind = match kind {
            TraceKind::Wire => "wire",
            TraceKind::Register => "reg",
        };
        writeln!(
            self.out,
            "$var {kind} {width} {} {name} $end",
            idx_to_vcd_id(slot + 1)
        )
    }

    fn end_definitions(&mut self) -> io::Result<()> {
        writeln!(self.out, "$enddefinitions $end")
    }

    fn begin_cycle(&mut self, tick: u64, edge: ClockEdge) -> io::Result<()> {
        self.tick = tick;
        let level = match edge {
            ClockEdge::Rising => '1',
            ClockEdge::Falling => '0',
        };
        if !self.dumped {
            self.dumping = true;
            self.active = true;
            writeln!(self.out, "#{tick}")?;
            writeln!(self.out, "$dumpvars")?;
            return writeln!(self.out, "{level}{}", Self::clock_id());
        }

        match (self.active, self.in_window(tick)) {
            (false, false) => Ok(()),
            (true, true) => {
                writeln!(self.out, "#{tick}")?;
                writeln!(self.out, "{level}{}", Self::clock_id())
            }
            (false, true) => {
                writeln!(self.out, "#{tick}")?;
                self.dump_block(Some(level))
            }
            (true, false) => {
                writeln!(self.out, "#{tick}")?;
                self.dump_block(None)
            }
        }
    }

    fn emit_change(
        &mut self,
        id: TraceId,
        width: u32,
        value: &TraceValue,
    ) -> io::Result<()> {
        if let Some(var) = self.vars.get_mut(id as usize) {
            *var = (width, value.clone());
        }
        if !self.active {
            return Ok(());
        }
        write_value(&mut self.out, id, width, value)
    }

    fn end_cycle(&mut self) -> io::Result<()> {
        if self.dumping {
            self.dumping = false;
            self.dumped = true;
            writeln!(self.out, "$end")?;
            if !self.in_window(self.tick) {
                self.dump_block(None)?;
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}
