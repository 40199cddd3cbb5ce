use std::io;

use ahash::{HashMap, HashMapExt};
use itertools::Itertools;
use slog::{Logger, debug};

use super::{ClockEdge, TraceId, TraceKind, TraceSink, TraceValue};

/// Forwards value changes to a logger at debug level, keyed by hierarchical
/// name. Useful for a quick look at a run without a waveform viewer.
pub struct LogSink {
    logger: Logger,
    scopes: Vec<String>,
    names: HashMap<TraceId, String>,
    tick: u64,
    edge: ClockEdge,
}

impl LogSink {
    pub fn new(logger: Logger) -> Self {
        Self {
            logger,
            scopes: vec![],
            names: HashMap::new(),
            tick: 0,
            edge: ClockEdge::Falling,
        }
    }
}

impl TraceSink for LogSink {
    fn enter_scope(&mut self, name: &str) -> io::Result<()> {
        self.scopes.push(name.to_string());
        Ok(())
    }

    fn exit_scope(&mut self) -> io::Result<()> {
        self.scopes.pop();
        Ok(())
    }

    fn define(
        &mut self,
        id: TraceId,
        name: &str,
        _kind: TraceKind,
        _width: u32,
    ) -> io::Result<()> {
        let path = self.scopes.iter().map(String::as_str).chain([name]).join(".");
        self.names.insert(id, path);
        Ok(())
    }

    fn end_definitions(&mut self) -> io::Result<()> {
        debug!(self.logger, "trace definitions complete"; "count" => self.names.len());
        Ok(())
    }

    fn begin_cycle(&mut self, tick: u64, edge: ClockEdge) -> io::Result<()> {
        self.tick = tick;
        self.edge = edge;
        Ok(())
    }

    fn emit_change(
        &mut self,
        id: TraceId,
        width: u32,
        value: &TraceValue,
    ) -> io::Result<()> {
        let name = self.names.get(&id).map(String::as_str).unwrap_or("?");
        debug!(self.logger, "value change";
            "tick" => self.tick,
            "edge" => ?self.edge,
            "name" => name,
            "value" => value.render(width));
        Ok(())
    }

    fn end_cycle(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
