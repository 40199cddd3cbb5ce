use std::{
    fmt,
    time::{Duration, Instant},
};

use serde::Serialize;
use slog::Logger;

use crate::{
    configuration::{SimConfig, enabled_limit},
    errors::SimResult,
    logging::{self, debug, info, trace, warn},
    structures::{EvalContext, Module, ModuleId, ModuleIdx, SimContext},
    trace::{ChangeRecord, TraceAttachment, TraceSink},
};

/// The root module of a design. Besides evaluating like any module, it is
/// told about every clock cycle before and after it happens.
pub trait Testbench: Module {
    /// Called at the start of every cycle, before registers commit.
    fn pre_clock(&mut self, _cycle: u64, _cx: &mut SimContext) {}

    /// Called once the cycle has settled.
    fn post_clock(&mut self, _cycle: u64, _cx: &mut SimContext) {}
}

/// How a simulation run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    /// The design asked to finish
    Normal,
    /// The configured number of cycles elapsed
    CycleLimitReached { cycle: u64 },
    /// No module was pending for `idle_limit` consecutive cycles
    IdleLimitExceeded { cycle: u64, idle_since: u64 },
    /// Propagation did not settle within `iteration_limit` passes
    IterationLimitExceeded { cycle: u64, iterations: u64 },
    /// The design called `end_simulation`
    UserRequested { code: i32, message: String },
}

impl RunStatus {
    /// The process exit code conventionally associated with the status.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunStatus::Normal => 0,
            RunStatus::CycleLimitReached { .. } => -1,
            RunStatus::IdleLimitExceeded { .. } => -2,
            RunStatus::IterationLimitExceeded { .. } => -3,
            RunStatus::UserRequested { code, .. } => *code,
        }
    }

    /// Whether the run ended in a way that suggests a broken design.
    pub fn is_abnormal(&self) -> bool {
        matches!(
            self,
            RunStatus::IdleLimitExceeded { .. }
                | RunStatus::IterationLimitExceeded { .. }
        ) || matches!(self, RunStatus::UserRequested { code, .. } if *code != 0)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Normal => write!(f, "simulation finished"),
            RunStatus::CycleLimitReached { cycle } => {
                write!(f, "cycle limit reached at cycle {cycle}")
            }
            RunStatus::IdleLimitExceeded { cycle, idle_since } => write!(
                f,
                "idle limit exceeded at cycle {cycle}: no activity since cycle {idle_since}"
            ),
            RunStatus::IterationLimitExceeded { cycle, iterations } => write!(
                f,
                "iteration limit exceeded at cycle {cycle} after {iterations} passes: \
                 the design does not settle (combinational loop?)"
            ),
            RunStatus::UserRequested { code, message } => {
                write!(f, "simulation ended with code {code}: {message}")
            }
        }
    }
}

/// Counters describing the work done by a simulation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// cycles taken by the last run
    pub cycles: u64,
    /// cycles taken by every run so far
    pub cumulative_cycles: u64,
    /// `eval` calls over every run so far
    pub evals: u64,
    /// propagation passes in the last cycle
    pub iterations: u64,
    /// the most propagation passes seen in a single cycle
    pub max_iterations: u64,
}

/// Drives a design, rooted at a [`Testbench`], through clock cycles.
pub struct Simulation<B: Testbench> {
    context: SimContext,
    bench: B,
    config: SimConfig,
    trace: Option<TraceAttachment>,
    stats: RunStats,
    idle_cycles: u64,
    has_run: bool,
    run_time: Duration,
    cumulative_run_time: Duration,
    /// traced register changes of the last run, by cycle
    traced_changes: Vec<(u64, ChangeRecord)>,
    logger: Logger,
}

impl<B: Testbench> Simulation<B> {
    /// Elaborates a design. `build` declares the hierarchy below the root
    /// module `name` and returns the testbench driving it.
    pub fn new<S, F>(name: S, config: SimConfig, build: F) -> SimResult<Self>
    where
        S: Into<String>,
        F: FnOnce(&mut SimContext, ModuleId) -> SimResult<B>,
    {
        let logger = logging::initialize_logger(config.get_logging_config());
        Self::with_logger(name, config, logger, build)
    }

    /// Like [`new`](Self::new) but logging to the given logger.
    pub fn with_logger<S, F>(
        name: S,
        config: SimConfig,
        logger: Logger,
        build: F,
    ) -> SimResult<Self>
    where
        S: Into<String>,
        F: FnOnce(&mut SimContext, ModuleId) -> SimResult<B>,
    {
        config.validate()?;
        let name = name.into();
        let logger = logging::new_sublogger(&logger, &name);
        let mut context = SimContext::new(name, logger.clone())?;
        let root = context.root();
        let bench = build(&mut context, root)?;
        debug!(logger, "design elaborated"; "root" => context.path(root));

        Ok(Self {
            context,
            bench,
            config,
            trace: None,
            stats: RunStats::default(),
            idle_cycles: 0,
            has_run: false,
            run_time: Duration::ZERO,
            cumulative_run_time: Duration::ZERO,
            traced_changes: vec![],
            logger,
        })
    }

    /// Attaches a trace sink, replacing and returning any previous one.
    /// The hierarchy is defined on the sink at the start of the next fresh
    /// run.
    pub fn attach_trace(
        &mut self,
        sink: Box<dyn TraceSink>,
    ) -> Option<Box<dyn TraceSink>> {
        self.trace
            .replace(TraceAttachment::new(sink))
            .map(TraceAttachment::into_sink)
    }

    pub fn detach_trace(&mut self) -> Option<Box<dyn TraceSink>> {
        self.trace.take().map(TraceAttachment::into_sink)
    }

    pub fn bench(&self) -> &B {
        &self.bench
    }

    pub fn bench_mut(&mut self) -> &mut B {
        &mut self.bench
    }

    pub fn context(&self) -> &SimContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut SimContext {
        &mut self.context
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: SimConfig) -> SimResult<()> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// The last cycle simulated.
    pub fn clock(&self) -> u64 {
        self.context.cycle()
    }

    /// Wall-clock time of the last run.
    pub fn run_time(&self) -> Duration {
        self.run_time
    }

    pub fn cumulative_run_time(&self) -> Duration {
        self.cumulative_run_time
    }

    /// The clock-edge changes of traced registers during the last run,
    /// tagged with their cycle.
    pub fn traced_changes(&self) -> &[(u64, ChangeRecord)] {
        &self.traced_changes
    }

    /// Rewinds every signal and register to its construction-time state
    /// without scheduling anything.
    pub fn reset_to_instance_state(&mut self) {
        self.context.reset_to_instance_state();
        self.idle_cycles = 0;
    }

    /// Runs clock cycles until a termination condition is met.
    ///
    /// A fresh run restarts the cycle counter and evaluates every module
    /// once before the first clock edge; with `continue_clock_sequence` set,
    /// later runs pick up where the previous one stopped. Errors are only
    /// returned for trace sink failures.
    pub fn run(&mut self) -> SimResult<RunStatus> {
        let started = Instant::now();
        let fresh = !self.config.continue_clock_sequence || !self.has_run;
        if fresh {
            self.context.set_cycle(0);
            self.idle_cycles = 0;
            self.context.kick_start();
            if let Some(trace) = &mut self.trace {
                let ticks = self.config.operating_point.ticks_per_clock();
                trace.start_fresh_run(&self.context, ticks)?;
            }
        }
        self.has_run = true;
        self.stats.cycles = 0;
        self.traced_changes.clear();
        debug!(self.logger, "simulation started";
            "fresh" => fresh,
            "cycle" => self.context.cycle());

        let status = loop {
            if let Some(status) = self.step()? {
                break status;
            }
        };

        if let Some(trace) = &mut self.trace {
            trace.flush()?;
        }
        self.run_time = started.elapsed();
        self.cumulative_run_time += self.run_time;
        info!(self.logger, "simulation stopped";
            "cycle" => self.context.cycle(),
            "status" => %status,
            "exit_code" => status.exit_code());
        Ok(status)
    }

    /// Simulates one clock cycle. Returns the status to stop with, if any.
    fn step(&mut self) -> SimResult<Option<RunStatus>> {
        let cycle = self.context.cycle() + 1;
        self.context.set_cycle(cycle);
        self.stats.cycles += 1;
        self.stats.cumulative_cycles += 1;

        trace!(self.logger, "pre-clock"; "cycle" => cycle);
        self.context.begin_cycle();
        self.bench.pre_clock(cycle, &mut self.context);

        trace!(self.logger, "clock advance"; "cycle" => cycle);
        let committed = self.context.commit_registers();
        if let Some(trace) = &mut self.trace {
            trace.rising(&self.context, cycle, &committed)?;
        }

        let limit = self.check_idle(cycle).or_else(|| self.propagate(cycle));

        trace!(self.logger, "settle"; "cycle" => cycle);
        let settled = self.context.settle();
        if let Some(trace) = &mut self.trace {
            trace.falling(&self.context, cycle, &settled)?;
        }

        self.record_traced_changes(cycle);

        trace!(self.logger, "post-clock"; "cycle" => cycle);
        self.bench.post_clock(cycle, &mut self.context);

        let requested = self.context.take_stop_request();
        let status = limit.or(requested).or_else(|| {
            enabled_limit(self.config.cycle_limit)
                .filter(|limit| self.stats.cycles >= *limit)
                .map(|_| RunStatus::CycleLimitReached { cycle })
        });
        Ok(status)
    }

    fn record_traced_changes(&mut self, cycle: u64) {
        for record in self.context.traced_changes() {
            debug!(self.logger, "register change";
                "cycle" => cycle,
                "register" => record.path.clone(),
                "start" => record.start.render(record.width),
                "end" => record.end.render(record.width));
            self.traced_changes.push((cycle, record.clone()));
        }
    }

    fn check_idle(&mut self, cycle: u64) -> Option<RunStatus> {
        if !self.context.run_set_is_empty() {
            self.idle_cycles = 0;
            return None;
        }
        self.idle_cycles += 1;
        let limit = enabled_limit(self.config.idle_limit)?;
        if self.idle_cycles < limit {
            return None;
        }
        let idle_since = cycle + 1 - self.idle_cycles;
        info!(self.logger, "idle limit exceeded";
            "cycle" => cycle,
            "idle_since" => idle_since);
        Some(RunStatus::IdleLimitExceeded { cycle, idle_since })
    }

    /// Drains the run-set until it stays empty or the iteration limit trips.
    fn propagate(&mut self, cycle: u64) -> Option<RunStatus> {
        let limit = enabled_limit(self.config.iteration_limit);
        let mut iterations = 0;
        let outcome = loop {
            if self.context.run_set_is_empty() {
                break None;
            }
            if limit.is_some_and(|limit| iterations >= limit) {
                info!(self.logger, "iteration limit exceeded";
                    "cycle" => cycle,
                    "iterations" => iterations);
                break Some(RunStatus::IterationLimitExceeded {
                    cycle,
                    iterations,
                });
            }
            iterations += 1;
            let snapshot = self.context.take_run_set();
            trace!(self.logger, "propagate";
                "cycle" => cycle,
                "pass" => iterations,
                "modules" => snapshot.len());
            for module in snapshot {
                self.evaluate(module);
            }
        };
        self.stats.iterations = iterations;
        self.stats.max_iterations = self.stats.max_iterations.max(iterations);
        outcome
    }

    fn evaluate(&mut self, module: ModuleIdx) {
        if !self.context.prepare_eval(module) {
            return;
        }
        self.stats.evals += 1;
        if module == self.context.root() {
            self.bench
                .eval(&mut EvalContext::new(&mut self.context, module));
        } else if let Some(mut behaviour) = self.context.take_behaviour(module)
        {
            behaviour.eval(&mut EvalContext::new(&mut self.context, module));
            self.context.restore_behaviour(module, behaviour);
        } else {
            warn!(self.logger, "module has no behaviour to evaluate";
                "module" => self.context.path(module),
                "cycle" => self.context.cycle());
        }
    }
}
