//! pvsim: runs the bundled designs on the simulation kernel.

use std::{fmt::Display, fs::File, io::BufWriter, path::PathBuf};

use argh::FromArgs;
use itertools::Itertools;
use owo_colors::{OwoColorize, Stream};
use pvsim::{
    RunStatus, Simulation, Testbench,
    configuration::SimConfig,
    designs::{Color, CounterBench, TrafficLightBench},
    errors::SimResult,
    trace::{VcdWriter, check_clock_window},
};

const DEFAULT_CYCLES: i64 = 32;

#[derive(FromArgs)]
#[argh(help_triggers("-h", "--help"))]
/// Cycle-based digital logic simulator
struct Opts {
    /// the number of clock cycles to simulate (default 32, zero or less
    /// for no limit)
    #[argh(option, short = 'c', long = "cycles")]
    cycles: Option<i64>,

    /// the number of propagation passes allowed in one cycle
    #[argh(option, short = 'L', long = "iterations")]
    iterations: Option<i64>,

    /// the number of consecutive idle cycles allowed
    #[argh(option, long = "idle")]
    idle: Option<i64>,

    /// path to a JSON configuration file. Command line options take
    /// precedence over its contents
    #[argh(option, long = "config")]
    config: Option<PathBuf>,

    /// write a VCD waveform to the given file
    #[argh(option, long = "vcd")]
    vcd: Option<PathBuf>,

    /// first cycle written to the VCD file
    #[argh(option, long = "vcd-start")]
    vcd_start: Option<u64>,

    /// cycle at which VCD output stops
    #[argh(option, long = "vcd-stop")]
    vcd_stop: Option<u64>,

    /// clock frequency in Hz used for VCD timing
    #[argh(option, long = "frequency")]
    frequency: Option<f64>,

    /// print the clock-edge changes of every register
    #[argh(switch, long = "trace-registers")]
    trace_registers: bool,

    /// silence warnings
    #[argh(switch, short = 'q', long = "quiet")]
    quiet: bool,

    /// enables debug logging
    #[argh(switch, long = "debug-logging")]
    debug_logging: bool,

    #[argh(subcommand)]
    design: Design,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Design {
    Tlc(CommandTlc),
    Counter(CommandCounter),
}

#[derive(FromArgs)]
#[argh(subcommand, name = "tlc")]
/// Run the traffic light controller
struct CommandTlc {
    /// length of a green phase in cycles
    #[argh(option, short = 't', long = "timer-ticks", default = "4")]
    timer_ticks: u32,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "counter")]
/// Run the 4-bit counter
struct CommandCounter {
    /// the number of leading cycles with reset asserted
    #[argh(option, long = "reset-cycles", default = "1")]
    reset_cycles: u64,
}

impl Opts {
    fn sim_config(&self) -> SimResult<SimConfig> {
        let mut config = match &self.config {
            Some(path) => SimConfig::from_json_file(path)?,
            None => SimConfig::builder().cycle_limit(DEFAULT_CYCLES).build(),
        };
        if let Some(cycles) = self.cycles {
            config.cycle_limit = cycles;
        }
        if let Some(iterations) = self.iterations {
            config.iteration_limit = iterations;
        }
        if let Some(idle) = self.idle {
            config.idle_limit = idle;
        }
        if let Some(frequency) = self.frequency {
            config.operating_point.frequency_hz = frequency;
        }
        config.logging.quiet |= self.quiet;
        config.logging.debug_logging |= self.debug_logging;
        config.validate()?;
        Ok(config)
    }

    fn attach_tracing<B: Testbench>(
        &self,
        sim: &mut Simulation<B>,
    ) -> SimResult<()> {
        check_clock_window(self.vcd_start, self.vcd_stop)?;
        if let Some(path) = &self.vcd {
            let file = BufWriter::new(File::create(path)?);
            let vcd = VcdWriter::new(file, sim.config().operating_point)?
                .with_clock_window(self.vcd_start, self.vcd_stop);
            sim.attach_trace(Box::new(vcd));
        }
        if self.trace_registers {
            sim.context_mut().trace_all_registers();
        }
        Ok(())
    }
}

fn paint(color: Color) -> String {
    let text = color.to_string();
    match color {
        Color::Red => text
            .if_supports_color(Stream::Stdout, |t| t.red())
            .to_string(),
        Color::Yellow => text
            .if_supports_color(Stream::Stdout, |t| t.yellow())
            .to_string(),
        Color::Green => text
            .if_supports_color(Stream::Stdout, |t| t.green())
            .to_string(),
    }
}

fn report<B: Testbench>(sim: &Simulation<B>, status: &RunStatus) {
    let stats = sim.stats();
    if status.is_abnormal() {
        eprintln!(
            "{} {status}",
            "Simulation error:".if_supports_color(Stream::Stderr, |t| t.red())
        );
    } else {
        println!(
            "{} {status}",
            "Simulation complete:"
                .if_supports_color(Stream::Stdout, |t| t.bold())
        );
    }
    println!(
        "{} clocks, {} evaluations, at most {} passes per clock, {:?}",
        stats.cycles,
        stats.evals,
        stats.max_iterations,
        sim.run_time()
    );
}

fn print_cycle(cycle: usize, line: impl Display) {
    println!(
        "clock {}: {line}",
        (cycle + 1).if_supports_color(Stream::Stdout, |t| t.dimmed())
    );
}

fn print_traced_changes<B: Testbench>(sim: &Simulation<B>) {
    for (cycle, changes) in &sim.traced_changes().iter().chunk_by(|(c, _)| *c) {
        println!(
            "{}",
            format!(">>> clock {cycle}")
                .if_supports_color(Stream::Stdout, |t| t.cyan())
        );
        for (_, record) in changes {
            println!(">>>   {record}");
        }
    }
}

fn run_tlc(opts: &Opts, cmd: &CommandTlc) -> SimResult<RunStatus> {
    let mut sim = Simulation::new("tlc_tb", opts.sim_config()?, |cx, root| {
        Ok(TrafficLightBench::build(cx, root, cmd.timer_ticks)?)
    })?;
    opts.attach_tracing(&mut sim)?;
    let status = sim.run()?;

    for (cycle, (ew, ns)) in sim.bench().history.iter().enumerate() {
        print_cycle(
            cycle,
            format!("East-West = {}, North-South = {}", paint(*ew), paint(*ns)),
        );
    }
    print_traced_changes(&sim);
    report(&sim, &status);
    Ok(status)
}

fn run_counter(opts: &Opts, cmd: &CommandCounter) -> SimResult<RunStatus> {
    let mut sim =
        Simulation::new("counter_tb", opts.sim_config()?, |cx, root| {
            Ok(CounterBench::build(cx, root, cmd.reset_cycles)?)
        })?;
    opts.attach_tracing(&mut sim)?;
    let status = sim.run()?;

    for (cycle, value) in sim.bench().history.iter().enumerate() {
        match value {
            Some(v) => print_cycle(cycle, format!("value = {v}")),
            None => print_cycle(cycle, "value = x"),
        }
    }
    print_traced_changes(&sim);
    report(&sim, &status);
    Ok(status)
}

fn main() -> SimResult<()> {
    let opts: Opts = argh::from_env();

    let status = match &opts.design {
        Design::Tlc(cmd) => run_tlc(&opts, cmd)?,
        Design::Counter(cmd) => run_counter(&opts, cmd)?,
    };

    if status.is_abnormal() {
        std::process::exit(status.exit_code());
    }
    Ok(())
}
