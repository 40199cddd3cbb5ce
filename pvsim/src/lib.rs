//! An event-driven, cycle-based simulation kernel for synchronous digital
//! logic.
//!
//! A design is a tree of modules connected by three-state signals and
//! two-stage registers, all owned by a [`SimContext`](structures::SimContext).
//! A [`Simulation`](simulation::Simulation) drives the design through clock
//! cycles, evaluating modules whenever something they are sensitized to
//! changes until the cycle settles.

pub mod configuration;
pub mod designs;
pub mod errors;
pub mod logging;
pub mod simulation;
pub mod structures;
pub mod trace;
pub mod values;

mod tests;

pub use simulation::{RunStats, RunStatus, Simulation, Testbench};
