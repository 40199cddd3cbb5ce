mod context;
mod graph;
mod indices;
mod module;
mod register;
mod signal;

pub use context::SimContext;
pub use graph::{DependencyGraph, Removed};
pub use indices::{
    ModuleId, ModuleIdx, NetRef, Register, RegisterIdx, Signal, SignalIdx,
    SignalKind,
};
pub use module::{EvalContext, Module};
pub use register::commit_triggers;
