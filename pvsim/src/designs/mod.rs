//! Small designs used by the command-line driver and the test suite.

mod counter;
mod tlc;

pub use counter::{Counter, CounterBench};
pub use tlc::{Color, TrafficLight, TrafficLightBench};
