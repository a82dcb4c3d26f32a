//! Clock and process plumbing for running an island simulation headless.

pub mod clock;
pub mod telemetry;

pub use clock::{ClockHandle, SimulationClock};
