//! Island world and tick engine.
//!
//! This crate implements the grid where animals live, move, hunt, graze and
//! breed, the tick engine that advances it, and the snapshots it publishes
//! for readers.

pub mod animal;
pub mod grid;
pub mod simulation;
pub mod snapshot;
pub mod world;

pub use animal::{Animal, Death};
pub use grid::{Cell, Grid};
pub use simulation::{EnginePhase, Simulation};
pub use snapshot::{SnapshotPublisher, TickSummary, WorldSnapshot};
pub use world::{FeedOutcome, StepOutcome, World};
