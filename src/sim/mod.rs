/// Dispatch event window derived from the target series.
pub mod event;
pub mod kpi;
/// Observers notified as the run advances.
pub mod observer;
pub mod orchestrator;
#[cfg(feature = "realtime")]
pub mod pacer;
pub mod penalty;
pub mod types;

pub use observer::{ObserverSet, SimulationObserver, TickLogger};
pub use orchestrator::Simulation;
#[cfg(feature = "realtime")]
pub use pacer::PacedSimulation;
pub use types::{
    Difficulty, DispatchCounts, FeedbackMemory, RunStatus, SimulationState, TickOutcome,
    TimestepResult,
};
