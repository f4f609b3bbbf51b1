//! Dispatch simulator for a portfolio of distributed energy resources.
//!
//! Residential HVAC, home batteries, EV chargers, fleet-charging depots and
//! commercial buildings are driven against a time-varying load-reduction
//! target in 5-minute ticks by a configurable dispatch strategy.

/// Per-asset state-transition models and shared estimators.
pub mod assets;
pub mod config;
/// Strategy configuration and the dispatch decision engine.
pub mod dispatch;
pub mod error;
pub mod io;
pub mod scenario;
/// Tick orchestrator, run records, KPIs and pacing.
pub mod sim;
