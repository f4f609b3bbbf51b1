//! Core orchestrator types: run status, difficulty, feedback memory, the
//! simulation state and per-tick records.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::assets::{Asset, AssetKind};

/// Trust score assigned to an asset before its first dispatch.
pub const INITIAL_TRUST: f32 = 0.8;
/// Trust lost when a dispatched asset drops.
pub const TRUST_PENALTY: f32 = 0.1;
/// Trust gained when a dispatched asset stays available.
pub const TRUST_REWARD: f32 = 0.02;
/// Accumulated error is clamped to this multiple of the current target.
pub const ANTI_WINDUP_MULTIPLE: f32 = 5.0;

/// Lifecycle of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    #[default]
    NotStarted,
    Running,
    Paused,
    Complete,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RunStatus::NotStarted => "not started",
            RunStatus::Running => "running",
            RunStatus::Paused => "paused",
            RunStatus::Complete => "complete",
        })
    }
}

/// Penalty and execution-noise presets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    #[default]
    Normal,
    Hard,
}

/// Numeric parameters behind a [`Difficulty`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DifficultyParams {
    pub penalty_exponent: f32,
    /// Scale applied to the penalty when delivery exceeds the target.
    pub over_performance_ratio: f32,
    /// Half-width of the per-asset execution multiplier `U(1-v, 1+v)`.
    pub response_variability: f32,
}

impl Difficulty {
    pub const NAMES: &'static [&'static str] = &["easy", "normal", "hard"];

    pub fn params(&self) -> DifficultyParams {
        let (penalty_exponent, over_performance_ratio, response_variability) = match self {
            Difficulty::Easy => (1.5, 0.25, 0.02),
            Difficulty::Normal => (2.0, 0.5, 0.05),
            Difficulty::Hard => (2.5, 0.75, 0.10),
        };
        DifficultyParams {
            penalty_exponent,
            over_performance_ratio,
            response_variability,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "easy" => Some(Difficulty::Easy),
            "normal" => Some(Difficulty::Normal),
            "hard" => Some(Difficulty::Hard),
            _ => None,
        }
    }
}

/// Closed-loop memory carried from one tick to the next.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedbackMemory {
    /// Integral of past errors, clamped for anti-windup (kW).
    pub accumulated_error_kw: f32,
    /// `target - achieved` of the last applied tick (kW).
    pub last_error_kw: f32,
    /// Error of the tick before that (kW).
    pub prev_error_kw: f32,
    /// Per-asset trust, in `[0, 1]`. Missing ids have [`INITIAL_TRUST`].
    pub trust_scores: BTreeMap<String, f32>,
    /// Ids commanded on the last applied tick.
    pub previously_dispatched: BTreeSet<String>,
    /// Tick at which each id was last commanded.
    pub last_dispatched_tick: BTreeMap<String, usize>,
    /// Effective target of the last tick that dispatched anything (kW).
    pub last_dispatch_target_kw: Option<f32>,
}

impl FeedbackMemory {
    pub fn trust(&self, id: &str) -> f32 {
        self.trust_scores.get(id).copied().unwrap_or(INITIAL_TRUST)
    }

    /// Folds the last error into the accumulator, clamped to
    /// `±ANTI_WINDUP_MULTIPLE × target`.
    pub fn integrate_error(&mut self, target_kw: f32) {
        let limit = ANTI_WINDUP_MULTIPLE * target_kw.abs();
        self.accumulated_error_kw =
            (self.accumulated_error_kw + self.last_error_kw).clamp(-limit, limit);
    }

    pub fn record_error(&mut self, error_kw: f32) {
        self.prev_error_kw = self.last_error_kw;
        self.last_error_kw = error_kw;
    }

    /// Adjusts the trust of a dispatched asset.
    pub fn update_trust(&mut self, id: &str, dropped: bool) {
        let delta = if dropped { -TRUST_PENALTY } else { TRUST_REWARD };
        let next = (self.trust(id) + delta).clamp(0.0, 1.0);
        self.trust_scores.insert(id.to_string(), next);
    }
}

/// Dispatched-asset counts per type for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchCounts {
    pub hvac: usize,
    pub battery: usize,
    pub ev: usize,
    pub fleet_site: usize,
    pub ci_building: usize,
}

impl DispatchCounts {
    pub fn increment(&mut self, kind: AssetKind) {
        match kind {
            AssetKind::Hvac => self.hvac += 1,
            AssetKind::Battery => self.battery += 1,
            AssetKind::Ev => self.ev += 1,
            AssetKind::FleetSite => self.fleet_site += 1,
            AssetKind::CiBuilding => self.ci_building += 1,
        }
    }

    pub fn get(&self, kind: AssetKind) -> usize {
        match kind {
            AssetKind::Hvac => self.hvac,
            AssetKind::Battery => self.battery,
            AssetKind::Ev => self.ev,
            AssetKind::FleetSite => self.fleet_site,
            AssetKind::CiBuilding => self.ci_building,
        }
    }

    pub fn total(&self) -> usize {
        self.hvac + self.battery + self.ev + self.fleet_site + self.ci_building
    }
}

/// Immutable record of one applied tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimestepResult {
    pub tick: usize,
    /// Start of the tick, RFC 3339.
    pub timestamp: String,
    pub outdoor_temp_f: f32,
    /// Nominal target from the scenario (kW).
    pub target_kw: f32,
    /// Target after strategy adjustments (kW).
    pub effective_target_kw: f32,
    /// Measured portfolio load reduction (kW).
    pub achieved_kw: f32,
    /// `max(0, target - achieved)` (kW).
    pub shortfall_kw: f32,
    pub penalty: f32,
    /// Assets dropped at the end of this tick, cumulative.
    pub dropped_count: usize,
    pub dispatch_counts: DispatchCounts,
    /// Ids commanded this tick but not the tick before.
    pub new_dispatches: usize,
    /// Ids commanded both this tick and the tick before.
    pub continued_dispatches: usize,
}

impl fmt::Display for TimestepResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "t={:>4} {} | target={:>8.2} kW  eff={:>8.2} kW  achieved={:>8.2} kW  \
             short={:>7.2} kW | penalty={:.4} | dispatched={} (new {}) dropped={} | {:.1}°F",
            self.tick,
            self.timestamp,
            self.target_kw,
            self.effective_target_kw,
            self.achieved_kw,
            self.shortfall_kw,
            self.penalty,
            self.dispatch_counts.total(),
            self.new_dispatches,
            self.dropped_count,
            self.outdoor_temp_f,
        )
    }
}

/// Everything that changes over a run, in one snapshot-able value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationState {
    /// Index of the next tick to apply.
    pub tick: usize,
    pub assets: Vec<Asset>,
    /// Append-only, one entry per applied tick.
    pub history: Vec<TimestepResult>,
    pub cumulative_penalty: f32,
    pub status: RunStatus,
    pub feedback: FeedbackMemory,
}

impl SimulationState {
    /// Fresh state at genesis for the given portfolio.
    pub fn new(assets: Vec<Asset>) -> Self {
        Self {
            assets,
            ..Self::default()
        }
    }

    pub fn dropped_count(&self) -> usize {
        self.assets.iter().filter(|a| a.is_dropped()).count()
    }
}

/// Result of applying one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome {
    pub result: TimestepResult,
    /// Whether this tick reached the horizon.
    pub completed: bool,
}
