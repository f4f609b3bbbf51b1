//! The immutable scenario a run is driven by: timing, exogenous series,
//! noise parameters and the genesis portfolio.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, FixedOffset, Timelike};
use serde::{Deserialize, Serialize};

use crate::assets::{Asset, AssetContext, BaselineErrorParams, Conditions, TICK_MINUTES};
use crate::error::ConfigError;
use crate::sim::event::DispatchEvent;
use crate::sim::types::Difficulty;

/// Outdoor temperature assumed for ticks past the end of the series (°F).
pub const DEFAULT_OUTDOOR_TEMP_F: f32 = 75.0;

/// Scenario-level inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub start_time: DateTime<FixedOffset>,
    /// Number of ticks in the run (the horizon).
    pub ticks: usize,
    /// Master seed for every stochastic draw of the run.
    pub seed: u64,
    pub difficulty: Difficulty,
    /// Per-tick target load reduction (kW). Missing ticks target 0.
    pub target_kw: Vec<f32>,
    /// Per-tick outdoor temperature (°F). Missing ticks use
    /// [`DEFAULT_OUTDOOR_TEMP_F`].
    pub outdoor_temp_f: Vec<f32>,
    pub baseline_error: BaselineErrorParams,
    /// Half-width of the multiplicative measurement noise (fraction).
    pub measurement_noise_pct: f32,
    pub noncompliance_prob: f32,
}

/// A validated scenario plus its genesis portfolio.
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    config: ScenarioConfig,
    assets: Vec<Asset>,
    event: Option<DispatchEvent>,
}

impl Scenario {
    /// Validates the inputs and freezes them.
    ///
    /// # Errors
    ///
    /// Returns every violated constraint.
    pub fn new(config: ScenarioConfig, assets: Vec<Asset>) -> Result<Self, Vec<ConfigError>> {
        let mut errors = Vec::new();
        if config.ticks == 0 {
            errors.push(ConfigError::new("simulation.ticks", "must be > 0"));
        }
        if !(0.0..=1.0).contains(&config.noncompliance_prob) {
            errors.push(ConfigError::new(
                "noise.noncompliance_prob",
                "must be in [0.0, 1.0]",
            ));
        }
        if !(0.0..1.0).contains(&config.measurement_noise_pct) {
            errors.push(ConfigError::new("noise.measurement_pct", "must be in [0.0, 1.0)"));
        }
        let be = &config.baseline_error;
        if be.sigma_bias < 0.0 || be.sigma_drift < 0.0 {
            errors.push(ConfigError::new("baseline_error", "sigmas must be >= 0"));
        }
        if !(0.0..=1.0).contains(&be.rho) {
            errors.push(ConfigError::new("baseline_error.rho", "must be in [0.0, 1.0]"));
        }
        if config.target_kw.iter().any(|t| !t.is_finite() || *t < 0.0) {
            errors.push(ConfigError::new("target", "every value must be finite and >= 0"));
        }
        if config.outdoor_temp_f.iter().any(|t| !t.is_finite()) {
            errors.push(ConfigError::new("weather", "every value must be finite"));
        }
        let mut seen = BTreeSet::new();
        for asset in &assets {
            if !seen.insert(asset.id()) {
                errors.push(ConfigError::new(
                    format!("{}.id", asset.kind()),
                    format!("duplicate asset id \"{}\"", asset.id()),
                ));
            }
        }
        if !errors.is_empty() {
            return Err(errors);
        }

        let horizon = config.ticks.min(config.target_kw.len());
        let event = DispatchEvent::from_targets(&config.target_kw[..horizon]);
        Ok(Self {
            config,
            assets,
            event,
        })
    }

    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    /// Genesis portfolio; never mutated.
    pub fn assets(&self) -> &[Asset] {
        &self.assets
    }

    pub fn ticks(&self) -> usize {
        self.config.ticks
    }

    pub fn seed(&self) -> u64 {
        self.config.seed
    }

    pub fn difficulty(&self) -> Difficulty {
        self.config.difficulty
    }

    pub fn event(&self) -> Option<DispatchEvent> {
        self.event
    }

    pub fn target_at(&self, tick: usize) -> f32 {
        self.config.target_kw.get(tick).copied().unwrap_or(0.0)
    }

    pub fn outdoor_temp_at(&self, tick: usize) -> f32 {
        self.config
            .outdoor_temp_f
            .get(tick)
            .copied()
            .unwrap_or(DEFAULT_OUTDOOR_TEMP_F)
    }

    pub fn timestamp(&self, tick: usize) -> DateTime<FixedOffset> {
        self.config.start_time + Duration::minutes(TICK_MINUTES * tick as i64)
    }

    /// Local clock hour at the start of `tick`.
    pub fn hour_of_day(&self, tick: usize) -> u32 {
        self.timestamp(tick).hour()
    }

    /// Position of `tick` within the dispatch event, 0 when there is none.
    pub fn event_progress(&self, tick: usize) -> f32 {
        self.event.map_or(0.0, |e| e.progress(tick))
    }

    pub fn conditions(&self, tick: usize) -> Conditions {
        Conditions::new(tick, self.outdoor_temp_at(tick), self.hour_of_day(tick))
    }

    pub fn asset_context(&self, tick: usize) -> AssetContext {
        AssetContext {
            conditions: self.conditions(tick),
            noncompliance_prob: self.config.noncompliance_prob,
            baseline_error: self.config.baseline_error,
            measurement_noise_pct: self.config.measurement_noise_pct,
        }
    }
}
