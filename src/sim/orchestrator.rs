//! Simulation orchestrator: owns the run state and drives the tick loop.
//!
//! A tick is computed against clones of the RNG, feedback memory and
//! portfolio, and committed only when every step succeeded. A failed tick
//! leaves the state exactly as it was.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info, warn};

use crate::assets::{Command, noise};
use crate::dispatch::strategy::{RiskPosture, StrategyConfig, StrategyPatch};
use crate::dispatch::{DispatchEngine, DispatchInput, Dispatcher};
use crate::error::SimError;
use crate::scenario::Scenario;

use super::observer::{ObserverSet, SimulationObserver};
use super::penalty::tick_penalty;
use super::types::{
    DifficultyParams, DispatchCounts, RunStatus, SimulationState, TickOutcome, TimestepResult,
};

/// Playback speed bounds (ticks per second).
pub const MIN_SPEED: f32 = 0.5;
pub const MAX_SPEED: f32 = 10.0;

/// A single run of a scenario under a strategy.
///
/// Generic over `D: Dispatcher` so alternative engines can be swapped in
/// without dynamic dispatch.
#[derive(Debug)]
pub struct Simulation<D: Dispatcher = DispatchEngine> {
    scenario: Scenario,
    strategy: StrategyConfig,
    dispatcher: D,
    difficulty: DifficultyParams,
    rng: StdRng,
    state: SimulationState,
    observers: ObserverSet,
    speed: f32,
    /// Bumped on every pause and reset so stale pacing tasks can tell they
    /// are outdated.
    epoch: u64,
}

impl Simulation<DispatchEngine> {
    /// Creates a simulation driven by the default [`DispatchEngine`].
    pub fn new(scenario: Scenario, strategy: StrategyConfig) -> Self {
        Self::with_dispatcher(scenario, strategy, DispatchEngine)
    }
}

impl<D: Dispatcher> Simulation<D> {
    pub fn with_dispatcher(scenario: Scenario, strategy: StrategyConfig, dispatcher: D) -> Self {
        let rng = StdRng::seed_from_u64(scenario.seed());
        let difficulty = scenario.difficulty().params();
        let state = SimulationState::new(scenario.assets().to_vec());
        Self {
            scenario,
            strategy,
            dispatcher,
            difficulty,
            rng,
            state,
            observers: ObserverSet::default(),
            speed: 1.0,
            epoch: 0,
        }
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    pub fn strategy(&self) -> &StrategyConfig {
        &self.strategy
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    /// Owned copy of the full state.
    pub fn snapshot(&self) -> SimulationState {
        self.state.clone()
    }

    pub fn status(&self) -> RunStatus {
        self.state.status
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn observers(&self) -> &ObserverSet {
        &self.observers
    }

    pub fn add_observer(&mut self, observer: Arc<dyn SimulationObserver>) {
        self.observers.add(observer);
    }

    /// Sets the playback speed, clamped to `[MIN_SPEED, MAX_SPEED]`.
    /// Non-finite values are ignored. Returns the speed in effect.
    pub fn set_speed(&mut self, speed: f32) -> f32 {
        if speed.is_finite() {
            self.speed = speed.clamp(MIN_SPEED, MAX_SPEED);
        }
        self.speed
    }

    /// Wall-clock time between paced ticks at the current speed.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f32(1.0 / self.speed)
    }

    /// NotStarted or Paused → Running.
    ///
    /// # Errors
    ///
    /// [`SimError::InvalidTransition`] from Running or Complete.
    pub fn start(&mut self) -> Result<(), SimError> {
        match self.state.status {
            RunStatus::NotStarted | RunStatus::Paused => {
                self.state.status = RunStatus::Running;
                info!(tick = self.state.tick, "simulation running");
                Ok(())
            }
            status => Err(SimError::InvalidTransition {
                action: "start",
                status,
            }),
        }
    }

    /// Running → Paused.
    ///
    /// # Errors
    ///
    /// [`SimError::InvalidTransition`] from any other status.
    pub fn pause(&mut self) -> Result<(), SimError> {
        match self.state.status {
            RunStatus::Running => {
                self.state.status = RunStatus::Paused;
                self.epoch += 1;
                info!(tick = self.state.tick, "simulation paused");
                Ok(())
            }
            status => Err(SimError::InvalidTransition {
                action: "pause",
                status,
            }),
        }
    }

    /// Any status → NotStarted with the genesis portfolio, empty history,
    /// zeroed feedback and a reseeded generator. The strategy is kept.
    pub fn reset(&mut self) {
        self.state = SimulationState::new(self.scenario.assets().to_vec());
        self.rng = StdRng::seed_from_u64(self.scenario.seed());
        self.epoch += 1;
        info!(seed = self.scenario.seed(), "simulation reset");
    }

    /// Applies one tick outside of paced playback.
    ///
    /// A step from NotStarted leaves the run Paused.
    ///
    /// # Errors
    ///
    /// [`SimError::InvalidTransition`] while Running,
    /// [`SimError::Complete`] at the horizon, and any tick failure.
    pub fn step(&mut self) -> Result<TickOutcome, SimError> {
        match self.state.status {
            RunStatus::Running => Err(SimError::InvalidTransition {
                action: "step",
                status: RunStatus::Running,
            }),
            RunStatus::Complete => Err(SimError::Complete {
                ticks: self.scenario.ticks(),
            }),
            RunStatus::NotStarted | RunStatus::Paused => {
                let outcome = self.advance()?;
                if !outcome.completed {
                    self.state.status = RunStatus::Paused;
                }
                Ok(outcome)
            }
        }
    }

    /// Starts (if needed) and applies every remaining tick without pacing.
    ///
    /// # Errors
    ///
    /// Any transition or tick failure. Ticks applied before the failure
    /// are kept and the run is left Paused.
    pub fn run_to_completion(&mut self) -> Result<&[TimestepResult], SimError> {
        if self.state.status != RunStatus::Running {
            self.start()?;
        }
        while self.state.status == RunStatus::Running {
            if let Err(err) = self.advance() {
                warn!(%err, "tick failed, pausing");
                self.pause()?;
                return Err(err);
            }
        }
        Ok(&self.state.history)
    }

    /// Replaces the risk posture; takes effect on the next tick.
    pub fn update_risk_posture(&mut self, posture: RiskPosture) {
        debug!(%posture, "risk posture updated");
        self.strategy.risk_posture = posture;
    }

    /// Applies a partial strategy update atomically.
    ///
    /// # Errors
    ///
    /// [`SimError::Strategy`] when the merged strategy is invalid; the
    /// current strategy is kept.
    pub fn update_strategy_config(&mut self, patch: &StrategyPatch) -> Result<(), SimError> {
        self.strategy.apply(patch)?;
        debug!(framework = self.strategy.framework.name(), "strategy updated");
        Ok(())
    }

    /// Applies the next tick regardless of status, short of the horizon.
    pub(crate) fn advance(&mut self) -> Result<TickOutcome, SimError> {
        let horizon = self.scenario.ticks();
        let tick = self.state.tick;
        if tick >= horizon {
            return Err(SimError::Complete { ticks: horizon });
        }

        let mut rng = self.rng.clone();
        let mut feedback = self.state.feedback.clone();
        let target_kw = self.scenario.target_at(tick);
        let ctx = self.scenario.asset_context(tick);

        // 1. Close the loop on the previous tick's error
        feedback.integrate_error(target_kw);

        // 2. Dispatch
        let input = DispatchInput {
            conditions: ctx.conditions,
            ticks_remaining: horizon - tick,
            assets: &self.state.assets,
            nominal_target_kw: target_kw,
            event_progress: self.scenario.event_progress(tick),
            strategy: &self.strategy,
            feedback: &feedback,
        };
        let plan = self.dispatcher.dispatch(&input, &mut rng);

        let mut commands: BTreeMap<&str, &Command> = BTreeMap::new();
        for c in &plan.commands {
            if self.state.assets.iter().any(|a| a.id() == c.asset_id) {
                commands.insert(c.asset_id.as_str(), &c.command);
            } else {
                warn!(tick, asset = %c.asset_id, "command for unknown asset ignored");
            }
        }

        // 3. Advance every asset and measure the aggregate response
        let variability = self.difficulty.response_variability;
        let mut next_assets = Vec::with_capacity(self.state.assets.len());
        let mut dispatch_counts = DispatchCounts::default();
        let mut dispatched: BTreeSet<String> = BTreeSet::new();
        let mut achieved_kw = 0.0_f32;
        for asset in &self.state.assets {
            let command = commands.get(asset.id()).copied();
            let step = match asset.advance(command, &ctx, &mut rng) {
                Ok(step) => {
                    if command.is_some() {
                        dispatch_counts.increment(asset.kind());
                        dispatched.insert(asset.id().to_string());
                    }
                    step
                }
                Err(err) => {
                    warn!(tick, asset = asset.id(), %err, "stepping without command");
                    asset.advance(None, &ctx, &mut rng)?
                }
            };
            let execution = 1.0 + noise::symmetric_uniform(&mut rng, variability);
            achieved_kw += step.power_delta_kw * execution;
            next_assets.push(step.asset);
        }
        if !achieved_kw.is_finite() {
            return Err(SimError::NonFiniteAggregate { tick });
        }
        let new_dispatches = dispatched
            .difference(&feedback.previously_dispatched)
            .count();
        let continued_dispatches = dispatched.len() - new_dispatches;

        // 4. Trust, error and dispatch memory
        for asset in next_assets.iter().filter(|a| dispatched.contains(a.id())) {
            feedback.update_trust(asset.id(), asset.is_dropped());
        }
        let penalty = tick_penalty(target_kw, achieved_kw, &self.difficulty);
        feedback.record_error(target_kw - achieved_kw);
        for id in &dispatched {
            feedback.last_dispatched_tick.insert(id.clone(), tick);
        }
        if !dispatched.is_empty() {
            feedback.last_dispatch_target_kw = Some(plan.effective_target_kw);
        }
        feedback.previously_dispatched = dispatched;

        let result = TimestepResult {
            tick,
            timestamp: self.scenario.timestamp(tick).to_rfc3339(),
            outdoor_temp_f: ctx.conditions.outdoor_temp_f,
            target_kw,
            effective_target_kw: plan.effective_target_kw,
            achieved_kw,
            shortfall_kw: (target_kw - achieved_kw).max(0.0),
            penalty,
            dropped_count: next_assets.iter().filter(|a| a.is_dropped()).count(),
            dispatch_counts,
            new_dispatches,
            continued_dispatches,
        };

        // 5. Commit
        self.rng = rng;
        self.state.assets = next_assets;
        self.state.feedback = feedback;
        self.state.cumulative_penalty += penalty;
        self.state.history.push(result.clone());
        self.state.tick += 1;
        let completed = self.state.tick >= horizon;
        if completed {
            self.state.status = RunStatus::Complete;
        }

        debug!(
            tick,
            target_kw,
            achieved_kw,
            penalty,
            dispatched = result.dispatch_counts.total(),
            "tick applied"
        );

        self.observers.on_tick(&self.state);
        if completed {
            info!(
                ticks = horizon,
                cumulative_penalty = self.state.cumulative_penalty,
                "simulation complete"
            );
            self.observers.on_complete(&self.state);
        }

        Ok(TickOutcome { result, completed })
    }
}
