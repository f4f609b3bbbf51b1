//! Dispatch decision engine.
//!
//! One call turns a portfolio snapshot, the tick's target and the strategy
//! into per-asset commands through a fixed pipeline: estimate, score and
//! rank, ramp-gate, scale the target, refine it per framework, synthesize
//! commands.

pub mod framework;
pub mod intensity;
pub mod objective;
pub mod ordering;
pub mod ramp;
pub mod strategy;
pub mod synthesis;

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::assets::{Asset, AssetCommand, Conditions, estimate};
use crate::sim::types::FeedbackMemory;

use ordering::ScoringContext;
use strategy::{FeedbackMode, Framework, StrategyConfig};

pub use strategy::{
    DeterministicPolicy, FeedbackLaw, GreedyCriterion, IntensityDials, ObjectiveFunction,
    RiskPosture, SelectionOrdering, StochasticMode, StrategyPatch, StrategySettings,
};

/// Gain on the previous error used by the error-correction feedback mode.
pub const ERROR_CORRECTION_GAIN: f32 = 0.5;
/// Bounds applied to trust when it scales usable capacity.
pub const TRUST_CAPACITY_FLOOR: f32 = 0.5;

/// A dispatchable asset with its per-tick estimates.
#[derive(Debug, Clone)]
pub struct Candidate<'a> {
    /// Position in the portfolio.
    pub index: usize,
    pub asset: &'a Asset,
    pub capacity_kw: f32,
    pub risk: f32,
    pub score: f32,
}

/// Everything the engine sees for one tick.
#[derive(Debug, Clone, Copy)]
pub struct DispatchInput<'a> {
    pub conditions: Conditions,
    /// Ticks left in the run, the current one included.
    pub ticks_remaining: usize,
    pub assets: &'a [Asset],
    pub nominal_target_kw: f32,
    /// Position within the event window, 0 to 1.
    pub event_progress: f32,
    pub strategy: &'a StrategyConfig,
    pub feedback: &'a FeedbackMemory,
}

/// Commands for one tick plus the engine's bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DispatchPlan {
    pub commands: Vec<AssetCommand>,
    /// Ids that received a command, in dispatch order.
    pub selected_ids: Vec<String>,
    /// Target after feedback, objective and framework adjustments (kW).
    pub effective_target_kw: f32,
    /// Engine-side contribution estimate per dispatched asset (kW).
    pub estimated_kw: BTreeMap<String, f32>,
}

impl DispatchPlan {
    fn empty(effective_target_kw: f32) -> Self {
        Self {
            effective_target_kw,
            ..Self::default()
        }
    }

    /// Sum of the engine's contribution estimates (kW).
    pub fn estimated_total_kw(&self) -> f32 {
        self.estimated_kw.values().sum()
    }
}

/// Produces per-asset commands for one tick.
///
/// Implementations must be deterministic given their inputs and the RNG.
pub trait Dispatcher {
    fn dispatch(&mut self, input: &DispatchInput<'_>, rng: &mut StdRng) -> DispatchPlan;
}

/// The composable strategy engine.
#[derive(Debug, Default, Clone, Copy)]
pub struct DispatchEngine;

impl Dispatcher for DispatchEngine {
    fn dispatch(&mut self, input: &DispatchInput<'_>, rng: &mut StdRng) -> DispatchPlan {
        plan(input, rng)
    }
}

fn mean_trust(candidates: &[Candidate<'_>], feedback: &FeedbackMemory) -> f32 {
    if candidates.is_empty() {
        return 0.0;
    }
    candidates
        .iter()
        .map(|c| feedback.trust(c.asset.id()))
        .sum::<f32>()
        / candidates.len() as f32
}

/// Runs the full pipeline.
pub fn plan(input: &DispatchInput<'_>, rng: &mut StdRng) -> DispatchPlan {
    let strategy = input.strategy;
    let feedback = input.feedback;
    let cond = &input.conditions;
    let nominal = input.nominal_target_kw;
    if !nominal.is_finite() || nominal <= 0.0 {
        return DispatchPlan::empty(0.0);
    }

    let conservation = strategy.risk_posture.conservation();
    let mut candidates: Vec<Candidate<'_>> = input
        .assets
        .iter()
        .enumerate()
        .filter(|(_, asset)| !asset.is_dropped())
        .map(|(index, asset)| Candidate {
            index,
            asset,
            capacity_kw: estimate::capacity_kw(asset, cond),
            risk: estimate::drop_risk(asset, cond, conservation),
            score: 0.0,
        })
        .filter(|c| c.capacity_kw > 0.0)
        .collect();
    if candidates.is_empty() {
        return DispatchPlan::empty(nominal);
    }

    let ctx = ScoringContext {
        conditions: cond,
        feedback,
        portfolio_len: input.assets.len(),
    };
    for c in &mut candidates {
        c.score = ordering::composite_score(strategy, c, &ctx);
    }
    ordering::sort_desc_by(&mut candidates, |c| c.score);
    if let Framework::GreedyMyopic(criterion) = strategy.framework {
        framework::greedy_rerank(criterion, &mut candidates, cond);
    }

    let fraction = ramp::ramp_fraction(strategy.risk_posture, input.event_progress);
    let quota = ramp::quota(candidates.len(), fraction);
    let gated = ramp::gate(candidates, quota, &feedback.previously_dispatched, |c| {
        c.asset.id()
    });

    let mut base = nominal;
    if strategy.feedback_mode == FeedbackMode::ErrorCorrection
        && !matches!(strategy.framework, Framework::FeedbackControl(_))
    {
        base = (base + ERROR_CORRECTION_GAIN * feedback.last_error_kw).max(0.0);
    }
    let scaled = objective::scale_target(strategy.objective, base, strategy.reserve_margin, cond.tick);

    let effective = match strategy.framework {
        Framework::DeterministicPolicy(policy) => {
            framework::deterministic(policy, scaled, input.event_progress, feedback)
        }
        Framework::GreedyMyopic(_) => scaled,
        Framework::Stochastic(mode) => {
            let lookahead = input.ticks_remaining.clamp(1, framework::MC_MAX_LOOKAHEAD);
            framework::stochastic(mode, scaled, &gated, lookahead, rng)
        }
        Framework::FeedbackControl(law) => {
            framework::feedback_control(law, scaled, feedback, mean_trust(&gated, feedback))
        }
    };
    if !effective.is_finite() || effective <= 0.0 {
        return DispatchPlan::empty(0.0);
    }

    let mut out = DispatchPlan::empty(effective);
    let mut remaining = effective;
    for c in &gated {
        if remaining <= 0.0 {
            break;
        }
        let dial = strategy.intensity.get(c.asset.kind());
        let mut usable = c.capacity_kw * intensity::capacity_multiplier(dial);
        if strategy.feedback_mode == FeedbackMode::TrustWeighted {
            usable *= feedback.trust(c.asset.id()).clamp(TRUST_CAPACITY_FLOOR, 1.0);
        }
        let request = usable.min(remaining);
        let Some(s) = synthesis::synthesize(c.asset, request, c.capacity_kw, dial, cond) else {
            continue;
        };
        remaining -= s.estimate_kw;
        let id = c.asset.id().to_string();
        out.estimated_kw.insert(id.clone(), s.estimate_kw);
        out.selected_ids.push(id.clone());
        out.commands.push(AssetCommand {
            asset_id: id,
            command: s.command,
        });
    }

    trace!(
        tick = cond.tick,
        nominal_kw = nominal,
        effective_kw = effective,
        gated = gated.len(),
        dispatched = out.commands.len(),
        "dispatch plan"
    );
    out
}
