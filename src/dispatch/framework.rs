//! Framework-specific refinement of the dispatch target and ranking.

use rand::{Rng, rngs::StdRng};

use super::Candidate;
use super::ordering::sort_desc_by;
use super::strategy::{DeterministicPolicy, FeedbackLaw, GreedyCriterion, StochasticMode};
use crate::assets::{Conditions, estimate};
use crate::sim::types::FeedbackMemory;

/// Share of the event treated as ramp-in or ramp-out by the state machine.
pub const STATE_MACHINE_EDGE: f32 = 0.15;
/// Derate applied during the ramp-in phase.
pub const STATE_MACHINE_RAMP_IN: f32 = 0.7;
/// Fraction of the target kept at the very end of the taper.
pub const STATE_MACHINE_TAPER_FLOOR: f32 = 0.5;
/// Relative band within which the threshold policy holds its last level.
pub const THRESHOLD_BAND: f32 = 0.05;

pub const MC_SAMPLES: usize = 10;
pub const MC_MAX_LOOKAHEAD: usize = 6;
/// Quantile of sampled dropout covered by the probabilistic guarantee.
pub const GUARANTEE_QUANTILE: f32 = 0.9;

pub const KP: f32 = 1.2;
pub const KI: f32 = 0.1;
pub const KD: f32 = 0.3;

/// Applies a deterministic policy to the target.
pub fn deterministic(
    policy: DeterministicPolicy,
    target_kw: f32,
    progress: f32,
    feedback: &FeedbackMemory,
) -> f32 {
    match policy {
        DeterministicPolicy::Static => target_kw,
        DeterministicPolicy::StateMachine => {
            if progress < STATE_MACHINE_EDGE {
                target_kw * STATE_MACHINE_RAMP_IN
            } else if progress > 1.0 - STATE_MACHINE_EDGE {
                let into_taper = ((progress - (1.0 - STATE_MACHINE_EDGE)) / STATE_MACHINE_EDGE)
                    .clamp(0.0, 1.0);
                target_kw * (1.0 - (1.0 - STATE_MACHINE_TAPER_FLOOR) * into_taper)
            } else {
                target_kw
            }
        }
        DeterministicPolicy::ThresholdTriggered => match feedback.last_dispatch_target_kw {
            Some(prev) if (prev - target_kw).abs() <= THRESHOLD_BAND * target_kw.abs() => prev,
            _ => target_kw,
        },
    }
}

/// Re-ranks candidates by a single greedy criterion, replacing the
/// composite ordering.
pub fn greedy_rerank(
    criterion: GreedyCriterion,
    candidates: &mut [Candidate<'_>],
    conditions: &Conditions,
) {
    match criterion {
        GreedyCriterion::Capacity => sort_desc_by(candidates, |c| c.capacity_kw),
        GreedyCriterion::Risk => sort_desc_by(candidates, |c| -c.risk),
        GreedyCriterion::Efficiency => sort_desc_by(candidates, |c| {
            c.capacity_kw / (estimate::comfort_cost(c.asset, conditions) + 0.1)
        }),
    }
}

/// Samples the capacity that survives a short lookahead, once per sample.
///
/// Each candidate survives each lookahead tick with probability
/// `1 - risk / lookahead`. Draws one value per candidate per lookahead tick
/// per sample, in that order.
pub fn sample_achievable(
    candidates: &[Candidate<'_>],
    lookahead: usize,
    rng: &mut StdRng,
) -> Vec<f32> {
    let lookahead = lookahead.clamp(1, MC_MAX_LOOKAHEAD);
    (0..MC_SAMPLES)
        .map(|_| {
            candidates
                .iter()
                .map(|c| {
                    let survive_p = (1.0 - c.risk / lookahead as f32).clamp(0.0, 1.0);
                    let mut alive = true;
                    for _ in 0..lookahead {
                        let roll: f32 = rng.random::<f32>();
                        alive &= roll < survive_p;
                    }
                    if alive { c.capacity_kw } else { 0.0 }
                })
                .sum()
        })
        .collect()
}

fn quantile(sorted: &[f32], q: f32) -> f32 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((sorted.len() - 1) as f32 * q.clamp(0.0, 1.0)).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

/// Monte-Carlo target adjustment.
pub fn stochastic(
    mode: StochasticMode,
    target_kw: f32,
    candidates: &[Candidate<'_>],
    lookahead: usize,
    rng: &mut StdRng,
) -> f32 {
    let total: f32 = candidates.iter().map(|c| c.capacity_kw).sum();
    if total <= 0.0 || candidates.is_empty() {
        return target_kw;
    }
    let mut achievable = sample_achievable(candidates, lookahead, rng);
    achievable.sort_by(f32::total_cmp);

    let mut dropout: Vec<f32> = achievable
        .iter()
        .map(|a| (1.0 - a / total).clamp(0.0, 1.0))
        .collect();
    dropout.sort_by(f32::total_cmp);

    match mode {
        StochasticMode::ExpectedValue => {
            let mean = dropout.iter().sum::<f32>() / dropout.len() as f32;
            target_kw * (1.0 + mean)
        }
        StochasticMode::ProbabilisticGuarantee => {
            target_kw * (1.0 + quantile(&dropout, GUARANTEE_QUANTILE))
        }
        StochasticMode::ScenarioMedian => target_kw.min(quantile(&achievable, 0.5)),
    }
}

/// Closed-loop target correction from the previous tick's error.
///
/// `mean_trust` is the mean trust score of the assets selected this tick.
pub fn feedback_control(
    law: FeedbackLaw,
    nominal_kw: f32,
    feedback: &FeedbackMemory,
    mean_trust: f32,
) -> f32 {
    let e = feedback.last_error_kw;
    let corrected = match law {
        FeedbackLaw::Proportional => nominal_kw + KP * e,
        FeedbackLaw::ProportionalTrust => nominal_kw + KP * e * mean_trust.clamp(0.0, 1.0),
        FeedbackLaw::Pid => {
            nominal_kw
                + KP * e
                + KI * feedback.accumulated_error_kw
                + KD * (e - feedback.prev_error_kw)
        }
    };
    corrected.clamp(0.0, 2.0 * nominal_kw.max(0.0))
}
