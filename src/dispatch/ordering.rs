//! Selection orderings and the weighted composite score.

use std::cmp::Ordering;

use super::Candidate;
use super::intensity;
use super::strategy::{SelectionOrdering, StrategyConfig};
use crate::assets::Conditions;
use crate::assets::estimate;
use crate::sim::types::FeedbackMemory;

/// Inputs shared by every criterion for one tick.
#[derive(Debug, Clone, Copy)]
pub struct ScoringContext<'a> {
    pub conditions: &'a Conditions,
    pub feedback: &'a FeedbackMemory,
    /// Number of assets in the portfolio, dropped ones included.
    pub portfolio_len: usize,
}

/// Rank weights `1/(rank+1)`, normalized to sum to one.
pub fn weights(n: usize) -> Vec<f32> {
    let raw: Vec<f32> = (0..n).map(|rank| 1.0 / (rank as f32 + 1.0)).collect();
    let total: f32 = raw.iter().sum();
    if total <= 0.0 {
        return raw;
    }
    raw.into_iter().map(|w| w / total).collect()
}

/// Score of one candidate under one criterion, in `[0, 1]`; higher ranks
/// earlier.
pub fn criterion_score(
    ordering: SelectionOrdering,
    candidate: &Candidate<'_>,
    ctx: &ScoringContext<'_>,
) -> f32 {
    let asset = candidate.asset;
    let tick = ctx.conditions.tick;
    let score = match ordering {
        SelectionOrdering::AssetTypePriority => estimate::type_priority(asset.kind()),
        SelectionOrdering::Trust => ctx.feedback.trust(asset.id()),
        SelectionOrdering::Performance => ctx.feedback.trust(asset.id()) * (1.0 - candidate.risk),
        SelectionOrdering::LowVariance => 1.0 - estimate::response_variance(asset.kind()),
        SelectionOrdering::Headroom => estimate::headroom(asset, ctx.conditions),
        SelectionOrdering::ComfortCost => 1.0 - estimate::comfort_cost(asset, ctx.conditions),
        SelectionOrdering::SocBuffer => estimate::soc_buffer(asset, ctx.conditions),
        SelectionOrdering::Recency => match ctx.feedback.last_dispatched_tick.get(asset.id()) {
            None => 1.0,
            Some(&last) => {
                let since = tick.saturating_sub(last) as f32;
                since / (since + 1.0)
            }
        },
        SelectionOrdering::RoundRobin => {
            let n = ctx.portfolio_len.max(1);
            let slot = (candidate.index + n - tick % n) % n;
            1.0 - slot as f32 / n as f32
        }
        SelectionOrdering::Fatigue => 1.0 - estimate::fatigue_level(asset),
    };
    if score.is_finite() {
        score.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Weighted blend of the configured criteria, scaled by the asset type's
/// intensity dial.
pub fn composite_score(
    strategy: &StrategyConfig,
    candidate: &Candidate<'_>,
    ctx: &ScoringContext<'_>,
) -> f32 {
    let blend: f32 = weights(strategy.orderings.len())
        .into_iter()
        .zip(&strategy.orderings)
        .map(|(w, o)| w * criterion_score(*o, candidate, ctx))
        .sum();
    blend * intensity::ordering_multiplier(strategy.intensity.get(candidate.asset.kind()))
}

/// Sorts by descending `key`, breaking ties by portfolio position.
pub fn sort_desc_by<F>(candidates: &mut [Candidate<'_>], key: F)
where
    F: Fn(&Candidate<'_>) -> f32,
{
    candidates.sort_by(|a, b| match key(b).total_cmp(&key(a)) {
        Ordering::Equal => a.index.cmp(&b.index),
        other => other,
    });
}
