//! Ramp gating: how much of the ranked list is dispatched as an event
//! progresses.

use std::collections::BTreeSet;

use super::strategy::RiskPosture;

/// Minimum share of candidates dispatched at any point of an event.
pub const RAMP_FLOOR: f32 = 0.2;

/// Share of the ranked candidates to dispatch at `progress` (0 to 1).
pub fn ramp_fraction(posture: RiskPosture, progress: f32) -> f32 {
    let p = if progress.is_finite() {
        progress.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let raw = match posture {
        RiskPosture::RiskAverse => p / 0.7,
        RiskPosture::OpportunitySeeking => p / 0.4,
        RiskPosture::DeadlineAware => p.sqrt(),
    };
    raw.clamp(RAMP_FLOOR, 1.0)
}

/// Number of assets to dispatch out of `n` candidates; at least one when
/// any candidate exists.
pub fn quota(n: usize, fraction: f32) -> usize {
    if n == 0 {
        return 0;
    }
    ((n as f32 * fraction).ceil() as usize).clamp(1, n)
}

/// Selects which ranked items are dispatched this tick.
///
/// Items dispatched last tick are always kept, in ranked order; the rest of
/// the quota is filled from the top of the ranking.
pub fn gate<T>(
    ranked: Vec<T>,
    quota: usize,
    previously: &BTreeSet<String>,
    id_of: impl Fn(&T) -> &str,
) -> Vec<T> {
    let retained = ranked
        .iter()
        .filter(|c| previously.contains(id_of(c)))
        .count();
    let mut fresh_slots = quota.saturating_sub(retained);
    ranked
        .into_iter()
        .filter(|c| {
            if previously.contains(id_of(c)) {
                true
            } else if fresh_slots > 0 {
                fresh_slots -= 1;
                true
            } else {
                false
            }
        })
        .collect()
}
