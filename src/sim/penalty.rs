//! Asymmetric tracking penalty.

use super::types::DifficultyParams;

/// Guard added to the target in the relative error denominator.
pub const EPSILON_KW: f32 = 0.001;

/// Penalty for one tick: `(|target − achieved| / (target + ε))^exponent`,
/// scaled by the over-performance ratio when delivery exceeds the target.
///
/// A non-positive target yields zero.
pub fn tick_penalty(target_kw: f32, achieved_kw: f32, params: &DifficultyParams) -> f32 {
    if target_kw.is_nan() || target_kw <= 0.0 || !achieved_kw.is_finite() {
        return 0.0;
    }
    let rel = (target_kw - achieved_kw).abs() / (target_kw + EPSILON_KW);
    let base = rel.powf(params.penalty_exponent);
    if achieved_kw > target_kw {
        base * params.over_performance_ratio
    } else {
        base
    }
}
