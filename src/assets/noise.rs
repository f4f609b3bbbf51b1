//! Stochastic helpers shared by every asset model.
//!
//! Every helper consumes exactly one draw from the generator regardless of
//! its parameters, so the RNG stream of a run never depends on which branch
//! a model took.

use rand::{Rng, rngs::StdRng};

use super::types::BaselineErrorParams;

/// Draws a value uniformly from `[-half_width, half_width)`.
///
/// A non-positive (or non-finite) width yields `0.0` but still advances the
/// generator.
pub fn symmetric_uniform(rng: &mut StdRng, half_width: f32) -> f32 {
    let u: f32 = rng.random::<f32>();
    if !half_width.is_finite() || half_width <= 0.0 {
        return 0.0;
    }
    (2.0 * u - 1.0) * half_width
}

/// Advances the persistent baseline drift by one AR(1) step.
///
/// ```text
/// drift(t+1) = rho * drift(t) + U(-sigma_drift, sigma_drift)
/// ```
pub fn advance_drift(rng: &mut StdRng, drift: f32, params: &BaselineErrorParams) -> f32 {
    let innovation = symmetric_uniform(rng, params.sigma_drift);
    params.rho.clamp(0.0, 1.0) * drift + innovation
}

/// Returns a multiplicative measurement-noise factor `1 + U(-pct, pct)`.
pub fn measurement_factor(rng: &mut StdRng, pct: f32) -> f32 {
    1.0 + symmetric_uniform(rng, pct)
}

/// Rolls the per-tick noncompliance die. Returns `true` when the asset
/// honors its command this tick.
pub fn complies(rng: &mut StdRng, noncompliance_prob: f32) -> bool {
    let roll: f32 = rng.random::<f32>();
    roll >= noncompliance_prob.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn symmetric_uniform_stays_in_band() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1_000 {
            let v = symmetric_uniform(&mut rng, 0.3);
            assert!((-0.3..=0.3).contains(&v), "{v} out of band");
        }
    }

    #[test]
    fn zero_width_still_advances_stream() {
        let mut a = StdRng::seed_from_u64(11);
        let mut b = StdRng::seed_from_u64(11);
        assert_eq!(symmetric_uniform(&mut a, 0.0), 0.0);
        let _ = symmetric_uniform(&mut b, 1.0);
        assert_eq!(a.random::<u64>(), b.random::<u64>());
    }

    #[test]
    fn drift_decays_without_innovation() {
        let mut rng = StdRng::seed_from_u64(3);
        let params = BaselineErrorParams {
            sigma_bias: 0.0,
            sigma_drift: 0.0,
            rho: 0.5,
        };
        let mut drift = 4.0;
        for _ in 0..3 {
            drift = advance_drift(&mut rng, drift, &params);
        }
        assert!((drift - 0.5).abs() < 1e-6);
    }

    #[test]
    fn full_noncompliance_never_complies() {
        let mut rng = StdRng::seed_from_u64(5);
        assert!((0..100).all(|_| !complies(&mut rng, 1.0)));
        assert!((0..100).all(|_| complies(&mut rng, 0.0)));
    }
}
