//! Objective-based scaling of the nominal target.

use super::strategy::ObjectiveFunction;

/// Amplitude of the exploration perturbation used by the learning objective.
pub const LEARNING_AMPLITUDE: f32 = 0.05;
/// Angular step (radians per tick) of the exploration perturbation.
pub const LEARNING_FREQUENCY: f32 = 0.7;

/// Multiplier applied to the target for the given objective.
pub fn target_multiplier(objective: ObjectiveFunction, reserve_margin: f32, tick: usize) -> f32 {
    let m = reserve_margin.max(0.0);
    match objective {
        ObjectiveFunction::Capacity => 1.0 + 0.5 * m,
        ObjectiveFunction::RiskMinimization => 1.0 + m,
        ObjectiveFunction::Efficiency => 1.0,
        ObjectiveFunction::RegretMinimization => 1.0 + 1.5 * m,
        ObjectiveFunction::LearningOriented => {
            1.0 + LEARNING_AMPLITUDE * (LEARNING_FREQUENCY * tick as f32).sin()
        }
    }
}

pub fn scale_target(
    objective: ObjectiveFunction,
    target_kw: f32,
    reserve_margin: f32,
    tick: usize,
) -> f32 {
    target_kw * target_multiplier(objective, reserve_margin, tick)
}
