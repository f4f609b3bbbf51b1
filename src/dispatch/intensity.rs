//! The single place where 0-100 intensity dials become multipliers.

/// Dial value at or above which a CI building may toggle its process load.
pub const PROCESS_TOGGLE_THRESHOLD: f32 = 70.0;

fn unit(dial: f32) -> f32 {
    if dial.is_finite() {
        dial.clamp(0.0, 100.0) / 100.0
    } else {
        0.0
    }
}

/// Ordering priority multiplier in `[0.5, 1.5]`.
pub fn ordering_multiplier(dial: f32) -> f32 {
    0.5 + unit(dial)
}

/// Share of raw capacity the engine may request, in `[0.5, 1.0]`.
pub fn capacity_multiplier(dial: f32) -> f32 {
    0.5 + 0.5 * unit(dial)
}

pub fn allows_process_toggle(dial: f32) -> bool {
    dial >= PROCESS_TOGGLE_THRESHOLD
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mappings_cover_expected_ranges() {
        assert_eq!(ordering_multiplier(0.0), 0.5);
        assert_eq!(ordering_multiplier(100.0), 1.5);
        assert_eq!(capacity_multiplier(0.0), 0.5);
        assert_eq!(capacity_multiplier(50.0), 0.75);
        assert_eq!(capacity_multiplier(100.0), 1.0);
    }

    #[test]
    fn out_of_range_dials_clamp() {
        assert_eq!(ordering_multiplier(-20.0), 0.5);
        assert_eq!(capacity_multiplier(400.0), 1.0);
        assert_eq!(capacity_multiplier(f32::NAN), 0.5);
    }

    #[test]
    fn toggle_threshold() {
        assert!(!allows_process_toggle(69.9));
        assert!(allows_process_toggle(70.0));
    }
}
