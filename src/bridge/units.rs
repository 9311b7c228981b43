//! Brightness unit conversion between the level command range and percentages

/// Maximum native level carried by a level command
pub const NATIVE_LEVEL_MAX: u8 = 254;

/// Convert a native level to a percentage in `[0, 100]`.
///
/// A zero `native_max` yields 0.
pub fn to_percentage(native_level: u8, native_max: u8) -> f64 {
    if native_max == 0 {
        return 0.0;
    }
    (f64::from(native_level) / f64::from(native_max) * 100.0).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    /// Convert a percentage back to the nearest native level
    fn from_percentage(percentage: f64, native_max: u8) -> u8 {
        if !percentage.is_finite() {
            return 0;
        }
        let level = (percentage.clamp(0.0, 100.0) / 100.0 * f64::from(native_max)).round();
        level as u8
    }

    #[rstest]
    #[case(0, 0.0)]
    #[case(254, 100.0)]
    #[case(127, 50.0)]
    fn test_known_levels(#[case] level: u8, #[case] expected: f64) {
        assert!((to_percentage(level, NATIVE_LEVEL_MAX) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_monotonic_over_native_range() {
        let mut previous = to_percentage(0, NATIVE_LEVEL_MAX);
        for level in 1..=NATIVE_LEVEL_MAX {
            let current = to_percentage(level, NATIVE_LEVEL_MAX);
            assert!(current >= previous, "level {level} went backwards");
            previous = current;
        }
    }

    #[test]
    fn test_out_of_range_input_is_clamped() {
        assert_eq!(to_percentage(255, NATIVE_LEVEL_MAX), 100.0);
        assert_eq!(to_percentage(10, 0), 0.0);
    }

    #[test]
    fn test_native_levels_survive_conversion_back() {
        for level in 0..=NATIVE_LEVEL_MAX {
            let percentage = to_percentage(level, NATIVE_LEVEL_MAX);
            assert_eq!(from_percentage(percentage, NATIVE_LEVEL_MAX), level);
        }
    }

    #[test]
    fn test_from_percentage_clamps() {
        assert_eq!(from_percentage(150.0, NATIVE_LEVEL_MAX), NATIVE_LEVEL_MAX);
        assert_eq!(from_percentage(-5.0, NATIVE_LEVEL_MAX), 0);
        assert_eq!(from_percentage(f64::NAN, NATIVE_LEVEL_MAX), 0);
    }
}
