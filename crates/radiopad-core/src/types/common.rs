//! Numeric helpers shared by the engine and its observers.

/// Volume used when none has been set, or when a non-finite value is supplied.
pub const DEFAULT_VOLUME: f64 = 1.0;

/// Clamp a volume to `[0, 1]`. Non-finite input yields full volume.
pub fn clamp_volume(volume: f64) -> f64 {
    if volume.is_finite() {
        volume.clamp(0.0, 1.0)
    } else {
        DEFAULT_VOLUME
    }
}

/// Returns the duration if it is usable (finite and strictly positive).
///
/// Media backends report an unknown length as `NaN`, `Infinity` or zero.
pub fn usable_duration(seconds: f64) -> Option<f64> {
    (seconds.is_finite() && seconds > 0.0).then_some(seconds)
}

/// Clamp a seek target to `[0, duration]`.
///
/// A non-finite target becomes 0. The upper bound only applies when the
/// duration is known.
pub fn clamp_position(target: f64, duration: f64) -> f64 {
    let target = if target.is_finite() { target.max(0.0) } else { 0.0 };
    match usable_duration(duration) {
        Some(duration) => target.min(duration),
        None => target,
    }
}

/// Format seconds as `m:ss`. Unknown or non-positive values render as `0:00`.
pub fn format_clock(seconds: f64) -> String {
    if !seconds.is_finite() || seconds <= 0.0 {
        return "0:00".to_string();
    }
    let total = seconds.floor() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

/// Format a duration as `m:ss`, or `--:--` while it is unknown.
pub fn format_duration(seconds: f64) -> String {
    match usable_duration(seconds) {
        Some(seconds) => format_clock(seconds),
        None => "--:--".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    #[allow(clippy::float_cmp)]
    fn test_clamp_volume_non_finite() {
        assert_eq!(clamp_volume(f64::NAN), 1.0);
        assert_eq!(clamp_volume(f64::INFINITY), 1.0);
        assert_eq!(clamp_volume(f64::NEG_INFINITY), 1.0);
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn test_clamp_position() {
        assert_eq!(clamp_position(9999.0, 45.0), 45.0);
        assert_eq!(clamp_position(-3.0, 45.0), 0.0);
        assert_eq!(clamp_position(30.0, 0.0), 30.0);
        assert_eq!(clamp_position(f64::NAN, 45.0), 0.0);
        assert_eq!(clamp_position(12.5, f64::INFINITY), 12.5);
    }

    #[test]
    fn test_usable_duration() {
        assert_eq!(usable_duration(12.0), Some(12.0));
        assert_eq!(usable_duration(0.0), None);
        assert_eq!(usable_duration(f64::INFINITY), None);
        assert_eq!(usable_duration(f64::NAN), None);
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(0.0), "0:00");
        assert_eq!(format_clock(59.9), "0:59");
        assert_eq!(format_clock(61.0), "1:01");
        assert_eq!(format_clock(3725.0), "62:05");
        assert_eq!(format_clock(f64::NAN), "0:00");
    }

    #[test]
    fn test_format_duration_unknown() {
        assert_eq!(format_duration(0.0), "--:--");
        assert_eq!(format_duration(f64::INFINITY), "--:--");
        assert_eq!(format_duration(90.0), "1:30");
    }

    proptest! {
        #[test]
        fn prop_volume_is_clamped(v in proptest::num::f64::ANY) {
            let clamped = clamp_volume(v);
            prop_assert!((0.0..=1.0).contains(&clamped));
            if v.is_finite() {
                prop_assert_eq!(clamped, v.max(0.0).min(1.0));
            } else {
                prop_assert_eq!(clamped, 1.0);
            }
        }

        #[test]
        fn prop_position_within_known_duration(
            target in -1.0e9f64..1.0e9,
            duration in 0.001f64..1.0e6,
        ) {
            let clamped = clamp_position(target, duration);
            prop_assert!(clamped >= 0.0);
            prop_assert!(clamped <= duration);
        }
    }
}
