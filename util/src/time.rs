//! General time utility functions

use chrono;

/// Number of nanoseconds in a second
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Convert a duration into a number of seconds, or `None` if overflow
pub fn duration_to_seconds(duration: chrono::Duration) -> Option<f64> {
    duration
        .num_nanoseconds()
        .map(|ns| ns as f64 / NANOS_PER_SECOND as f64)
}

/// Convert a tick frequency into the period of one tick.
///
/// Non-positive frequencies have no period and return `None`.
pub fn period_from_hz(frequency_hz: f64) -> Option<std::time::Duration> {
    let period_s = 1.0 / frequency_hz;
    if frequency_hz > 0.0 && frequency_hz.is_finite() && period_s < u64::MAX as f64 {
        Some(std::time::Duration::from_secs_f64(period_s))
    }
    else {
        None
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_period_from_hz() {
        assert_eq!(period_from_hz(20.0), Some(std::time::Duration::from_millis(50)));
        assert_eq!(period_from_hz(0.0), None);
        assert_eq!(period_from_hz(-5.0), None);
        assert_eq!(period_from_hz(1e-300), None);
    }

    #[test]
    fn test_duration_to_seconds() {
        let d = chrono::Duration::milliseconds(1500);
        assert_eq!(duration_to_seconds(d), Some(1.5));
    }
}
