//! Parameters for the vision feed

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;
use std::time::Duration;

use super::VisionError;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Upper limit on the join timeout.
///
/// Units: seconds
const MAX_JOIN_TIMEOUT_S: f64 = 3600.0;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct VisionParams {
    /// Width of the captured frames.
    ///
    /// Units: pixels
    pub frame_width_px: u32,

    /// Height of the captured frames.
    ///
    /// Units: pixels
    pub frame_height_px: u32,

    /// Rate at which the capture thread acquires frames.
    ///
    /// Units: Hertz
    pub capture_rate_hz: f64,

    /// Maximum time to wait for the capture thread to finish when stopping.
    ///
    /// Units: seconds
    pub join_timeout_s: f64,

    /// Frames older than this are not reported by the feed.
    ///
    /// Units: seconds
    pub max_frame_age_s: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl VisionParams {
    /// Check the parameters are usable by the feed.
    pub fn validate(&self) -> Result<(), VisionError> {
        if self.frame_width_px == 0 || self.frame_height_px == 0 {
            return Err(VisionError::InvalidParam(format!(
                "frame size must be non-zero, found {}x{}",
                self.frame_width_px, self.frame_height_px
            )));
        }

        let periods = [
            ("capture_rate_hz", self.capture_rate_hz),
            ("max_frame_age_s", self.max_frame_age_s),
        ];
        for (name, value) in periods.iter() {
            if !value.is_finite() || *value <= 0.0 {
                return Err(VisionError::InvalidParam(format!(
                    "{} must be finite and positive, found {}",
                    name, value
                )));
            }
        }

        if !self.join_timeout_s.is_finite() || self.join_timeout_s < 0.0 {
            return Err(VisionError::InvalidParam(format!(
                "join_timeout_s must be finite and non-negative, found {}",
                self.join_timeout_s
            )));
        }

        Ok(())
    }

    /// Minimum time between two acquisitions.
    pub fn capture_period(&self) -> Duration {
        util::time::period_from_hz(self.capture_rate_hz).unwrap_or_else(|| Duration::from_secs(0))
    }

    /// Maximum wait for the capture thread, zero if the parameter is not a usable duration.
    pub fn join_timeout(&self) -> Duration {
        if self.join_timeout_s.is_finite() && self.join_timeout_s > 0.0 {
            Duration::from_secs_f64(self.join_timeout_s.min(MAX_JOIN_TIMEOUT_S))
        } else {
            Duration::from_secs(0)
        }
    }
}

impl Default for VisionParams {
    fn default() -> Self {
        Self {
            frame_width_px: 320,
            frame_height_px: 240,
            capture_rate_hz: 30.0,
            join_timeout_s: 1.0,
            max_frame_age_s: 0.5,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_validate() {
        assert!(VisionParams::default().validate().is_ok());

        let params = VisionParams {
            join_timeout_s: std::f64::INFINITY,
            ..Default::default()
        };
        assert!(matches!(
            params.validate(),
            Err(VisionError::InvalidParam(_))
        ));
        assert_eq!(params.join_timeout(), Duration::from_secs(0));

        let params = VisionParams {
            capture_rate_hz: 0.0,
            ..Default::default()
        };
        assert!(params.validate().is_err());

        let params = VisionParams {
            frame_height_px: 0,
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_periods() {
        let params = VisionParams::default();
        assert_eq!(params.join_timeout(), Duration::from_secs(1));
        assert_eq!(params.capture_period(), Duration::from_secs_f64(1.0 / 30.0));
    }
}
