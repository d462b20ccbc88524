//! # BehavMgr Parameters

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;

use super::{moving::MovingParams, scan::ScanParams, BehavMgrError};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BehavMgrParams {
    pub scan: ScanParams,

    pub moving: MovingParams,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl BehavMgrParams {
    /// Check the parameters are usable by the state machine.
    pub fn validate(&self) -> Result<(), BehavMgrError> {
        let m = &self.moving;

        if m.frame_width_px == 0 {
            return Err(BehavMgrError::InvalidParam(
                "moving.frame_width_px must be non-zero".into(),
            ));
        }

        let thresholds = [
            ("moving.centering_threshold_px", m.centering_threshold_px),
            ("moving.approach_threshold_m", m.approach_threshold_m),
            ("moving.alignment_threshold_deg", m.alignment_threshold_deg),
        ];
        for (name, value) in thresholds.iter() {
            if !value.is_finite() || *value < 0.0 {
                return Err(BehavMgrError::InvalidParam(format!(
                    "{} must be finite and non-negative, found {}",
                    name, value
                )));
            }
        }

        let rates = [
            ("moving.centering_turn_rate", m.centering_turn_rate),
            ("moving.approach_speed", m.approach_speed),
            ("moving.strafe_speed", m.strafe_speed),
        ];
        for (name, value) in rates.iter() {
            if !value.is_finite() || *value == 0.0 {
                return Err(BehavMgrError::InvalidParam(format!(
                    "{} must be finite and non-zero, found {}",
                    name, value
                )));
            }
        }

        let gains = [
            ("moving.blended.rot_per_px", m.blended.rot_per_px),
            ("moving.blended.fwd_per_m", m.blended.fwd_per_m),
            ("moving.blended.strafe_per_deg", m.blended.strafe_per_deg),
        ];
        for (name, value) in gains.iter() {
            if !value.is_finite() || *value <= 0.0 {
                return Err(BehavMgrError::InvalidParam(format!(
                    "{} must be finite and positive, found {}",
                    name, value
                )));
            }
        }

        if !self.scan.search_turn_rate.is_finite() {
            return Err(BehavMgrError::InvalidParam(format!(
                "scan.search_turn_rate must be finite, found {}",
                self.scan.search_turn_rate
            )));
        }

        if !m.approach_gain.is_finite() || m.approach_gain < 0.0 {
            return Err(BehavMgrError::InvalidParam(format!(
                "moving.approach_gain must be non-negative, found {}",
                m.approach_gain
            )));
        }

        Ok(())
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::behav_mgr::ControlStrategy;

    #[test]
    fn test_load_params() {
        let params: BehavMgrParams = util::params::from_str(
            r#"
            [scan]
            search_turn_rate = 0.5

            [moving]
            frame_width_px = 320
            centering_threshold_px = 20.0
            approach_threshold_m = 0.10
            alignment_threshold_deg = 10.0
            centering_turn_rate = -1.0
            approach_speed = 40.0
            approach_gain = 0.0
            strafe_speed = -15.0
            max_tracking_loss_ticks = 100
            control_strategy = "Blended"

            [moving.blended]
            rot_per_px = 0.05
            fwd_per_m = 100.0
            strafe_per_deg = 1.5
            "#,
        )
        .unwrap();

        assert_eq!(params.scan.search_turn_rate, 0.5);
        assert_eq!(params.moving.max_tracking_loss_ticks, 100);
        assert_eq!(params.moving.control_strategy, ControlStrategy::Blended);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_validate() {
        let mut params = BehavMgrParams::default();
        assert!(params.validate().is_ok());

        params.moving.approach_threshold_m = -0.1;
        assert!(matches!(
            params.validate(),
            Err(BehavMgrError::InvalidParam(_))
        ));

        let mut params = BehavMgrParams::default();
        params.moving.frame_width_px = 0;
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_validate_gains_and_rates() {
        let mut params = BehavMgrParams::default();
        params.moving.blended.rot_per_px = 0.0;
        assert!(params.validate().is_err());

        let mut params = BehavMgrParams::default();
        params.moving.blended.strafe_per_deg = -1.5;
        assert!(params.validate().is_err());

        let mut params = BehavMgrParams::default();
        params.moving.centering_turn_rate = 0.0;
        assert!(params.validate().is_err());

        let mut params = BehavMgrParams::default();
        params.moving.approach_speed = std::f64::NAN;
        assert!(params.validate().is_err());

        // Negative rates only flip the wiring convention
        let mut params = BehavMgrParams::default();
        params.moving.centering_turn_rate = -1.0;
        params.moving.strafe_speed = -15.0;
        assert!(params.validate().is_ok());
    }
}
