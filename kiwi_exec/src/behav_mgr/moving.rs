//! # [`BehavState::Moving`] implementation
//!
//! Visual servo loop which brings the robot centred, close and parallel to the marker being
//! followed. Each cycle the latest observation is compared against the tolerances in
//! [`MovingParams`] and a single correction command is issued.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, error, info, trace};
use serde::Deserialize;

use super::{
    states::{Exit, Scan},
    BehavCtx, BehavMgrError, BehavMgrParams, BehavState,
};
use crate::{actuator::ActuatorPort, vision::VisionFeed};
use comms_if::eqpt::{mech::DriveCommand, vision::MarkerObservation};
use util::maths::clamp_abs;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Moving state of the BehavMgr.
///
/// Possible transitions:
/// - Scan, if no marker has been seen for more than `max_tracking_loss_ticks` cycles
/// - Exit, once the robot is centred, close and aligned with the marker
#[derive(Debug)]
pub struct Moving {
    last_observation: MarkerObservation,

    /// Number of consecutive cycles without an observation
    retry_count: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MovingParams {
    /// Width of the frames the observations are taken from.
    ///
    /// Units: pixels
    pub frame_width_px: u32,

    /// Maximum horizontal distance between the marker centre and the frame centre.
    ///
    /// Units: pixels
    pub centering_threshold_px: f64,

    /// Distance under which the marker is considered reached.
    ///
    /// Units: meters
    pub approach_threshold_m: f64,

    /// Maximum marker pitch considered parallel.
    ///
    /// Units: degrees
    pub alignment_threshold_deg: f64,

    /// Angular rate commanded when centring on a positive lateral error. A negative error
    /// commands the opposite rate.
    pub centering_turn_rate: f64,

    /// Forward speed while approaching. When `approach_gain` is non-zero this is the upper limit
    /// of the distance-proportional speed.
    pub approach_speed: f64,

    /// Forward speed per meter of distance to the marker, zero for a fixed approach speed.
    pub approach_gain: f64,

    /// Lateral speed commanded when aligning on a positive pitch. A negative pitch commands the
    /// opposite speed.
    pub strafe_speed: f64,

    /// Number of consecutive cycles without an observation tolerated before returning to Scan.
    pub max_tracking_loss_ticks: u32,

    #[serde(default)]
    pub control_strategy: ControlStrategy,

    #[serde(default)]
    pub blended: BlendedGains,
}

/// Proportional gains of the [`ControlStrategy::Blended`] controller.
///
/// The output of each axis is limited by the corresponding priority-gated speed.
#[derive(Debug, Clone, Deserialize)]
pub struct BlendedGains {
    /// Angular rate per pixel of lateral error
    pub rot_per_px: f64,

    /// Forward speed per meter beyond the approach threshold
    pub fwd_per_m: f64,

    /// Lateral speed per degree of pitch
    pub strafe_per_deg: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// How the corrections are combined into a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ControlStrategy {
    /// Correct one axis at a time: centring, then distance, then alignment.
    PriorityGated,

    /// Correct all axes at once, each proportionally to its error.
    Blended,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ServoAction {
    Correct(DriveCommand),
    Converged,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Moving {
    pub fn new(observation: MarkerObservation) -> Self {
        Self {
            last_observation: observation,
            retry_count: 0,
        }
    }

    pub fn last_observation(&self) -> &MarkerObservation {
        &self.last_observation
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn enter<A: ActuatorPort, V: VisionFeed>(
        &mut self,
        _params: &BehavMgrParams,
        _ctx: &mut BehavCtx<A, V>,
    ) -> Result<(), BehavMgrError> {
        info!(
            "Moving towards marker {} at {:.3} m",
            self.last_observation.id, self.last_observation.distance_m
        );
        Ok(())
    }

    pub fn execute<A: ActuatorPort, V: VisionFeed>(
        &mut self,
        params: &BehavMgrParams,
        ctx: &mut BehavCtx<A, V>,
    ) -> Result<Option<BehavState>, BehavMgrError> {
        let params = &params.moving;

        let obs = match ctx.vision.detect_markers().first() {
            Some(o) => *o,
            None => {
                self.retry_count += 1;

                if self.retry_count > params.max_tracking_loss_ticks {
                    error!(
                        "Marker {} lost for {} cycles, returning to scan",
                        self.last_observation.id, self.retry_count
                    );
                    return Ok(Some(BehavState::Scan(Scan::new())));
                }

                trace!("No observation, retry {}", self.retry_count);
                ctx.stop_actuator()?;
                return Ok(None);
            }
        };

        self.retry_count = 0;
        self.last_observation = obs;

        let action = match params.control_strategy {
            ControlStrategy::PriorityGated => priority_gated(params, &obs),
            ControlStrategy::Blended => blended(params, &obs),
        };

        match action {
            ServoAction::Correct(cmd) => {
                ctx.command(cmd)?;
                Ok(None)
            }
            ServoAction::Converged => {
                ctx.stop_actuator()?;
                info!(
                    "Centred, close and aligned with marker {} ({:.3} m, pitch {:.1} deg)",
                    obs.id, obs.distance_m, obs.angles.pitch_deg
                );
                Ok(Some(BehavState::Exit(Exit::new())))
            }
        }
    }

    pub fn exit<A: ActuatorPort, V: VisionFeed>(
        &mut self,
        _params: &BehavMgrParams,
        ctx: &mut BehavCtx<A, V>,
    ) -> Result<(), BehavMgrError> {
        ctx.stop_actuator()
    }
}

impl Default for MovingParams {
    fn default() -> Self {
        Self {
            frame_width_px: 320,
            centering_threshold_px: 20.0,
            approach_threshold_m: 0.10,
            alignment_threshold_deg: 10.0,
            centering_turn_rate: 1.0,
            approach_speed: 40.0,
            approach_gain: 0.0,
            strafe_speed: 15.0,
            max_tracking_loss_ticks: 100,
            control_strategy: ControlStrategy::default(),
            blended: BlendedGains::default(),
        }
    }
}

impl Default for BlendedGains {
    fn default() -> Self {
        Self {
            rot_per_px: 0.05,
            fwd_per_m: 100.0,
            strafe_per_deg: 1.5,
        }
    }
}

impl Default for ControlStrategy {
    fn default() -> Self {
        ControlStrategy::PriorityGated
    }
}

impl MovingParams {
    /// Horizontal offset of the marker from the frame centre, positive when the marker is left of
    /// centre.
    fn lateral_error_px(&self, obs: &MarkerObservation) -> f64 {
        self.frame_width_px as f64 / 2.0 - obs.center_px.x as f64
    }

    fn approach_speed(&self, distance_m: f64) -> f64 {
        if self.approach_gain == 0.0 {
            self.approach_speed
        } else {
            proportional(distance_m, self.approach_gain, self.approach_speed)
        }
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// The first failing check issues its correction: centring, then distance, then alignment.
fn priority_gated(params: &MovingParams, obs: &MarkerObservation) -> ServoAction {
    let lateral_error = params.lateral_error_px(obs);
    let pitch = obs.angles.pitch_deg;

    if lateral_error.abs() > params.centering_threshold_px {
        debug!("Centring, lateral error {:.0} px", lateral_error);
        return ServoAction::Correct(DriveCommand::rotate(
            lateral_error.signum() * params.centering_turn_rate,
        ));
    }

    if obs.distance_m > params.approach_threshold_m {
        debug!("Approaching, distance {:.3} m", obs.distance_m);
        return ServoAction::Correct(DriveCommand::forward(params.approach_speed(obs.distance_m)));
    }

    if pitch.abs() > params.alignment_threshold_deg {
        debug!("Aligning, pitch {:.1} deg", pitch);
        return ServoAction::Correct(DriveCommand::strafe(pitch.signum() * params.strafe_speed));
    }

    ServoAction::Converged
}

/// Every axis outside its tolerance is corrected in the same command.
fn blended(params: &MovingParams, obs: &MarkerObservation) -> ServoAction {
    let gains = &params.blended;
    let lateral_error = params.lateral_error_px(obs);
    let pitch = obs.angles.pitch_deg;

    let centred = lateral_error.abs() <= params.centering_threshold_px;
    let close = obs.distance_m <= params.approach_threshold_m;
    let aligned = pitch.abs() <= params.alignment_threshold_deg;

    if centred && close && aligned {
        return ServoAction::Converged;
    }

    let v_ang = if centred {
        0.0
    } else {
        proportional(lateral_error, gains.rot_per_px, params.centering_turn_rate)
    };

    let vy = if close {
        0.0
    } else {
        proportional(
            obs.distance_m - params.approach_threshold_m,
            gains.fwd_per_m,
            params.approach_speed,
        )
    };

    let vx = if aligned {
        0.0
    } else {
        proportional(pitch, gains.strafe_per_deg, params.strafe_speed)
    };

    let cmd = DriveCommand::new(vx, vy, v_ang);
    debug!("Blended correction {:?}", cmd);

    ServoAction::Correct(cmd)
}

/// Proportional correction with the magnitude limited to `|limit|`. The sign follows the error
/// with the sign convention of `limit`.
fn proportional(error: f64, gain: f64, limit: f64) -> f64 {
    clamp_abs(gain * error, limit) * limit.signum()
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::behav_mgr::{
        test::{machine, marker},
        BehavStateKind,
    };

    #[test]
    fn test_priority_gated_checks() {
        let params = MovingParams::default();

        // All three failing, only centring is issued
        assert_eq!(
            priority_gated(&params, &marker(300, 1.0, 45.0)),
            ServoAction::Correct(DriveCommand::rotate(-1.0))
        );

        // Exactly on a threshold is within tolerance
        assert_eq!(
            priority_gated(&params, &marker(140, 0.10, 10.0)),
            ServoAction::Converged
        );

        assert_eq!(
            priority_gated(&params, &marker(160, 0.08, 3.0)),
            ServoAction::Converged
        );
    }

    #[test]
    fn test_sign_convention_follows_params() {
        let params = MovingParams {
            centering_turn_rate: -1.0,
            strafe_speed: -15.0,
            ..Default::default()
        };

        // Marker left of centre with the reversed wiring convention
        assert_eq!(
            priority_gated(&params, &marker(100, 1.0, 0.0)),
            ServoAction::Correct(DriveCommand::rotate(-1.0))
        );
        assert_eq!(
            priority_gated(&params, &marker(160, 0.05, 20.0)),
            ServoAction::Correct(DriveCommand::strafe(-15.0))
        );
    }

    #[test]
    fn test_proportional_approach() {
        let params = MovingParams {
            approach_gain: 50.0,
            ..Default::default()
        };

        assert_eq!(
            priority_gated(&params, &marker(160, 0.5, 0.0)),
            ServoAction::Correct(DriveCommand::forward(25.0))
        );
        assert_eq!(
            priority_gated(&params, &marker(160, 2.0, 0.0)),
            ServoAction::Correct(DriveCommand::forward(40.0))
        );
    }

    #[test]
    fn test_blended() {
        let params = MovingParams {
            control_strategy: ControlStrategy::Blended,
            ..Default::default()
        };

        // Every axis corrected at once, each limited
        match blended(&params, &marker(0, 10.0, 40.0)) {
            ServoAction::Correct(cmd) => {
                assert_eq!(cmd.v_ang, 1.0);
                assert_eq!(cmd.vy, 40.0);
                assert_eq!(cmd.vx, 15.0);
            }
            a => panic!("Expected a correction, got {:?}", a),
        }

        // Small errors are corrected proportionally
        match blended(&params, &marker(130, 0.2, -12.0)) {
            ServoAction::Correct(cmd) => {
                assert!((cmd.v_ang - 1.0).abs() < 1e-9);
                assert!((cmd.vy - 10.0).abs() < 1e-9);
                assert!((cmd.vx + 15.0).abs() < 1e-9);
            }
            a => panic!("Expected a correction, got {:?}", a),
        }

        match blended(&params, &marker(190, 0.05, -11.0)) {
            ServoAction::Correct(cmd) => {
                assert_eq!(cmd.vy, 0.0);
                assert!(cmd.v_ang < 0.0);
                assert!((cmd.vx + 15.0).abs() < 1e-9);
            }
            a => panic!("Expected a correction, got {:?}", a),
        }

        assert_eq!(
            blended(&params, &marker(170, 0.05, 5.0)),
            ServoAction::Converged
        );
    }

    #[test]
    fn test_blended_zero_gain_is_not_converged() {
        let mut params = MovingParams {
            control_strategy: ControlStrategy::Blended,
            ..Default::default()
        };
        params.blended.rot_per_px = 0.0;

        // 160 px off centre and close: the rotation output is zero but the marker is not centred
        assert_eq!(
            blended(&params, &marker(0, 0.05, 0.0)),
            ServoAction::Correct(DriveCommand::zero())
        );
    }

    #[test]
    fn test_blended_machine_converges() {
        let (mut sm, log) = machine();
        sm.params.moving.control_strategy = ControlStrategy::Blended;

        assert!(sm.update());
        sm.vision_mut().markers = vec![marker(100, 0.5, 20.0)];
        assert!(sm.update());
        assert_eq!(sm.state_kind(), BehavStateKind::Moving);

        assert!(sm.update());
        let cmd = *log.borrow().last().unwrap();
        assert!(cmd.vx > 0.0 && cmd.vy > 0.0 && cmd.v_ang > 0.0);

        sm.vision_mut().markers = vec![marker(160, 0.08, 3.0)];
        assert!(!sm.update());
        assert_eq!(sm.state_kind(), BehavStateKind::Exit);
    }
}
