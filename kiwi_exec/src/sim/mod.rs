//! # Simulation Module
//!
//! A planar world containing the robot and a single marker, so that the executable can be run
//! without hardware. The [`SimMotorBus`] decodes the frames the motor board driver writes back
//! into a body velocity which moves the robot, and the [`SimCamera`] reports the marker as seen
//! from the robot's current pose.
//!
//! World frame: `x` east, `y` north, headings in degrees counter-clockwise from `x`.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod camera;
mod motor_bus;
mod world;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

pub use camera::{CameraModel, SimCamera};
pub use motor_bus::{SimBusError, SimMotorBus};
pub use world::SimWorld;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters of the simulated world, loaded from `sim.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct SimParams {
    /// Pose of the robot at the start of the simulation
    pub initial_pose: SimPose,

    pub marker: SimMarker,

    /// Horizontal field of view of the camera.
    ///
    /// Units: degrees
    pub camera_fov_deg: f64,

    /// Maximum distance at which the marker can be detected.
    ///
    /// Units: meters
    pub camera_max_range_m: f64,

    /// Linear speed of the body per unit of decoded body velocity.
    ///
    /// Units: meters/second
    pub lin_speed_per_unit_ms: f64,

    /// Turn rate of the body per unit of decoded angular rate. Positive angular rate demands
    /// turn the robot clockwise.
    ///
    /// Units: radians/second
    pub ang_rate_per_unit_rads: f64,
}

/// Planar pose of the robot.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SimPose {
    pub x_m: f64,
    pub y_m: f64,
    pub heading_deg: f64,
}

/// A marker standing vertically at the height of the camera.
#[derive(Debug, Clone, Deserialize)]
pub struct SimMarker {
    pub id: u32,
    pub x_m: f64,
    pub y_m: f64,

    /// Direction the printed face points towards.
    ///
    /// Units: degrees
    pub facing_deg: f64,

    /// Side length of the printed marker.
    ///
    /// Units: meters
    pub size_m: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for SimParams {
    fn default() -> Self {
        Self {
            initial_pose: SimPose {
                x_m: 0.0,
                y_m: 0.0,
                heading_deg: 90.0,
            },
            marker: SimMarker {
                id: 0,
                x_m: 0.0,
                y_m: 1.5,
                facing_deg: 270.0,
                size_m: 0.05,
            },
            camera_fov_deg: 60.0,
            camera_max_range_m: 3.0,
            lin_speed_per_unit_ms: 0.003,
            ang_rate_per_unit_rads: 0.02,
        }
    }
}

impl SimPose {
    /// Unit vector pointing out of the front of the robot.
    pub fn forward(&self) -> (f64, f64) {
        let (s, c) = self.heading_deg.to_radians().sin_cos();
        (c, s)
    }

    /// Unit vector pointing out of the right of the robot.
    pub fn right(&self) -> (f64, f64) {
        let (s, c) = self.heading_deg.to_radians().sin_cos();
        (s, -c)
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        actuator::{MotorBoard, MotorBoardParams},
        behav_mgr::{BehavMgrParams, StateMachine},
        drive_ctrl::{DriveCtrlParams, DriveKinematics},
        vision::{VisionError, VisionFeed, VisionParams},
    };
    use comms_if::eqpt::vision::MarkerObservation;
    use std::sync::Arc;

    const CYCLE_PERIOD_S: f64 = 0.05;

    /// Feed which steps the world by one cycle before each observation.
    struct SteppedFeed {
        world: Arc<SimWorld>,
        camera: SimCamera,
    }

    impl VisionFeed for SteppedFeed {
        fn start_capture(&mut self) -> Result<(), VisionError> {
            Ok(())
        }

        fn stop_capture(&mut self) -> Result<(), VisionError> {
            Ok(())
        }

        fn detect_markers(&mut self) -> Vec<MarkerObservation> {
            self.world.advance(CYCLE_PERIOD_S);
            self.camera.observe().into_iter().collect()
        }

        fn self_test(&mut self) -> bool {
            true
        }
    }

    #[test]
    fn test_approach_in_sim() {
        let world = SimWorld::new(SimParams {
            initial_pose: SimPose {
                x_m: -0.3,
                y_m: 0.0,
                heading_deg: 100.0,
            },
            ..Default::default()
        });

        let kin = DriveKinematics::new(&DriveCtrlParams::default()).unwrap();
        let bus = SimMotorBus::new(world.clone(), MotorBoardParams::default(), kin.clone());
        let actuator = MotorBoard::new(bus, MotorBoardParams::default(), kin);
        let feed = SteppedFeed {
            camera: SimCamera::new(world.clone(), &VisionParams::default()),
            world: world.clone(),
        };

        let mut params = BehavMgrParams::default();
        params.moving.centering_turn_rate = -1.0;
        params.moving.strafe_speed = -15.0;

        let mut sm = StateMachine::new(params, actuator, feed);
        sm.start();

        let mut num_cycles = 0;
        while sm.update() {
            num_cycles += 1;
            assert!(num_cycles < 4000, "No convergence, pose {:?}", world.pose());
        }

        assert!(sm.last_error().is_none());
        assert!(world.marker_distance_m() < 0.15);
        assert!(world.body_velocity().is_zero());
    }
}
