//! Simulated world state shared between the simulated bus and camera

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::trace;
use std::{
    sync::{Arc, Mutex, MutexGuard},
    time::Instant,
};

use super::{SimMarker, SimParams, SimPose};
use comms_if::eqpt::mech::DriveCommand;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The robot and the marker.
///
/// The robot moves at the last commanded body velocity, integrated either from the wall clock
/// ([`SimWorld::sync`]) or by explicit steps ([`SimWorld::advance`]).
#[derive(Debug)]
pub struct SimWorld {
    params: SimParams,
    state: Mutex<WorldState>,
}

#[derive(Debug)]
struct WorldState {
    pose: SimPose,
    body_vel: DriveCommand,
    last_sync: Instant,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SimWorld {
    pub fn new(params: SimParams) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(WorldState {
                pose: params.initial_pose,
                body_vel: DriveCommand::zero(),
                last_sync: Instant::now(),
            }),
            params,
        })
    }

    pub fn params(&self) -> &SimParams {
        &self.params
    }

    pub fn marker(&self) -> &SimMarker {
        &self.params.marker
    }

    pub fn pose(&self) -> SimPose {
        self.lock().pose
    }

    pub fn body_velocity(&self) -> DriveCommand {
        self.lock().body_vel
    }

    /// Set the body velocity the robot moves at from the next integration.
    pub fn set_body_velocity(&self, cmd: DriveCommand) {
        self.lock().body_vel = cmd;
    }

    /// Integrate the motion since the last synchronisation.
    pub fn sync(&self) {
        let mut state = self.lock();
        Self::sync_state(&self.params, &mut state);
    }

    /// Integrate the motion over `dt_s` seconds.
    pub fn advance(&self, dt_s: f64) {
        let mut state = self.lock();
        state.pose = Self::integrate(&self.params, state.pose, &state.body_vel, dt_s);
    }

    /// Distance from the robot to the marker.
    ///
    /// Units: meters
    pub fn marker_distance_m(&self) -> f64 {
        let pose = self.pose();
        (self.params.marker.x_m - pose.x_m).hypot(self.params.marker.y_m - pose.y_m)
    }

    fn sync_state(params: &SimParams, state: &mut WorldState) {
        let now = Instant::now();
        let dt_s = now.duration_since(state.last_sync).as_secs_f64();
        state.pose = Self::integrate(params, state.pose, &state.body_vel, dt_s);
        state.last_sync = now;
    }

    fn integrate(params: &SimParams, pose: SimPose, vel: &DriveCommand, dt_s: f64) -> SimPose {
        if vel.is_zero() || dt_s <= 0.0 {
            return pose;
        }

        let (fx, fy) = pose.forward();
        let (rx, ry) = pose.right();
        let lin = params.lin_speed_per_unit_ms * dt_s;

        let next = SimPose {
            x_m: pose.x_m + (vel.vy * fx + vel.vx * rx) * lin,
            y_m: pose.y_m + (vel.vy * fy + vel.vx * ry) * lin,
            heading_deg: util::maths::wrap_deg_180(
                pose.heading_deg - (vel.v_ang * params.ang_rate_per_unit_rads * dt_s).to_degrees(),
            ),
        };

        trace!("Sim pose {:?} -> {:?}", pose, next);

        next
    }

    /// A poisoned lock only means another thread panicked mid-update, the pose is still usable.
    fn lock(&self) -> MutexGuard<'_, WorldState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_integrate() {
        let world = SimWorld::new(SimParams::default());

        // Forward while facing north
        world.set_body_velocity(DriveCommand::forward(100.0));
        world.advance(1.0);
        let pose = world.pose();
        assert!(pose.x_m.abs() < 1e-9);
        assert!((pose.y_m - 0.3).abs() < 1e-9);

        // Strafing right while facing north moves east
        world.set_body_velocity(DriveCommand::strafe(100.0));
        world.advance(1.0);
        let pose = world.pose();
        assert!((pose.x_m - 0.3).abs() < 1e-9);

        // Positive angular rate turns clockwise
        world.set_body_velocity(DriveCommand::rotate(10.0));
        world.advance(1.0);
        let pose = world.pose();
        assert!((pose.heading_deg - (90.0 - 0.2f64.to_degrees())).abs() < 1e-9);

        assert!((world.marker_distance_m() - (0.3f64.powi(2) + 1.2f64.powi(2)).sqrt()).abs() < 1e-9);
    }
}
