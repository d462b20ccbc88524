//! Simulated I2C bus carrying the motor board frames into the simulated world

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use embedded_hal::blocking::i2c::Write;
use log::{debug, trace};
use std::sync::Arc;

use super::SimWorld;
use crate::{
    actuator::{motor_board::decode_frame, MotorBoardParams},
    drive_ctrl::DriveKinematics,
};
use comms_if::eqpt::mech::NUM_WHEELS;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Bus which plays the part of the motor board.
///
/// Once a power has been written to each of the three motors the powers are decoded back into a
/// body velocity using the inverse kinematics, which the robot then moves at.
pub struct SimMotorBus {
    world: Arc<SimWorld>,
    board: MotorBoardParams,
    kinematics: DriveKinematics,

    /// Powers received since the last complete set, in wheel order
    pending: [Option<i32>; NUM_WHEELS],
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SimBusError {
    #[error("No device at address {0:#04x}")]
    Nack(u8),

    #[error("Malformed motor frame: {0:?}")]
    InvalidFrame(Vec<u8>),

    #[error("Unknown motor ID {0}")]
    UnknownMotor(u8),

    #[error("The drive geometry has no inverse")]
    SingularGeometry,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SimMotorBus {
    pub fn new(world: Arc<SimWorld>, board: MotorBoardParams, kinematics: DriveKinematics) -> Self {
        Self {
            world,
            board,
            kinematics,
            pending: [None; NUM_WHEELS],
        }
    }

    fn apply(&mut self, powers: [i32; NUM_WHEELS]) -> Result<(), SimBusError> {
        let sign = self.kinematics.wiring_sign() as f64;
        let raw = [
            powers[0] as f64 * sign,
            powers[1] as f64 * sign,
            powers[2] as f64 * sign,
        ];

        let vel = self
            .kinematics
            .body_velocity(raw)
            .ok_or(SimBusError::SingularGeometry)?;

        debug!("Sim wheel powers {:?} -> body velocity {:?}", powers, vel);

        // Motion up to now happened at the previous velocity
        self.world.sync();
        self.world.set_body_velocity(vel);

        Ok(())
    }
}

impl Write for SimMotorBus {
    type Error = SimBusError;

    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), Self::Error> {
        if address != self.board.address {
            return Err(SimBusError::Nack(address));
        }

        let (motor_id, power) =
            decode_frame(bytes).ok_or_else(|| SimBusError::InvalidFrame(bytes.to_vec()))?;

        let wheel = self
            .board
            .motor_ids
            .iter()
            .position(|&id| id == motor_id)
            .ok_or(SimBusError::UnknownMotor(motor_id))?;

        trace!("Sim motor {} (wheel {}) <- {}", motor_id, wheel, power);

        self.pending[wheel] = Some(power);

        if let [Some(p0), Some(p1), Some(p2)] = self.pending {
            self.pending = [None; NUM_WHEELS];
            self.apply([p0, p1, p2])?;
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
    use crate::{
        actuator::{ActuatorPort, MotorBoard},
        drive_ctrl::DriveCtrlParams,
        sim::SimParams,
    };
    use comms_if::eqpt::mech::DriveCommand;

    fn board() -> (MotorBoard<SimMotorBus>, Arc<SimWorld>) {
        let world = SimWorld::new(SimParams::default());
        let kin = DriveKinematics::new(&DriveCtrlParams::default()).unwrap();
        let bus = SimMotorBus::new(world.clone(), MotorBoardParams::default(), kin.clone());
        (MotorBoard::new(bus, MotorBoardParams::default(), kin), world)
    }

    #[test]
    fn test_rotation_decoded() {
        let (mut board, world) = board();

        // Shaping lifts every wheel to the floor, the decoded rate reflects the lifted powers
        board.set_velocity(DriveCommand::rotate(1.0)).unwrap();
        let vel = world.body_velocity();
        assert!(vel.vx.abs() < 1e-9);
        assert!(vel.vy.abs() < 1e-9);
        assert!((vel.v_ang - 13.5).abs() < 1e-9);

        board.stop().unwrap();
        assert!(world.body_velocity().is_zero());
    }

    #[test]
    fn test_forward_moves_robot() {
        let (mut board, world) = board();

        board.set_velocity(DriveCommand::forward(40.0)).unwrap();
        assert!(world.body_velocity().vy > 40.0);

        let start = world.pose();
        world.advance(1.0);
        assert!(world.pose().y_m > start.y_m + 0.1);
    }

    #[test]
    fn test_bus_errors() {
        let (board, _) = board();
        let mut bus = board.into_bus();

        assert!(matches!(bus.write(0x11, &[0, 0]), Err(SimBusError::Nack(0x11))));
        assert!(matches!(bus.write(0x10, &[0]), Err(SimBusError::InvalidFrame(_))));
        assert!(matches!(bus.write(0x10, &[7, 0]), Err(SimBusError::UnknownMotor(7))));
    }
}
