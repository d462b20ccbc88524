//! # Actuator Module
//!
//! Provides the [`ActuatorPort`] abstraction through which behaviour states command the drive,
//! and the motor board driver which implements it over an I2C bus.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// [`ActuatorPort`] implementation for the three channel motor driver board.
pub mod motor_board;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::eqpt::mech::DriveCommand;

pub use motor_board::{MotorBoard, MotorBoardParams};

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Unified interface to the drive actuators.
pub trait ActuatorPort {
    /// Command a body velocity.
    ///
    /// The command is converted into wheel powers and transmitted. A failed transmission is
    /// retried once immediately, the second failure is returned.
    fn set_velocity(&mut self, cmd: DriveCommand) -> Result<(), ActuatorError>;

    /// Command all wheels to zero.
    fn stop(&mut self) -> Result<(), ActuatorError> {
        self.set_velocity(DriveCommand::zero())
    }

    /// Check that the actuators respond.
    fn self_test(&mut self) -> bool;
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum ActuatorError {
    #[error("Bus write to motor {motor_id} failed after retrying: {msg}")]
    BusError { motor_id: u8, msg: String },

    #[error("Could not open the actuator bus: {0}")]
    BusInitError(String),
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = ActuatorError::BusInitError(String::from("Permission denied"));
        assert_eq!(
            format!("{}", e),
            "Could not open the actuator bus: Permission denied"
        );

        let e = ActuatorError::BusError {
            motor_id: 2,
            msg: String::from("nack"),
        };
        assert_eq!(
            format!("{}", e),
            "Bus write to motor 2 failed after retrying: nack"
        );
    }
}
