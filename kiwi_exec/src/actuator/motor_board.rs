//! [`ActuatorPort`] implementation for the three channel DC motor driver board
//!
//! The board sits on an I2C bus and accepts one two byte frame per motor: the motor ID followed
//! by the signed power as a two's complement byte.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use embedded_hal::blocking::i2c::Write;
use log::{debug, error, trace, warn};
use serde::Deserialize;

use super::{ActuatorError, ActuatorPort};
use crate::drive_ctrl::DriveKinematics;
use comms_if::eqpt::mech::{DriveCommand, WheelPowers, NUM_WHEELS};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Largest power magnitude the board accepts.
pub const MAX_BOARD_POWER: i32 = 100;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Bus configuration of the motor board.
#[derive(Debug, Clone, Deserialize)]
pub struct MotorBoardParams {
    /// 7 bit I2C address of the board
    pub address: u8,

    /// Board channel driving each wheel, in wheel order
    pub motor_ids: [u8; NUM_WHEELS],
}

pub struct MotorBoard<I2C> {
    bus: I2C,
    params: MotorBoardParams,
    kinematics: DriveKinematics,

    /// Last powers successfully written to every wheel
    last_powers: Option<WheelPowers>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for MotorBoardParams {
    fn default() -> Self {
        Self {
            address: 0x10,
            motor_ids: [0, 2, 1],
        }
    }
}

impl<I2C, E> MotorBoard<I2C>
where
    I2C: Write<Error = E>,
    E: std::fmt::Debug,
{
    pub fn new(bus: I2C, params: MotorBoardParams, kinematics: DriveKinematics) -> Self {
        Self {
            bus,
            params,
            kinematics,
            last_powers: None,
        }
    }

    /// The powers of the last fully transmitted command.
    pub fn last_powers(&self) -> Option<WheelPowers> {
        self.last_powers
    }

    /// Release the underlying bus.
    pub fn into_bus(self) -> I2C {
        self.bus
    }

    /// Access the underlying bus.
    pub fn bus(&self) -> &I2C {
        &self.bus
    }

    /// Transmit powers to every wheel.
    pub fn write_powers(&mut self, powers: WheelPowers) -> Result<(), ActuatorError> {
        let motor_ids = self.params.motor_ids;
        for (&motor_id, &power) in motor_ids.iter().zip(powers.powers().iter()) {
            self.write_motor(motor_id, power)?;
        }

        self.last_powers = Some(powers);

        Ok(())
    }

    /// Write a single motor frame, retrying once on failure.
    fn write_motor(&mut self, motor_id: u8, power: i32) -> Result<(), ActuatorError> {
        let frame = encode_frame(motor_id, power);

        trace!("Motor {} <- {:?}", motor_id, frame);

        if let Err(e) = self.bus.write(self.params.address, &frame) {
            warn!("Write to motor {} failed ({:?}), retrying", motor_id, e);

            if let Err(e) = self.bus.write(self.params.address, &frame) {
                error!("Retry of write to motor {} failed: {:?}", motor_id, e);
                return Err(ActuatorError::BusError {
                    motor_id,
                    msg: format!("{:?}", e),
                });
            }
        }

        Ok(())
    }
}

impl<I2C, E> ActuatorPort for MotorBoard<I2C>
where
    I2C: Write<Error = E>,
    E: std::fmt::Debug,
{
    fn set_velocity(&mut self, cmd: DriveCommand) -> Result<(), ActuatorError> {
        let powers = self.kinematics.wheel_powers(&cmd);

        debug!("Drive command {:?} -> powers {:?}", cmd, powers.powers());

        self.write_powers(powers)
    }

    fn self_test(&mut self) -> bool {
        match self.write_powers(WheelPowers::zero()) {
            Ok(_) => true,
            Err(e) => {
                warn!("Motor board self test failed: {}", e);
                false
            }
        }
    }
}

/// Build the frame for one motor: the ID followed by the power clamped to the board range, as a
/// two's complement byte.
pub fn encode_frame(motor_id: u8, power: i32) -> [u8; 2] {
    let p = power.max(-MAX_BOARD_POWER).min(MAX_BOARD_POWER);

    [motor_id, p as i8 as u8]
}

/// Inverse of [`encode_frame`], returning the motor ID and power.
pub fn decode_frame(frame: &[u8]) -> Option<(u8, i32)> {
    match frame {
        [id, power] => Some((*id, *power as i8 as i32)),
        _ => None,
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::drive_ctrl::DriveCtrlParams;

    /// Bus which records every frame and fails a scripted number of writes.
    #[derive(Default)]
    struct MockBus {
        frames: Vec<(u8, Vec<u8>)>,
        failures_left: usize,
        attempts: usize,
    }

    impl Write for MockBus {
        type Error = &'static str;

        fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), Self::Error> {
            self.attempts += 1;
            if self.failures_left > 0 {
                self.failures_left -= 1;
                return Err("nack");
            }
            self.frames.push((address, bytes.to_vec()));
            Ok(())
        }
    }

    fn board(failures: usize) -> MotorBoard<MockBus> {
        let bus = MockBus {
            failures_left: failures,
            ..Default::default()
        };
        let kin = DriveKinematics::new(&DriveCtrlParams::default()).unwrap();
        MotorBoard::new(bus, MotorBoardParams::default(), kin)
    }

    #[test]
    fn test_encode_frame() {
        assert_eq!(encode_frame(0, 0), [0, 0]);
        assert_eq!(encode_frame(2, 40), [2, 40]);
        assert_eq!(encode_frame(1, -27), [1, 229]);
        assert_eq!(encode_frame(1, -250), [1, 156]);
        assert_eq!(encode_frame(0, 250), [0, 100]);
        assert_eq!(decode_frame(&[1, 229]), Some((1, -27)));
        assert_eq!(decode_frame(&[1]), None);
    }

    #[test]
    fn test_set_velocity_writes_all_motors() {
        let mut b = board(0);
        b.set_velocity(DriveCommand::rotate(1.0)).unwrap();

        let frames = &b.bus().frames;
        assert_eq!(frames.len(), 3);
        assert!(frames.iter().all(|(a, _)| *a == 0x10));

        let ids: Vec<u8> = frames.iter().map(|(_, f)| f[0]).collect();
        assert_eq!(ids, vec![0, 2, 1]);
        assert!(frames.iter().all(|(_, f)| decode_frame(f).unwrap().1 == -27));
        assert_eq!(b.last_powers(), Some(WheelPowers::new([-27, -27, -27])));
    }

    #[test]
    fn test_single_failure_is_retried() {
        let mut b = board(1);
        assert!(b.stop().is_ok());
        assert_eq!(b.bus().attempts, 4);
        assert_eq!(b.bus().frames.len(), 3);
    }

    #[test]
    fn test_double_failure_propagates() {
        let mut b = board(2);
        match b.set_velocity(DriveCommand::forward(40.0)) {
            Err(ActuatorError::BusError { motor_id, .. }) => assert_eq!(motor_id, 0),
            r => panic!("Expected a bus error, got {:?}", r),
        }
        assert_eq!(b.bus().attempts, 2);
        assert_eq!(b.last_powers(), None);
    }

    #[test]
    fn test_self_test() {
        let mut b = board(0);
        assert!(b.self_test());
        assert!(b.bus().frames.iter().all(|(_, f)| f[1] == 0));

        let mut b = board(2);
        assert!(!b.self_test());
    }
}
