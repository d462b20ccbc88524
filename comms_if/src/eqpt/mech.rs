//! # Drive Mechanisms Commands

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Number of drive wheels on the chassis
pub const NUM_WHEELS: usize = 3;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Desired planar body velocity and turn rate.
///
/// Values are unclamped, they are only brought into the motors' range by the drive kinematics.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DriveCommand {
    /// Lateral velocity, positive to the right
    pub vx: f64,

    /// Forward velocity
    pub vy: f64,

    /// Angular rate about the vertical axis
    pub v_ang: f64,
}

/// Signed power demand for each of the three wheels, in the motor board's native units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WheelPowers([i32; NUM_WHEELS]);

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl DriveCommand {
    pub fn new(vx: f64, vy: f64, v_ang: f64) -> Self {
        Self { vx, vy, v_ang }
    }

    /// The all-zero command, equivalent to stopping.
    pub fn zero() -> Self {
        Self::default()
    }

    /// Pure rotation in place
    pub fn rotate(v_ang: f64) -> Self {
        Self::new(0.0, 0.0, v_ang)
    }

    /// Pure forward/backward motion
    pub fn forward(vy: f64) -> Self {
        Self::new(0.0, vy, 0.0)
    }

    /// Pure sideways motion
    pub fn strafe(vx: f64) -> Self {
        Self::new(vx, 0.0, 0.0)
    }

    pub fn is_zero(&self) -> bool {
        self.vx == 0.0 && self.vy == 0.0 && self.v_ang == 0.0
    }

    pub fn as_array(&self) -> [f64; 3] {
        [self.vx, self.vy, self.v_ang]
    }
}

impl WheelPowers {
    pub fn new(powers: [i32; NUM_WHEELS]) -> Self {
        Self(powers)
    }

    pub fn zero() -> Self {
        Self::default()
    }

    pub fn powers(&self) -> [i32; NUM_WHEELS] {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&p| p == 0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_constructors() {
        assert!(DriveCommand::zero().is_zero());
        assert_eq!(DriveCommand::rotate(-1.0).as_array(), [0.0, 0.0, -1.0]);
        assert_eq!(DriveCommand::forward(40.0).as_array(), [0.0, 40.0, 0.0]);
        assert_eq!(DriveCommand::strafe(15.0).as_array(), [15.0, 0.0, 0.0]);
        assert!(WheelPowers::zero().is_zero());
        assert!(!WheelPowers::new([0, 25, -25]).is_zero());
    }
}
