//! Drive control module
//!
//! Converts body velocity demands into wheel powers for the three-wheeled holonomic (kiwi)
//! chassis.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod kinematics;
mod params;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

pub use kinematics::*;
pub use params::*;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur while setting up drive control.
#[derive(Debug, thiserror::Error)]
pub enum DriveCtrlError {
    #[error(
        "Invalid power band: the floor ({floor}) must be non-negative and below the ceiling \
        ({ceiling})"
    )]
    InvalidPowerBand { floor: i32, ceiling: i32 },

    #[error("The rotational contribution constant must be non-zero and finite, found {0}")]
    InvalidRotConstant(f64),
}
