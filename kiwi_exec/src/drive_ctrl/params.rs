//! Parameters structure for DriveCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for drive control.
#[derive(Debug, Clone, Deserialize)]
pub struct DriveCtrlParams {

    // ---- GEOMETRY ----

    /// Rotation between the camera and the chassis wheel frame, compensating a known mounting
    /// misalignment.
    ///
    /// Units: degrees
    pub mounting_offset_deg: f64,

    /// Contribution of the angular rate demand to each wheel.
    pub k_rot: f64,

    // ---- POWER SHAPING ----

    /// Minimum power at which the motors overcome static friction. Every non-zero wheel demand
    /// is raised to at least this value.
    pub power_floor: i32,

    /// Maximum power the motor board accepts.
    pub power_ceiling: i32,

    /// If true the wheel powers are negated before transmission to match the motor wiring.
    pub invert_output: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for DriveCtrlParams {
    fn default() -> Self {
        Self {
            mounting_offset_deg: 1.9,
            k_rot: 2.0,
            power_floor: 25,
            power_ceiling: 100,
            invert_output: true,
        }
    }
}
