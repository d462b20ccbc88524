//! # Kiwi Executable Library
//!
//! Modules used by `kiwi_exec` to drive the kiwi robot up to a fiducial marker.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

/// Actuator port and the motor board driver
pub mod actuator;

/// Behaviour manager - the Init/Scan/Moving/Exit state machine
pub mod behav_mgr;

/// Drive control - kiwi drive kinematics and power shaping
pub mod drive_ctrl;

/// Executable parameters
pub mod params;

/// Simulated world, motor bus and camera
pub mod sim;

/// Vision feed - background capture of marker detections
pub mod vision;
