//! # Communications interface crate.
//!
//! Provides the data passed between the behaviour manager and its equipment: marker observations
//! coming in from the vision feed and drive commands/wheel powers going out to the motors.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Data definitions for equipment (vision feed and drive motors)
pub mod eqpt;
