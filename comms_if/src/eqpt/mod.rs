//! # Equipment Interface
//!
//! This module defines the interface structures which are exchanged with the equipment.

// -----------------------------------------------------------------------------------------------
// MODULES
// -----------------------------------------------------------------------------------------------

pub mod mech;
pub mod vision;
