//! # Defines Telemetry Pack for the BehavMgr

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use super::BehavStateKind;
use comms_if::eqpt::{mech::DriveCommand, vision::MarkerObservation};

// -----------------------------------------------------------------------------------------------
// STRUCTS
// -----------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehavTm {
    pub state: BehavStateKind,
    pub previous_state: Option<BehavStateKind>,
    pub running: bool,

    /// Consecutive cycles without an observation, only set in Moving
    pub retry_count: Option<u32>,

    /// The observation being followed, only set in Moving
    pub last_observation: Option<MarkerObservation>,

    pub last_cmd: Option<DriveCommand>,
    pub num_consec_errors: u64,
    pub last_error: Option<String>,
}
