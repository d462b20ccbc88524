//! # [`BehavState::Scan`] implementation

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, info, trace};
use serde::Deserialize;

use super::{states::Moving, BehavCtx, BehavMgrError, BehavMgrParams, BehavState};
use crate::{actuator::ActuatorPort, vision::VisionFeed};
use comms_if::eqpt::mech::DriveCommand;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Scan state of the BehavMgr.
///
/// Possible transitions:
/// - Moving, as soon as a marker is visible
#[derive(Debug, Default)]
pub struct Scan {
    num_cycles: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScanParams {
    /// Angular rate commanded while no marker is visible, zero to stand still.
    pub search_turn_rate: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Scan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter<A: ActuatorPort, V: VisionFeed>(
        &mut self,
        _params: &BehavMgrParams,
        _ctx: &mut BehavCtx<A, V>,
    ) -> Result<(), BehavMgrError> {
        info!("Scanning for markers");
        Ok(())
    }

    pub fn execute<A: ActuatorPort, V: VisionFeed>(
        &mut self,
        params: &BehavMgrParams,
        ctx: &mut BehavCtx<A, V>,
    ) -> Result<Option<BehavState>, BehavMgrError> {
        self.num_cycles += 1;

        let markers = ctx.vision.detect_markers();

        // No ranking, the first detection is followed
        if let Some(obs) = markers.first() {
            debug!(
                "{} marker(s) detected after {} cycles, following marker {}",
                markers.len(),
                self.num_cycles,
                obs.id
            );
            return Ok(Some(BehavState::Moving(Moving::new(*obs))));
        }

        trace!("No marker detected");

        ctx.command(DriveCommand::rotate(params.scan.search_turn_rate))?;

        Ok(None)
    }

    pub fn exit<A: ActuatorPort, V: VisionFeed>(
        &mut self,
        _params: &BehavMgrParams,
        ctx: &mut BehavCtx<A, V>,
    ) -> Result<(), BehavMgrError> {
        ctx.stop_actuator()
    }
}
