//! # [`BehavState::Exit`] implementation

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::info;

use super::{BehavCtx, BehavMgrError, BehavMgrParams, BehavState};
use crate::{actuator::ActuatorPort, vision::VisionFeed};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Terminal state of the BehavMgr, there are no transitions out of it.
#[derive(Debug, Default)]
pub struct Exit;

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Exit {
    pub fn new() -> Self {
        Self
    }

    /// Zeroes the actuators and requests the machine stops.
    pub fn enter<A: ActuatorPort, V: VisionFeed>(
        &mut self,
        _params: &BehavMgrParams,
        ctx: &mut BehavCtx<A, V>,
    ) -> Result<(), BehavMgrError> {
        info!("Marker reached, stopping");
        ctx.stop_requested = true;
        ctx.stop_actuator()
    }

    pub fn execute<A: ActuatorPort, V: VisionFeed>(
        &mut self,
        _params: &BehavMgrParams,
        _ctx: &mut BehavCtx<A, V>,
    ) -> Result<Option<BehavState>, BehavMgrError> {
        Ok(None)
    }

    pub fn exit<A: ActuatorPort, V: VisionFeed>(
        &mut self,
        _params: &BehavMgrParams,
        _ctx: &mut BehavCtx<A, V>,
    ) -> Result<(), BehavMgrError> {
        Ok(())
    }
}
