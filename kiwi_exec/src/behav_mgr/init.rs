//! # [`BehavState::Init`] implementation

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{error, info};

use super::{states::Scan, BehavCtx, BehavMgrError, BehavMgrParams, BehavState};
use crate::{actuator::ActuatorPort, vision::VisionFeed};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Initialisation state of the BehavMgr.
///
/// Possible transitions:
/// - Scan, once both the camera and the actuator self-tests pass
#[derive(Debug, Default)]
pub struct Init {
    /// True once both self-tests have passed
    passed: bool,

    num_attempts: u64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Init {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter<A: ActuatorPort, V: VisionFeed>(
        &mut self,
        _params: &BehavMgrParams,
        _ctx: &mut BehavCtx<A, V>,
    ) -> Result<(), BehavMgrError> {
        info!("Initialising: testing camera and actuators");
        Ok(())
    }

    pub fn execute<A: ActuatorPort, V: VisionFeed>(
        &mut self,
        _params: &BehavMgrParams,
        ctx: &mut BehavCtx<A, V>,
    ) -> Result<Option<BehavState>, BehavMgrError> {
        self.num_attempts += 1;

        if !ctx.vision.self_test() {
            error!("Camera self test failed (attempt {}), retrying", self.num_attempts);
            return Ok(None);
        }

        if !ctx.actuator.self_test() {
            error!("Actuator self test failed (attempt {}), retrying", self.num_attempts);
            return Ok(None);
        }

        info!("Initialisation complete, camera and actuators OK");
        self.passed = true;

        Ok(Some(BehavState::Scan(Scan::new())))
    }

    /// Starts the vision capture if the self-tests passed.
    pub fn exit<A: ActuatorPort, V: VisionFeed>(
        &mut self,
        _params: &BehavMgrParams,
        ctx: &mut BehavCtx<A, V>,
    ) -> Result<(), BehavMgrError> {
        if self.passed {
            ctx.vision.start_capture()?;
        }
        Ok(())
    }
}
