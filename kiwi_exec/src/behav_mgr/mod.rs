//! # BehavMgr module
//!
//! This module implements the [`StateMachine`] which drives the robot towards a fiducial marker.
//! The behaviour is broken down into a number of states:
//!
//! - `Init` - Self-test the camera and the actuators, retried every cycle until both pass.
//! - `Scan` - Wait (optionally rotating) until a marker is visible.
//! - `Moving` - Visual servo towards the marker until centred, close and aligned.
//! - `Exit` - Terminal state, stops the machine.
//!
//! Each state implements the enter/execute/exit lifecycle. The machine executes the current
//! state once per cycle and performs the transition when a state returns its successor.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod exit;
mod init;
mod moving;
mod params;
mod scan;
pub mod tm;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::{
    fmt::Display,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use crate::{
    actuator::{ActuatorError, ActuatorPort},
    vision::{VisionError, VisionFeed},
};
use comms_if::eqpt::mech::DriveCommand;

pub use self::{
    moving::{BlendedGains, ControlStrategy, MovingParams},
    params::BehavMgrParams,
    scan::ScanParams,
    tm::BehavTm,
};

// ------------------------------------------------------------------------------------------------
// EXPORTS
// ------------------------------------------------------------------------------------------------

pub mod states {
    pub use super::exit::Exit;
    pub use super::init::Init;
    pub use super::moving::Moving;
    pub use super::scan::Scan;
}

use states::*;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Behaviour state machine.
///
/// Owns the actuator and vision collaborators and the single active state.
pub struct StateMachine<A: ActuatorPort, V: VisionFeed> {
    params: BehavMgrParams,

    /// Data available to every state
    ctx: BehavCtx<A, V>,

    /// The currently active state
    state: BehavState,

    /// Kind of the state active before the last transition
    previous: Option<BehavStateKind>,

    running: bool,

    stop_handle: StopHandle,

    /// The most recent error raised by a state
    last_error: Option<BehavMgrError>,

    /// Number of consecutive cycles in which the state's execute failed
    num_consec_errors: u64,
}

/// Collaborators and shared data passed to each state.
pub struct BehavCtx<A, V> {
    pub actuator: A,

    pub vision: V,

    /// The last command sent to the actuator
    pub last_cmd: Option<DriveCommand>,

    /// Set by a state to request the machine stops at the end of the cycle
    pub stop_requested: bool,
}

/// Cloneable handle used to request the machine stops from outside the control loop.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Errors that can occur in the behaviour manager.
#[derive(Debug, thiserror::Error)]
pub enum BehavMgrError {
    #[error("Actuator error: {0}")]
    ActuatorError(#[from] ActuatorError),

    #[error("Vision error: {0}")]
    VisionError(#[from] VisionError),

    #[error("Invalid BehavMgr parameter: {0}")]
    InvalidParam(String),
}

#[derive(Debug)]
pub enum BehavState {
    Init(Init),
    Scan(Scan),
    Moving(Moving),
    Exit(Exit),
}

/// Discriminant of [`BehavState`] used in logs and telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BehavStateKind {
    Init,
    Scan,
    Moving,
    Exit,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<A: ActuatorPort, V: VisionFeed> StateMachine<A, V> {
    pub fn new(params: BehavMgrParams, actuator: A, vision: V) -> Self {
        Self {
            params,
            ctx: BehavCtx {
                actuator,
                vision,
                last_cmd: None,
                stop_requested: false,
            },
            state: BehavState::Init(Init::new()),
            previous: None,
            running: false,
            stop_handle: StopHandle::default(),
            last_error: None,
            num_consec_errors: 0,
        }
    }

    /// Start the machine in the `Init` state. Has no effect if already running.
    pub fn start(&mut self) {
        if self.running {
            return;
        }

        self.running = true;
        self.ctx.stop_requested = false;
        self.stop_handle.0.store(false, Ordering::SeqCst);

        if self.state.kind() != BehavStateKind::Init {
            self.previous = Some(self.state.kind());
            self.state = BehavState::Init(Init::new());
        }

        info!("BehavMgr started in {}", self.state);

        if let Err(e) = self.state.enter(&self.params, &mut self.ctx) {
            self.record_lifecycle_error("entering", e);
        }
    }

    /// Execute one cycle of the current state, performing any transition it requests.
    ///
    /// Returns `true` while the machine is running. Errors raised by the state are logged and
    /// made available through [`StateMachine::last_error`], the state is kept for the next cycle.
    pub fn update(&mut self) -> bool {
        if !self.running {
            return false;
        }

        if self.stop_handle.is_stop_requested() {
            info!("Stop requested through the stop handle");
            self.stop();
            return false;
        }

        match self.state.execute(&self.params, &mut self.ctx) {
            Ok(Some(next)) => {
                self.num_consec_errors = 0;
                self.transition(next);
            }
            Ok(None) => self.num_consec_errors = 0,
            Err(e) => {
                error!("Error executing {}: {}", self.state, e);
                self.num_consec_errors += 1;
                self.last_error = Some(e);
            }
        }

        if self.ctx.stop_requested {
            self.stop();
        }

        self.running
    }

    /// Stop the machine, exiting the current state, stopping the vision capture and zeroing the
    /// actuator. Has no effect if not running.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }

        self.running = false;

        if let Err(e) = self.state.exit(&self.params, &mut self.ctx) {
            self.record_lifecycle_error("exiting", e);
        }

        if let Err(e) = self.ctx.vision.stop_capture() {
            warn!("Could not stop vision capture: {}", e);
        }

        match self.ctx.actuator.stop() {
            Ok(_) => self.ctx.last_cmd = Some(DriveCommand::zero()),
            Err(e) => error!("Could not stop the actuators: {}", e),
        }

        info!("BehavMgr stopped in {}", self.state);
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// A handle which can be used to stop the machine from another thread.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop_handle.clone()
    }

    pub fn state(&self) -> &BehavState {
        &self.state
    }

    pub fn state_kind(&self) -> BehavStateKind {
        self.state.kind()
    }

    pub fn previous_state(&self) -> Option<BehavStateKind> {
        self.previous
    }

    pub fn last_error(&self) -> Option<&BehavMgrError> {
        self.last_error.as_ref()
    }

    /// Take the last error, clearing it.
    pub fn take_last_error(&mut self) -> Option<BehavMgrError> {
        self.last_error.take()
    }

    pub fn num_consec_errors(&self) -> u64 {
        self.num_consec_errors
    }

    pub fn actuator(&self) -> &A {
        &self.ctx.actuator
    }

    pub fn vision(&self) -> &V {
        &self.ctx.vision
    }

    pub fn vision_mut(&mut self) -> &mut V {
        &mut self.ctx.vision
    }

    /// Build the telemetry snapshot for the current cycle.
    pub fn get_tm(&self) -> BehavTm {
        let (retry_count, last_observation) = match self.state {
            BehavState::Moving(ref m) => (Some(m.retry_count()), Some(*m.last_observation())),
            _ => (None, None),
        };

        BehavTm {
            state: self.state.kind(),
            previous_state: self.previous,
            running: self.running,
            retry_count,
            last_observation,
            last_cmd: self.ctx.last_cmd,
            num_consec_errors: self.num_consec_errors,
            last_error: self.last_error.as_ref().map(|e| e.to_string()),
        }
    }

    fn transition(&mut self, next: BehavState) {
        if let Err(e) = self.state.exit(&self.params, &mut self.ctx) {
            self.record_lifecycle_error("exiting", e);
        }

        info!("BehavMgr state change: {} -> {}", self.state, next);

        self.previous = Some(self.state.kind());
        self.state = next;

        if let Err(e) = self.state.enter(&self.params, &mut self.ctx) {
            self.record_lifecycle_error("entering", e);
        }
    }

    /// Errors in enter and exit do not prevent the transition.
    fn record_lifecycle_error(&mut self, action: &str, e: BehavMgrError) {
        warn!("Error {} {}: {}", action, self.state, e);
        self.last_error = Some(e);
    }
}

impl<A: ActuatorPort, V: VisionFeed> Drop for StateMachine<A, V> {
    fn drop(&mut self) {
        self.stop();
    }
}

impl<A: ActuatorPort, V: VisionFeed> BehavCtx<A, V> {
    /// Send a command to the actuator, recording it as the last command.
    pub fn command(&mut self, cmd: DriveCommand) -> Result<(), BehavMgrError> {
        self.actuator.set_velocity(cmd)?;
        self.last_cmd = Some(cmd);
        Ok(())
    }

    pub fn stop_actuator(&mut self) -> Result<(), BehavMgrError> {
        self.command(DriveCommand::zero())
    }
}

impl StopHandle {
    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl BehavState {
    pub fn kind(&self) -> BehavStateKind {
        match self {
            BehavState::Init(_) => BehavStateKind::Init,
            BehavState::Scan(_) => BehavStateKind::Scan,
            BehavState::Moving(_) => BehavStateKind::Moving,
            BehavState::Exit(_) => BehavStateKind::Exit,
        }
    }

    fn enter<A: ActuatorPort, V: VisionFeed>(
        &mut self,
        params: &BehavMgrParams,
        ctx: &mut BehavCtx<A, V>,
    ) -> Result<(), BehavMgrError> {
        match self {
            BehavState::Init(s) => s.enter(params, ctx),
            BehavState::Scan(s) => s.enter(params, ctx),
            BehavState::Moving(s) => s.enter(params, ctx),
            BehavState::Exit(s) => s.enter(params, ctx),
        }
    }

    fn execute<A: ActuatorPort, V: VisionFeed>(
        &mut self,
        params: &BehavMgrParams,
        ctx: &mut BehavCtx<A, V>,
    ) -> Result<Option<BehavState>, BehavMgrError> {
        match self {
            BehavState::Init(s) => s.execute(params, ctx),
            BehavState::Scan(s) => s.execute(params, ctx),
            BehavState::Moving(s) => s.execute(params, ctx),
            BehavState::Exit(s) => s.execute(params, ctx),
        }
    }

    fn exit<A: ActuatorPort, V: VisionFeed>(
        &mut self,
        params: &BehavMgrParams,
        ctx: &mut BehavCtx<A, V>,
    ) -> Result<(), BehavMgrError> {
        match self {
            BehavState::Init(s) => s.exit(params, ctx),
            BehavState::Scan(s) => s.exit(params, ctx),
            BehavState::Moving(s) => s.exit(params, ctx),
            BehavState::Exit(s) => s.exit(params, ctx),
        }
    }
}

impl Display for BehavState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind())
    }
}

impl Display for BehavStateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BehavStateKind::Init => write!(f, "BehavState::Init"),
            BehavStateKind::Scan => write!(f, "BehavState::Scan"),
            BehavStateKind::Moving => write!(f, "BehavState::Moving"),
            BehavStateKind::Exit => write!(f, "BehavState::Exit"),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
