//! Parameters for the kiwi executable

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;
use std::time::Duration;

use crate::actuator::MotorBoardParams;

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// Parameters for the executable's main loop and hardware selection, loaded from
/// `kiwi_exec.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct KiwiExecParams {
    /// Frequency of the main loop.
    ///
    /// Units: Hertz
    pub cycle_frequency_hz: f64,

    /// Maximum run time, after which the state machine is stopped. Zero or absent runs until the
    /// machine stops itself.
    ///
    /// Units: seconds
    #[serde(default)]
    pub max_run_time_s: Option<f64>,

    /// Number of consecutive failing cycles after which execution is aborted.
    pub max_consec_errors: u64,

    /// Run against the simulated world instead of the hardware.
    #[serde(default)]
    pub use_sim: bool,

    /// Number of the I2C bus the motor board is attached to.
    pub i2c_bus: u8,

    /// Motor board address and motor IDs
    #[serde(default)]
    pub motor_board: MotorBoardParams,

    /// File or named pipe the external marker detector writes its detections into.
    pub detection_stream_path: String,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl KiwiExecParams {
    /// Target period of one cycle, or `None` if the frequency isn't positive.
    pub fn cycle_period(&self) -> Option<Duration> {
        util::time::period_from_hz(self.cycle_frequency_hz)
    }

    /// The maximum run time if one is set.
    pub fn max_run_time(&self) -> Option<Duration> {
        match self.max_run_time_s {
            // Longer than a Duration can hold is the same as no limit
            Some(t) if t > 0.0 && t < u64::MAX as f64 => Some(Duration::from_secs_f64(t)),
            _ => None,
        }
    }
}

impl Default for KiwiExecParams {
    fn default() -> Self {
        Self {
            cycle_frequency_hz: 20.0,
            max_run_time_s: None,
            max_consec_errors: 20,
            use_sim: false,
            i2c_bus: 1,
            motor_board: MotorBoardParams::default(),
            detection_stream_path: String::from("/tmp/kiwi_detections"),
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
