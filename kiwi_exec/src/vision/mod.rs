//! # Vision Module
//!
//! The vision feed supplies the latest marker observations to the behaviour states. Acquisition
//! runs on a background thread which overwrites a single frame slot, the control thread only ever
//! reads the most recent frame.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod frame_slot;
mod params;
mod stream_source;
mod threaded_feed;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::eqpt::vision::MarkerObservation;

pub use frame_slot::FrameSlot;
pub use params::VisionParams;
pub use stream_source::DetectionStream;
pub use threaded_feed::ThreadedFeed;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Interface to the marker detection system.
pub trait VisionFeed {
    /// Begin continuous acquisition. Calling this while already capturing has no effect.
    fn start_capture(&mut self) -> Result<(), VisionError>;

    /// End continuous acquisition. Calling this while not capturing has no effect.
    fn stop_capture(&mut self) -> Result<(), VisionError>;

    /// Markers visible in the latest frame. An empty vector means nothing is visible.
    fn detect_markers(&mut self) -> Vec<MarkerObservation>;

    /// Check that the detection system is available.
    fn self_test(&mut self) -> bool;
}

/// A blocking producer of marker detections, run on the capture thread of a [`ThreadedFeed`].
pub trait FrameSource: Send + 'static {
    /// Acquire the next frame and return the markers detected in it.
    ///
    /// Returning [`VisionError::SourceClosed`] ends the capture, any other error is reported and
    /// acquisition continues.
    fn acquire(&mut self) -> Result<Vec<MarkerObservation>, VisionError>;

    /// Check that the source is able to produce frames.
    fn self_test(&mut self) -> bool;
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum VisionError {
    #[error("Could not spawn the capture thread: {0}")]
    ThreadSpawnError(std::io::Error),

    #[error("The capture thread did not finish within {0} s and has been detached")]
    JoinTimeout(f64),

    #[error("The capture thread panicked")]
    CaptureThreadPanicked,

    #[error("The frame source is no longer available")]
    SourceUnavailable,

    #[error("The frame source has closed")]
    SourceClosed,

    #[error("Could not read from the frame source: {0}")]
    ReadError(std::io::Error),

    #[error("Could not parse a detection: {0}")]
    ParseError(serde_json::Error),

    #[error("Could not open the detection stream: {0}")]
    OpenError(std::io::Error),

    #[error("No new frame is available from the source")]
    NoNewFrame,

    #[error("Invalid vision parameter: {0}")]
    InvalidParam(String),
}
