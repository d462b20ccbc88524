//! [`VisionFeed`] implementation which runs a [`FrameSource`] on a background capture thread

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use chrono::Utc;
use log::{debug, error, info, trace, warn};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use super::{FrameSlot, FrameSource, VisionError, VisionFeed, VisionParams};
use comms_if::eqpt::vision::{MarkerFrame, MarkerObservation};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Interval at which the capture thread is polled for completion while stopping.
const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(5);

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct ThreadedFeed<S: FrameSource> {
    params: VisionParams,

    slot: FrameSlot,

    /// The source while not capturing. It is moved onto the capture thread on start and returned
    /// to the feed when the thread is joined.
    source: Option<S>,

    worker: Option<Worker<S>>,
}

struct Worker<S> {
    jh: JoinHandle<S>,
    run: Arc<AtomicBool>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<S: FrameSource> ThreadedFeed<S> {
    pub fn new(source: S, params: VisionParams) -> Self {
        Self {
            params,
            slot: FrameSlot::new(),
            source: Some(source),
            worker: None,
        }
    }

    /// A handle on the slot the capture thread publishes into.
    pub fn slot(&self) -> FrameSlot {
        self.slot.clone()
    }

    pub fn is_capturing(&self) -> bool {
        self.worker.is_some()
    }
}

impl<S: FrameSource> VisionFeed for ThreadedFeed<S> {
    fn start_capture(&mut self) -> Result<(), VisionError> {
        if self.worker.is_some() {
            return Ok(());
        }

        let source = self.source.take().ok_or(VisionError::SourceUnavailable)?;

        let run = Arc::new(AtomicBool::new(true));
        let run_clone = run.clone();
        let slot = self.slot.clone();
        let period = self.params.capture_period();

        let jh = thread::Builder::new()
            .name("vision_capture".into())
            .spawn(move || bg_thread(source, slot, run_clone, period))
            .map_err(VisionError::ThreadSpawnError)?;

        self.worker = Some(Worker { jh, run });

        info!("Vision capture started");

        Ok(())
    }

    fn stop_capture(&mut self) -> Result<(), VisionError> {
        let worker = match self.worker.take() {
            Some(w) => w,
            None => return Ok(()),
        };

        worker.run.store(false, Ordering::Relaxed);

        let timeout = self.params.join_timeout();
        let start = Instant::now();

        while !worker.jh.is_finished() {
            if start.elapsed() >= timeout {
                // The handle is dropped which detaches the thread, it exits at its next check of
                // the run flag.
                warn!(
                    "Vision capture thread did not stop within {:.2} s, detaching it",
                    timeout.as_secs_f64()
                );
                self.slot.clear();
                return Err(VisionError::JoinTimeout(timeout.as_secs_f64()));
            }
            thread::sleep(JOIN_POLL_INTERVAL);
        }

        self.slot.clear();

        match worker.jh.join() {
            Ok(source) => {
                self.source = Some(source);
                info!("Vision capture stopped");
                Ok(())
            }
            Err(_) => {
                error!("Vision capture thread panicked");
                Err(VisionError::CaptureThreadPanicked)
            }
        }
    }

    fn detect_markers(&mut self) -> Vec<MarkerObservation> {
        match self.slot.latest() {
            Some(frame) => {
                let age_s = frame.age_s(Utc::now());
                if age_s > self.params.max_frame_age_s {
                    trace!("Latest frame is stale ({:.3} s old)", age_s);
                    Vec::new()
                } else {
                    frame.markers.clone()
                }
            }
            None => Vec::new(),
        }
    }

    fn self_test(&mut self) -> bool {
        match (self.source.as_mut(), &self.worker) {
            (Some(source), _) => source.self_test(),
            (None, Some(worker)) => !worker.jh.is_finished(),
            (None, None) => false,
        }
    }
}

impl<S: FrameSource> Drop for ThreadedFeed<S> {
    fn drop(&mut self) {
        if let Err(e) = self.stop_capture() {
            warn!("Error stopping vision capture on drop: {}", e);
        }
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Capture thread, acquires frames from the source and publishes them into the slot until
/// instructed to stop or the source closes.
fn bg_thread<S: FrameSource>(
    mut source: S,
    slot: FrameSlot,
    run: Arc<AtomicBool>,
    period: Duration,
) -> S {
    while run.load(Ordering::Relaxed) {
        let cycle_start = Instant::now();

        match source.acquire() {
            Ok(markers) => slot.publish(MarkerFrame::now(markers)),
            Err(VisionError::SourceClosed) => {
                warn!("Frame source closed, ending capture");
                break;
            }
            // The previous frame ages out of the slot by itself
            Err(VisionError::NoNewFrame) => trace!("No new frame from the source"),
            Err(e) => warn!("Could not acquire frame: {}", e),
        }

        match period.checked_sub(cycle_start.elapsed()) {
            Some(d) => thread::sleep(d),
            None => debug!("Frame acquisition overran the capture period"),
        }
    }

    source
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::eqpt::vision::{MarkerAngles, PixelCoord};

    /// Source which reports a single marker with an incrementing ID.
    struct CountingSource {
        next_id: u32,
        healthy: bool,
        block: Option<Duration>,
    }

    impl FrameSource for CountingSource {
        fn acquire(&mut self) -> Result<Vec<MarkerObservation>, VisionError> {
            if let Some(d) = self.block {
                thread::sleep(d);
            }
            self.next_id += 1;
            Ok(vec![MarkerObservation::new(
                self.next_id,
                0.5,
                MarkerAngles::default(),
                PixelCoord { x: 160, y: 120 },
            )])
        }

        fn self_test(&mut self) -> bool {
            self.healthy
        }
    }

    fn params() -> VisionParams {
        VisionParams {
            capture_rate_hz: 200.0,
            join_timeout_s: 0.2,
            ..Default::default()
        }
    }

    fn source() -> CountingSource {
        CountingSource {
            next_id: 0,
            healthy: true,
            block: None,
        }
    }

    fn wait_for_frame(feed: &mut ThreadedFeed<CountingSource>) -> Vec<MarkerObservation> {
        let start = Instant::now();
        loop {
            let markers = feed.detect_markers();
            if !markers.is_empty() || start.elapsed() > Duration::from_secs(2) {
                return markers;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_capture_lifecycle() {
        let mut feed = ThreadedFeed::new(source(), params());

        assert!(feed.self_test());
        assert!(feed.detect_markers().is_empty());

        feed.start_capture().unwrap();
        feed.start_capture().unwrap();
        assert!(feed.is_capturing());
        assert!(feed.self_test());

        let markers = wait_for_frame(&mut feed);
        assert_eq!(markers.len(), 1);

        // Later frames replace earlier ones
        let first_id = markers[0].id;
        thread::sleep(Duration::from_millis(50));
        assert!(feed.detect_markers()[0].id > first_id);

        feed.stop_capture().unwrap();
        feed.stop_capture().unwrap();
        assert!(!feed.is_capturing());
        assert!(feed.detect_markers().is_empty());

        // The source is returned to the feed so capture can be restarted
        feed.start_capture().unwrap();
        assert!(!wait_for_frame(&mut feed).is_empty());
        feed.stop_capture().unwrap();
    }

    #[test]
    fn test_unhealthy_source() {
        let mut feed = ThreadedFeed::new(
            CountingSource {
                healthy: false,
                ..source()
            },
            params(),
        );
        assert!(!feed.self_test());
    }

    #[test]
    fn test_stop_times_out_on_blocked_source() {
        let mut feed = ThreadedFeed::new(
            CountingSource {
                block: Some(Duration::from_millis(800)),
                ..source()
            },
            params(),
        );

        feed.start_capture().unwrap();
        thread::sleep(Duration::from_millis(20));

        let start = Instant::now();
        assert!(matches!(
            feed.stop_capture(),
            Err(VisionError::JoinTimeout(_))
        ));
        assert!(start.elapsed() < Duration::from_millis(700));

        // The detached thread took the source with it
        assert!(!feed.is_capturing());
        assert!(matches!(
            feed.start_capture(),
            Err(VisionError::SourceUnavailable)
        ));
    }

    #[test]
    fn test_stale_frames_ignored() {
        let mut feed = ThreadedFeed::new(source(), params());
        let mut frame = MarkerFrame::now(vec![MarkerObservation::new(
            1,
            0.5,
            MarkerAngles::default(),
            PixelCoord::default(),
        )]);
        frame.timestamp = frame.timestamp - chrono::Duration::seconds(5);
        feed.slot().publish(frame);

        assert!(feed.detect_markers().is_empty());
    }
}
