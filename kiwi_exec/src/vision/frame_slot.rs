//! Single frame slot shared between the capture thread and the control thread

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use arc_swap::ArcSwapOption;
use std::sync::Arc;

use comms_if::eqpt::vision::MarkerFrame;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Holds the most recent [`MarkerFrame`].
///
/// Publishing replaces the previous frame, there is no queue. Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct FrameSlot(Arc<ArcSwapOption<MarkerFrame>>);

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current frame.
    pub fn publish(&self, frame: MarkerFrame) {
        self.0.store(Some(Arc::new(frame)));
    }

    /// Get the current frame, or `None` if nothing has been published since creation or the last
    /// clear.
    pub fn latest(&self) -> Option<Arc<MarkerFrame>> {
        self.0.load_full()
    }

    pub fn clear(&self) {
        self.0.store(None);
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::eqpt::vision::{MarkerAngles, MarkerObservation, PixelCoord};
    use std::thread;

    #[test]
    fn test_most_recent_wins() {
        let slot = FrameSlot::new();
        assert!(slot.latest().is_none());

        let writer = slot.clone();
        thread::spawn(move || {
            for id in 0..10 {
                writer.publish(MarkerFrame::now(vec![MarkerObservation::new(
                    id,
                    1.0,
                    MarkerAngles::default(),
                    PixelCoord::default(),
                )]));
            }
        })
        .join()
        .unwrap();

        let latest = slot.latest().unwrap();
        assert_eq!(latest.markers.len(), 1);
        assert_eq!(latest.markers[0].id, 9);

        slot.clear();
        assert!(slot.latest().is_none());
    }
}
