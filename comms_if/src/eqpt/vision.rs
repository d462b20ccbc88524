//! # Vision Equipment Data
//!
//! Marker observations as produced by the vision feed.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use chrono::{serde::ts_milliseconds, DateTime, Utc};
use nalgebra::{Point2, Rotation3, Vector3};
use serde::{de, Deserialize, Deserializer, Serialize};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Below this value the rotation matrix is treated as gimbal locked when extracting angles.
const SINGULAR_THRESHOLD: f64 = 1e-6;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A single fiducial marker detection.
///
/// Observations are replaced wholesale on each detection cycle, there is no notion of tracking
/// the same observation across frames.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarkerObservation {
    /// Decoded marker ID
    pub id: u32,

    /// Distance from the camera to the marker centre. Negative or non-finite distances are
    /// rejected when deserialising.
    ///
    /// Units: meters
    #[serde(deserialize_with = "de_distance")]
    pub distance_m: f64,

    /// Orientation of the marker relative to the camera
    pub angles: MarkerAngles,

    /// Centre of the marker in the image, origin at the bottom left.
    ///
    /// Units: pixels
    pub center_px: PixelCoord,
}

/// Roll, pitch and yaw of a marker.
///
/// Units: degrees
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MarkerAngles {
    pub roll_deg: f64,
    pub pitch_deg: f64,
    pub yaw_deg: f64,
}

/// Integer image coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PixelCoord {
    pub x: i32,
    pub y: i32,
}

/// All markers detected in one captured frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerFrame {
    /// UTC timestamp at which the frame was acquired
    #[serde(with = "ts_milliseconds")]
    pub timestamp: DateTime<Utc>,

    /// Markers found in the frame, in detection order. Empty if none are visible.
    pub markers: Vec<MarkerObservation>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl MarkerObservation {
    /// Create a new observation. Negative distances are clamped to zero.
    pub fn new(id: u32, distance_m: f64, angles: MarkerAngles, center_px: PixelCoord) -> Self {
        Self {
            id,
            distance_m: distance_m.max(0.0),
            angles,
            center_px,
        }
    }

    /// Build an observation from an estimated marker pose.
    ///
    /// ## Arguments
    /// - `rvec` - Rotation of the marker in the camera frame as a scaled axis (Rodrigues vector)
    /// - `tvec` - Translation of the marker in the camera frame, meters
    /// - `corners` - The four detected corners of the marker in image coordinates (origin top
    ///   left)
    /// - `frame_height_px` - Height of the image the corners were detected in
    pub fn from_marker_pose(
        id: u32,
        rvec: &Vector3<f64>,
        tvec: &Vector3<f64>,
        corners: &[Point2<f64>; 4],
        frame_height_px: u32,
    ) -> Self {
        let angles = MarkerAngles::from_rotation(&Rotation3::new(*rvec));

        // Mean of the corners, y flipped so that the origin is the bottom left of the image
        let sum = corners
            .iter()
            .fold(Vector3::zeros(), |acc, c| acc + Vector3::new(c.x, c.y, 0.0));
        let center_x = (sum.x / 4.0) as i32;
        let center_y = (sum.y / 4.0) as i32;

        Self::new(
            id,
            tvec.norm(),
            angles,
            PixelCoord {
                x: center_x,
                y: frame_height_px as i32 - center_y,
            },
        )
    }
}

impl MarkerAngles {
    /// Extract roll, pitch and yaw from a rotation.
    ///
    /// Roll is offset by half a turn so that a marker squarely facing the camera has zero roll.
    pub fn from_rotation(rot: &Rotation3<f64>) -> Self {
        let r = rot.matrix();

        let sy = (r[(0, 0)].powi(2) + r[(1, 0)].powi(2)).sqrt();

        let (x, y, z) = if sy >= SINGULAR_THRESHOLD {
            (
                r[(2, 1)].atan2(r[(2, 2)]),
                (-r[(2, 0)]).atan2(sy),
                r[(1, 0)].atan2(r[(0, 0)]),
            )
        } else {
            ((-r[(1, 2)]).atan2(r[(1, 1)]), (-r[(2, 0)]).atan2(sy), 0.0)
        };

        Self {
            roll_deg: x.to_degrees().rem_euclid(360.0) - 180.0,
            pitch_deg: (y.to_degrees() + 180.0).rem_euclid(360.0) - 180.0,
            yaw_deg: (z.to_degrees() + 180.0).rem_euclid(360.0) - 180.0,
        }
    }
}

impl MarkerFrame {
    /// Create a frame timestamped now.
    pub fn now(markers: Vec<MarkerObservation>) -> Self {
        Self {
            timestamp: Utc::now(),
            markers,
        }
    }

    /// Age of the frame in seconds relative to `now`.
    pub fn age_s(&self, now: DateTime<Utc>) -> f64 {
        now.signed_duration_since(self.timestamp).num_milliseconds() as f64 * 0.001
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn de_distance<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let d = f64::deserialize(deserializer)?;

    if d.is_finite() && d >= 0.0 {
        Ok(d)
    } else {
        Err(de::Error::custom(format!(
            "expected a finite non-negative distance, found {}",
            d
        )))
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_from_marker_pose() {
        let corners = [
            Point2::new(100.0, 100.0),
            Point2::new(120.0, 100.0),
            Point2::new(120.0, 120.0),
            Point2::new(100.0, 120.0),
        ];

        // Marker squarely facing the camera, half a meter away
        let obs = MarkerObservation::from_marker_pose(
            7,
            &Vector3::new(PI, 0.0, 0.0),
            &Vector3::new(0.3, 0.0, 0.4),
            &corners,
            240,
        );

        assert_eq!(obs.id, 7);
        assert!((obs.distance_m - 0.5).abs() < 1e-9);
        assert!(obs.angles.roll_deg.abs() < 1e-6);
        assert!(obs.angles.pitch_deg.abs() < 1e-6);
        assert!(obs.angles.yaw_deg.abs() < 1e-6);
        assert_eq!(obs.center_px, PixelCoord { x: 110, y: 130 });
    }

    #[test]
    fn test_pitch_sign() {
        // A rotation about the camera's vertical axis shows up as pitch
        let rot = Rotation3::from_euler_angles(0.0, 20f64.to_radians(), 0.0);
        let angles = MarkerAngles::from_rotation(&rot);
        assert!((angles.pitch_deg - 20.0).abs() < 1e-6);

        let rot = Rotation3::from_euler_angles(0.0, -20f64.to_radians(), 0.0);
        let angles = MarkerAngles::from_rotation(&rot);
        assert!((angles.pitch_deg + 20.0).abs() < 1e-6);
    }

    #[test]
    fn test_negative_distance_clamped() {
        let obs = MarkerObservation::new(0, -1.0, MarkerAngles::default(), PixelCoord::default());
        assert_eq!(obs.distance_m, 0.0);
    }

    #[test]
    fn test_negative_distance_rejected() {
        let json = r#"{"id":1,"distance_m":-0.5,"angles":{"roll_deg":0.0,"pitch_deg":0.0,"yaw_deg":0.0},"center_px":{"x":160,"y":120}}"#;
        assert!(serde_json::from_str::<MarkerObservation>(json).is_err());

        let json = json.replace("-0.5", "0.5");
        let obs: MarkerObservation = serde_json::from_str(&json).unwrap();
        assert_eq!(obs.distance_m, 0.5);
    }

    #[test]
    fn test_frame_serialises() {
        let frame = MarkerFrame::now(vec![MarkerObservation::new(
            3,
            0.25,
            MarkerAngles::default(),
            PixelCoord { x: 160, y: 120 },
        )]);

        let json = serde_json::to_string(&frame).unwrap();
        let back: MarkerFrame = serde_json::from_str(&json).unwrap();

        assert_eq!(back.markers, frame.markers);
        assert_eq!(
            back.timestamp.timestamp_millis(),
            frame.timestamp.timestamp_millis()
        );
    }
}
