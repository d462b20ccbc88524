//! Simulated camera producing marker observations from the simulated world

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::trace;
use nalgebra::{Point2, Point3, Rotation3, Vector3};
use std::{f64::consts::PI, sync::Arc};

use super::{SimPose, SimWorld};
use crate::vision::{FrameSource, VisionError, VisionParams};
use comms_if::eqpt::vision::MarkerObservation;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Pinhole model of the camera, mounted at the robot centre looking forward.
#[derive(Debug, Clone)]
pub struct CameraModel {
    pub width_px: u32,
    pub height_px: u32,

    /// Focal length.
    ///
    /// Units: pixels
    pub focal_px: f64,

    /// Units: meters
    pub max_range_m: f64,
}

/// [`FrameSource`] observing the simulated world.
pub struct SimCamera {
    world: Arc<SimWorld>,
    model: CameraModel,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl CameraModel {
    pub fn new(width_px: u32, height_px: u32, fov_deg: f64, max_range_m: f64) -> Self {
        Self {
            width_px,
            height_px,
            focal_px: (width_px as f64 / 2.0) / (fov_deg.to_radians() / 2.0).tan(),
            max_range_m,
        }
    }

    /// Project a point in the camera frame (`x` right, `y` down, `z` forward) into the image,
    /// returning `None` if it is behind the camera or outside the image.
    fn project(&self, p: &Point3<f64>) -> Option<Point2<f64>> {
        if p.z <= 0.0 {
            return None;
        }

        let u = self.width_px as f64 / 2.0 + self.focal_px * p.x / p.z;
        let v = self.height_px as f64 / 2.0 + self.focal_px * p.y / p.z;

        if u < 0.0 || u >= self.width_px as f64 || v < 0.0 || v >= self.height_px as f64 {
            return None;
        }

        Some(Point2::new(u, v))
    }
}

impl SimCamera {
    pub fn new(world: Arc<SimWorld>, vision: &VisionParams) -> Self {
        let model = CameraModel::new(
            vision.frame_width_px,
            vision.frame_height_px,
            world.params().camera_fov_deg,
            world.params().camera_max_range_m,
        );

        Self { world, model }
    }

    /// Observe the marker from the robot's current pose.
    pub fn observe(&self) -> Option<MarkerObservation> {
        observe_from(&self.world, &self.world.pose(), &self.model)
    }
}

impl FrameSource for SimCamera {
    fn acquire(&mut self) -> Result<Vec<MarkerObservation>, VisionError> {
        self.world.sync();
        Ok(self.observe().into_iter().collect())
    }

    fn self_test(&mut self) -> bool {
        true
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Compute the observation of the world's marker from `pose`, or `None` if the marker cannot be
/// seen.
pub fn observe_from(
    world: &SimWorld,
    pose: &SimPose,
    model: &CameraModel,
) -> Option<MarkerObservation> {
    let marker = world.marker();

    let (fx, fy) = pose.forward();
    let (rx, ry) = pose.right();

    // Marker position in the camera frame
    let (dx, dy) = (marker.x_m - pose.x_m, marker.y_m - pose.y_m);
    let tvec = Vector3::new(dx * rx + dy * ry, 0.0, dx * fx + dy * fy);

    if tvec.norm() > model.max_range_m {
        return None;
    }

    // Marker normal in the body frame, the printed face must point back at the camera
    let (ns, nc) = marker.facing_deg.to_radians().sin_cos();
    let n_fwd = nc * fx + ns * fy;
    let n_right = nc * rx + ns * ry;
    if -(dx * nc + dy * ns) <= 0.0 {
        return None;
    }

    // A marker squarely facing the camera is a half turn about x, turning its face towards the
    // robot's left is a positive rotation about the camera's vertical axis.
    let turn = (-n_right).atan2(-n_fwd);
    let rot = Rotation3::from_euler_angles(PI, turn, 0.0);

    let half = marker.size_m / 2.0;
    let offsets = [(-half, half), (half, half), (half, -half), (-half, -half)];
    let mut corners = [Point2::origin(); 4];
    for (corner, (cx, cy)) in corners.iter_mut().zip(offsets.iter()) {
        let p = rot * Point3::new(*cx, *cy, 0.0) + tvec;
        *corner = model.project(&p)?;
    }

    let obs = MarkerObservation::from_marker_pose(
        marker.id,
        &rot.scaled_axis(),
        &tvec,
        &corners,
        model.height_px,
    );

    trace!("Sim observation {:?}", obs);

    Some(obs)
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::sim::SimParams;

    fn camera(initial_pose: SimPose) -> SimCamera {
        let world = SimWorld::new(SimParams {
            initial_pose,
            ..Default::default()
        });
        SimCamera::new(world, &VisionParams::default())
    }

    fn pose(x_m: f64, y_m: f64, heading_deg: f64) -> SimPose {
        SimPose {
            x_m,
            y_m,
            heading_deg,
        }
    }

    #[test]
    fn test_marker_straight_ahead() {
        let obs = camera(pose(0.0, 0.0, 90.0)).observe().unwrap();

        assert_eq!(obs.id, 0);
        assert!((obs.distance_m - 1.5).abs() < 1e-9);
        assert!((obs.center_px.x - 160).abs() <= 1);
        assert!((obs.center_px.y - 120).abs() <= 1);
        assert!(obs.angles.pitch_deg.abs() < 1e-6);
        assert!(obs.angles.roll_deg.abs() < 1e-6);
    }

    #[test]
    fn test_marker_side_and_pitch() {
        // Robot west of the marker's axis, turned towards it: the marker appears centred with its
        // face turned to the robot's right
        let heading = (1.5f64).atan2(0.3).to_degrees();
        let obs = camera(pose(-0.3, 0.0, heading)).observe().unwrap();
        assert!((obs.center_px.x - 160).abs() <= 1);
        assert!(obs.angles.pitch_deg < -5.0);

        // From the east side the face is turned to the robot's left
        let heading = (1.5f64).atan2(-0.3).to_degrees();
        let obs = camera(pose(0.3, 0.0, heading)).observe().unwrap();
        assert!(obs.angles.pitch_deg > 5.0);

        // Facing north from the west the marker is right of centre
        let obs = camera(pose(-0.3, 0.0, 90.0)).observe().unwrap();
        assert!(obs.center_px.x > 160);
    }

    #[test]
    fn test_marker_not_visible() {
        // Facing away
        assert!(camera(pose(0.0, 0.0, -90.0)).observe().is_none());

        // Out of range
        assert!(camera(pose(0.0, -2.0, 90.0)).observe().is_none());

        // Behind the marker
        assert!(camera(pose(0.0, 2.5, -90.0)).observe().is_none());

        // Outside the field of view
        assert!(camera(pose(0.0, 0.0, 150.0)).observe().is_none());
    }

    #[test]
    fn test_acquire() {
        let mut cam = camera(pose(0.0, 0.0, 90.0));
        assert!(cam.self_test());
        assert_eq!(cam.acquire().unwrap().len(), 1);
    }
}
