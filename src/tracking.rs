//! Head pose samples and the tracking-loss desaturation heuristic.
use nalgebra::{Matrix4, UnitQuaternion, Vector3, Vector4};

/// Position and orientation in the runtime's tracking space
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Pose {
    pub position: Vector3<f32>,
    pub orientation: UnitQuaternion<f32>,
}

impl Pose {
    pub fn new(position: Vector3<f32>, orientation: UnitQuaternion<f32>) -> Self {
        Self {
            position,
            orientation,
        }
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::new(Vector3::zeros(), UnitQuaternion::identity())
    }
}

/// What the runtime knows about positional tracking this frame
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct TrackingStatus {
    /// The headset is tracked by an external camera at all
    pub camera_connected: bool,
    /// The camera currently sees the headset
    pub position_locked: bool,
}

/// Head and tracking camera poses sampled once per frame at the predicted display time
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct PoseSample {
    pub head: Pose,
    pub camera: Option<Pose>,
    pub status: TrackingStatus,
}

/// Viewing volume of an external tracking camera
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CameraFrustum {
    pub h_fov_radians: f32,
    pub v_fov_radians: f32,
    pub near: f32,
    pub far: f32,
}

impl CameraFrustum {
    /// Perspective matrix for the camera, looking down -Z, with depth mapped to [0, 1]
    pub fn projection(&self) -> Matrix4<f32> {
        let sx = 1.0 / (self.h_fov_radians * 0.5).tan();
        let sy = 1.0 / (self.v_fov_radians * 0.5).tan();
        let (n, f) = (self.near, self.far);
        Matrix4::new(
            sx, 0.0, 0.0, 0.0, //
            0.0, sy, 0.0, 0.0, //
            0.0, 0.0, f / (n - f), n * f / (n - f), //
            0.0, 0.0, -1.0, 0.0, //
        )
    }
}

/// Tuning of the desaturation heuristic. These are empirical, not physical limits.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TrackingLossBounds {
    pub x_limit: f32,
    pub y_limit: f32,
    pub xy_gain: f32,
    pub depth_center: f32,
    pub depth_half_width: f32,
    pub depth_gain: f32,
    pub yaw_limit_degrees: f32,
    pub yaw_gain: f32,
}

impl Default for TrackingLossBounds {
    fn default() -> Self {
        Self {
            x_limit: 0.6,
            y_limit: 0.45,
            xy_gain: 6.25,
            depth_center: 0.5,
            depth_half_width: 0.5,
            depth_gain: 10.0,
            yaw_limit_degrees: 105.0,
            yaw_gain: 0.04,
        }
    }
}

/// Estimates how close the headset is to dropping out of the tracking camera's view.
pub struct TrackingLossEstimator {
    camera_projection: Matrix4<f32>,
    bounds: TrackingLossBounds,
}

impl TrackingLossEstimator {
    pub fn new(frustum: &CameraFrustum, bounds: TrackingLossBounds) -> Self {
        Self {
            camera_projection: frustum.projection(),
            bounds,
        }
    }

    /// Blend weight towards greyscale in [0, 1]. Zero without a tracking camera, one when the
    /// camera has lost the headset.
    pub fn desaturation(&self, sample: &PoseSample) -> f32 {
        if !sample.status.camera_connected {
            return 0.0;
        }
        if !sample.status.position_locked {
            return 1.0;
        }
        let camera = match sample.camera {
            Some(camera) => camera,
            None => return 0.0,
        };
        let b = &self.bounds;

        let yaw = (self.head_yaw_degrees(&sample.head, &camera).abs() - b.yaw_limit_degrees)
            * b.yaw_gain;

        let relative = camera.orientation.inverse() * (sample.head.position - camera.position);
        let clip = self.camera_projection * Vector4::new(relative.x, relative.y, relative.z, 1.0);
        if clip.w <= f32::EPSILON {
            // Behind the camera
            return 1.0;
        }
        let ndc = clip.xyz() / clip.w;

        let x = (ndc.x.abs() - b.x_limit) * b.xy_gain;
        let y = (ndc.y.abs() - b.y_limit) * b.xy_gain;
        let z = ((ndc.z - b.depth_center).abs() - b.depth_half_width) * b.depth_gain;

        [x, y, z, yaw]
            .iter()
            .map(|v| v.max(0.0).min(1.0))
            .fold(0.0, f32::max)
    }

    /// Yaw of the head in camera space; zero when facing straight into the camera
    fn head_yaw_degrees(&self, head: &Pose, camera: &Pose) -> f32 {
        let relative = camera.orientation.inverse() * head.orientation;
        let forward = relative * Vector3::new(0.0, 0.0, -1.0);
        forward.x.atan2(forward.z).to_degrees()
    }
}
