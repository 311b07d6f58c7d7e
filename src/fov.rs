//! Per-eye field of view and the projection parameters derived from it.
use crate::eye::PerEye;
use nalgebra::{Matrix4, Vector3};

/// Half-angle field of view of one eye, as tangents. All four values are positive for a view
/// that contains the optical axis.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct FovTangents {
    pub left: f32,
    pub right: f32,
    pub up: f32,
    pub down: f32,
}

impl FovTangents {
    pub fn new(left: f32, right: f32, up: f32, down: f32) -> Self {
        Self {
            left,
            right,
            up,
            down,
        }
    }

    /// Symmetric view with the given full horizontal and vertical angles in degrees
    pub fn symmetric_degrees(horizontal: f32, vertical: f32) -> Self {
        let h = (horizontal.to_radians() * 0.5).tan();
        let v = (vertical.to_radians() * 0.5).tan();
        Self::new(h, h, v, v)
    }

    /// Convert signed OpenXR-style angles (radians; left and down are negative) to tangents
    pub fn from_angles(angle_left: f32, angle_right: f32, angle_up: f32, angle_down: f32) -> Self {
        Self::new(
            (-angle_left).tan(),
            angle_right.tan(),
            angle_up.tan(),
            (-angle_down).tan(),
        )
    }

    /// Inverse of `from_angles`: `[left, right, up, down]` in radians, left and down negative
    pub fn angles(&self) -> [f32; 4] {
        [
            -self.left.atan(),
            self.right.atan(),
            self.up.atan(),
            -self.down.atan(),
        ]
    }

    /// Horizontal/vertical scale and offset for the projection matrix
    pub fn projection(&self) -> EyeProjection {
        let x_scale = 2.0 / (self.left + self.right);
        let y_scale = 2.0 / (self.up + self.down);
        EyeProjection {
            x: ScaleOffset {
                scale: x_scale,
                offset: (self.left - self.right) * x_scale * 0.5,
            },
            y: ScaleOffset {
                scale: y_scale,
                offset: (self.up - self.down) * y_scale * 0.5,
            },
        }
    }

    /// Off-axis perspective matrix (right-handed, clip depth in [-1, 1])
    pub fn projection_matrix(&self, near: f32, far: f32) -> Matrix4<f32> {
        let proj = self.projection();
        let a33 = -(far + near) / (far - near);
        let a34 = -(2.0 * far * near) / (far - near);
        Matrix4::new(
            proj.x.scale, 0.0, -proj.x.offset, 0.0, //
            0.0, proj.y.scale, proj.y.offset, 0.0, //
            0.0, 0.0, a33, a34, //
            0.0, 0.0, -1.0, 0.0, //
        )
    }
}

/// One axis of a projection: `ndc = scale * tan + offset`
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct ScaleOffset {
    pub scale: f32,
    pub offset: f32,
}

/// Projection scale/offset pair for one eye
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct EyeProjection {
    pub x: ScaleOffset,
    pub y: ScaleOffset,
}

/// Rough field of view covering both eyes, for renderers that are not stereo aware
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct CombinedFov {
    /// Full horizontal angle in degrees
    pub x_degrees: f32,
    /// Full vertical angle in degrees
    pub y_degrees: f32,
    /// Horizontal over vertical tangent
    pub aspect: f32,
}

impl CombinedFov {
    pub fn from_eyes(fov: &PerEye<FovTangents>) -> Self {
        let horizontal = fov
            .iter()
            .map(|(_, f)| f.left.max(f.right))
            .fold(f32::MIN, f32::max);
        let vertical = fov
            .iter()
            .map(|(_, f)| f.up.max(f.down))
            .fold(f32::MIN, f32::max);
        Self {
            x_degrees: full_angle_degrees(horizontal),
            y_degrees: full_angle_degrees(vertical),
            aspect: horizontal / vertical,
        }
    }
}

/// Full angle in degrees of a view whose half-angle tangent is `tan_half`
pub fn full_angle_degrees(tan_half: f32) -> f32 {
    2.0 * tan_half.atan() * 180.0 / std::f32::consts::PI
}

/// Convert the runtime's eye-to-head translation to the renderer's coordinate convention.
/// X is mirrored; changing this mirrors the world left to right.
pub fn view_offset(eye_to_head: Vector3<f32>) -> Vector3<f32> {
    Vector3::new(-eye_to_head.x, eye_to_head.y, eye_to_head.z)
}
