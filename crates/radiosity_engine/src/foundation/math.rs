//! Math utilities and types
//!
//! Provides the vector and matrix aliases shared by the lighting, sampling
//! and reprojection code.

pub use nalgebra::{Matrix4, Vector3, Vector4};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// Math constants
pub mod constants {
    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;

    /// 2 * Pi
    pub const TAU: f32 = 2.0 * PI;

    /// Degrees to radians conversion factor
    pub const DEG_TO_RAD: f32 = PI / 180.0;
}

/// Math utility functions
pub mod utils {
    use super::{constants, Vec3};

    /// Convert degrees to radians
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees * constants::DEG_TO_RAD
    }

    /// Flip `v` so that it lies in the hemisphere around `n`
    pub fn face_forward(v: Vec3, n: &Vec3) -> Vec3 {
        if v.dot(n) < 0.0 {
            -v
        } else {
            v
        }
    }

    /// Build two unit tangents that complete `n` to a right-handed frame
    ///
    /// `n` must be normalized. The returned `(tangent, bitangent)` satisfy
    /// `tangent x bitangent == n`.
    pub fn orthonormal_basis(n: &Vec3) -> (Vec3, Vec3) {
        // Pick the world axis least aligned with n to avoid a degenerate cross product
        let helper = if n.x.abs() < 0.9 {
            Vec3::x()
        } else {
            Vec3::y()
        };
        let tangent = helper.cross(n).normalize();
        (tangent, n.cross(&tangent))
    }

    /// Angle between two non-zero vectors in radians, robust near 0 and pi
    pub fn angle_between(a: &Vec3, b: &Vec3) -> f32 {
        let cos = a.dot(b) / (a.norm() * b.norm());
        cos.clamp(-1.0, 1.0).acos()
    }
}

/// Extension trait for Mat4 with additional convenience methods
pub trait Mat4Ext {
    /// Create a perspective projection matrix with depth mapped to [0, 1]
    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4;

    /// Create a look-at view matrix
    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4;

    /// Axis flip from Y-up view space into Y-down, Z-forward clip conventions
    fn clip_coordinate_transform() -> Mat4;
}

impl Mat4Ext for Mat4 {
    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
        let tan_half_fovy = (fov_y * 0.5).tan();

        let mut result = Mat4::zeros();

        // P = [a⁻¹/tan(φ/2)    0              0                    0           ]
        //     [0               1/tan(φ/2)     0                    0           ]
        //     [0               0              f/(f-n)              -nf/(f-n)   ]
        //     [0               0              1                    0           ]
        result[(0, 0)] = 1.0 / (aspect * tan_half_fovy);
        result[(1, 1)] = 1.0 / tan_half_fovy;
        result[(2, 2)] = far / (far - near);
        result[(2, 3)] = -(near * far) / (far - near);
        result[(3, 2)] = 1.0;

        result
    }

    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
        let forward = (target - eye).normalize();
        let right = forward.cross(&up).normalize();
        let camera_up = right.cross(&forward);

        let translation = Mat4::new(
            1.0, 0.0, 0.0, -eye.x,
            0.0, 1.0, 0.0, -eye.y,
            0.0, 0.0, 1.0, -eye.z,
            0.0, 0.0, 0.0, 1.0,
        );

        let rotation = Mat4::new(
            right.x, right.y, right.z, 0.0,
            camera_up.x, camera_up.y, camera_up.z, 0.0,
            -forward.x, -forward.y, -forward.z, 0.0,
            0.0, 0.0, 0.0, 1.0,
        );

        rotation * translation
    }

    fn clip_coordinate_transform() -> Mat4 {
        Mat4::new(
            1.0,  0.0,  0.0, 0.0,
            0.0, -1.0,  0.0, 0.0,
            0.0,  0.0, -1.0, 0.0,
            0.0,  0.0,  0.0, 1.0,
        )
    }
}
