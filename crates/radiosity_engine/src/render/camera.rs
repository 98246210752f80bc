//! # 3D Camera
//!
//! Perspective camera used to reproject history frames and, by the demo
//! application, to cast primary rays for its G-buffer.
//!
//! ## Coordinate System
//! Right-handed Y-up world and view space. The projection chain is
//! `P × X × V` where `X` flips Y and Z into the Y-down, Z-forward clip
//! convention, so pixel (0, 0) is the top-left corner of the image.

use crate::core::ViewportConfig;
use crate::foundation::math::{utils, Mat4, Mat4Ext, Vec3, Vec4};

/// 3D Camera for perspective projections
#[derive(Debug, Clone)]
pub struct Camera {
    /// Camera position in world space
    pub position: Vec3,

    /// Point the camera is looking at in world space
    pub target: Vec3,

    /// Up vector for camera orientation (typically [0, 1, 0])
    pub up: Vec3,

    /// Vertical field of view angle in radians
    pub fov: f32,

    /// Aspect ratio (width / height)
    pub aspect: f32,

    /// Distance to near clipping plane
    pub near: f32,

    /// Distance to far clipping plane
    pub far: f32,
}

impl Camera {
    /// Create a new perspective camera with standard Y-up orientation
    ///
    /// The default target is the origin; use [`Camera::look_at`] to aim it.
    pub fn perspective(position: Vec3, fov_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            position,
            target: Vec3::zeros(),
            up: Vec3::new(0.0, 1.0, 0.0),
            fov: utils::deg_to_rad(fov_degrees),
            aspect,
            near,
            far,
        }
    }

    /// Create a camera matching the configured viewport
    pub fn from_viewport(viewport: &ViewportConfig, position: Vec3, target: Vec3) -> Self {
        let mut camera = Self::perspective(
            position,
            viewport.fov_degrees,
            viewport.aspect(),
            viewport.near,
            viewport.far,
        );
        camera.target = target;
        camera
    }

    /// Update camera position in world space
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        log::trace!("Camera position updated to: {:?}", position);
    }

    /// Configure camera to look at a specific point with custom up vector
    pub fn look_at(&mut self, target: Vec3, up: Vec3) {
        self.target = target;
        self.up = up;
        log::trace!("Camera look_at updated - target: {:?}, up: {:?}", target, up);
    }

    /// World-to-view transformation
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at(self.position, self.target, self.up)
    }

    /// View-to-clip transformation, including the axis flip
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective(self.fov, self.aspect, self.near, self.far) * Mat4::clip_coordinate_transform()
    }

    /// Combined `P × X × V`
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Direction of the primary ray through the centre of pixel (`x`, `y`)
    pub fn primary_ray_direction(&self, x: u32, y: u32, width: u32, height: u32) -> Vec3 {
        let forward = (self.target - self.position).normalize();
        let right = forward.cross(&self.up).normalize();
        let camera_up = right.cross(&forward);
        let tan_half = (self.fov * 0.5).tan();

        let ndc_x = 2.0 * (x as f32 + 0.5) / width as f32 - 1.0;
        let ndc_y = 2.0 * (y as f32 + 0.5) / height as f32 - 1.0;

        (forward + right * (ndc_x * tan_half * self.aspect) - camera_up * (ndc_y * tan_half))
            .normalize()
    }

    /// Project a world position through `view` and this camera's projection
    ///
    /// Returns the pixel containing the projected point, or `None` when the
    /// point is behind the camera or outside the image. Passing a stored view
    /// matrix reprojects into a previous frame.
    pub fn project_to_pixel(&self, view: &Mat4, world: &Vec3, width: u32, height: u32) -> Option<(u32, u32)> {
        let clip = self.projection_matrix() * view * Vec4::new(world.x, world.y, world.z, 1.0);
        if clip.w <= f32::EPSILON {
            return None;
        }

        let ndc_x = clip.x / clip.w;
        let ndc_y = clip.y / clip.w;
        if !(-1.0..=1.0).contains(&ndc_x) || !(-1.0..=1.0).contains(&ndc_y) {
            return None;
        }

        let px = ((ndc_x + 1.0) * 0.5 * width as f32).floor() as u32;
        let py = ((ndc_y + 1.0) * 0.5 * height as f32).floor() as u32;
        Some((px.min(width - 1), py.min(height - 1)))
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 3.0, 3.0),
            target: Vec3::zeros(),
            up: Vec3::new(0.0, 1.0, 0.0),
            fov: std::f32::consts::FRAC_PI_4,
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_ray_reprojects_to_same_pixel() {
        let mut camera = Camera::perspective(Vec3::new(0.5, 1.0, 4.0), 45.0, 4.0 / 3.0, 0.1, 100.0);
        camera.look_at(Vec3::new(0.0, 0.5, 0.0), Vec3::y());
        let view = camera.view_matrix();

        for (x, y) in [(0, 0), (31, 0), (12, 7), (31, 23), (0, 23)] {
            let dir = camera.primary_ray_direction(x, y, 32, 24);
            let point = camera.position + dir * 3.5;
            assert_eq!(camera.project_to_pixel(&view, &point, 32, 24), Some((x, y)));
        }
    }

    #[test]
    fn test_points_behind_camera_do_not_project() {
        let camera = Camera::default();
        let behind = camera.position + (camera.position - camera.target);
        assert_eq!(camera.project_to_pixel(&camera.view_matrix(), &behind, 16, 16), None);
    }
}
