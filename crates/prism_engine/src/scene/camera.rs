//! Camera with cached culling frustum
//!
//! The partitioners only ever see a [`Frustum`]; the camera's job is to keep
//! that frustum in sync with its view and projection matrices.

use crate::foundation::math::{Mat4, Mat4Ext, Vec3};
use crate::scene::bounds::Frustum;

/// A camera that exposes a world-space culling frustum
#[derive(Debug, Clone)]
pub struct Camera {
    view: Mat4,
    projection: Mat4,
    frustum: Frustum,
}

impl Camera {
    /// Create a perspective camera at the origin looking down -Z
    pub fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Self {
        let projection = Mat4::perspective(fov_y, aspect, near, far);
        let view = Mat4::identity();
        let frustum = Frustum::from_matrix(&(projection * view));
        Self {
            view,
            projection,
            frustum,
        }
    }

    /// Point the camera at a target, rebuilding the frustum
    pub fn look_at(&mut self, eye: Vec3, target: Vec3, up: Vec3) {
        self.view = Mat4::look_at(eye, target, up);
        self.rebuild_frustum();
    }

    /// Replace the view matrix, rebuilding the frustum
    pub fn set_view(&mut self, view: Mat4) {
        self.view = view;
        self.rebuild_frustum();
    }

    /// Replace the projection matrix, rebuilding the frustum
    pub fn set_projection(&mut self, projection: Mat4) {
        self.projection = projection;
        self.rebuild_frustum();
    }

    /// The current view matrix
    pub fn view(&self) -> &Mat4 {
        &self.view
    }

    /// The current projection matrix
    pub fn projection(&self) -> &Mat4 {
        &self.projection
    }

    /// The world-space frustum for this camera's current matrices
    pub fn frustum(&self) -> &Frustum {
        &self.frustum
    }

    fn rebuild_frustum(&mut self) {
        self.frustum = Frustum::from_matrix(&(self.projection * self.view));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::bounds::AABB;

    #[test]
    fn test_camera_frustum_tracks_view_changes() {
        let mut camera = Camera::perspective(std::f32::consts::FRAC_PI_2, 1.0, 0.1, 100.0);

        let box_at_origin = AABB::from_center_extents(Vec3::zeros(), Vec3::new(1.0, 1.0, 1.0));

        // Looking down -Z from z=10: origin visible
        camera.look_at(Vec3::new(0.0, 0.0, 10.0), Vec3::zeros(), Vec3::new(0.0, 1.0, 0.0));
        assert!(camera.frustum().intersects_aabb(&box_at_origin));

        // Turn the camera around: origin no longer visible
        camera.look_at(
            Vec3::new(0.0, 0.0, 10.0),
            Vec3::new(0.0, 0.0, 20.0),
            Vec3::new(0.0, 1.0, 0.0),
        );
        assert!(!camera.frustum().intersects_aabb(&box_at_origin));
    }
}
