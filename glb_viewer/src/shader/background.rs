use glam::{Mat4, Vec2, Vec3};

use crate::hdr::HdrImage;

use super::tonemap;

/// Draws the HDRI behind everything, seen through the inverse of the camera's view projection.
pub struct BackgroundShader<'a> {
    environment: &'a HdrImage,
    rotation: f32,
    inverse_view_projection: Mat4,
}

impl<'a> BackgroundShader<'a> {
    pub fn new(environment: &'a HdrImage, rotation: f32, view_projection: Mat4) -> Self {
        Self {
            environment,
            rotation,
            inverse_view_projection: view_projection.inverse(),
        }
    }

    /// World space direction through the pixel at `ndc`.
    pub fn direction(&self, ndc: Vec2) -> Vec3 {
        let near = self.inverse_view_projection.project_point3(ndc.extend(0.0));
        let far = self.inverse_view_projection.project_point3(ndc.extend(1.0));
        (far - near).normalize_or_zero()
    }

    pub fn shade(&self, ndc: Vec2) -> Vec3 {
        tonemap(
            self.environment
                .sample_direction(self.direction(ndc), self.rotation),
        )
    }
}
