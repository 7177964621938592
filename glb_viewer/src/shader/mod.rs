use glam::{Mat3, Mat4, Vec2, Vec3, Vec4};
use rasterizer::{Interpolate, VertexShader};

mod background;
mod pbr;

pub use background::*;
pub use pbr::*;

use crate::model::ModelVertex;

/// Per-draw transforms shared by the model shaders.
#[derive(Debug, Clone, Copy)]
pub struct ModelTransforms {
    pub model: Mat4,
    /// Inverse transpose of the upper 3x3 of `model`.
    pub normal_matrix: Mat3,
    pub view_projection: Mat4,
}

impl ModelTransforms {
    pub fn new(model: Mat4, view_projection: Mat4) -> Self {
        Self {
            model,
            normal_matrix: Mat3::from_mat4(model).inverse().transpose(),
            view_projection,
        }
    }
}

#[derive(Interpolate)]
pub struct StandardShaderData {
    // world position
    pub position: Vec3,
    pub normal: Vec3,
    pub texture_coords: Vec2,
}

/// Anything a [`StandardVertexShader`] can read its transforms from.
pub trait HasTransforms {
    fn transforms(&self) -> &ModelTransforms;
}

impl HasTransforms for ModelTransforms {
    fn transforms(&self) -> &ModelTransforms {
        self
    }
}

pub struct StandardVertexShader<U>(std::marker::PhantomData<fn() -> U>);

impl<U> StandardVertexShader<U> {
    pub fn new() -> Self {
        Self(std::marker::PhantomData)
    }
}

impl<U> Default for StandardVertexShader<U> {
    fn default() -> Self {
        Self::new()
    }
}

impl<U: HasTransforms + Send + Sync> VertexShader for StandardVertexShader<U> {
    type VertexData = ModelVertex;
    type Uniform = U;
    type SharedData = StandardShaderData;

    fn vertex(
        &self,
        vertex: &Self::VertexData,
        uniform: &Self::Uniform,
    ) -> (Vec4, Self::SharedData) {
        let transforms = uniform.transforms();
        let world_position = transforms.model * vertex.position.extend(1.0);
        let clip = transforms.view_projection * world_position;
        let data = Self::SharedData {
            position: world_position.truncate(),
            normal: (transforms.normal_matrix * vertex.normal).normalize_or_zero(),
            texture_coords: vertex.texture,
        };
        (clip, data)
    }
}

/// Reinhard tone map followed by gamma 2.2.
pub fn tonemap(color: Vec3) -> Vec3 {
    let color = color.max(Vec3::ZERO);
    (color / (color + Vec3::ONE)).powf(1.0 / 2.2)
}

fn reflect(dir: Vec3, normal: Vec3) -> Vec3 {
    dir - normal * 2.0 * normal.dot(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tonemap_stays_in_display_range() {
        assert_eq!(tonemap(Vec3::ZERO), Vec3::ZERO);
        let bright = tonemap(Vec3::splat(1000.0));
        assert!(bright.max_element() <= 1.0);
        assert!((tonemap(Vec3::ONE).x - 0.5f32.powf(1.0 / 2.2)).abs() < 1e-6);
    }

    #[test]
    fn reflection_mirrors_about_the_normal() {
        let r = reflect(Vec3::new(1.0, -1.0, 0.0), Vec3::Y);
        assert!((r - Vec3::new(1.0, 1.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn normals_follow_non_uniform_scale() {
        let model = Mat4::from_scale(Vec3::new(4.0, 1.0, 1.0));
        let transforms = ModelTransforms::new(model, Mat4::IDENTITY);
        let shader = StandardVertexShader::<ModelTransforms>::new();
        let vertex = ModelVertex {
            position: Vec3::ONE,
            normal: Vec3::new(1.0, 1.0, 0.0).normalize(),
            texture: Vec2::ZERO,
        };
        let (clip, data) = shader.vertex(&vertex, &transforms);
        assert_eq!(clip, Vec4::new(4.0, 1.0, 1.0, 1.0));
        // stretching x flattens the surface, so the normal leans towards y
        assert!(data.normal.y > data.normal.x);
        assert!((data.normal.length() - 1.0).abs() < 1e-5);
    }
}
