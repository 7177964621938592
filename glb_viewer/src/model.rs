use std::sync::Arc;

use glam::{Vec2, Vec3, Vec4};

use crate::texture::Texture;

#[derive(Debug, Clone, Copy)]
pub struct ModelVertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub texture: Vec2,
}

/// glTF metallic-roughness material, factors already combined with their defaults.
#[derive(Debug, Clone)]
pub struct Material {
    pub name: Option<String>,
    pub base_color: Vec4,
    pub base_color_texture: Option<Arc<Texture>>,
    pub metallic: f32,
    pub roughness: f32,
    pub emissive: Vec3,
    pub double_sided: bool,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: None,
            base_color: Vec4::ONE,
            base_color_texture: None,
            metallic: 0.0,
            roughness: 0.5,
            emissive: Vec3::ZERO,
            double_sided: false,
        }
    }
}

pub struct Primitive {
    pub vertices: Vec<ModelVertex>,
    pub indices: Vec<u32>,
    pub material: Arc<Material>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bounds {
    pub fn empty() -> Self {
        Self {
            min: Vec3::splat(f32::MAX),
            max: Vec3::splat(f32::MIN),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min.cmpgt(self.max).any()
    }

    pub fn extend(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }
}

pub struct Model {
    pub name: String,
    pub primitives: Vec<Primitive>,
    pub bounds: Bounds,
}

impl Model {
    pub fn new(name: impl Into<String>, primitives: Vec<Primitive>) -> Self {
        let mut bounds = Bounds::empty();
        primitives
            .iter()
            .flat_map(|p| p.vertices.iter())
            .for_each(|v| bounds.extend(v.position));
        Self {
            name: name.into(),
            primitives,
            bounds,
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.primitives.iter().map(|p| p.indices.len() / 3).sum()
    }
}

/// Area weighted vertex normals for meshes that ship without them.
pub fn compute_normals(vertices: &mut [ModelVertex], indices: &[u32]) {
    vertices.iter_mut().for_each(|v| v.normal = Vec3::ZERO);
    for triangle in indices.chunks_exact(3) {
        let [a, b, c] = [triangle[0], triangle[1], triangle[2]].map(|i| i as usize);
        if a >= vertices.len() || b >= vertices.len() || c >= vertices.len() {
            continue;
        }
        let face = (vertices[b].position - vertices[a].position)
            .cross(vertices[c].position - vertices[a].position);
        vertices[a].normal += face;
        vertices[b].normal += face;
        vertices[c].normal += face;
    }
    vertices
        .iter_mut()
        .for_each(|v| v.normal = v.normal.normalize_or_zero());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertex(x: f32, y: f32, z: f32) -> ModelVertex {
        ModelVertex {
            position: Vec3::new(x, y, z),
            normal: Vec3::ZERO,
            texture: Vec2::ZERO,
        }
    }

    #[test]
    fn shared_vertices_average_face_normals() {
        // two faces folded along the x axis
        let mut vertices = vec![
            vertex(0.0, 0.0, 0.0),
            vertex(1.0, 0.0, 0.0),
            vertex(0.0, 1.0, 0.0),
            vertex(0.0, 0.0, 1.0),
        ];
        compute_normals(&mut vertices, &[0, 1, 2, 0, 3, 1]);

        assert!((vertices[2].normal - Vec3::Z).length() < 1e-6);
        assert!((vertices[3].normal - Vec3::Y).length() < 1e-6);
        let shared = Vec3::new(0.0, 1.0, 1.0).normalize();
        assert!((vertices[0].normal - shared).length() < 1e-6);
    }

    #[test]
    fn bounds_cover_every_primitive() {
        let primitive = |vertices| Primitive {
            vertices,
            indices: vec![0, 1, 2],
            material: Arc::new(Material::default()),
        };
        let model = Model::new(
            "pair",
            vec![
                primitive(vec![vertex(0.0, 0.0, 0.0), vertex(1.0, 0.0, 0.0), vertex(0.0, 1.0, 0.0)]),
                primitive(vec![vertex(-2.0, 0.0, 0.0), vertex(0.0, 0.0, 3.0), vertex(0.0, 1.0, 0.0)]),
            ],
        );
        assert_eq!(model.bounds.min, Vec3::new(-2.0, 0.0, 0.0));
        assert_eq!(model.bounds.max, Vec3::new(1.0, 1.0, 3.0));
        assert_eq!(model.bounds.center(), Vec3::new(-0.5, 0.5, 1.5));
        assert_eq!(model.triangle_count(), 2);
        assert!(Bounds::empty().is_empty());
    }
}
