use std::path::Path;
use std::sync::Arc;

use glam::{Mat3, Mat4, Vec2, Vec3, Vec4};
use log::{debug, warn};

use crate::error::{Error, Result};
use crate::model::{compute_normals, Material, Model, ModelVertex, Primitive};
use crate::texture::Texture;

/// Reads every triangle primitive of the default scene, flattened into model space.
pub fn read_model<P: AsRef<Path>>(path: P) -> Result<Model> {
    let path = path.as_ref();
    let (document, buffers, images) = gltf::import(path).map_err(|source| Error::Gltf {
        path: path.to_path_buf(),
        source,
    })?;
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let model = build_model(name, &document, &buffers, &images);
    if model.primitives.is_empty() {
        return Err(Error::EmptyModel(path.to_path_buf()));
    }
    Ok(model)
}

struct Assets<'a> {
    buffers: &'a [gltf::buffer::Data],
    materials: Vec<Arc<Material>>,
    default_material: Arc<Material>,
}

fn build_model(
    name: String,
    document: &gltf::Document,
    buffers: &[gltf::buffer::Data],
    images: &[gltf::image::Data],
) -> Model {
    let textures: Vec<Option<Arc<Texture>>> = images
        .iter()
        .enumerate()
        .map(|(index, data)| match Texture::from_gltf(data) {
            Ok(texture) => {
                debug!("{}: image {} is {}x{}", name, index, texture.width(), texture.height());
                Some(Arc::new(texture))
            }
            Err(e) => {
                warn!("{}: skipping image {}: {}", name, index, e);
                None
            }
        })
        .collect();
    let assets = Assets {
        buffers,
        materials: document
            .materials()
            .map(|m| Arc::new(read_material(&m, &textures)))
            .collect(),
        default_material: Arc::new(Material::default()),
    };

    let mut primitives = Vec::new();
    match document.default_scene().or_else(|| document.scenes().next()) {
        Some(scene) => {
            for node in scene.nodes() {
                visit_node(&node, Mat4::IDENTITY, &assets, &mut primitives);
            }
        }
        None => {
            for mesh in document.meshes() {
                read_mesh(&mesh, Mat4::IDENTITY, &assets, &mut primitives);
            }
        }
    }

    let model = Model::new(name, primitives);
    debug!(
        "{}: {} primitives, {} triangles, extent {:?} around {:?}",
        model.name,
        model.primitives.len(),
        model.triangle_count(),
        model.bounds.extent(),
        model.bounds.center()
    );
    model
}

fn visit_node(node: &gltf::Node, parent: Mat4, assets: &Assets, out: &mut Vec<Primitive>) {
    let transform = parent * Mat4::from_cols_array_2d(&node.transform().matrix());
    if let Some(mesh) = node.mesh() {
        read_mesh(&mesh, transform, assets, out);
    }
    for child in node.children() {
        visit_node(&child, transform, assets, out);
    }
}

fn read_mesh(mesh: &gltf::Mesh, transform: Mat4, assets: &Assets, out: &mut Vec<Primitive>) {
    let normal_matrix = Mat3::from_mat4(transform).inverse().transpose();
    let mirrored = transform.determinant() < 0.0;

    for primitive in mesh.primitives() {
        if primitive.mode() != gltf::mesh::Mode::Triangles {
            debug!("skipping {:?} primitive", primitive.mode());
            continue;
        }
        let reader = primitive.reader(|buffer| {
            assets
                .buffers
                .get(buffer.index())
                .map(|data| data.0.as_slice())
        });
        let Some(positions) = reader.read_positions() else {
            continue;
        };

        let mut vertices: Vec<ModelVertex> = positions
            .map(|p| ModelVertex {
                position: transform.transform_point3(Vec3::from(p)),
                normal: Vec3::ZERO,
                texture: Vec2::ZERO,
            })
            .collect();
        if let Some(uvs) = reader.read_tex_coords(0) {
            vertices
                .iter_mut()
                .zip(uvs.into_f32())
                .for_each(|(v, uv)| v.texture = Vec2::from(uv));
        }

        let mut indices: Vec<u32> = match reader.read_indices() {
            Some(indices) => indices.into_u32().collect(),
            None => (0..vertices.len() as u32).collect(),
        };
        indices.truncate(indices.len() - indices.len() % 3);
        if mirrored {
            indices.chunks_exact_mut(3).for_each(|t| t.swap(1, 2));
        }

        match reader.read_normals() {
            Some(normals) => vertices
                .iter_mut()
                .zip(normals)
                .for_each(|(v, n)| v.normal = (normal_matrix * Vec3::from(n)).normalize_or_zero()),
            None => compute_normals(&mut vertices, &indices),
        }

        let material = primitive
            .material()
            .index()
            .and_then(|i| assets.materials.get(i))
            .unwrap_or(&assets.default_material)
            .clone();

        out.push(Primitive {
            vertices,
            indices,
            material,
        });
    }
}

fn read_material(material: &gltf::Material, textures: &[Option<Arc<Texture>>]) -> Material {
    let pbr = material.pbr_metallic_roughness();
    let base_color_texture = pbr
        .base_color_texture()
        .and_then(|info| textures.get(info.texture().source().index()).cloned().flatten());

    Material {
        name: material.name().map(str::to_owned),
        base_color: Vec4::from(pbr.base_color_factor()),
        base_color_texture,
        metallic: pbr.metallic_factor(),
        roughness: pbr.roughness_factor(),
        emissive: Vec3::from(material.emissive_factor()),
        double_sided: material.double_sided(),
    }
}
