use std::f32::consts::PI;
use std::sync::Arc;

use glam::{Vec3, Vec4Swizzles as _};
use rasterizer::FragmentShader;

use crate::environment::PrefilteredEnvironment;
use crate::model::Material;

use super::{reflect, tonemap, HasTransforms, ModelTransforms, StandardShaderData};

/// Scene lighting as the standard shader sees it.
#[derive(Debug, Clone, Copy)]
pub struct Lights {
    /// Uniform white light, already scaled by its intensity.
    pub ambient: Vec3,
    /// Unit vector pointing from the scene towards the directional light.
    pub directional_direction: Vec3,
    pub directional_radiance: Vec3,
}

pub struct PBRUniform {
    pub transforms: ModelTransforms,
    pub view_position: Vec3,
    pub material: Arc<Material>,
    pub lights: Lights,
    pub environment: Option<Arc<PrefilteredEnvironment>>,
}

impl HasTransforms for PBRUniform {
    fn transforms(&self) -> &ModelTransforms {
        &self.transforms
    }
}

pub struct PBRFragmentShader;

impl PBRFragmentShader {
    fn normal_dist_ggx(normal: Vec3, halfway: Vec3, roughness: f32) -> f32 {
        let a = roughness * roughness;
        let a2 = a * a;
        let ndot_h = normal.dot(halfway).max(0.0);
        let denom = ndot_h * ndot_h * (a2 - 1.0) + 1.0;
        a2 / (PI * denom * denom)
    }

    fn geometry_schlick_ggx(n_dot_v: f32, roughness: f32) -> f32 {
        let r = roughness + 1.0;
        let k = r * r / 8.0;
        n_dot_v / (n_dot_v * (1.0 - k) + k)
    }

    fn geometry_smith(normal: Vec3, view: Vec3, light: Vec3, roughness: f32) -> f32 {
        let n_dot_v = normal.dot(view).max(0.0);
        let n_dot_l = normal.dot(light).max(0.0);
        Self::geometry_schlick_ggx(n_dot_v, roughness)
            * Self::geometry_schlick_ggx(n_dot_l, roughness)
    }

    fn fresnel_schlick(cos_theta: f32, f0: Vec3) -> Vec3 {
        f0 + (1.0 - f0) * (1.0 - cos_theta).clamp(0.0, 1.0).powi(5)
    }

    fn fresnel_schlick_roughness(cos_theta: f32, f0: Vec3, roughness: f32) -> Vec3 {
        f0 + (Vec3::splat(1.0 - roughness).max(f0) - f0)
            * (1.0 - cos_theta).clamp(0.0, 1.0).powi(5)
    }

    /// Linear radiance leaving the surface towards the eye.
    #[allow(non_snake_case)]
    pub fn shade(shared: &StandardShaderData, uniform: &PBRUniform) -> Vec3 {
        let material = &uniform.material;
        let mut base = material.base_color;
        if let Some(texture) = &material.base_color_texture {
            base *= texture.sample(shared.texture_coords);
        }
        let albedo = base.xyz();
        let metallic = material.metallic.clamp(0.0, 1.0);
        // GGX degenerates at zero roughness
        let roughness = material.roughness.clamp(0.04, 1.0);

        let V = (uniform.view_position - shared.position).normalize_or_zero();
        let mut N = shared.normal.normalize_or_zero();
        // back faces of double sided materials
        if material.double_sided && N.dot(V) < 0.0 {
            N = -N;
        }
        let n_dot_v = N.dot(V).max(1e-4);
        let F0 = Vec3::splat(0.04).lerp(albedo, metallic);

        // directional light, cook-torrance brdf
        let L = uniform.lights.directional_direction;
        let H = (V + L).normalize_or_zero();
        let n_dot_l = N.dot(L).max(0.0);
        let NDF = Self::normal_dist_ggx(N, H, roughness);
        let G = Self::geometry_smith(N, V, L, roughness);
        let F = Self::fresnel_schlick(H.dot(V).max(0.0), F0);
        let kD = (Vec3::ONE - F) * (1.0 - metallic);
        let specular = NDF * G * F / (4.0 * n_dot_v * n_dot_l).max(0.001);
        let Lo = (kD * albedo / PI + specular) * uniform.lights.directional_radiance * n_dot_l;

        // ambient light only feeds the diffuse lobe
        let ambient = uniform.lights.ambient * albedo * (1.0 - metallic);

        let ibl = match &uniform.environment {
            Some(environment) => {
                let F = Self::fresnel_schlick_roughness(n_dot_v, F0, roughness);
                let kD = (Vec3::ONE - F) * (1.0 - metallic);
                let diffuse = environment.irradiance(N) * albedo;
                let R = reflect(-V, N);
                let specular = environment.radiance(R, roughness) * F;
                kD * diffuse + specular
            }
            None => Vec3::ZERO,
        };

        Lo + ambient + ibl + material.emissive
    }
}

impl FragmentShader for PBRFragmentShader {
    type Uniform = PBRUniform;
    type SharedData = StandardShaderData;

    fn fragment(&self, shared: &Self::SharedData, uniform: &Self::Uniform) -> Vec3 {
        tonemap(Self::shade(shared, uniform))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::{CpuPrefilter, EnvironmentGenerator, PrefilterConfig};
    use crate::hdr::HdrImage;
    use glam::{Mat4, Vec2, Vec4};

    fn uniform(material: Material, lights: Lights) -> PBRUniform {
        PBRUniform {
            transforms: ModelTransforms::new(Mat4::IDENTITY, Mat4::IDENTITY),
            view_position: Vec3::new(0.0, 0.0, 5.0),
            material: Arc::new(material),
            lights,
            environment: None,
        }
    }

    fn facing_camera() -> StandardShaderData {
        StandardShaderData {
            position: Vec3::ZERO,
            normal: Vec3::Z,
            texture_coords: Vec2::ZERO,
        }
    }

    fn dark() -> Lights {
        Lights {
            ambient: Vec3::ZERO,
            directional_direction: Vec3::Z,
            directional_radiance: Vec3::ZERO,
        }
    }

    #[test]
    fn unlit_surface_is_black() {
        let color = PBRFragmentShader::shade(&facing_camera(), &uniform(Material::default(), dark()));
        assert_eq!(color, Vec3::ZERO);
    }

    #[test]
    fn ambient_scales_diffuse_albedo() {
        let material = Material {
            base_color: Vec4::new(0.5, 0.25, 1.0, 1.0),
            ..Material::default()
        };
        let lights = Lights {
            ambient: Vec3::splat(2.0),
            ..dark()
        };
        let color = PBRFragmentShader::shade(&facing_camera(), &uniform(material, lights));
        assert!((color - Vec3::new(1.0, 0.5, 2.0)).length() < 1e-5);
    }

    #[test]
    fn light_behind_the_surface_adds_nothing() {
        let lights = Lights {
            directional_direction: -Vec3::Z,
            directional_radiance: Vec3::splat(3.0),
            ..dark()
        };
        let color = PBRFragmentShader::shade(&facing_camera(), &uniform(Material::default(), lights));
        assert_eq!(color, Vec3::ZERO);

        let lit = Lights {
            directional_direction: Vec3::Z,
            ..lights
        };
        let color = PBRFragmentShader::shade(&facing_camera(), &uniform(Material::default(), lit));
        assert!(color.min_element() > 0.0);
    }

    #[test]
    fn environment_lights_a_dielectric() {
        let mut prefilter = CpuPrefilter::new(PrefilterConfig {
            radiance_width: 16,
            radiance_levels: 2,
            irradiance_width: 8,
        });
        let sky = HdrImage::from_fn(32, 16, |_, _| Vec3::ONE);
        let mut uniform = uniform(Material::default(), dark());
        uniform.environment = Some(prefilter.from_equirectangular(&sky, 0.0));

        let color = PBRFragmentShader::shade(&facing_camera(), &uniform);
        // white furnace: diffuse plus specular stays close to the incoming radiance
        assert!(color.x > 0.8 && color.x < 1.2, "{:?}", color);
    }
}
