use std::f32::consts::PI;

use glam::{Mat4, Vec3};
use sdl2::event::Event;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub position: Vec3,
    pub target: Vec3,
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    /// Zero disables damping.
    pub damping_factor: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: Vec3::new(1.0, 1.0, 0.2),
            target: Vec3::ZERO,
            fov: 45.0,
            near: 0.1,
            far: 100.0,
            damping_factor: 0.05,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            min_distance: 0.05,
            max_distance: 50.0,
        }
    }
}

/// Orbit controls around a target point, kept in spherical coordinates.
///
/// Input accumulates into a pending delta. With damping enabled every
/// [`OrbitCamera::update`] applies `delta * damping_factor` and then decays the
/// delta by `1 - damping_factor`, so motion eases out over several frames.
pub struct OrbitCamera {
    target: Vec3,
    radius: f32,
    // azimuth around +Y, measured from +Z
    theta: f32,
    // polar angle from +Y
    phi: f32,
    fov: f32,
    aspect: f32,
    near: f32,
    far: f32,
    damping_factor: f32,
    rotate_speed: f32,
    zoom_speed: f32,
    min_distance: f32,
    max_distance: f32,
    delta_theta: f32,
    delta_phi: f32,
    scale: f32,
}

impl OrbitCamera {
    pub const FOV_MIN: f32 = 20.0;
    pub const FOV_MAX: f32 = 100.0;

    const MIN_POLAR: f32 = 1e-3;

    pub fn new(config: &CameraConfig, aspect: f32) -> Self {
        let offset = config.position - config.target;
        let radius = offset.length().max(config.min_distance);
        let theta = offset.x.atan2(offset.z);
        let phi = (offset.y / radius).clamp(-1.0, 1.0).acos();

        Self {
            target: config.target,
            radius,
            theta,
            phi,
            fov: config.fov.clamp(Self::FOV_MIN, Self::FOV_MAX),
            aspect,
            near: config.near,
            far: config.far,
            damping_factor: config.damping_factor.clamp(0.0, 1.0),
            rotate_speed: config.rotate_speed,
            zoom_speed: config.zoom_speed,
            min_distance: config.min_distance,
            max_distance: config.max_distance,
            delta_theta: 0.0,
            delta_phi: 0.0,
            scale: 1.0,
        }
    }

    pub fn position(&self) -> Vec3 {
        let (sin_phi, cos_phi) = self.phi.sin_cos();
        let (sin_theta, cos_theta) = self.theta.sin_cos();
        self.target
            + Vec3::new(
                sin_phi * sin_theta,
                cos_phi,
                sin_phi * cos_theta,
            ) * self.radius
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }

    /// Field of view in degrees.
    pub fn fov(&self) -> f32 {
        self.fov
    }

    pub fn set_fov(&mut self, degrees: f32) {
        self.fov = degrees.clamp(Self::FOV_MIN, Self::FOV_MAX);
    }

    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.aspect = width.max(1) as f32 / height.max(1) as f32;
    }

    pub fn generate_matrix(&self) -> Mat4 {
        self.generate_projection_matrix() * self.generate_view_matrix()
    }

    pub fn generate_projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov.to_radians(), self.aspect, self.near, self.far)
    }

    pub fn generate_view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position(), self.target, Vec3::Y)
    }

    /// Drag by a pixel delta; a drag across the full viewport height is one turn.
    pub fn rotate(&mut self, dx: f32, dy: f32, viewport_height: u32) {
        let h = viewport_height.max(1) as f32;
        self.delta_theta -= 2.0 * PI * dx / h * self.rotate_speed;
        self.delta_phi -= 2.0 * PI * dy / h * self.rotate_speed;
    }

    /// Positive steps move towards the target.
    pub fn dolly(&mut self, steps: f32) {
        self.scale *= 0.95f32.powf(self.zoom_speed * steps);
    }

    pub fn handle_event(&mut self, event: &Event, viewport_height: u32) {
        match event {
            Event::MouseMotion {
                mousestate,
                xrel,
                yrel,
                ..
            } if mousestate.left() => {
                self.rotate(*xrel as f32, *yrel as f32, viewport_height);
            }
            Event::MouseWheel { y, .. } => self.dolly(*y as f32),
            _ => {}
        }
    }

    pub fn update(&mut self) {
        if self.damping_factor > 0.0 {
            self.theta += self.delta_theta * self.damping_factor;
            self.phi += self.delta_phi * self.damping_factor;
            self.delta_theta *= 1.0 - self.damping_factor;
            self.delta_phi *= 1.0 - self.damping_factor;
        } else {
            self.theta += self.delta_theta;
            self.phi += self.delta_phi;
            self.delta_theta = 0.0;
            self.delta_phi = 0.0;
        }
        self.phi = self.phi.clamp(Self::MIN_POLAR, PI - Self::MIN_POLAR);
        self.radius = (self.radius * self.scale).clamp(self.min_distance, self.max_distance);
        self.scale = 1.0;
    }
}
