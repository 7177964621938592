//! The viewer context.
//!
//! Owns every piece of mutable scene state and is the only thing that
//! mutates it: finished loads, control changes and animation all go through
//! [`Viewer`] on the render thread.

use std::sync::Arc;

use glam::Vec3;
use log::{debug, info, warn};
use rasterizer::{CullMode, Rasterizer};
use sdl2::event::Event;

use crate::assets::{Asset, AssetKind, AssetLoader, AssetSource, Loaded};
use crate::config::{ModelEntry, Settings, ViewerConfig};
use crate::controls::{Axis, Control};
use crate::environment::{CpuPrefilter, EnvironmentLight};
use crate::error::{Error, Result};
use crate::scene::{OrbitCamera, Stage, TransitionController};
use crate::shader::{
    BackgroundShader, Lights, ModelTransforms, PBRFragmentShader, PBRUniform, StandardVertexShader,
};

pub struct Viewer {
    settings: Settings,
    models: Vec<ModelEntry>,
    selected: Option<usize>,
    // model index and load generation of the newest selection
    requested: Option<(usize, u64)>,
    camera: OrbitCamera,
    stage: Stage,
    transitions: TransitionController,
    environment: EnvironmentLight<CpuPrefilter>,
    loader: AssetLoader,
    vertex_shader: StandardVertexShader<PBRUniform>,
    fragment_shader: PBRFragmentShader,
}

impl Viewer {
    /// Sets up the scene and starts loading the environment and the first model.
    pub fn new(config: &ViewerConfig, source: Arc<dyn AssetSource>, aspect: f32) -> Self {
        let mut environment = EnvironmentLight::new(CpuPrefilter::new(config.prefilter.clone()));
        // picked up by the first map once the HDRI arrives
        environment.update(config.settings.env_rotation);

        let mut viewer = Self {
            settings: config.settings.clone(),
            models: config.models.clone(),
            selected: None,
            requested: None,
            camera: OrbitCamera::new(&config.camera, aspect),
            stage: Stage::new(),
            transitions: TransitionController::new(config.transition.clone()),
            environment,
            loader: AssetLoader::new(source),
            vertex_shader: StandardVertexShader::new(),
            fragment_shader: PBRFragmentShader,
        };

        viewer
            .loader
            .request(AssetKind::Environment, config.environment.clone());
        if viewer.models.is_empty() {
            warn!("no models configured");
        } else if let Err(e) = viewer.select_model(0) {
            warn!("{}", e);
        }
        viewer
    }

    pub fn apply(&mut self, control: Control) -> Result<()> {
        let control = control.clamped();
        debug!("control {}", control);
        match control {
            Control::AutoRotate(enabled) => self.settings.auto_rotate = enabled,
            Control::RotateSpeed(speed) => self.settings.rotate_speed = speed,
            Control::CameraFov(degrees) => self.camera.set_fov(degrees),
            Control::AmbientIntensity(intensity) => self.settings.ambient_intensity = intensity,
            Control::EnvRotation(degrees) => {
                self.settings.env_rotation = degrees.to_radians();
                self.environment.update(self.settings.env_rotation);
            }
            Control::DirectionalIntensity(intensity) => {
                self.settings.directional_intensity = intensity
            }
            Control::DirectionalPosition(axis, value) => {
                let position = &mut self.settings.directional_position;
                match axis {
                    Axis::X => position.x = value,
                    Axis::Y => position.y = value,
                    Axis::Z => position.z = value,
                }
            }
            Control::SelectModel(index) => self.select_model(index)?,
        }
        Ok(())
    }

    /// Starts loading the model at `index` of the configured list.
    /// It replaces the current model once loaded, through a transition,
    /// and only then becomes [`Viewer::selected`].
    pub fn select_model(&mut self, index: usize) -> Result<()> {
        let entry = self.models.get(index).ok_or(Error::ModelIndex {
            index,
            count: self.models.len(),
        })?;
        info!("selected {} ({})", entry.name, entry.path.display());
        let generation = self.loader.request(AssetKind::Model, entry.path.clone());
        self.requested = Some((index, generation));
        Ok(())
    }

    /// One frame of state: finished loads, transitions, auto rotation, camera damping.
    pub fn tick(&mut self) {
        for loaded in self.loader.poll() {
            self.install(loaded);
        }

        self.transitions.advance(&mut self.stage);

        if self.settings.auto_rotate {
            if let Some(current) = self.stage.current_model_mut() {
                current.transform.rotation.y += self.settings.rotate_speed;
            }
        }

        self.camera.update();
    }

    pub fn render(&self, rasterizer: &mut Rasterizer) {
        rasterizer.clear();
        let view_projection = self.camera.generate_matrix();

        if let Some((hdri, rotation)) = self.environment.background() {
            let background = BackgroundShader::new(hdri, rotation, view_projection);
            rasterizer.fill_background(|ndc| background.shade(ndc));
        }

        let lights = Lights {
            ambient: Vec3::splat(self.settings.ambient_intensity),
            directional_direction: self.settings.directional_position.normalize_or_zero(),
            directional_radiance: Vec3::splat(self.settings.directional_intensity),
        };
        let view_position = self.camera.position();

        for (_, scene_model) in self.stage.iter() {
            let transforms = ModelTransforms::new(scene_model.world_matrix(), view_projection);
            for primitive in &scene_model.model.primitives {
                let uniform = PBRUniform {
                    transforms,
                    view_position,
                    material: Arc::clone(&primitive.material),
                    lights,
                    environment: self.environment.map().cloned(),
                };
                let cull = if primitive.material.double_sided {
                    CullMode::None
                } else {
                    CullMode::Back
                };
                rasterizer.render_mesh(
                    &primitive.vertices,
                    &primitive.indices,
                    &self.vertex_shader,
                    &self.fragment_shader,
                    &uniform,
                    cull,
                );
            }
        }
    }

    /// Mouse input for the orbit controls.
    pub fn handle_event(&mut self, event: &Event, viewport_height: u32) {
        self.camera.handle_event(event, viewport_height);
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.camera.set_viewport(width, height);
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn camera(&self) -> &OrbitCamera {
        &self.camera
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn transitions(&self) -> &TransitionController {
        &self.transitions
    }

    pub fn environment(&self) -> &EnvironmentLight<CpuPrefilter> {
        &self.environment
    }

    pub fn models(&self) -> &[ModelEntry] {
        &self.models
    }

    /// Index of the model last installed from the configured list.
    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn loads_in_flight(&self) -> usize {
        self.loader.in_flight()
    }

    fn install(&mut self, loaded: Loaded) {
        match loaded.asset {
            Asset::Model(model) => {
                info!(
                    "loaded {} ({} triangles) from {}",
                    model.name,
                    model.triangle_count(),
                    loaded.path.display()
                );
                if let Some((index, generation)) = self.requested {
                    if generation == loaded.generation {
                        self.selected = Some(index);
                        self.requested = None;
                    }
                }
                self.transitions.request(&mut self.stage, Arc::new(model));
            }
            Asset::Environment(hdri) => {
                info!(
                    "loaded environment {} ({}x{})",
                    loaded.path.display(),
                    hdri.width(),
                    hdri.height()
                );
                self.environment.set_source(Arc::new(hdri));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::tests::FakeSource;
    use crate::environment::PrefilterConfig;
    use crate::hdr::HdrImage;
    use crate::model::{Material, Model, ModelVertex, Primitive};
    use crate::scene::TransitionState;
    use glam::Vec2;
    use std::path::{Path, PathBuf};
    use std::time::{Duration, Instant};

    fn config(models: &[&str]) -> ViewerConfig {
        ViewerConfig {
            models: models
                .iter()
                .map(|p| ModelEntry::from_path(PathBuf::from(p)))
                .collect(),
            prefilter: PrefilterConfig {
                radiance_width: 16,
                radiance_levels: 3,
                irradiance_width: 8,
            },
            ..ViewerConfig::default()
        }
    }

    /// Ticks until every load has landed and the scene is at rest.
    fn settle(viewer: &mut Viewer) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while (viewer.loads_in_flight() > 0 || !viewer.transitions().is_idle())
            && Instant::now() < deadline
        {
            std::thread::sleep(Duration::from_millis(2));
            viewer.tick();
        }
    }

    fn current_name(viewer: &Viewer) -> Option<&str> {
        let id = viewer.stage().current()?;
        viewer.stage().get(id).map(|m| m.model.name.as_str())
    }

    fn current_yaw(viewer: &Viewer) -> f32 {
        let id = viewer.stage().current().unwrap();
        viewer.stage().get(id).unwrap().transform.rotation.y
    }

    #[test]
    fn first_model_and_environment_arrive_through_tick() {
        let mut viewer = Viewer::new(&config(&["model/chair.glb"]), Arc::new(FakeSource), 1.0);
        assert!(viewer.stage().is_empty());

        settle(&mut viewer);
        assert_eq!(current_name(&viewer), Some("chair"));
        assert_eq!(viewer.stage().len(), 1);
        assert!(viewer.environment().map().is_some());
    }

    #[test]
    fn loads_wait_for_the_next_tick() {
        let mut viewer = Viewer::new(&config(&["model/chair.glb"]), Arc::new(FakeSource), 1.0);
        // give the workers time to finish without ticking
        std::thread::sleep(Duration::from_millis(200));
        assert!(viewer.stage().is_empty());
        assert!(viewer.environment().map().is_none());

        viewer.tick();
        assert_eq!(current_name(&viewer), Some("chair"));
        assert!(viewer.environment().map().is_some());
    }

    #[test]
    fn zero_speed_leaves_orientation_unchanged() {
        let mut config = config(&["model/chair.glb"]);
        config.settings.auto_rotate = true;
        config.settings.rotate_speed = 0.0;
        let mut viewer = Viewer::new(&config, Arc::new(FakeSource), 1.0);
        settle(&mut viewer);

        let before = current_yaw(&viewer);
        for _ in 0..100 {
            viewer.tick();
        }
        assert_eq!(current_yaw(&viewer), before);
    }

    #[test]
    fn auto_rotate_adds_speed_every_frame() {
        let mut viewer = Viewer::new(&config(&["model/chair.glb"]), Arc::new(FakeSource), 1.0);
        settle(&mut viewer);
        let before = current_yaw(&viewer);

        viewer.apply(Control::RotateSpeed(0.02)).unwrap();
        for _ in 0..10 {
            viewer.tick();
        }
        // toggle is off by default
        assert_eq!(current_yaw(&viewer), before);

        viewer.apply(Control::AutoRotate(true)).unwrap();
        for _ in 0..10 {
            viewer.tick();
        }
        assert!((current_yaw(&viewer) - before - 0.2).abs() < 1e-5);
    }

    #[test]
    fn selecting_a_model_transitions_to_it() {
        let mut viewer = Viewer::new(
            &config(&["model/chair.glb", "model/lamp.glb"]),
            Arc::new(FakeSource),
            1.0,
        );
        settle(&mut viewer);

        viewer.apply(Control::SelectModel(1)).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while viewer.transitions().is_idle() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(2));
            viewer.tick();
        }
        assert!(matches!(
            viewer.transitions().state(),
            TransitionState::Exiting { .. }
        ));
        assert_eq!(current_name(&viewer), Some("chair"));

        settle(&mut viewer);
        assert_eq!(current_name(&viewer), Some("lamp"));
        assert_eq!(viewer.stage().len(), 1);
        assert_eq!(viewer.selected(), Some(1));
    }

    #[test]
    fn newest_selection_wins_over_a_slow_one() {
        let mut viewer = Viewer::new(
            &config(&["model/chair.glb", "model/slow_sofa.glb", "model/lamp.glb"]),
            Arc::new(FakeSource),
            1.0,
        );
        settle(&mut viewer);

        viewer.select_model(1).unwrap();
        viewer.select_model(2).unwrap();
        settle(&mut viewer);
        assert_eq!(current_name(&viewer), Some("lamp"));
        assert_eq!(viewer.stage().len(), 1);
        assert_eq!(viewer.selected(), Some(2));
    }

    #[test]
    fn out_of_range_selection_is_an_error() {
        let mut viewer = Viewer::new(&config(&["model/chair.glb"]), Arc::new(FakeSource), 1.0);
        settle(&mut viewer);
        assert!(matches!(
            viewer.apply(Control::SelectModel(4)),
            Err(Error::ModelIndex { index: 4, count: 1 })
        ));
        assert_eq!(viewer.selected(), Some(0));
    }

    #[test]
    fn failed_model_load_keeps_the_scene() {
        let mut viewer = Viewer::new(
            &config(&["model/chair.glb", "model/missing.glb"]),
            Arc::new(FakeSource),
            1.0,
        );
        settle(&mut viewer);
        viewer.select_model(1).unwrap();
        // not selected until the model is on stage
        assert_eq!(viewer.selected(), Some(0));
        settle(&mut viewer);
        assert_eq!(current_name(&viewer), Some("chair"));
        assert_eq!(viewer.selected(), Some(0));
    }

    #[test]
    fn environment_rotation_regenerates_lighting() {
        let mut viewer = Viewer::new(&config(&[]), Arc::new(FakeSource), 1.0);
        settle(&mut viewer);
        let first = viewer.environment().map().unwrap().id();

        viewer.apply(Control::EnvRotation(90.0)).unwrap();
        let map = viewer.environment().map().unwrap();
        assert_ne!(map.id(), first);
        assert!((map.rotation() - std::f32::consts::FRAC_PI_2).abs() < 1e-6);
        assert!((viewer.settings().env_rotation - std::f32::consts::FRAC_PI_2).abs() < 1e-6);
        assert_eq!(viewer.environment().generator().live_maps(), 1);
    }

    #[test]
    fn controls_update_settings_and_camera() {
        let mut viewer = Viewer::new(&config(&[]), Arc::new(FakeSource), 1.0);
        viewer.apply(Control::CameraFov(70.0)).unwrap();
        viewer.apply(Control::AmbientIntensity(5.0)).unwrap();
        viewer.apply(Control::DirectionalPosition(Axis::Z, -4.0)).unwrap();
        viewer.apply(Control::DirectionalIntensity(2.5)).unwrap();

        assert_eq!(viewer.camera().fov(), 70.0);
        assert_eq!(viewer.settings().ambient_intensity, 2.0);
        assert_eq!(viewer.settings().directional_position.z, -4.0);
        assert_eq!(viewer.settings().directional_intensity, 2.5);
    }

    /// A large double sided floor under a white sky.
    struct FloorSource;

    impl AssetSource for FloorSource {
        fn load_model(&self, _path: &Path) -> Result<Model> {
            let vertex = |x: f32, z: f32| ModelVertex {
                position: Vec3::new(x, 0.0, z),
                normal: Vec3::Y,
                texture: Vec2::ZERO,
            };
            let material = Material {
                double_sided: true,
                ..Material::default()
            };
            let primitive = Primitive {
                vertices: vec![vertex(-5.0, -5.0), vertex(5.0, -5.0), vertex(0.0, 5.0)],
                indices: vec![0, 1, 2],
                material: Arc::new(material),
            };
            Ok(Model::new("floor", vec![primitive]))
        }

        fn load_environment(&self, _path: &Path) -> Result<HdrImage> {
            Ok(HdrImage::from_fn(16, 8, |_, _| Vec3::ONE))
        }
    }

    #[test]
    fn renders_background_and_model() {
        let mut viewer = Viewer::new(&config(&["floor.glb"]), Arc::new(FloorSource), 1.0);
        settle(&mut viewer);
        let mut rasterizer = Rasterizer::new(32, 32);
        viewer.render(&mut rasterizer);

        assert_eq!(rasterizer.frametime().draws(), 1);
        // the camera looks down at the origin, which sits on the floor
        let center = *rasterizer.framebuffer().get_color(16, 16).unwrap();
        let sky = 0.5f32.powf(1.0 / 2.2);
        assert!(center.x > sky + 0.05, "{:?}", center);
    }
}
