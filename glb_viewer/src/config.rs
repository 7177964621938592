use std::path::{Path, PathBuf};

use glam::Vec3;
use serde::Deserialize;

use crate::environment::PrefilterConfig;
use crate::error::{Error, Result};
use crate::scene::{CameraConfig, TransitionConfig};

/// Values the controls can change while the viewer runs.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub auto_rotate: bool,
    /// Radians added to the model yaw every rendered frame.
    pub rotate_speed: f32,
    pub ambient_intensity: f32,
    /// HDRI yaw in radians.
    pub env_rotation: f32,
    pub directional_intensity: f32,
    pub directional_position: Vec3,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            auto_rotate: false,
            rotate_speed: 0.01,
            ambient_intensity: 1.0,
            env_rotation: 0.0,
            directional_intensity: 1.0,
            directional_position: Vec3::new(3.0, 5.0, 2.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelEntry {
    pub name: String,
    pub path: PathBuf,
}

impl ModelEntry {
    pub fn from_path(path: PathBuf) -> Self {
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self { name, path }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "GLB viewer".to_string(),
            width: 1280,
            height: 720,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub environment: PathBuf,
    pub models: Vec<ModelEntry>,
    pub settings: Settings,
    pub camera: CameraConfig,
    pub transition: TransitionConfig,
    pub prefilter: PrefilterConfig,
    pub window: WindowConfig,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            environment: PathBuf::from("hdr/lebombo.exr"),
            models: vec![ModelEntry::from_path(PathBuf::from("model/BL-360.glb"))],
            settings: Settings::default(),
            camera: CameraConfig::default(),
            transition: TransitionConfig::default(),
            prefilter: PrefilterConfig::default(),
            window: WindowConfig::default(),
        }
    }
}

impl ViewerConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents).map_err(|source| Error::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(contents: &str) -> std::result::Result<Self, ron::error::SpannedError> {
        ron::from_str(contents)
    }
}
