//! Image based lighting derived from an equirectangular HDRI.
//!
//! Turning the environment means re-deriving the prefiltered maps from the
//! base HDRI. Each derived map is a separate allocation, so the previous one
//! has to be released whenever a new one is installed.

use std::f32::consts::PI;
use std::sync::Arc;

use glam::{Vec2, Vec3};
use itertools::Itertools;
use log::{debug, trace};
use serde::Deserialize;

use crate::hdr::{equirect_to_direction, HdrImage};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PrefilterConfig {
    /// Width of the sharpest radiance level; the source is box filtered down to it.
    pub radiance_width: usize,
    pub radiance_levels: usize,
    pub irradiance_width: usize,
}

impl Default for PrefilterConfig {
    fn default() -> Self {
        Self {
            radiance_width: 256,
            radiance_levels: 6,
            irradiance_width: 32,
        }
    }
}

pub struct PrefilteredEnvironment {
    id: u64,
    rotation: f32,
    irradiance: HdrImage,
    // sharpest first
    radiance: Vec<HdrImage>,
}

impl PrefilteredEnvironment {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn rotation(&self) -> f32 {
        self.rotation
    }

    pub fn levels(&self) -> usize {
        self.radiance.len()
    }

    /// Cosine weighted irradiance divided by pi: multiply by albedo for Lambert diffuse.
    pub fn irradiance(&self, normal: Vec3) -> Vec3 {
        self.irradiance.sample_direction(normal, 0.0)
    }

    /// Reflected radiance, blurrier as roughness goes to 1.
    pub fn radiance(&self, dir: Vec3, roughness: f32) -> Vec3 {
        let max_level = self.radiance.len().saturating_sub(1);
        let lod = roughness.clamp(0.0, 1.0) * max_level as f32;
        let lo = (lod.floor() as usize).min(max_level);
        let hi = (lo + 1).min(max_level);
        let a = self.radiance[lo].sample_direction(dir, 0.0);
        let b = self.radiance[hi].sample_direction(dir, 0.0);
        a.lerp(b, lod - lo as f32)
    }
}

/// Creates and releases derived environment maps.
pub trait EnvironmentGenerator {
    type Map;

    fn from_equirectangular(&mut self, source: &HdrImage, rotation: f32) -> Self::Map;
    fn dispose(&mut self, map: Self::Map);
}

pub struct CpuPrefilter {
    config: PrefilterConfig,
    next_id: u64,
    live: usize,
}

impl CpuPrefilter {
    pub fn new(config: PrefilterConfig) -> Self {
        Self {
            config,
            next_id: 0,
            live: 0,
        }
    }

    /// Maps created and not yet disposed.
    pub fn live_maps(&self) -> usize {
        self.live
    }
}

impl EnvironmentGenerator for CpuPrefilter {
    type Map = Arc<PrefilteredEnvironment>;

    fn from_equirectangular(&mut self, source: &HdrImage, rotation: f32) -> Self::Map {
        let start = std::time::Instant::now();
        let base = reduce_to_width(source, self.config.radiance_width.max(1)).rotated(rotation);

        let mut radiance = vec![base];
        while radiance.len() < self.config.radiance_levels.max(1) {
            let Some(last) = radiance.last() else { break };
            if last.width() <= 1 {
                break;
            }
            let next = last.downsample();
            radiance.push(next);
        }

        let irradiance_width = self.config.irradiance_width.max(2);
        let convolution_source = reduce_to_width(&radiance[0], irradiance_width * 2);
        let irradiance = convolve_irradiance(&convolution_source, irradiance_width);

        self.next_id += 1;
        self.live += 1;
        debug!(
            "generated environment map {} at {:.3} rad in {:?} ({} live)",
            self.next_id,
            rotation,
            start.elapsed(),
            self.live
        );

        Arc::new(PrefilteredEnvironment {
            id: self.next_id,
            rotation,
            irradiance,
            radiance,
        })
    }

    fn dispose(&mut self, map: Self::Map) {
        self.live = self.live.saturating_sub(1);
        trace!("disposed environment map {}", map.id());
    }
}

fn reduce_to_width(source: &HdrImage, max_width: usize) -> HdrImage {
    if source.width() <= max_width {
        return source.clone();
    }
    let mut image = source.downsample();
    while image.width() > max_width {
        image = image.downsample();
    }
    image
}

fn convolve_irradiance(source: &HdrImage, width: usize) -> HdrImage {
    let height = (width / 2).max(1);
    let samples: Vec<(Vec3, Vec3)> = (0..source.height())
        .cartesian_product(0..source.width())
        .map(|(y, x)| {
            (
                source.texel_direction(x, y),
                source.texel(x, y) * source.texel_solid_angle(y),
            )
        })
        .collect();

    HdrImage::from_fn(width, height, |x, y| {
        let normal = equirect_to_direction(Vec2::new(
            (x as f32 + 0.5) / width as f32,
            (y as f32 + 0.5) / height as f32,
        ));
        let irradiance = samples
            .iter()
            .fold(Vec3::ZERO, |acc, (dir, radiance)| {
                acc + *radiance * normal.dot(*dir).max(0.0)
            });
        irradiance / PI
    })
}

/// The scene's environment: the base HDRI (also used as background) and the
/// single derived map currently installed for lighting.
pub struct EnvironmentLight<G: EnvironmentGenerator> {
    generator: G,
    source: Option<Arc<HdrImage>>,
    map: Option<G::Map>,
    rotation: f32,
}

impl<G: EnvironmentGenerator> EnvironmentLight<G> {
    pub fn new(generator: G) -> Self {
        Self {
            generator,
            source: None,
            map: None,
            rotation: 0.0,
        }
    }

    /// Installs a new base HDRI and derives lighting for the current rotation.
    pub fn set_source(&mut self, source: Arc<HdrImage>) {
        self.source = Some(source);
        self.update(self.rotation);
    }

    /// Re-derives the lighting for `angle` and releases the map it replaces.
    /// Without a base HDRI nothing happens and `false` is returned.
    pub fn update(&mut self, angle: f32) -> bool {
        self.rotation = angle;
        let Some(source) = self.source.as_ref() else {
            debug!("no HDRI loaded, environment lighting left unset");
            return false;
        };
        let next = self.generator.from_equirectangular(source, angle);
        if let Some(previous) = self.map.replace(next) {
            self.generator.dispose(previous);
        }
        true
    }

    pub fn map(&self) -> Option<&G::Map> {
        self.map.as_ref()
    }

    /// Base HDRI and the rotation it is displayed with.
    pub fn background(&self) -> Option<(&HdrImage, f32)> {
        self.source.as_deref().map(|s| (s, self.rotation))
    }

    pub fn rotation(&self) -> f32 {
        self.rotation
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }
}
