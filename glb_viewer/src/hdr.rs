use std::f32::consts::{PI, TAU};
use std::path::Path;

use glam::{Vec2, Vec3};
use rayon::prelude::*;

use crate::error::{Error, Result};

/// Maps a direction to equirectangular coordinates, `v = 0` looking straight up.
pub fn direction_to_equirect(dir: Vec3) -> Vec2 {
    let dir = dir.normalize_or_zero();
    let u = 0.5 + dir.z.atan2(dir.x) / TAU;
    let v = dir.y.clamp(-1.0, 1.0).acos() / PI;
    Vec2::new(u, v)
}

pub fn equirect_to_direction(uv: Vec2) -> Vec3 {
    let phi = (uv.x - 0.5) * TAU;
    let theta = uv.y * PI;
    let (sin_theta, cos_theta) = theta.sin_cos();
    let (sin_phi, cos_phi) = phi.sin_cos();
    Vec3::new(sin_theta * cos_phi, cos_theta, sin_theta * sin_phi)
}

/// Linear HDR radiance stored as an equirectangular (latitude / longitude) image.
#[derive(Debug, Clone)]
pub struct HdrImage {
    pixels: Vec<Vec3>,
    width: usize,
    height: usize,
}

impl HdrImage {
    pub fn new(width: usize, height: usize, pixels: Vec<Vec3>) -> Self {
        debug_assert_eq!(pixels.len(), width * height);
        Self {
            pixels,
            width,
            height,
        }
    }

    pub fn from_fn<F>(width: usize, height: usize, texel: F) -> Self
    where
        F: Fn(usize, usize) -> Vec3 + Sync,
    {
        let pixels = (0..width * height)
            .into_par_iter()
            .map(|i| texel(i % width, i / width))
            .collect();
        Self::new(width, height, pixels)
    }

    /// Reads any float format `image` can decode; EXR is the expected one.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let image = image::open(path)
            .map_err(|source| Error::Image {
                path: path.to_path_buf(),
                source,
            })?
            .to_rgb32f();
        let (width, height) = (image.width() as usize, image.height() as usize);
        let pixels = image.pixels().map(|p| Vec3::from(p.0)).collect();
        Ok(Self::new(width, height, pixels))
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn texel(&self, x: usize, y: usize) -> Vec3 {
        self.pixels[x.min(self.width - 1) + y.min(self.height - 1) * self.width]
    }

    /// Direction through the center of texel `(x, y)`.
    pub fn texel_direction(&self, x: usize, y: usize) -> Vec3 {
        equirect_to_direction(self.texel_uv(x, y))
    }

    pub fn texel_solid_angle(&self, y: usize) -> f32 {
        let theta = (y as f32 + 0.5) / self.height as f32 * PI;
        (TAU / self.width as f32) * (PI / self.height as f32) * theta.sin()
    }

    /// Bilinear lookup, wrapping horizontally and clamping at the poles.
    pub fn sample_uv(&self, uv: Vec2) -> Vec3 {
        let x = uv.x * self.width as f32 - 0.5;
        let y = (uv.y * self.height as f32 - 0.5).clamp(0.0, (self.height - 1) as f32);
        let (xf, yf) = (x.floor(), y.floor());
        let (tx, ty) = (x - xf, y - yf);

        let w = self.width as i64;
        let xl = (xf as i64).rem_euclid(w) as usize;
        let xr = (xf as i64 + 1).rem_euclid(w) as usize;
        let yt = yf as usize;
        let yb = (yt + 1).min(self.height - 1);

        let top = self.texel(xl, yt).lerp(self.texel(xr, yt), tx);
        let bottom = self.texel(xl, yb).lerp(self.texel(xr, yb), tx);
        top.lerp(bottom, ty)
    }

    /// Radiance arriving from `dir` with the whole map turned by `rotation` radians around +Y.
    pub fn sample_direction(&self, dir: Vec3, rotation: f32) -> Vec3 {
        self.sample_uv(direction_to_equirect(dir) - Vec2::new(rotation / TAU, 0.0))
    }

    /// Copy with the rotation baked in, so that
    /// `rotated(a).sample_direction(d, 0.0) == sample_direction(d, a)`.
    pub fn rotated(&self, rotation: f32) -> Self {
        let shift = Vec2::new(rotation / TAU, 0.0);
        Self::from_fn(self.width, self.height, |x, y| {
            self.sample_uv(self.texel_uv(x, y) - shift)
        })
    }

    /// 2x2 box filter. Odd edges repeat their last texel.
    pub fn downsample(&self) -> Self {
        let width = (self.width / 2).max(1);
        let height = (self.height / 2).max(1);
        Self::from_fn(width, height, |x, y| {
            let (sx, sy) = (x * 2, y * 2);
            (self.texel(sx, sy)
                + self.texel(sx + 1, sy)
                + self.texel(sx, sy + 1)
                + self.texel(sx + 1, sy + 1))
                * 0.25
        })
    }

    fn texel_uv(&self, x: usize, y: usize) -> Vec2 {
        Vec2::new(
            (x as f32 + 0.5) / self.width as f32,
            (y as f32 + 0.5) / self.height as f32,
        )
    }
}
