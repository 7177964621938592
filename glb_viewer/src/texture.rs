use glam::{Vec2, Vec4};

use crate::error::{Error, Result};

/// Linear RGBA texture sampled with wrapping bilinear filtering.
#[derive(Debug)]
pub struct Texture {
    colors: Vec<Vec4>,
    width: usize,
    height: usize,
}

impl Texture {
    /// Decodes 8 bit texels. sRGB color channels are converted to linear, alpha never is.
    pub fn from_rgba8(width: usize, height: usize, rgba: &[u8], srgb: bool) -> Self {
        let to_linear = |c: u8| {
            let c = c as f32 / 255.0;
            if srgb {
                c.powf(2.2)
            } else {
                c
            }
        };
        let colors = rgba
            .chunks_exact(4)
            .take(width * height)
            .map(|p| Vec4::new(to_linear(p[0]), to_linear(p[1]), to_linear(p[2]), p[3] as f32 / 255.0))
            .collect();

        Self {
            colors,
            width: width.max(1),
            height: height.max(1),
        }
    }

    /// Base color textures embedded in a glTF asset.
    pub fn from_gltf(data: &gltf::image::Data) -> Result<Self> {
        use gltf::image::Format;

        let rgba: Vec<u8> = match data.format {
            Format::R8G8B8A8 => data.pixels.clone(),
            Format::R8G8B8 => data
                .pixels
                .chunks_exact(3)
                .flat_map(|p| [p[0], p[1], p[2], 255])
                .collect(),
            Format::R8G8 => data
                .pixels
                .chunks_exact(2)
                .flat_map(|p| [p[0], p[0], p[0], p[1]])
                .collect(),
            Format::R8 => data.pixels.iter().flat_map(|&l| [l, l, l, 255]).collect(),
            other => return Err(Error::UnsupportedImage(format!("{:?}", other))),
        };
        let (width, height) = (data.width as usize, data.height as usize);
        if rgba.len() < width * height * 4 {
            return Err(Error::UnsupportedImage(format!(
                "{}x{} texture with {} bytes",
                width,
                height,
                data.pixels.len()
            )));
        }
        Ok(Self::from_rgba8(width, height, &rgba, true))
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn sample(&self, uv: Vec2) -> Vec4 {
        // glTF puts v = 0 on the first row
        let x = uv.x * self.width as f32 - 0.5;
        let y = uv.y * self.height as f32 - 0.5;
        let (xf, yf) = (x.floor(), y.floor());
        let (tx, ty) = (x - xf, y - yf);

        let xl = wrap(xf as i64, self.width);
        let xr = wrap(xf as i64 + 1, self.width);
        let yt = wrap(yf as i64, self.height);
        let yb = wrap(yf as i64 + 1, self.height);

        let top = self.color_at(xl, yt).lerp(self.color_at(xr, yt), tx);
        let bottom = self.color_at(xl, yb).lerp(self.color_at(xr, yb), tx);
        top.lerp(bottom, ty)
    }

    fn color_at(&self, x: usize, y: usize) -> Vec4 {
        self.colors
            .get(x + y * self.width)
            .copied()
            .unwrap_or(Vec4::ONE)
    }
}

fn wrap(v: i64, size: usize) -> usize {
    v.rem_euclid(size as i64) as usize
}
