use glam::Vec3;

pub struct Framebuffer {
    pub(super) width: u32,
    pub(super) height: u32,
    pub(super) color: Vec<Vec3>,
}

impl Framebuffer {
    pub fn new(width: u32, height: u32) -> Self {
        let size = (width * height) as usize;
        Self {
            width,
            height,
            color: vec![Vec3::ZERO; size],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn get_color(&self, x: u32, y: u32) -> Option<&Vec3> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.color.get(self.coords_to_index(x, y) as usize)
    }

    /// Writes the color buffer as tightly packed RGBA8, clamping every channel to `[0, 1]`.
    pub fn write_rgba8(&self, out: &mut [u8]) {
        out.chunks_exact_mut(4)
            .zip(self.color.iter())
            .for_each(|(px, c)| {
                let c = c.clamp(Vec3::ZERO, Vec3::ONE) * 255.0;
                px[0] = c.x as u8;
                px[1] = c.y as u8;
                px[2] = c.z as u8;
                px[3] = 255;
            });
    }

    fn coords_to_index(&self, x: u32, y: u32) -> u32 {
        x + y * self.width
    }
}
