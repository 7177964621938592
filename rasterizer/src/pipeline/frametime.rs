use std::time::Duration;

/// Time spent in each pipeline stage since the last clear.
#[derive(Debug, Default, Clone)]
pub struct FrameTime {
    time_background: Duration,
    time_vertex_shader: Duration,
    time_rasterization: Duration,
    time_fragment_shader: Duration,
    draws: u32,
}

impl FrameTime {
    pub fn zero() -> Self {
        Self::default()
    }

    pub(super) fn add_background(&mut self, background: Duration) {
        self.time_background += background;
    }

    pub(super) fn add_draw(&mut self, vertex: Duration, raster: Duration, frag: Duration) {
        self.time_vertex_shader += vertex;
        self.time_rasterization += raster;
        self.time_fragment_shader += frag;
        self.draws += 1;
    }

    pub fn background_stage(&self) -> &Duration {
        &self.time_background
    }

    pub fn geometry_stage(&self) -> &Duration {
        &self.time_vertex_shader
    }

    pub fn rasterization_stage(&self) -> &Duration {
        &self.time_rasterization
    }

    pub fn fragment_stage(&self) -> &Duration {
        &self.time_fragment_shader
    }

    pub fn draws(&self) -> u32 {
        self.draws
    }

    pub fn total(&self) -> Duration {
        *self.background_stage()
            + *self.geometry_stage()
            + *self.rasterization_stage()
            + *self.fragment_stage()
    }
}
