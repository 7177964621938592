// Lets `#[derive(Interpolate)]` expand to `::rasterizer::Interpolate` inside this crate too.
extern crate self as rasterizer;

pub mod pipeline;
pub use pipeline::*;
pub use rasterizer_macros::Interpolate;

pub mod math_prelude {
    pub use glam::{Mat3, Mat4, Quat, Vec2, Vec3, Vec3Swizzles, Vec4, Vec4Swizzles};
}
