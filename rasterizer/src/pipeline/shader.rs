use crate::math_prelude::*;

/// Barycentric blend of per-vertex values. Derive it with `#[derive(Interpolate)]`.
pub trait Interpolate {
    fn interpolate(v0: &Self, v1: &Self, v2: &Self, r0: f32, r1: f32, r2: f32) -> Self;
}

pub trait ShaderData: Interpolate + Send + Sync {}
impl<T: Interpolate + Send + Sync> ShaderData for T {}

pub trait VertexShader: Send + Sync {
    type VertexData: Send + Sync;
    type Uniform: Send + Sync;
    type SharedData: ShaderData;

    /// Returns the clip space position and the varyings handed to the fragment stage.
    fn vertex(
        &self,
        vertex: &Self::VertexData,
        uniform: &Self::Uniform,
    ) -> (Vec4, Self::SharedData);
}

pub trait FragmentShader: Send + Sync {
    type Uniform: Send + Sync;
    type SharedData: ShaderData;

    fn fragment(&self, shared: &Self::SharedData, uniform: &Self::Uniform) -> Vec3;
}

macro_rules! impl_interpolate {
    ($ty:ident) => {
        impl Interpolate for $ty {
            fn interpolate(v0: &Self, v1: &Self, v2: &Self, r0: f32, r1: f32, r2: f32) -> Self {
                *v0 * r0 + *v1 * r1 + *v2 * r2
            }
        }
    };
}

impl_interpolate!(f32);
impl_interpolate!(Vec2);
impl_interpolate!(Vec3);
impl_interpolate!(Vec4);
