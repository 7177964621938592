mod bounding_box;
mod framebuffer;
mod frametime;
mod shader;

use bounding_box::BoundingBox;

pub use framebuffer::Framebuffer;
pub use frametime::FrameTime;
pub use shader::{FragmentShader, Interpolate, ShaderData, VertexShader};

use glam::{Vec2, Vec3, Vec4Swizzles};
use itertools::Itertools;
use rayon::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CullMode {
    None,
    /// Drop faces whose projected winding is clockwise.
    #[default]
    Back,
}

#[derive(Debug, Clone)]
struct Fragment {
    depth: f32,
    // Draw call that last won the depth test here
    draw: u32,
    //Index to ProcessedFace of that draw
    face: usize,
    ratios: Vec3,
}

impl Fragment {
    const INVALID_FACE_INDEX: usize = usize::MAX;

    fn belongs_to(&self, draw: u32) -> bool {
        self.face != Self::INVALID_FACE_INDEX && self.draw == draw
    }

    fn reset(&mut self) {
        self.depth = f32::MAX;
        self.face = Self::INVALID_FACE_INDEX;
    }
}

impl Default for Fragment {
    fn default() -> Self {
        Self {
            depth: f32::MAX,
            draw: 0,
            face: Self::INVALID_FACE_INDEX,
            ratios: Vec3::ZERO,
        }
    }
}

struct FrameBlock {
    // The block on the screen this struct represents
    bounding_box: BoundingBox,
    //indices to ProcessedFace
    face_indices: Vec<usize>,
    fragments: Vec<Fragment>,
}

impl FrameBlock {
    fn new(bounding_box: BoundingBox) -> Self {
        let size = bounding_box.width() * bounding_box.height();
        Self {
            bounding_box,
            face_indices: Vec::with_capacity(128),
            fragments: vec![Fragment::default(); size as usize],
        }
    }

    fn clear(&mut self) {
        self.face_indices.clear();
        self.fragments.iter_mut().for_each(Fragment::reset);
    }

    fn fragment_index(&self, x: u32, y: u32) -> usize {
        let fragment_x = x - self.bounding_box.x();
        let fragment_y = y - self.bounding_box.y();
        (fragment_x + fragment_y * self.bounding_box.width()) as usize
    }
}

struct TriangleInteriorChecker {
    vertex0: Vec2,
    inv_col1: Vec2,
    inv_col2: Vec2,
}

impl TriangleInteriorChecker {
    /// `None` for degenerate (zero area) triangles.
    fn new(v0: Vec3, v1: Vec3, v2: Vec3) -> Option<Self> {
        let col1 = (v1 - v0).truncate();
        let col2 = (v2 - v0).truncate();
        let det = col1.x * col2.y - col2.x * col1.y;
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        let inv_det = 1.0 / det;
        Some(Self {
            vertex0: v0.truncate(),
            inv_col1: Vec2::new(col2.y, -col1.y) * inv_det,
            inv_col2: Vec2::new(-col2.x, col1.x) * inv_det,
        })
    }

    fn to_triangle_coords(&self, point: Vec2) -> Vec2 {
        let target = point - self.vertex0;
        self.inv_col1 * target.x + self.inv_col2 * target.y
    }

    //A point in triangle coords
    fn is_point_in_triangle(&self, triangle_point: Vec2) -> bool {
        0.0 <= triangle_point.x
            && 0.0 <= triangle_point.y
            && (triangle_point.x + triangle_point.y) <= 1.0
    }
}

struct ProcessedFace<DataType> {
    // normalized device coordinates
    vertices: [Vec3; 3],
    inv_w: [f32; 3],
    data: [DataType; 3],
    bounding_box: BoundingBox,
}

pub struct Rasterizer {
    framebuffer: Framebuffer,
    frame_blocks: Option<Vec<FrameBlock>>,
    frame_time: FrameTime,
    blocks_width: u32,
    blocks_height: u32,
    draw: u32,
}

impl Rasterizer {
    const NORMALIZED_COORDS_MIN: f32 = -1.0;
    const NORMALIZED_COORDS_MAX: f32 = 1.0;
    const BLOCK_SIZE: u32 = 64;
    // Vertices closer to the eye plane than this are rejected instead of clipped
    const MIN_CLIP_W: f32 = 1e-5;

    pub fn new(width: u32, height: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let framebuffer = Framebuffer::new(width, height);
        let mut frame_blocks = Vec::new();

        for y in (0..height).step_by(Self::BLOCK_SIZE as usize) {
            for x in (0..width).step_by(Self::BLOCK_SIZE as usize) {
                let w = Self::BLOCK_SIZE.min(width - x);
                let h = Self::BLOCK_SIZE.min(height - y);
                frame_blocks.push(FrameBlock::new(BoundingBox::new(x, y, w, h)));
            }
        }

        Self {
            framebuffer,
            frame_blocks: Some(frame_blocks),
            frame_time: FrameTime::zero(),
            blocks_width: (width + Self::BLOCK_SIZE - 1) / Self::BLOCK_SIZE,
            blocks_height: (height + Self::BLOCK_SIZE - 1) / Self::BLOCK_SIZE,
            draw: 0,
        }
    }

    /// Draws an indexed triangle list. Depth is shared with every other draw since the last clear.
    pub fn render_mesh<VS, FS, SD, V, U>(
        &mut self,
        vertices: &[V],
        indices: &[u32],
        vertex_shader: &VS,
        fragment_shader: &FS,
        uniform: &U,
        cull: CullMode,
    ) where
        V: Send + Sync,
        U: Send + Sync,
        SD: ShaderData,
        VS: VertexShader<VertexData = V, Uniform = U, SharedData = SD>,
        FS: FragmentShader<Uniform = U, SharedData = SD>,
    {
        let Some(mut frame_blocks) = self.frame_blocks.take() else {
            return;
        };
        self.draw = self.draw.wrapping_add(1);
        let draw = self.draw;

        let start = std::time::Instant::now();
        //Vertex shader stage
        let processed_faces: Vec<ProcessedFace<SD>> = indices
            .par_chunks_exact(3)
            .filter_map(|triangle| {
                let v0 = vertices.get(triangle[0] as usize)?;
                let v1 = vertices.get(triangle[1] as usize)?;
                let v2 = vertices.get(triangle[2] as usize)?;
                let (clip0, data0) = vertex_shader.vertex(v0, uniform);
                let (clip1, data1) = vertex_shader.vertex(v1, uniform);
                let (clip2, data2) = vertex_shader.vertex(v2, uniform);
                if clip0.w < Self::MIN_CLIP_W
                    || clip1.w < Self::MIN_CLIP_W
                    || clip2.w < Self::MIN_CLIP_W
                {
                    return None;
                }
                let vertices = [
                    clip0.xyz() / clip0.w,
                    clip1.xyz() / clip1.w,
                    clip2.xyz() / clip2.w,
                ];
                if cull == CullMode::Back && signed_area(&vertices) <= 0.0 {
                    return None;
                }
                let bounding_box = self.bounding_box_from_vertices(&vertices)?;
                Some(ProcessedFace {
                    vertices,
                    inv_w: [1.0 / clip0.w, 1.0 / clip1.w, 1.0 / clip2.w],
                    data: [data0, data1, data2],
                    bounding_box,
                })
            })
            .collect();

        //Put all the faces in their respective blocks so we can multi thread this
        frame_blocks.iter_mut().for_each(|b| b.face_indices.clear());
        for (face_index, face) in processed_faces.iter().enumerate() {
            for block_index in self.frame_blocks_in_bounding_box(&face.bounding_box) {
                frame_blocks[block_index].face_indices.push(face_index);
            }
        }

        let vertex_shader_duration = start.elapsed();
        let start = std::time::Instant::now();

        let (width, height) = (self.width(), self.height());
        frame_blocks.par_iter_mut().for_each(|block| {
            for face_index in block.face_indices.iter().copied() {
                let face = &processed_faces[face_index];
                let Some(rasterize_box) = block.bounding_box.overlap(&face.bounding_box) else {
                    continue;
                };
                let [v0, v1, v2] = face.vertices;
                let Some(triangle_checker) = TriangleInteriorChecker::new(v0, v1, v2) else {
                    continue;
                };

                let y_iter = rasterize_box.y()..rasterize_box.bottom();
                let x_iter = rasterize_box.x()..rasterize_box.right();

                for (y, x) in y_iter.cartesian_product(x_iter) {
                    let triangle_point =
                        triangle_checker.to_triangle_coords(screen_to_normalized(x, y, width, height));
                    if !triangle_checker.is_point_in_triangle(triangle_point) {
                        continue;
                    }
                    let ratio_1 = triangle_point.x;
                    let ratio_2 = triangle_point.y;
                    let ratio_0 = 1.0 - ratio_1 - ratio_2;
                    let depth = ratio_0 * v0.z + ratio_1 * v1.z + ratio_2 * v2.z;
                    if !(0.0..=1.0).contains(&depth) {
                        continue;
                    }

                    let fragment_index = block.fragment_index(x, y);
                    let fragment = &mut block.fragments[fragment_index];
                    if fragment.depth > depth {
                        fragment.depth = depth;
                        fragment.draw = draw;
                        fragment.face = face_index;
                        fragment.ratios = perspective_correct(
                            Vec3::new(ratio_0, ratio_1, ratio_2),
                            face.inv_w,
                        );
                    }
                }
            }
        });

        let rasterization_duration = start.elapsed();
        let start = std::time::Instant::now();

        //Fragment shader stage
        let width = width as usize;
        let blocks_width = self.blocks_width as usize;
        self.framebuffer
            .color
            .par_iter_mut()
            .enumerate()
            .for_each(|(index, color)| {
                let x = index % width;
                let y = index / width;
                let block_index = x / Self::BLOCK_SIZE as usize
                    + (y / Self::BLOCK_SIZE as usize) * blocks_width;
                let block = &frame_blocks[block_index];
                let fragment = &block.fragments[block.fragment_index(x as u32, y as u32)];
                if fragment.belongs_to(draw) {
                    let face = &processed_faces[fragment.face];
                    let interpolated = SD::interpolate(
                        &face.data[0],
                        &face.data[1],
                        &face.data[2],
                        fragment.ratios.x,
                        fragment.ratios.y,
                        fragment.ratios.z,
                    );
                    *color = fragment_shader.fragment(&interpolated, uniform);
                }
            });

        let fragment_shader_duration = start.elapsed();

        self.frame_time.add_draw(
            vertex_shader_duration,
            rasterization_duration,
            fragment_shader_duration,
        );
        self.frame_blocks = Some(frame_blocks);
    }

    /// Shades every pixel from its normalized device coordinates. Depth is left untouched.
    pub fn fill_background<F>(&mut self, shade: F)
    where
        F: Fn(Vec2) -> Vec3 + Sync,
    {
        let start = std::time::Instant::now();
        let (width, height) = (self.width(), self.height());
        self.framebuffer
            .color
            .par_iter_mut()
            .enumerate()
            .for_each(|(index, color)| {
                let x = index as u32 % width;
                let y = index as u32 / width;
                *color = shade(screen_to_normalized(x, y, width, height));
            });
        self.frame_time.add_background(start.elapsed());
    }

    pub fn width(&self) -> u32 {
        self.framebuffer.width()
    }

    pub fn height(&self) -> u32 {
        self.framebuffer.height()
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.width() as f32 / self.height() as f32
    }

    pub fn framebuffer(&self) -> &Framebuffer {
        &self.framebuffer
    }

    pub fn clear(&mut self) {
        self.clear_color(Vec3::ZERO)
    }

    pub fn clear_color(&mut self, color: Vec3) {
        if let Some(blocks) = self.frame_blocks.as_mut() {
            blocks.par_iter_mut().for_each(|b| b.clear());
        }
        self.framebuffer.color.fill(color);
        self.frame_time = FrameTime::zero();
    }

    pub fn frametime(&self) -> &FrameTime {
        &self.frame_time
    }

    fn bounding_box_from_vertices(&self, vertices: &[Vec3; 3]) -> Option<BoundingBox> {
        let [v0, v1, v2] = vertices;
        let min = v0.min(*v1).min(*v2);
        let max = v0.max(*v1).max(*v2);

        let outside = max.x < Self::NORMALIZED_COORDS_MIN
            || max.y < Self::NORMALIZED_COORDS_MIN
            || min.x > Self::NORMALIZED_COORDS_MAX
            || min.y > Self::NORMALIZED_COORDS_MAX
            || max.z < 0.0
            || min.z > 1.0;
        if outside {
            return None;
        }

        let clamp = |v: f32| v.clamp(Self::NORMALIZED_COORDS_MIN, Self::NORMALIZED_COORDS_MAX);
        let (tlx, tly) = normalized_to_screen(clamp(min.x), clamp(max.y), self.width(), self.height());
        let (brx, bry) = normalized_to_screen(clamp(max.x), clamp(min.y), self.width(), self.height());

        //we add 1 to round it up so the box completly fills the triangle otherwise some triangles will render weirdly
        Some(BoundingBox::new(tlx, tly, brx - tlx + 1, bry - tly + 1))
    }

    fn frame_blocks_in_bounding_box(
        &self,
        bounding_box: &BoundingBox,
    ) -> impl Iterator<Item = usize> {
        let blocks_width = self.blocks_width;
        let last_column = self.blocks_width - 1;
        let last_row = self.blocks_height - 1;
        let left_block = (bounding_box.x() / Self::BLOCK_SIZE).min(last_column);
        let right_block = (bounding_box.right() / Self::BLOCK_SIZE).min(last_column);
        let top_block = (bounding_box.y() / Self::BLOCK_SIZE).min(last_row);
        let bot_block = (bounding_box.bottom() / Self::BLOCK_SIZE).min(last_row);

        (top_block..=bot_block)
            .cartesian_product(left_block..=right_block)
            .map(move |(y, x)| (x + y * blocks_width) as usize)
    }
}

fn signed_area(vertices: &[Vec3; 3]) -> f32 {
    let e1 = vertices[1] - vertices[0];
    let e2 = vertices[2] - vertices[0];
    e1.x * e2.y - e2.x * e1.y
}

fn perspective_correct(screen_ratios: Vec3, inv_w: [f32; 3]) -> Vec3 {
    let weighted = screen_ratios * Vec3::from(inv_w);
    let sum = weighted.x + weighted.y + weighted.z;
    if sum.abs() <= f32::EPSILON {
        screen_ratios
    } else {
        weighted / sum
    }
}

fn normalized_to_screen(mut x: f32, mut y: f32, width: u32, height: u32) -> (u32, u32) {
    x = (x + 1.0) / 2.0;
    y = (-y + 1.0) / 2.0;
    let screen_x = ((x * width as f32) as u32).min(width - 1);
    let screen_y = ((y * height as f32) as u32).min(height - 1);
    (screen_x, screen_y)
}

// Pixel centers
fn screen_to_normalized(x: u32, y: u32, width: u32, height: u32) -> Vec2 {
    let normalized_x = ((x as f32 + 0.5) / width as f32) * 2.0 - 1.0;
    let normalized_y = -(((y as f32 + 0.5) / height as f32) * 2.0 - 1.0);
    Vec2::new(normalized_x, normalized_y)
}
