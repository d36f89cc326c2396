//! GPU-facing data layouts.
//!
//! Every type here is `#[repr(C)]` + `Pod` so it can be written into an
//! [`UploadStream`](crate::stream::UploadStream) with `bytemuck::cast_slice`.
//! Sizes are fixed by the shaders in `device/shaders/` and checked in tests.

use bytemuck::{Pod, Zeroable};

use crate::color::Color;

/// Column-major 4×4 matrix, laid out exactly like a WGSL `mat4x4<f32>`.
pub type Mat4 = [f32; 16];

pub const IDENTITY: Mat4 = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    0.0, 0.0, 0.0, 1.0,
];

/// Orthographic pixel projection with a top-left origin and y pointing down.
///
/// Maps `(0, 0)` to clip `(-1, 1)` and `(width, height)` to clip `(1, -1)`.
/// A zero dimension is treated as 1 so the matrix stays finite while minimized.
pub fn screen_projection(width: u32, height: u32) -> Mat4 {
    let w = width.max(1) as f32;
    let h = height.max(1) as f32;
    [
        2.0 / w, 0.0, 0.0, 0.0, //
        0.0, -2.0 / h, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
        -1.0, 1.0, 0.0, 1.0,
    ]
}

/// Orthographic projection for world space.
///
/// `near`/`far` map to clip depth `0` / `1`, matching the world pass depth test
/// (`LessEqual`, cleared to `1.0`).
pub fn orthographic(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
    let rl = right - left;
    let tb = top - bottom;
    let fnr = far - near;
    [
        2.0 / rl, 0.0, 0.0, 0.0, //
        0.0, 2.0 / tb, 0.0, 0.0, //
        0.0, 0.0, 1.0 / fnr, 0.0, //
        -(right + left) / rl,
        -(top + bottom) / tb,
        -near / fnr,
        1.0,
    ]
}

/// One instanced sprite quad.
///
/// `flags` is a float so the whole struct stays `f32`-typed for the storage
/// buffer; any value above `0.5` enables the water wave in the sprite shader.
/// `(u, v, uw, vh)` selects the texture sub-rectangle in normalized coordinates.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct SpriteInstance {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub flags: f32,
    pub w: f32,
    pub h: f32,
    pub tile_x: f32,
    pub tile_y: f32,
    pub u: f32,
    pub v: f32,
    pub uw: f32,
    pub vh: f32,
}

impl SpriteInstance {
    pub const WATER: f32 = 1.0;
}

/// Size in bytes of one [`SpriteInstance`] in the instance stream.
pub const SPRITE_INSTANCE_SIZE: u32 = std::mem::size_of::<SpriteInstance>() as u32;

/// Colored triangle-list vertex shared by world and UI geometry.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 2],
    pub color: Color,
    pub tex_coord: [f32; 2],
}

impl Vertex {
    #[inline]
    pub const fn new(x: f32, y: f32, color: Color) -> Self {
        Self {
            position: [x, y],
            color,
            tex_coord: [0.0, 0.0],
        }
    }

    pub const ATTRIBUTES: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x4, 2 => Float32x2];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Self>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// World-space line endpoint.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct LineVertex {
    pub position: [f32; 3],
}

impl LineVertex {
    #[inline]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self {
            position: [x, y, z],
        }
    }

    pub const ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x3];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Self>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Screen-space glyph vertex: pixel position plus atlas UV.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct TextVertex {
    pub position: [f32; 2],
    pub uv: [f32; 2],
}

impl TextVertex {
    #[inline]
    pub const fn new(x: f32, y: f32, u: f32, v: f32) -> Self {
        Self {
            position: [x, y],
            uv: [u, v],
        }
    }

    pub const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Self>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Water animation parameters pushed with every sprite batch.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct WaterParams {
    /// Seconds since start.
    pub time: f32,
    /// Wave cycles per second.
    pub speed: f32,
    /// Vertical displacement as a fraction of sprite height.
    pub amplitude: f32,
    /// Phase offset per tile step.
    pub phase: f32,
}

impl WaterParams {
    #[inline]
    pub const fn new(time: f32, speed: f32, amplitude: f32, phase: f32) -> Self {
        Self {
            time,
            speed,
            amplitude,
            phase,
        }
    }

    #[inline]
    pub const fn to_array(self) -> [f32; 4] {
        [self.time, self.speed, self.amplitude, self.phase]
    }
}

/// Per-draw uniform block (group 0, binding 0 in every shader).
///
/// `params` carries the water parameters for sprites and is zero elsewhere.
/// `color` tints lines and text.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct DrawUniforms {
    pub transform: Mat4,
    pub params: [f32; 4],
    pub color: [f32; 4],
}

impl DrawUniforms {
    pub fn transform(transform: Mat4) -> Self {
        Self {
            transform,
            params: [0.0; 4],
            color: Color::WHITE.to_array(),
        }
    }

    pub fn tinted(transform: Mat4, color: Color) -> Self {
        Self {
            color: color.to_array(),
            ..Self::transform(transform)
        }
    }
}
