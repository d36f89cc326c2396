//! Graphics device seam.
//!
//! The frame controller and pass assembler talk to the device only through
//! [`GraphicsDevice`]. Two implementations ship:
//! - [`WgpuDevice`]: window surface + wgpu pipelines
//! - [`RecordingDevice`]: headless, keeps buffer bytes in memory and records
//!   every call; used by tests and tooling

use std::ops::Range;

use crate::color::Color;
use crate::error::RenderError;
use crate::vertex::DrawUniforms;

mod frame;
mod gpu;
mod init;
mod pipelines;
mod recording;
mod surface;
mod uniforms;

pub use surface::SurfaceErrorAction;
pub use gpu::WgpuDevice;
pub use init::GpuInit;
pub use recording::{DeviceCall, RecordingDevice};

/// Device-resident buffer created through [`GraphicsDevice::create_buffer`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct BufferId(pub u32);

/// Opaque texture reference. Textures are created by whoever owns the assets;
/// the renderer only passes handles through to binds.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub u64);

/// How a stream buffer is bound at draw time.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BufferUsage {
    /// Read-only storage buffer indexed by `instance_index`.
    Instance,
    Vertex,
    /// 32-bit indices.
    Index,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum PipelineKind {
    Sprite,
    WorldGeometry,
    Line,
    UiGeometry,
    UiText,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum PassKind {
    /// Clears color and depth; depth-tested.
    World { clear: Color },
    /// Loads color; no depth attachment.
    Ui,
}

/// Operations the renderer needs from a graphics backend.
///
/// Calls arrive in a fixed shape each frame:
/// `begin_commands`, `acquire_surface`, one copy pass with uploads, two render
/// passes, `submit`. Binds and draws only happen inside a render pass.
pub trait GraphicsDevice {
    /// Creates a buffer of `size` bytes that can be uploaded to and bound as `usage`.
    fn create_buffer(
        &mut self,
        label: &'static str,
        usage: BufferUsage,
        size: u64,
    ) -> Result<BufferId, RenderError>;

    fn release_buffer(&mut self, buffer: BufferId);

    /// Starts a command recording context. `false` when none can be acquired.
    fn begin_commands(&mut self) -> bool;

    /// Acquires the presentation target. May block. `false` skips the frame.
    fn acquire_surface(&mut self) -> bool;

    /// Drawable size in physical pixels.
    fn surface_size(&self) -> (u32, u32);

    /// Handles a window resize. Backends without a surface ignore it.
    fn resize(&mut self, _width: u32, _height: u32) {}

    fn begin_copy_pass(&mut self);

    /// Copies `data` into `dst` at `offset`. Only valid inside a copy pass.
    fn upload(&mut self, dst: BufferId, offset: u64, data: &[u8]);

    fn end_copy_pass(&mut self);

    fn begin_render_pass(&mut self, pass: PassKind);

    fn end_render_pass(&mut self);

    fn bind_pipeline(&mut self, pipeline: PipelineKind);

    fn bind_texture(&mut self, texture: TextureHandle);

    fn bind_instance_buffer(&mut self, buffer: BufferId);

    fn bind_vertex_buffer(&mut self, buffer: BufferId, offset: u64);

    fn bind_index_buffer(&mut self, buffer: BufferId, offset: u64);

    /// Sets the uniform block for subsequent draws.
    fn push_uniforms(&mut self, uniforms: &DrawUniforms);

    fn draw(&mut self, vertices: Range<u32>, instances: Range<u32>);

    fn draw_indexed(&mut self, indices: Range<u32>, base_vertex: i32);

    /// Submits recorded work and presents the surface if one was acquired.
    fn submit(&mut self);
}

impl<D: GraphicsDevice + ?Sized> GraphicsDevice for &mut D {
    fn create_buffer(
        &mut self,
        label: &'static str,
        usage: BufferUsage,
        size: u64,
    ) -> Result<BufferId, RenderError> {
        (**self).create_buffer(label, usage, size)
    }

    fn release_buffer(&mut self, buffer: BufferId) {
        (**self).release_buffer(buffer)
    }

    fn begin_commands(&mut self) -> bool {
        (**self).begin_commands()
    }

    fn acquire_surface(&mut self) -> bool {
        (**self).acquire_surface()
    }

    fn surface_size(&self) -> (u32, u32) {
        (**self).surface_size()
    }

    fn resize(&mut self, width: u32, height: u32) {
        (**self).resize(width, height)
    }

    fn begin_copy_pass(&mut self) {
        (**self).begin_copy_pass()
    }

    fn upload(&mut self, dst: BufferId, offset: u64, data: &[u8]) {
        (**self).upload(dst, offset, data)
    }

    fn end_copy_pass(&mut self) {
        (**self).end_copy_pass()
    }

    fn begin_render_pass(&mut self, pass: PassKind) {
        (**self).begin_render_pass(pass)
    }

    fn end_render_pass(&mut self) {
        (**self).end_render_pass()
    }

    fn bind_pipeline(&mut self, pipeline: PipelineKind) {
        (**self).bind_pipeline(pipeline)
    }

    fn bind_texture(&mut self, texture: TextureHandle) {
        (**self).bind_texture(texture)
    }

    fn bind_instance_buffer(&mut self, buffer: BufferId) {
        (**self).bind_instance_buffer(buffer)
    }

    fn bind_vertex_buffer(&mut self, buffer: BufferId, offset: u64) {
        (**self).bind_vertex_buffer(buffer, offset)
    }

    fn bind_index_buffer(&mut self, buffer: BufferId, offset: u64) {
        (**self).bind_index_buffer(buffer, offset)
    }

    fn push_uniforms(&mut self, uniforms: &DrawUniforms) {
        (**self).push_uniforms(uniforms)
    }

    fn draw(&mut self, vertices: Range<u32>, instances: Range<u32>) {
        (**self).draw(vertices, instances)
    }

    fn draw_indexed(&mut self, indices: Range<u32>, base_vertex: i32) {
        (**self).draw_indexed(indices, base_vertex)
    }

    fn submit(&mut self) {
        (**self).submit()
    }
}
