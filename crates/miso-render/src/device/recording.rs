use std::ops::Range;

use crate::error::RenderError;
use crate::vertex::DrawUniforms;

use super::{BufferId, BufferUsage, GraphicsDevice, PassKind, PipelineKind, TextureHandle};

/// One call made against a [`RecordingDevice`].
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    BeginCommands,
    AcquireSurface { acquired: bool },
    BeginCopyPass,
    Upload { buffer: BufferId, offset: u64, len: usize },
    EndCopyPass,
    BeginRenderPass(PassKind),
    EndRenderPass,
    BindPipeline(PipelineKind),
    BindTexture(TextureHandle),
    BindInstanceBuffer(BufferId),
    BindVertexBuffer { buffer: BufferId, offset: u64 },
    BindIndexBuffer { buffer: BufferId, offset: u64 },
    PushUniforms(DrawUniforms),
    Draw { vertices: Range<u32>, instances: Range<u32> },
    DrawIndexed { indices: Range<u32>, base_vertex: i32 },
    Submit,
}

#[derive(Debug)]
struct RecordedBuffer {
    label: &'static str,
    usage: BufferUsage,
    bytes: Vec<u8>,
}

/// Headless [`GraphicsDevice`].
///
/// Buffers are plain byte vectors so uploaded data can be read back, and every
/// call is appended to a log that tests assert against.
#[derive(Debug)]
pub struct RecordingDevice {
    buffers: Vec<Option<RecordedBuffer>>,
    calls: Vec<DeviceCall>,
    size: (u32, u32),
    surface_available: bool,
    commands_available: bool,
    lost: bool,
    submissions: usize,
}

impl RecordingDevice {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            buffers: Vec::new(),
            calls: Vec::new(),
            size: (width, height),
            surface_available: true,
            commands_available: true,
            lost: false,
            submissions: 0,
        }
    }

    /// Makes subsequent `acquire_surface` calls fail (e.g. minimized window).
    pub fn set_surface_available(&mut self, available: bool) {
        self.surface_available = available;
    }

    pub fn set_commands_available(&mut self, available: bool) {
        self.commands_available = available;
    }

    /// Makes buffer creation fail as it would on a lost adapter.
    pub fn set_lost(&mut self, lost: bool) {
        self.lost = lost;
    }

    pub fn calls(&self) -> &[DeviceCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Number of calls matching `pred`.
    pub fn count(&self, pred: impl Fn(&DeviceCall) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    pub fn submissions(&self) -> usize {
        self.submissions
    }

    /// Device-side contents of a live buffer.
    pub fn buffer_bytes(&self, buffer: BufferId) -> Option<&[u8]> {
        self.buffers
            .get(buffer.0 as usize)?
            .as_ref()
            .map(|b| b.bytes.as_slice())
    }

    pub fn buffer_label(&self, buffer: BufferId) -> Option<&'static str> {
        self.buffers.get(buffer.0 as usize)?.as_ref().map(|b| b.label)
    }

    pub fn buffer_usage(&self, buffer: BufferId) -> Option<BufferUsage> {
        self.buffers.get(buffer.0 as usize)?.as_ref().map(|b| b.usage)
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.iter().flatten().count()
    }
}

impl GraphicsDevice for RecordingDevice {
    fn create_buffer(
        &mut self,
        label: &'static str,
        usage: BufferUsage,
        size: u64,
    ) -> Result<BufferId, RenderError> {
        if self.lost {
            return Err(anyhow::anyhow!("adapter lost while creating {label}").into());
        }
        let len = usize::try_from(size).map_err(|_| RenderError::BufferCreation {
            label,
            size,
            reason: "size does not fit in host memory".into(),
        })?;

        let id = BufferId(self.buffers.len() as u32);
        self.buffers.push(Some(RecordedBuffer {
            label,
            usage,
            bytes: vec![0; len],
        }));
        Ok(id)
    }

    fn release_buffer(&mut self, buffer: BufferId) {
        if let Some(slot) = self.buffers.get_mut(buffer.0 as usize) {
            *slot = None;
        }
    }

    fn begin_commands(&mut self) -> bool {
        self.calls.push(DeviceCall::BeginCommands);
        self.commands_available
    }

    fn acquire_surface(&mut self) -> bool {
        let acquired = self.surface_available;
        self.calls.push(DeviceCall::AcquireSurface { acquired });
        acquired
    }

    fn surface_size(&self) -> (u32, u32) {
        self.size
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.size = (width, height);
    }

    fn begin_copy_pass(&mut self) {
        self.calls.push(DeviceCall::BeginCopyPass);
    }

    fn upload(&mut self, dst: BufferId, offset: u64, data: &[u8]) {
        self.calls.push(DeviceCall::Upload {
            buffer: dst,
            offset,
            len: data.len(),
        });

        let Some(Some(buf)) = self.buffers.get_mut(dst.0 as usize) else {
            log::warn!("upload into unknown buffer {dst:?}");
            return;
        };
        let start = offset as usize;
        let Some(region) = buf.bytes.get_mut(start..start + data.len()) else {
            log::warn!(
                "upload of {} bytes at {offset} overruns {} ({} bytes)",
                data.len(),
                buf.label,
                buf.bytes.len()
            );
            return;
        };
        region.copy_from_slice(data);
    }

    fn end_copy_pass(&mut self) {
        self.calls.push(DeviceCall::EndCopyPass);
    }

    fn begin_render_pass(&mut self, pass: PassKind) {
        self.calls.push(DeviceCall::BeginRenderPass(pass));
    }

    fn end_render_pass(&mut self) {
        self.calls.push(DeviceCall::EndRenderPass);
    }

    fn bind_pipeline(&mut self, pipeline: PipelineKind) {
        self.calls.push(DeviceCall::BindPipeline(pipeline));
    }

    fn bind_texture(&mut self, texture: TextureHandle) {
        self.calls.push(DeviceCall::BindTexture(texture));
    }

    fn bind_instance_buffer(&mut self, buffer: BufferId) {
        self.calls.push(DeviceCall::BindInstanceBuffer(buffer));
    }

    fn bind_vertex_buffer(&mut self, buffer: BufferId, offset: u64) {
        self.calls.push(DeviceCall::BindVertexBuffer { buffer, offset });
    }

    fn bind_index_buffer(&mut self, buffer: BufferId, offset: u64) {
        self.calls.push(DeviceCall::BindIndexBuffer { buffer, offset });
    }

    fn push_uniforms(&mut self, uniforms: &DrawUniforms) {
        self.calls.push(DeviceCall::PushUniforms(*uniforms));
    }

    fn draw(&mut self, vertices: Range<u32>, instances: Range<u32>) {
        self.calls.push(DeviceCall::Draw {
            vertices,
            instances,
        });
    }

    fn draw_indexed(&mut self, indices: Range<u32>, base_vertex: i32) {
        self.calls.push(DeviceCall::DrawIndexed {
            indices,
            base_vertex,
        });
    }

    fn submit(&mut self) {
        self.calls.push(DeviceCall::Submit);
        self.submissions += 1;
    }
}
