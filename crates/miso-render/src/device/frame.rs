/// Per-frame wgpu state between `begin_commands` and `submit`.
///
/// Holding the surface texture prevents acquisition of subsequent frames, so
/// this never outlives one frame.
pub(crate) struct FrameRecording {
    pub encoder: wgpu::CommandEncoder,
    pub target: Option<SurfaceTarget>,
}

pub(crate) struct SurfaceTarget {
    pub texture: wgpu::SurfaceTexture,
    pub view: wgpu::TextureView,
}
