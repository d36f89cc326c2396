/// Surface and device preferences for [`WgpuDevice`](super::WgpuDevice).
#[derive(Debug, Clone)]
pub struct GpuInit {
    /// Prefer an sRGB surface format when available.
    pub prefer_srgb: bool,

    /// Requested present mode; surfaces without it fall back to FIFO.
    pub present_mode: wgpu::PresentMode,

    /// Composite alpha mode; `None` or an unsupported mode picks the surface's first.
    pub alpha_mode: Option<wgpu::CompositeAlphaMode>,

    pub required_features: wgpu::Features,

    pub required_limits: wgpu::Limits,

    /// Swapchain latency hint passed to the surface configuration.
    pub desired_maximum_frame_latency: u32,

    /// Draws per frame the uniform arena can hold.
    ///
    /// Each draw takes one uniform slot of 96 bytes rounded up to the device's
    /// dynamic offset alignment. Draws past this are skipped with a warning.
    pub max_draws_per_frame: u32,
}

impl Default for GpuInit {
    fn default() -> Self {
        Self {
            prefer_srgb: true,
            present_mode: wgpu::PresentMode::Mailbox,
            alpha_mode: None,
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            desired_maximum_frame_latency: 2,
            max_draws_per_frame: 16_384,
        }
    }
}
