use std::collections::HashMap;
use std::ops::Range;

use anyhow::{Context, Result};
use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::error::RenderError;
use crate::vertex::DrawUniforms;

use super::frame::{FrameRecording, SurfaceTarget};
use super::pipelines::Pipelines;
use super::surface::{self, DepthTarget};
use super::uniforms::UniformArena;
use super::{
    BufferId, BufferUsage, GpuInit, GraphicsDevice, PassKind, PipelineKind, SurfaceErrorAction,
    TextureHandle,
};

struct StreamBuffer {
    buffer: wgpu::Buffer,
    /// Storage bind group, only for [`BufferUsage::Instance`] buffers.
    instance_bind_group: Option<wgpu::BindGroup>,
}

struct TextureEntry {
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
    size: (u32, u32),
}

/// wgpu implementation of [`GraphicsDevice`] bound to a window surface.
///
/// Owns the instance/adapter/device/queue, the configured surface, a depth
/// target, one pipeline per [`PipelineKind`] and every texture registered
/// through [`create_texture_rgba8`](Self::create_texture_rgba8).
pub struct WgpuDevice<'w> {
    /// Kept alive for the surface.
    _instance: wgpu::Instance,

    /// Surface lifetime is tied to the window via `'w`.
    surface: wgpu::Surface<'w>,

    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,

    config: wgpu::SurfaceConfiguration,
    size: PhysicalSize<u32>,
    present_modes: Vec<wgpu::PresentMode>,
    depth: DepthTarget,

    pipelines: Pipelines,
    uniforms: UniformArena,
    sampler: wgpu::Sampler,

    buffers: Vec<Option<StreamBuffer>>,
    textures: HashMap<TextureHandle, TextureEntry>,
    next_texture: u64,

    frame: Option<FrameRecording>,
    pass: Option<wgpu::RenderPass<'static>>,
    /// Set when the uniform arena overflowed; draws are skipped until the next push fits.
    skip_draws: bool,
    lost: bool,
}

impl<'w> WgpuDevice<'w> {
    /// Creates a device bound to `window`.
    ///
    /// Adapter/device acquisition is asynchronous under wgpu. Any bring-up
    /// failure is reported as [`RenderError::DeviceUnavailable`].
    pub async fn new(window: &'w Window, init: GpuInit) -> Result<Self, RenderError> {
        Self::bring_up(window, init).await.map_err(RenderError::from)
    }

    async fn bring_up(window: &'w Window, init: GpuInit) -> Result<Self> {
        let size = window.inner_size();
        anyhow::ensure!(size.width > 0 && size.height > 0, "window has zero size");

        let GpuInit {
            prefer_srgb,
            present_mode,
            alpha_mode,
            required_features,
            required_limits,
            desired_maximum_frame_latency,
            max_draws_per_frame,
        } = init;

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window)
            .context("failed to create wgpu surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("failed to find a suitable GPU adapter")?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("miso device"),
                required_features,
                required_limits,
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .context("failed to create wgpu device/queue")?;

        let caps = surface.get_capabilities(&adapter);
        let format = surface::choose_surface_format(&caps, prefer_srgb)
            .context("no supported surface formats")?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width,
            height: size.height,
            present_mode: surface::choose_present_mode(&caps.present_modes, present_mode),
            alpha_mode: surface::choose_alpha_mode(&caps, alpha_mode),
            view_formats: vec![],
            desired_maximum_frame_latency,
        };
        surface.configure(&device, &config);

        let depth = DepthTarget::new(&device, size.width, size.height);
        let uniforms = UniformArena::new(&device, max_draws_per_frame);
        let pipelines = Pipelines::new(&device, format, &uniforms.bind_group_layout);

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("miso nearest sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            ..Default::default()
        });

        log::info!(
            "wgpu device: {} ({:?}), surface {:?} {}x{} {:?}",
            adapter.get_info().name,
            adapter.get_info().backend,
            format,
            size.width,
            size.height,
            config.present_mode,
        );

        Ok(Self {
            _instance: instance,
            surface,
            adapter,
            device,
            queue,
            config,
            size,
            present_modes: caps.present_modes,
            depth,
            pipelines,
            uniforms,
            sampler,
            buffers: Vec::new(),
            textures: HashMap::new(),
            next_texture: 1,
            frame: None,
            pass: None,
            skip_draws: false,
            lost: false,
        })
    }

    /// Returns the active surface format.
    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    pub fn adapter_info(&self) -> wgpu::AdapterInfo {
        self.adapter.get_info()
    }

    /// `true` after an unrecoverable surface error; the owner should shut down.
    pub fn is_lost(&self) -> bool {
        self.lost
    }

    pub fn present_mode(&self) -> wgpu::PresentMode {
        self.config.present_mode
    }

    /// Switches present mode, falling back to FIFO when unsupported.
    ///
    /// Returns the mode actually applied.
    pub fn set_present_mode(&mut self, mode: wgpu::PresentMode) -> wgpu::PresentMode {
        let chosen = surface::choose_present_mode(&self.present_modes, mode);
        if chosen != self.config.present_mode {
            self.config.present_mode = chosen;
            if self.size.width > 0 && self.size.height > 0 {
                self.surface.configure(&self.device, &self.config);
            }
        }
        chosen
    }

    // ── textures ──────────────────────────────────────────────────────────

    /// Uploads an RGBA8 (sRGB) image and returns a handle usable in sprite and text draws.
    pub fn create_texture_rgba8(
        &mut self,
        label: &str,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> Result<TextureHandle> {
        anyhow::ensure!(width > 0 && height > 0, "texture '{label}' has zero size");
        anyhow::ensure!(
            pixels.len() == (width * height * 4) as usize,
            "texture '{label}': expected {} bytes, got {}",
            width * height * 4,
            pixels.len()
        );

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &self.pipelines.texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });

        let handle = TextureHandle(self.next_texture);
        self.next_texture += 1;
        self.textures.insert(
            handle,
            TextureEntry {
                texture,
                bind_group,
                size: (width, height),
            },
        );

        self.write_texture_region(handle, 0, 0, width, height, pixels)?;
        Ok(handle)
    }

    /// Overwrites a sub-rectangle of a texture created by this device.
    pub fn write_texture_region(
        &mut self,
        handle: TextureHandle,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> Result<()> {
        let entry = self
            .textures
            .get(&handle)
            .with_context(|| format!("unknown texture {handle:?}"))?;
        anyhow::ensure!(
            x + width <= entry.size.0 && y + height <= entry.size.1,
            "region {x},{y} {width}x{height} outside texture {handle:?}"
        );
        anyhow::ensure!(
            pixels.len() == (width * height * 4) as usize,
            "region {width}x{height}: expected {} bytes, got {}",
            width * height * 4,
            pixels.len()
        );

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &entry.texture,
                mip_level: 0,
                origin: wgpu::Origin3d { x, y, z: 0 },
                aspect: wgpu::TextureAspect::All,
            },
            pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * 4),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    pub fn texture_size(&self, handle: TextureHandle) -> Option<(u32, u32)> {
        self.textures.get(&handle).map(|t| t.size)
    }

    pub fn release_texture(&mut self, handle: TextureHandle) {
        self.textures.remove(&handle);
    }

    // ── internals ─────────────────────────────────────────────────────────

    fn handle_surface_error(&mut self, err: wgpu::SurfaceError) -> SurfaceErrorAction {
        let action = surface::map_surface_error(&self.surface, &self.device, &self.config, &err);
        match action {
            SurfaceErrorAction::Reconfigured => log::debug!("surface {err:?}; reconfigured"),
            SurfaceErrorAction::SkipFrame => log::debug!("surface {err:?}; skipping frame"),
            SurfaceErrorAction::Fatal => {
                log::error!("surface acquire failed fatally: {err:?}");
                self.lost = true;
            }
        }
        action
    }

    fn stream_buffer(&self, id: BufferId) -> Option<&StreamBuffer> {
        self.buffers.get(id.0 as usize)?.as_ref()
    }
}

impl GraphicsDevice for WgpuDevice<'_> {
    fn create_buffer(
        &mut self,
        label: &'static str,
        usage: BufferUsage,
        size: u64,
    ) -> Result<BufferId, RenderError> {
        let max = self.device.limits().max_buffer_size;
        if size > max {
            return Err(RenderError::BufferCreation {
                label,
                size,
                reason: format!("exceeds device max_buffer_size ({max})"),
            });
        }

        let usages = match usage {
            BufferUsage::Instance => wgpu::BufferUsages::STORAGE,
            BufferUsage::Vertex => wgpu::BufferUsages::VERTEX,
            BufferUsage::Index => wgpu::BufferUsages::INDEX,
        } | wgpu::BufferUsages::COPY_DST;

        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage: usages,
            mapped_at_creation: false,
        });

        let instance_bind_group = (usage == BufferUsage::Instance).then(|| {
            self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout: &self.pipelines.instance_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer.as_entire_binding(),
                }],
            })
        });

        let id = BufferId(self.buffers.len() as u32);
        self.buffers.push(Some(StreamBuffer {
            buffer,
            instance_bind_group,
        }));
        Ok(id)
    }

    fn release_buffer(&mut self, buffer: BufferId) {
        if let Some(slot) = self.buffers.get_mut(buffer.0 as usize) {
            if let Some(b) = slot.take() {
                b.buffer.destroy();
            }
        }
    }

    fn begin_commands(&mut self) -> bool {
        if self.lost {
            return false;
        }
        let encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("miso frame encoder"),
            });
        self.uniforms.reset();
        self.skip_draws = false;
        self.frame = Some(FrameRecording {
            encoder,
            target: None,
        });
        true
    }

    fn acquire_surface(&mut self) -> bool {
        if self.size.width == 0 || self.size.height == 0 {
            return false;
        }
        let Some(frame) = self.frame.as_mut() else {
            return false;
        };

        match self.surface.get_current_texture() {
            Ok(texture) => {
                let view = texture
                    .texture
                    .create_view(&wgpu::TextureViewDescriptor::default());
                frame.target = Some(SurfaceTarget { texture, view });
                true
            }
            Err(err) => {
                self.handle_surface_error(err);
                false
            }
        }
    }

    fn surface_size(&self) -> (u32, u32) {
        (self.size.width, self.size.height)
    }

    /// wgpu does not support configuring a 0x0 surface; the size is recorded and
    /// configuration deferred until the window is restored.
    fn resize(&mut self, width: u32, height: u32) {
        self.size = PhysicalSize::new(width, height);
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        self.depth = DepthTarget::new(&self.device, width, height);
    }

    fn begin_copy_pass(&mut self) {}

    fn upload(&mut self, dst: BufferId, offset: u64, data: &[u8]) {
        let Some(target) = self.stream_buffer(dst) else {
            log::warn!("upload into unknown buffer {dst:?}");
            return;
        };
        self.queue.write_buffer(&target.buffer, offset, data);
    }

    fn end_copy_pass(&mut self) {}

    fn begin_render_pass(&mut self, pass: PassKind) {
        self.pass = None;
        let Some(frame) = self.frame.as_mut() else { return };
        let Some(target) = frame.target.as_ref() else { return };

        let (label, load, depth) = match pass {
            PassKind::World { clear } => (
                "miso world pass",
                wgpu::LoadOp::Clear(clear.into()),
                Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
            ),
            PassKind::Ui => ("miso ui pass", wgpu::LoadOp::Load, None),
        };

        let rpass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &target.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: depth,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        // The pass is ended explicitly in `end_render_pass`, before the encoder is finished.
        self.pass = Some(rpass.forget_lifetime());
    }

    fn end_render_pass(&mut self) {
        self.pass = None;
    }

    fn bind_pipeline(&mut self, pipeline: PipelineKind) {
        if let Some(pass) = self.pass.as_mut() {
            pass.set_pipeline(self.pipelines.get(pipeline));
        }
    }

    fn bind_texture(&mut self, texture: TextureHandle) {
        let Some(pass) = self.pass.as_mut() else { return };
        match self.textures.get(&texture) {
            Some(entry) => pass.set_bind_group(1, &entry.bind_group, &[]),
            None => log::warn!("bind of unknown texture {texture:?}"),
        }
    }

    fn bind_instance_buffer(&mut self, buffer: BufferId) {
        let Some(pass) = self.pass.as_mut() else { return };
        let bind_group = self
            .buffers
            .get(buffer.0 as usize)
            .and_then(Option::as_ref)
            .and_then(|b| b.instance_bind_group.as_ref());
        if let Some(bg) = bind_group {
            pass.set_bind_group(2, bg, &[]);
        }
    }

    fn bind_vertex_buffer(&mut self, buffer: BufferId, offset: u64) {
        let Some(pass) = self.pass.as_mut() else { return };
        if let Some(Some(b)) = self.buffers.get(buffer.0 as usize) {
            pass.set_vertex_buffer(0, b.buffer.slice(offset..));
        }
    }

    fn bind_index_buffer(&mut self, buffer: BufferId, offset: u64) {
        let Some(pass) = self.pass.as_mut() else { return };
        if let Some(Some(b)) = self.buffers.get(buffer.0 as usize) {
            pass.set_index_buffer(b.buffer.slice(offset..), wgpu::IndexFormat::Uint32);
        }
    }

    fn push_uniforms(&mut self, uniforms: &DrawUniforms) {
        let Some(pass) = self.pass.as_mut() else { return };
        match self.uniforms.push(uniforms) {
            Some(offset) => {
                pass.set_bind_group(0, &self.uniforms.bind_group, &[offset]);
                self.skip_draws = false;
            }
            None => self.skip_draws = true,
        }
    }

    fn draw(&mut self, vertices: Range<u32>, instances: Range<u32>) {
        if self.skip_draws {
            return;
        }
        if let Some(pass) = self.pass.as_mut() {
            pass.draw(vertices, instances);
        }
    }

    fn draw_indexed(&mut self, indices: Range<u32>, base_vertex: i32) {
        if self.skip_draws {
            return;
        }
        if let Some(pass) = self.pass.as_mut() {
            pass.draw_indexed(indices, base_vertex, 0..1);
        }
    }

    fn submit(&mut self) {
        self.pass = None;
        let Some(frame) = self.frame.take() else { return };

        self.uniforms.upload(&self.queue);
        self.queue.submit(std::iter::once(frame.encoder.finish()));

        if let Some(target) = frame.target {
            drop(target.view);
            target.texture.present();
        }
    }
}
