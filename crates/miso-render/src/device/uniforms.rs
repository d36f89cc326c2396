//! Per-frame arena for [`DrawUniforms`].
//!
//! Every draw gets its own slot in one uniform buffer, selected with a dynamic
//! offset. The whole arena is written with a single `write_buffer` right before
//! submit.

use crate::vertex::DrawUniforms;

/// CPU side of the arena: fixed-stride slots, reset every frame.
#[derive(Debug)]
pub(crate) struct UniformStaging {
    bytes: Vec<u8>,
    stride: u32,
    capacity: u32,
    len: u32,
}

impl UniformStaging {
    /// `alignment` is the device's dynamic-offset alignment.
    pub fn new(alignment: u32, capacity: u32) -> Self {
        let stride = (size_of::<DrawUniforms>() as u32).next_multiple_of(alignment.max(1));
        Self {
            bytes: Vec::with_capacity((stride * capacity) as usize),
            stride,
            capacity,
            len: 0,
        }
    }

    pub fn reset(&mut self) {
        self.bytes.clear();
        self.len = 0;
    }

    /// Appends a slot. Returns its byte offset, or `None` when the arena is full.
    pub fn push(&mut self, uniforms: &DrawUniforms) -> Option<u32> {
        if self.len >= self.capacity {
            return None;
        }
        let offset = self.len * self.stride;
        self.bytes.extend_from_slice(bytemuck::bytes_of(uniforms));
        self.bytes.resize((offset + self.stride) as usize, 0);
        self.len += 1;
        Some(offset)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn size_bytes(&self) -> u64 {
        self.stride as u64 * self.capacity as u64
    }
}

pub(crate) struct UniformArena {
    staging: UniformStaging,
    buffer: wgpu::Buffer,
    pub bind_group_layout: wgpu::BindGroupLayout,
    pub bind_group: wgpu::BindGroup,
    warned: bool,
}

impl UniformArena {
    pub fn new(device: &wgpu::Device, capacity: u32) -> Self {
        let alignment = device.limits().min_uniform_buffer_offset_alignment;
        let staging = UniformStaging::new(alignment, capacity.max(1));

        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("miso draw uniforms"),
            size: staging.size_bytes(),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("miso draw uniforms bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: wgpu::BufferSize::new(size_of::<DrawUniforms>() as u64),
                },
                count: None,
            }],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("miso draw uniforms bind group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(size_of::<DrawUniforms>() as u64),
                }),
            }],
        });

        Self {
            staging,
            buffer,
            bind_group_layout,
            bind_group,
            warned: false,
        }
    }

    pub fn reset(&mut self) {
        self.staging.reset();
    }

    /// Stages `uniforms` and returns the dynamic offset to bind them with.
    pub fn push(&mut self, uniforms: &DrawUniforms) -> Option<u32> {
        let offset = self.staging.push(uniforms);
        if offset.is_none() && !std::mem::replace(&mut self.warned, true) {
            log::warn!("draw uniform arena full; skipping draws until next frame");
        }
        offset
    }

    /// Writes staged slots to the device buffer.
    pub fn upload(&mut self, queue: &wgpu::Queue) {
        if !self.staging.bytes().is_empty() {
            queue.write_buffer(&self.buffer, 0, self.staging.bytes());
        }
        self.warned = false;
    }
}
