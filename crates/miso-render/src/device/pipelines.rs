//! Render pipelines for every [`PipelineKind`].
//!
//! Bind group slots are shared across pipelines:
//! - group 0: per-draw uniforms (dynamic offset)
//! - group 1: texture + sampler (sprites, text)
//! - group 2: sprite instance storage buffer

use crate::vertex::{LineVertex, TextVertex, Vertex};

use super::PipelineKind;
use super::surface::DEPTH_FORMAT;

pub(crate) struct Pipelines {
    sprite: wgpu::RenderPipeline,
    world_geometry: wgpu::RenderPipeline,
    line: wgpu::RenderPipeline,
    ui_geometry: wgpu::RenderPipeline,
    ui_text: wgpu::RenderPipeline,
    pub texture_layout: wgpu::BindGroupLayout,
    pub instance_layout: wgpu::BindGroupLayout,
}

struct PipelineSpec<'a> {
    label: &'static str,
    shader: &'a wgpu::ShaderModule,
    layout: &'a wgpu::PipelineLayout,
    buffers: &'a [wgpu::VertexBufferLayout<'a>],
    topology: wgpu::PrimitiveTopology,
    depth_tested: bool,
}

impl Pipelines {
    pub fn new(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        uniform_layout: &wgpu::BindGroupLayout,
    ) -> Self {
        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("miso texture bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let instance_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("miso sprite instances bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Storage { read_only: true },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let layout = |label: &'static str, groups: &[&wgpu::BindGroupLayout]| {
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(label),
                bind_group_layouts: groups,
                immediate_size: 0,
            })
        };
        let sprite_layout = layout(
            "miso sprite pipeline layout",
            &[uniform_layout, &texture_layout, &instance_layout],
        );
        let textured_layout =
            layout("miso text pipeline layout", &[uniform_layout, &texture_layout]);
        let plain_layout = layout("miso geometry pipeline layout", &[uniform_layout]);

        let shader = |label: &'static str, src: &'static str| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(src.into()),
            })
        };
        let sprite_shader = shader("miso sprite shader", include_str!("shaders/sprite.wgsl"));
        let geometry_shader = shader("miso geometry shader", include_str!("shaders/geometry.wgsl"));
        let line_shader = shader("miso line shader", include_str!("shaders/line.wgsl"));
        let text_shader = shader("miso text shader", include_str!("shaders/text.wgsl"));

        Self {
            sprite: create_pipeline(device, surface_format, PipelineSpec {
                label: "miso sprite pipeline",
                shader: &sprite_shader,
                layout: &sprite_layout,
                buffers: &[],
                topology: wgpu::PrimitiveTopology::TriangleList,
                depth_tested: true,
            }),
            world_geometry: create_pipeline(device, surface_format, PipelineSpec {
                label: "miso world geometry pipeline",
                shader: &geometry_shader,
                layout: &plain_layout,
                buffers: &[Vertex::layout()],
                topology: wgpu::PrimitiveTopology::TriangleList,
                depth_tested: true,
            }),
            line: create_pipeline(device, surface_format, PipelineSpec {
                label: "miso line pipeline",
                shader: &line_shader,
                layout: &plain_layout,
                buffers: &[LineVertex::layout()],
                topology: wgpu::PrimitiveTopology::LineList,
                depth_tested: true,
            }),
            ui_geometry: create_pipeline(device, surface_format, PipelineSpec {
                label: "miso ui geometry pipeline",
                shader: &geometry_shader,
                layout: &plain_layout,
                buffers: &[Vertex::layout()],
                topology: wgpu::PrimitiveTopology::TriangleList,
                depth_tested: false,
            }),
            ui_text: create_pipeline(device, surface_format, PipelineSpec {
                label: "miso ui text pipeline",
                shader: &text_shader,
                layout: &textured_layout,
                buffers: &[TextVertex::layout()],
                topology: wgpu::PrimitiveTopology::TriangleList,
                depth_tested: false,
            }),
            texture_layout,
            instance_layout,
        }
    }

    pub fn get(&self, kind: PipelineKind) -> &wgpu::RenderPipeline {
        match kind {
            PipelineKind::Sprite => &self.sprite,
            PipelineKind::WorldGeometry => &self.world_geometry,
            PipelineKind::Line => &self.line,
            PipelineKind::UiGeometry => &self.ui_geometry,
            PipelineKind::UiText => &self.ui_text,
        }
    }
}

fn alpha_blend() -> wgpu::BlendState {
    wgpu::BlendState {
        color: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::SrcAlpha,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        },
        alpha: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        },
    }
}

fn create_pipeline(
    device: &wgpu::Device,
    surface_format: wgpu::TextureFormat,
    spec: PipelineSpec<'_>,
) -> wgpu::RenderPipeline {
    // World pipelines share the depth attachment; UI pipelines run in a pass without one.
    let depth_stencil = spec.depth_tested.then(|| wgpu::DepthStencilState {
        format: DEPTH_FORMAT,
        depth_write_enabled: true,
        depth_compare: wgpu::CompareFunction::LessEqual,
        stencil: wgpu::StencilState::default(),
        bias: wgpu::DepthBiasState::default(),
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(spec.label),
        layout: Some(spec.layout),

        vertex: wgpu::VertexState {
            module: spec.shader,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers: spec.buffers,
        },

        fragment: Some(wgpu::FragmentState {
            module: spec.shader,
            entry_point: Some("fs_main"),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: surface_format,
                blend: Some(alpha_blend()),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),

        primitive: wgpu::PrimitiveState {
            topology: spec.topology,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },

        depth_stencil,
        multisample: wgpu::MultisampleState::default(),
        multiview_mask: None,
        cache: None,
    })
}
