//! Streams and queues owned by a [`Renderer`](crate::Renderer).

use crate::config::{QueueLimits, STREAM_ALIGN, StreamBudgets};
use crate::device::{BufferUsage, GraphicsDevice};
use crate::error::RenderError;
use crate::queue::{CommandQueue, GeometryCmd, LineCmd, QueueKind, SpriteQueue, TextCmd};
use crate::stats::{FrameStats, StreamKind};
use crate::stream::UploadStream;
use crate::vertex::SPRITE_INSTANCE_SIZE;

/// Sprite slots are sized in whole instances so instance indices stay exact.
const SPRITE_GRANULE: u32 = SPRITE_INSTANCE_SIZE;

#[derive(Debug)]
pub(crate) struct Streams {
    pub sprites: UploadStream,
    pub world_geometry: UploadStream,
    pub lines: UploadStream,
    pub ui_geometry: UploadStream,
    pub ui_text_vertices: UploadStream,
    pub ui_text_indices: UploadStream,
}

impl Streams {
    pub fn new<D: GraphicsDevice>(
        device: &mut D,
        budgets: &StreamBudgets,
    ) -> Result<Self, RenderError> {
        let mut make = |kind: StreamKind, usage, bytes, granule| {
            UploadStream::new(device, kind.label(), usage, bytes, granule)
        };

        Ok(Self {
            sprites: make(
                StreamKind::Sprites,
                BufferUsage::Instance,
                budgets.sprite_bytes,
                SPRITE_GRANULE,
            )?,
            world_geometry: make(
                StreamKind::WorldGeometry,
                BufferUsage::Vertex,
                budgets.world_geometry_bytes,
                STREAM_ALIGN,
            )?,
            lines: make(
                StreamKind::Lines,
                BufferUsage::Vertex,
                budgets.line_bytes,
                STREAM_ALIGN,
            )?,
            ui_geometry: make(
                StreamKind::UiGeometry,
                BufferUsage::Vertex,
                budgets.ui_geometry_bytes,
                STREAM_ALIGN,
            )?,
            ui_text_vertices: make(
                StreamKind::UiTextVertices,
                BufferUsage::Vertex,
                budgets.ui_text_vertex_bytes,
                STREAM_ALIGN,
            )?,
            ui_text_indices: make(
                StreamKind::UiTextIndices,
                BufferUsage::Index,
                budgets.ui_text_index_bytes,
                STREAM_ALIGN,
            )?,
        })
    }

    pub fn get(&self, kind: StreamKind) -> &UploadStream {
        match kind {
            StreamKind::Sprites => &self.sprites,
            StreamKind::WorldGeometry => &self.world_geometry,
            StreamKind::Lines => &self.lines,
            StreamKind::UiGeometry => &self.ui_geometry,
            StreamKind::UiTextVertices => &self.ui_text_vertices,
            StreamKind::UiTextIndices => &self.ui_text_indices,
        }
    }

    pub fn get_mut(&mut self, kind: StreamKind) -> &mut UploadStream {
        match kind {
            StreamKind::Sprites => &mut self.sprites,
            StreamKind::WorldGeometry => &mut self.world_geometry,
            StreamKind::Lines => &mut self.lines,
            StreamKind::UiGeometry => &mut self.ui_geometry,
            StreamKind::UiTextVertices => &mut self.ui_text_vertices,
            StreamKind::UiTextIndices => &mut self.ui_text_indices,
        }
    }

    pub fn begin_frame(&mut self, slot: u32) {
        for kind in StreamKind::ALL {
            self.get_mut(kind).begin_frame(slot);
        }
    }

    pub fn end_frame(&mut self) {
        for kind in StreamKind::ALL {
            self.get_mut(kind).end_frame();
        }
    }

    /// Uploads every stream's used bytes inside one copy pass.
    pub fn upload_used<D: GraphicsDevice>(&self, device: &mut D) {
        device.begin_copy_pass();
        for kind in StreamKind::ALL {
            self.get(kind).upload_used(device);
        }
        device.end_copy_pass();
    }

    pub fn record_stats(&self, stats: &mut FrameStats) {
        for kind in StreamKind::ALL {
            *stats.stream_mut(kind) = self.get(kind).stats();
        }
    }

    pub fn release<D: GraphicsDevice>(&mut self, device: &mut D) {
        for kind in StreamKind::ALL {
            self.get_mut(kind).release(device);
        }
    }
}

#[derive(Debug)]
pub(crate) struct Queues {
    pub sprites: SpriteQueue,
    pub world_geometry: CommandQueue<GeometryCmd>,
    pub lines: CommandQueue<LineCmd>,
    pub ui_geometry: CommandQueue<GeometryCmd>,
    pub ui_text: CommandQueue<TextCmd>,
}

impl Queues {
    pub fn new(limits: &QueueLimits) -> Self {
        Self {
            sprites: SpriteQueue::new(limits.sprites),
            world_geometry: CommandQueue::new(QueueKind::WorldGeometry, limits.world_geometry),
            lines: CommandQueue::new(QueueKind::Lines, limits.lines),
            ui_geometry: CommandQueue::new(QueueKind::UiGeometry, limits.ui_geometry),
            ui_text: CommandQueue::new(QueueKind::UiText, limits.ui_text),
        }
    }

    pub fn clear(&mut self) {
        self.sprites.clear();
        self.world_geometry.clear();
        self.lines.clear();
        self.ui_geometry.clear();
        self.ui_text.clear();
    }

    pub fn len(&self, kind: QueueKind) -> usize {
        match kind {
            QueueKind::Sprites => self.sprites.len(),
            QueueKind::WorldGeometry => self.world_geometry.len(),
            QueueKind::Lines => self.lines.len(),
            QueueKind::UiGeometry => self.ui_geometry.len(),
            QueueKind::UiText => self.ui_text.len(),
        }
    }
}
