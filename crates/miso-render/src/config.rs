//! Renderer sizing and behavior knobs.
//!
//! Every budget is fixed at construction. Streams and queues never grow while a
//! frame is recording; work that does not fit is dropped for that frame.

use crate::color::Color;
use crate::vertex::{LineVertex, SPRITE_INSTANCE_SIZE, TextVertex, Vertex};

/// Number of frames the device may be executing concurrently.
///
/// Each upload stream is split into this many slots; a slot is rewritten only
/// after `FRAMES_IN_FLIGHT - 1` other frames have been submitted.
pub const FRAMES_IN_FLIGHT: u32 = 3;

/// Default allocation alignment inside an upload stream.
pub const STREAM_ALIGN: u32 = 16;

/// Maximum number of atlas ranges a single text command can carry.
pub const MAX_ATLAS_RANGES: usize = 16;

/// Per-slot byte budgets for each upload stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamBudgets {
    pub sprite_bytes: u32,
    pub world_geometry_bytes: u32,
    pub line_bytes: u32,
    pub ui_geometry_bytes: u32,
    pub ui_text_vertex_bytes: u32,
    pub ui_text_index_bytes: u32,
}

impl Default for StreamBudgets {
    fn default() -> Self {
        Self {
            sprite_bytes: SPRITE_INSTANCE_SIZE * 100_000,
            world_geometry_bytes: size_of::<Vertex>() as u32 * 300_000,
            line_bytes: size_of::<LineVertex>() as u32 * 65_536,
            ui_geometry_bytes: size_of::<Vertex>() as u32 * 131_072,
            ui_text_vertex_bytes: size_of::<TextVertex>() as u32 * 262_144,
            ui_text_index_bytes: size_of::<u32>() as u32 * 524_288,
        }
    }
}

/// Maximum number of entries per command queue and frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueLimits {
    pub sprites: usize,
    pub world_geometry: usize,
    pub lines: usize,
    pub ui_geometry: usize,
    pub ui_text: usize,
}

impl Default for QueueLimits {
    fn default() -> Self {
        Self {
            sprites: 4096,
            world_geometry: 4096,
            lines: 8192,
            ui_geometry: 4096,
            ui_text: 1024,
        }
    }
}

/// Construction parameters for [`Renderer`](crate::Renderer).
#[derive(Debug, Clone)]
pub struct RendererConfig {
    pub streams: StreamBudgets,
    pub queues: QueueLimits,

    /// Color the world pass clears to.
    pub clear_color: Color,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            streams: StreamBudgets::default(),
            queues: QueueLimits::default(),
            clear_color: Color::CORNFLOWER,
        }
    }
}
