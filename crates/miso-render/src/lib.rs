//! Miso render crate.
//!
//! Streams per-frame geometry into ring-sliced GPU buffers and turns queued
//! draw commands into a world pass and a UI pass. The public surface:
//! - [`Renderer`]: frame lifecycle and the draw API
//! - [`UploadStream`](stream::UploadStream): frames-in-flight ring allocator
//! - [`UiBatch`](ui::UiBatch): immediate-mode UI rectangles, lines and text
//! - [`device::GraphicsDevice`]: backend seam with wgpu and headless implementations

pub mod color;
pub mod config;
pub mod device;
pub mod error;
pub mod logging;
pub mod queue;
pub mod stats;
pub mod stream;
pub mod ui;
pub mod vertex;

mod frame;
mod overflow;
mod pass;
mod renderer;

pub use color::Color;
pub use config::{QueueLimits, RendererConfig, StreamBudgets};
pub use error::{AllocError, RenderError};
pub use renderer::{DrawOutcome, DropReason, FramePhase, Renderer};
pub use stats::{FrameStats, StreamKind};
pub use ui::{UiBatch, UiBatchStats};
