//! Profiler overlay: last frame's counters drawn through the UI batch.

use std::fmt::Write as _;

use anyhow::Result;

use miso_render::device::WgpuDevice;
use miso_render::queue::QueueKind;
use miso_render::ui::{BACKGROUND_DEFAULT, UiBatch, UiBatchStats};
use miso_render::{Color, FrameStats, StreamKind};

use crate::glyphs::GlyphAtlas;

const TEXT_SIZE: f32 = 14.0;
const LINE_HEIGHT: f32 = 17.0;
const PADDING: f32 = 6.0;

/// Inputs the overlay reports besides [`FrameStats`].
#[derive(Debug, Copy, Clone, Default)]
pub struct OverlayInfo<'a> {
    pub fps: f32,
    pub frame_index: u64,
    pub present_mode: &'a str,
    pub ui: UiBatchStats,
    pub atlas_pages: usize,
}

/// Formats the overlay text, one entry per line.
pub fn overlay_lines(stats: &FrameStats, info: &OverlayInfo<'_>) -> Vec<String> {
    let mut lines = Vec::with_capacity(16);
    lines.push(format!(
        "{:.0} fps  frame {}  {}",
        info.fps, info.frame_index, info.present_mode
    ));
    lines.push(format!(
        "draws {}  cmds {}  dropped {}",
        stats.total_draw_calls(),
        stats.total_commands(),
        stats.total_dropped()
    ));
    lines.push(format!(
        "acquire {:.2} ms  submit {:.2} ms",
        stats.timing.surface_acquire_ms, stats.timing.submit_ms
    ));

    for kind in QueueKind::ALL {
        let q = stats.queue(kind);
        let mut line = format!(
            "{:<15} {:>5} cmd {:>5} draw",
            kind.name(),
            q.cmd_count,
            q.draw_calls
        );
        if q.dropped > 0 {
            let _ = write!(line, "  {} dropped", q.dropped);
        }
        lines.push(line);
    }

    for kind in StreamKind::ALL {
        let s = stats.stream(kind);
        lines.push(format!(
            "{:<17} {:>7} / {:>7} B  peak {:>7}",
            kind.label(),
            s.used_bytes,
            s.capacity_bytes,
            s.peak_bytes
        ));
    }

    lines.push(format!(
        "ui {} geo verts  {} text idx  {} atlas  {} glyph pages",
        info.ui.geometry_vertices, info.ui.text_indices, info.ui.text_atlas_count, info.atlas_pages
    ));
    lines
}

/// Queues the overlay panel at `(x, y)` into `batch`.
pub fn draw_overlay(
    device: &mut WgpuDevice<'_>,
    atlas: &mut GlyphAtlas,
    batch: &mut UiBatch,
    lines: &[String],
    x: f32,
    y: f32,
) -> Result<()> {
    let mut width = 0.0f32;
    for (i, line) in lines.iter().enumerate() {
        let (w, _) = atlas.queue_text(line, x, y + i as f32 * LINE_HEIGHT, TEXT_SIZE);
        width = width.max(w);
    }
    let height = lines.len() as f32 * LINE_HEIGHT;

    batch.text_background(x, y, width, height, BACKGROUND_DEFAULT, PADDING);
    batch.rect_outline(
        x - PADDING,
        y - PADDING,
        width + PADDING * 2.0,
        height + PADDING * 2.0,
        Color::WHITE.with_alpha(0.25),
        1.0,
    );
    atlas.emit(device, batch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_line_per_queue_and_stream() {
        let lines = overlay_lines(&FrameStats::default(), &OverlayInfo::default());
        assert_eq!(lines.len(), 3 + QueueKind::COUNT + StreamKind::COUNT + 1);
    }

    #[test]
    fn dropped_draws_are_called_out() {
        let mut stats = FrameStats::default();
        stats.queue_mut(QueueKind::Lines).dropped = 7;
        let lines = overlay_lines(&stats, &OverlayInfo::default());

        assert!(lines[1].ends_with("dropped 7"));
        let lines_row = lines.iter().find(|l| l.starts_with("lines")).unwrap();
        assert!(lines_row.ends_with("7 dropped"));
        assert!(!lines.iter().any(|l| l.starts_with("sprites") && l.contains("dropped")));
    }

    #[test]
    fn stream_usage_is_reported() {
        let mut stats = FrameStats::default();
        let s = stats.stream_mut(StreamKind::Sprites);
        s.used_bytes = 480;
        s.capacity_bytes = 4096;
        let lines = overlay_lines(&stats, &OverlayInfo::default());
        let row = lines.iter().find(|l| l.starts_with("sprite instances")).unwrap();
        assert!(row.contains("480 /"));
        assert!(row.contains("4096 B"));
    }
}
