//! Immediate-mode UI batching.
//!
//! [`UiBatch`] accumulates rectangles, thick lines and glyph quads for a whole
//! frame and hands them to the renderer as one UI geometry command plus one
//! multi-atlas text command. Glyphs are grouped per atlas while recording, so
//! each atlas becomes one contiguous index range and one indexed draw.

use crate::color::Color;
use crate::device::{GraphicsDevice, TextureHandle};
use crate::queue::AtlasRange;
use crate::renderer::{DrawOutcome, Renderer};
use crate::vertex::{TextVertex, Vertex};

/// Distinct atlases one batch can hold per frame.
pub const UI_TEXT_MAX_ATLASES: usize = 8;

/// Semi-transparent black used behind overlay text.
pub const BACKGROUND_DEFAULT: Color = Color::new(0.0, 0.0, 0.0, 0.6);

/// Counters for the last [`UiBatch::flush`].
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct UiBatchStats {
    pub geometry_vertices: u32,
    pub geometry_draw_calls: u32,
    pub text_vertices: u32,
    pub text_indices: u32,
    pub text_atlas_count: u32,
    pub text_draw_calls: u32,
    /// Glyphs dropped because the atlas limit was reached.
    pub dropped_glyphs: u32,
}

#[derive(Debug, Default)]
struct TextPage {
    atlas: Option<TextureHandle>,
    vertices: Vec<TextVertex>,
    /// Page-local indices.
    indices: Vec<u32>,
}

impl TextPage {
    fn reset(&mut self) {
        self.atlas = None;
        self.vertices.clear();
        self.indices.clear();
    }
}

#[derive(Debug, Default)]
pub struct UiBatch {
    geometry: Vec<Vertex>,
    pages: Vec<TextPage>,
    active_pages: usize,
    dropped_glyphs: u32,
    warned_atlas_limit: bool,

    // flush scratch, reused across frames
    scratch_vertices: Vec<TextVertex>,
    scratch_indices: Vec<u32>,
    scratch_ranges: Vec<AtlasRange>,

    last_stats: UiBatchStats,
}

impl UiBatch {
    pub fn new() -> Self {
        Self::default()
    }

    // ── geometry ──────────────────────────────────────────────────────────

    pub fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Color) {
        let (x1, y1) = (x + w, y + h);
        self.geometry.extend_from_slice(&[
            Vertex::new(x, y, color),
            Vertex::new(x1, y, color),
            Vertex::new(x, y1, color),
            Vertex::new(x1, y, color),
            Vertex::new(x1, y1, color),
            Vertex::new(x, y1, color),
        ]);
    }

    /// Outline drawn inside the rectangle bounds.
    pub fn rect_outline(&mut self, x: f32, y: f32, w: f32, h: f32, color: Color, thickness: f32) {
        self.fill_rect(x, y, w, thickness, color);
        self.fill_rect(x, y + h - thickness, w, thickness, color);
        self.fill_rect(x, y, thickness, h, color);
        self.fill_rect(x + w - thickness, y, thickness, h, color);
    }

    /// Thick line as a quad. Degenerate segments are ignored.
    pub fn line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, color: Color, thickness: f32) {
        let (dx, dy) = (x2 - x1, y2 - y1);
        let len = (dx * dx + dy * dy).sqrt();
        if len < 0.001 {
            return;
        }

        let half = thickness * 0.5;
        let (nx, ny) = (-dy / len * half, dx / len * half);
        self.geometry.extend_from_slice(&[
            Vertex::new(x1 + nx, y1 + ny, color),
            Vertex::new(x2 + nx, y2 + ny, color),
            Vertex::new(x2 - nx, y2 - ny, color),
            Vertex::new(x2 - nx, y2 - ny, color),
            Vertex::new(x1 - nx, y1 - ny, color),
            Vertex::new(x1 + nx, y1 + ny, color),
        ]);
    }

    /// Background box for a block of text of the given pixel size.
    pub fn text_background(
        &mut self,
        x: f32,
        y: f32,
        text_w: f32,
        text_h: f32,
        color: Color,
        padding: f32,
    ) {
        self.fill_rect(
            x - padding,
            y - padding,
            text_w + padding * 2.0,
            text_h + padding * 2.0,
            color,
        );
    }

    // ── text ──────────────────────────────────────────────────────────────

    /// Adds one glyph quad. `rect` and `uv` are `[x0, y0, x1, y1]`.
    pub fn glyph_quad(&mut self, atlas: TextureHandle, rect: [f32; 4], uv: [f32; 4]) {
        let vertices = [
            TextVertex::new(rect[0], rect[1], uv[0], uv[1]),
            TextVertex::new(rect[2], rect[1], uv[2], uv[1]),
            TextVertex::new(rect[2], rect[3], uv[2], uv[3]),
            TextVertex::new(rect[0], rect[3], uv[0], uv[3]),
        ];
        self.text_sequence(atlas, &vertices, &[0, 1, 2, 0, 2, 3], 0.0, 0.0);
    }

    /// Adds pre-built glyph geometry for one atlas, offset by `(x, y)`.
    ///
    /// `indices` are relative to `vertices`.
    pub fn text_sequence(
        &mut self,
        atlas: TextureHandle,
        vertices: &[TextVertex],
        indices: &[u32],
        x: f32,
        y: f32,
    ) {
        if vertices.is_empty() || indices.is_empty() {
            return;
        }
        let Some(page) = self.page_for(atlas) else {
            self.dropped_glyphs += 1;
            if !std::mem::replace(&mut self.warned_atlas_limit, true) {
                log::warn!("ui text uses more than {UI_TEXT_MAX_ATLASES} atlases; dropping glyphs");
            }
            return;
        };

        let base = page.vertices.len() as u32;
        page.vertices.extend(vertices.iter().map(|v| {
            TextVertex::new(v.position[0] + x, v.position[1] + y, v.uv[0], v.uv[1])
        }));
        page.indices.extend(indices.iter().map(|i| i + base));
    }

    fn page_for(&mut self, atlas: TextureHandle) -> Option<&mut TextPage> {
        let active = self.active_pages;
        if let Some(i) = self.pages[..active]
            .iter()
            .position(|p| p.atlas == Some(atlas))
        {
            return Some(&mut self.pages[i]);
        }

        if active >= UI_TEXT_MAX_ATLASES {
            return None;
        }
        if self.pages.len() == active {
            self.pages.push(TextPage::default());
        }
        self.active_pages += 1;
        let page = &mut self.pages[active];
        page.reset();
        page.atlas = Some(atlas);
        Some(page)
    }

    // ── flush ─────────────────────────────────────────────────────────────

    /// Submits everything recorded since the last flush and clears the batch.
    pub fn flush<D: GraphicsDevice>(&mut self, renderer: &mut Renderer<D>) -> UiBatchStats {
        self.scratch_vertices.clear();
        self.scratch_indices.clear();
        self.scratch_ranges.clear();

        for page in &self.pages[..self.active_pages] {
            let Some(atlas) = page.atlas else { continue };
            if page.indices.is_empty() {
                continue;
            }
            let base = self.scratch_vertices.len() as u32;
            let start = self.scratch_indices.len() as u32;
            self.scratch_vertices.extend_from_slice(&page.vertices);
            self.scratch_indices
                .extend(page.indices.iter().map(|i| i + base));
            self.scratch_ranges
                .push(AtlasRange::new(atlas, start, page.indices.len() as u32));
        }

        let mut stats = UiBatchStats {
            geometry_vertices: self.geometry.len() as u32,
            text_vertices: self.scratch_vertices.len() as u32,
            text_indices: self.scratch_indices.len() as u32,
            text_atlas_count: self.scratch_ranges.len() as u32,
            dropped_glyphs: self.dropped_glyphs,
            ..UiBatchStats::default()
        };

        if renderer.flush_ui_geometry(&self.geometry) == DrawOutcome::Queued {
            stats.geometry_draw_calls = 1;
        }
        if renderer.flush_ui_text(
            &self.scratch_vertices,
            &self.scratch_indices,
            &self.scratch_ranges,
        ) == DrawOutcome::Queued
        {
            stats.text_draw_calls = stats.text_atlas_count;
        }

        self.clear();
        self.last_stats = stats;
        stats
    }

    /// Discards everything recorded since the last flush.
    pub fn clear(&mut self) {
        self.geometry.clear();
        for page in &mut self.pages[..self.active_pages] {
            page.reset();
        }
        self.active_pages = 0;
        self.dropped_glyphs = 0;
    }

    pub fn last_stats(&self) -> UiBatchStats {
        self.last_stats
    }

    pub fn geometry_vertex_count(&self) -> usize {
        self.geometry.len()
    }

    pub fn atlas_count(&self) -> usize {
        self.active_pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RendererConfig;
    use crate::device::{DeviceCall, RecordingDevice};

    const ATLAS_A: TextureHandle = TextureHandle(1);
    const ATLAS_B: TextureHandle = TextureHandle(2);

    fn glyph(batch: &mut UiBatch, atlas: TextureHandle, x: f32) {
        batch.glyph_quad(atlas, [x, 0.0, x + 8.0, 12.0], [0.0, 0.0, 0.5, 0.5]);
    }

    // ── geometry ──────────────────────────────────────────────────────────

    #[test]
    fn rect_outline_is_four_quads() {
        let mut b = UiBatch::new();
        b.rect_outline(0.0, 0.0, 10.0, 10.0, Color::WHITE, 1.0);
        assert_eq!(b.geometry_vertex_count(), 24);
    }

    #[test]
    fn degenerate_line_is_ignored() {
        let mut b = UiBatch::new();
        b.line(5.0, 5.0, 5.0, 5.0, Color::WHITE, 2.0);
        assert_eq!(b.geometry_vertex_count(), 0);
        b.line(0.0, 0.0, 10.0, 0.0, Color::WHITE, 2.0);
        assert_eq!(b.geometry_vertex_count(), 6);
        assert_eq!(b.geometry[0].position, [0.0, 1.0]);
        assert_eq!(b.geometry[2].position, [10.0, -1.0]);
    }

    // ── text ──────────────────────────────────────────────────────────────

    #[test]
    fn interleaved_atlases_are_grouped() {
        let mut b = UiBatch::new();
        glyph(&mut b, ATLAS_A, 0.0);
        glyph(&mut b, ATLAS_B, 10.0);
        glyph(&mut b, ATLAS_A, 20.0);
        glyph(&mut b, ATLAS_A, 30.0);
        glyph(&mut b, ATLAS_B, 40.0);
        assert_eq!(b.atlas_count(), 2);

        let device = RecordingDevice::new(320, 240);
        let mut r = Renderer::new(device, RendererConfig::default()).unwrap();
        assert!(r.begin_frame());
        let stats = b.flush(&mut r);
        r.end_frame();

        assert_eq!(stats.text_vertices, 20);
        assert_eq!(stats.text_indices, 30);
        assert_eq!(stats.text_atlas_count, 2);
        assert_eq!(stats.text_draw_calls, 2);

        let indexed: Vec<_> = r
            .device()
            .calls()
            .iter()
            .filter_map(|c| match c {
                DeviceCall::DrawIndexed { indices, .. } => Some(indices.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(indexed, vec![0..18, 18..30]);
    }

    #[test]
    fn flattened_indices_point_at_their_own_page() {
        let mut b = UiBatch::new();
        glyph(&mut b, ATLAS_A, 0.0);
        glyph(&mut b, ATLAS_B, 10.0);

        let device = RecordingDevice::new(320, 240);
        let mut r = Renderer::new(device, RendererConfig::default()).unwrap();
        assert!(r.begin_frame());
        b.flush(&mut r);
        assert_eq!(b.scratch_indices[6..], [4, 5, 6, 4, 6, 7]);
        assert_eq!(b.scratch_vertices[4].position, [10.0, 0.0]);
        r.end_frame();
    }

    #[test]
    fn atlas_limit_drops_extra_glyphs() {
        let mut b = UiBatch::new();
        for i in 0..=UI_TEXT_MAX_ATLASES as u64 {
            glyph(&mut b, TextureHandle(100 + i), 0.0);
        }
        assert_eq!(b.atlas_count(), UI_TEXT_MAX_ATLASES);
        assert_eq!(b.dropped_glyphs, 1);
    }

    #[test]
    fn text_sequence_offsets_positions() {
        let mut b = UiBatch::new();
        let verts = [
            TextVertex::new(0.0, 0.0, 0.0, 0.0),
            TextVertex::new(1.0, 0.0, 1.0, 0.0),
            TextVertex::new(1.0, 1.0, 1.0, 1.0),
        ];
        b.text_sequence(ATLAS_A, &verts, &[0, 1, 2], 100.0, 50.0);
        assert_eq!(b.pages[0].vertices[2].position, [101.0, 51.0]);
    }

    // ── flush ─────────────────────────────────────────────────────────────

    #[test]
    fn flush_emits_one_geometry_and_one_text_command() {
        let mut b = UiBatch::new();
        b.text_background(10.0, 10.0, 40.0, 12.0, BACKGROUND_DEFAULT, 4.0);
        b.fill_rect(0.0, 0.0, 5.0, 5.0, Color::WHITE);
        glyph(&mut b, ATLAS_A, 10.0);

        let device = RecordingDevice::new(320, 240);
        let mut r = Renderer::new(device, RendererConfig::default()).unwrap();
        assert!(r.begin_frame());
        let stats = b.flush(&mut r);
        r.end_frame();

        assert_eq!(stats.geometry_vertices, 12);
        assert_eq!(stats.geometry_draw_calls, 1);
        assert_eq!(stats.text_draw_calls, 1);
        assert_eq!(r.frame_stats().total_commands(), 2);
        assert_eq!(b.last_stats(), stats);

        // batch is empty afterwards
        assert_eq!(b.geometry_vertex_count(), 0);
        assert_eq!(b.atlas_count(), 0);
    }

    #[test]
    fn flush_outside_a_frame_reports_no_draws() {
        let mut b = UiBatch::new();
        b.fill_rect(0.0, 0.0, 5.0, 5.0, Color::WHITE);
        let device = RecordingDevice::new(320, 240);
        let mut r = Renderer::new(device, RendererConfig::default()).unwrap();
        let stats = b.flush(&mut r);
        assert_eq!(stats.geometry_vertices, 6);
        assert_eq!(stats.geometry_draw_calls, 0);
    }
}
