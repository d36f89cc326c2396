//! fontdue glyph cache backed by multiple RGBA atlas pages.
//!
//! Glyphs are rasterized on first use and shelf-packed into the newest page;
//! a full page opens another one, up to [`MAX_PAGES`]. Coverage is expanded to
//! white RGBA so the text pipeline can tint it with the draw color.

use std::collections::HashMap;

use anyhow::Result;
use fontdue::layout::{CoordinateSystem, GlyphRasterConfig, Layout, LayoutSettings, TextStyle};

use miso_render::device::{TextureHandle, WgpuDevice};
use miso_render::ui::{UI_TEXT_MAX_ATLASES, UiBatch};

pub const PAGE_SIZE: u32 = 256;
pub const MAX_PAGES: usize = UI_TEXT_MAX_ATLASES;

const GLYPH_PADDING: u32 = 1;

// ── ShelfPacker ───────────────────────────────────────────────────────────

/// Row-based rectangle packer for a square page.
#[derive(Debug, Clone)]
pub struct ShelfPacker {
    size: u32,
    cursor_x: u32,
    cursor_y: u32,
    row_height: u32,
}

impl ShelfPacker {
    pub fn new(size: u32) -> Self {
        Self {
            size,
            cursor_x: GLYPH_PADDING,
            cursor_y: GLYPH_PADDING,
            row_height: 0,
        }
    }

    /// Returns the top-left corner for a `w × h` rectangle, or `None` when the page is full.
    pub fn place(&mut self, w: u32, h: u32) -> Option<(u32, u32)> {
        if w + 2 * GLYPH_PADDING > self.size || h + 2 * GLYPH_PADDING > self.size {
            return None;
        }

        if self.cursor_x + w + GLYPH_PADDING > self.size {
            self.cursor_y += self.row_height + GLYPH_PADDING;
            self.cursor_x = GLYPH_PADDING;
            self.row_height = 0;
        }
        if self.cursor_y + h + GLYPH_PADDING > self.size {
            return None;
        }

        let pos = (self.cursor_x, self.cursor_y);
        self.cursor_x += w + GLYPH_PADDING;
        self.row_height = self.row_height.max(h);
        Some(pos)
    }
}

// ── AtlasPages ────────────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct GlyphSlot {
    pub page: usize,
    /// `[u0, v0, u1, v1]`
    pub uv: [f32; 4],
}

struct Page {
    packer: ShelfPacker,
    pixels: Vec<u8>,
    texture: Option<TextureHandle>,
    dirty: bool,
}

impl Page {
    fn new(size: u32) -> Self {
        Self {
            packer: ShelfPacker::new(size),
            pixels: vec![0; (size * size * 4) as usize],
            texture: None,
            dirty: true,
        }
    }
}

/// CPU copies of every atlas page plus their GPU handles.
pub struct AtlasPages {
    page_size: u32,
    max_pages: usize,
    pages: Vec<Page>,
    full_warned: bool,
}

impl AtlasPages {
    pub fn new(page_size: u32, max_pages: usize) -> Self {
        Self {
            page_size,
            max_pages,
            pages: Vec::new(),
            full_warned: false,
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn texture(&self, page: usize) -> Option<TextureHandle> {
        self.pages.get(page)?.texture
    }

    /// Copies an 8-bit coverage bitmap into the atlas.
    pub fn insert(&mut self, w: u32, h: u32, coverage: &[u8]) -> Option<GlyphSlot> {
        debug_assert_eq!(coverage.len(), (w * h) as usize);

        let placed = self
            .pages
            .last_mut()
            .and_then(|p| p.packer.place(w, h))
            .map(|pos| (self.pages.len() - 1, pos));

        let (page_index, (gx, gy)) = match placed {
            Some(p) => p,
            None => {
                if self.pages.len() >= self.max_pages {
                    if !std::mem::replace(&mut self.full_warned, true) {
                        log::warn!(
                            "glyph atlas is full ({} pages of {}×{}); further glyphs are skipped",
                            self.max_pages,
                            self.page_size,
                            self.page_size
                        );
                    }
                    return None;
                }
                let mut page = Page::new(self.page_size);
                let pos = page.packer.place(w, h)?;
                self.pages.push(page);
                log::debug!("glyph atlas opened page {}", self.pages.len() - 1);
                (self.pages.len() - 1, pos)
            }
        };

        let size = self.page_size;
        let page = &mut self.pages[page_index];
        for row in 0..h {
            for col in 0..w {
                let alpha = coverage[(row * w + col) as usize];
                let dst = (((gy + row) * size + gx + col) * 4) as usize;
                page.pixels[dst..dst + 4].copy_from_slice(&[255, 255, 255, alpha]);
            }
        }
        page.dirty = true;

        let s = size as f32;
        Some(GlyphSlot {
            page: page_index,
            uv: [
                gx as f32 / s,
                gy as f32 / s,
                (gx + w) as f32 / s,
                (gy + h) as f32 / s,
            ],
        })
    }

    /// Creates or refreshes the textures of every page touched since the last sync.
    pub fn sync(&mut self, device: &mut WgpuDevice<'_>) -> Result<()> {
        let size = self.page_size;
        for (i, page) in self.pages.iter_mut().enumerate() {
            if !page.dirty {
                continue;
            }
            match page.texture {
                Some(handle) => {
                    device.write_texture_region(handle, 0, 0, size, size, &page.pixels)?
                }
                None => {
                    let handle =
                        device.create_texture_rgba8("miso glyph page", size, size, &page.pixels)?;
                    log::debug!("glyph page {i} uploaded as {handle:?}");
                    page.texture = Some(handle);
                }
            }
            page.dirty = false;
        }
        Ok(())
    }
}

// ── GlyphAtlas ────────────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone)]
struct PlacedGlyph {
    page: usize,
    rect: [f32; 4],
    uv: [f32; 4],
}

/// One font, its glyph cache and the text queued for the current frame.
pub struct GlyphAtlas {
    font: fontdue::Font,
    layout: Layout<()>,
    pages: AtlasPages,
    cache: HashMap<GlyphRasterConfig, GlyphSlot>,
    pending: Vec<PlacedGlyph>,
}

impl GlyphAtlas {
    pub fn new(font_bytes: &[u8]) -> Result<Self> {
        let font = fontdue::Font::from_bytes(font_bytes, fontdue::FontSettings::default())
            .map_err(anyhow::Error::msg)?;
        Ok(Self {
            font,
            layout: Layout::new(CoordinateSystem::PositiveYDown),
            pages: AtlasPages::new(PAGE_SIZE, MAX_PAGES),
            cache: HashMap::new(),
            pending: Vec::new(),
        })
    }

    pub fn page_count(&self) -> usize {
        self.pages.page_count()
    }

    /// Lays out `text` at `(x, y)` and queues its glyphs. Returns `(width, height)`.
    pub fn queue_text(&mut self, text: &str, x: f32, y: f32, size: f32) -> (f32, f32) {
        self.layout.reset(&LayoutSettings {
            x,
            y,
            ..LayoutSettings::default()
        });
        self.layout.append(&[&self.font], &TextStyle::new(text, size, 0));

        let mut extent = (0.0f32, size);
        for g in self.layout.glyphs() {
            let m = self.font.metrics_indexed(g.key.glyph_index, size);
            extent.0 = extent.0.max(g.x - x - m.xmin as f32 + m.advance_width);
            extent.1 = extent.1.max(g.y - y + g.height as f32);

            if !g.char_data.rasterize() || g.width == 0 || g.height == 0 {
                continue;
            }

            let slot = match self.cache.get(&g.key) {
                Some(slot) => *slot,
                None => {
                    let (metrics, bitmap) = self.font.rasterize_config(g.key);
                    if metrics.width == 0 || metrics.height == 0 {
                        continue;
                    }
                    let Some(slot) =
                        self.pages
                            .insert(metrics.width as u32, metrics.height as u32, &bitmap)
                    else {
                        continue;
                    };
                    self.cache.insert(g.key, slot);
                    slot
                }
            };

            self.pending.push(PlacedGlyph {
                page: slot.page,
                rect: [g.x, g.y, g.x + g.width as f32, g.y + g.height as f32],
                uv: slot.uv,
            });
        }
        extent
    }

    /// Measures `text` without queuing it.
    pub fn measure(&mut self, text: &str, size: f32) -> (f32, f32) {
        self.layout.reset(&LayoutSettings::default());
        self.layout.append(&[&self.font], &TextStyle::new(text, size, 0));
        self.layout.glyphs().iter().fold((0.0f32, size), |(w, h), g| {
            let m = self.font.metrics_indexed(g.key.glyph_index, size);
            (
                w.max(g.x - m.xmin as f32 + m.advance_width),
                h.max(g.y + g.height as f32),
            )
        })
    }

    /// Uploads touched pages and moves the queued glyphs into `batch`.
    pub fn emit(&mut self, device: &mut WgpuDevice<'_>, batch: &mut UiBatch) -> Result<()> {
        self.pages.sync(device)?;
        for glyph in self.pending.drain(..) {
            if let Some(texture) = self.pages.texture(glyph.page) {
                batch.glyph_quad(texture, glyph.rect, glyph.uv);
            }
        }
        Ok(())
    }
}
