//! Miso viewer: an animated tile field with a profiler overlay.
//!
//! Keys: `F1` toggles the overlay, `V` toggles vsync, `Esc` quits.

mod clock;
mod glyphs;
mod overlay;
mod runtime;
mod scene;

use miso_render::logging::{LoggingConfig, init_logging};

use crate::runtime::ViewerConfig;

fn main() -> anyhow::Result<()> {
    init_logging(LoggingConfig::default());

    let font = load_font();
    if font.is_empty() {
        log::warn!("no system font found; profiler overlay disabled");
    }

    runtime::run(ViewerConfig {
        font,
        ..ViewerConfig::default()
    })
}

fn load_font() -> Vec<u8> {
    [
        "/usr/share/fonts/TTF/DejaVuSansMono.ttf",
        "/usr/share/fonts/truetype/dejavu/DejaVuSansMono.ttf",
        "/usr/share/fonts/dejavu/DejaVuSansMono.ttf",
        "/usr/share/fonts/TTF/DejaVuSans.ttf",
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/noto/NotoSansMono-Regular.ttf",
        "/usr/share/fonts/truetype/noto/NotoSansMono-Regular.ttf",
    ]
    .iter()
    .find_map(|p| std::fs::read(p).ok())
    .unwrap_or_default()
}
