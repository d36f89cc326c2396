use anyhow::{Context, Result};
use ouroboros::self_referencing;

use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use miso_render::device::{GpuInit, WgpuDevice};
use miso_render::ui::UiBatch;
use miso_render::{FrameStats, Renderer, RendererConfig};

use crate::clock::FrameClock;
use crate::glyphs::GlyphAtlas;
use crate::overlay::{OverlayInfo, draw_overlay, overlay_lines};
use crate::scene::{Scene, tile_sheet_pixels};

/// Window/runtime configuration.
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    pub title: String,
    pub initial_size: LogicalSize<f64>,
    pub gpu: GpuInit,
    pub renderer: RendererConfig,
    /// TTF/OTF bytes for the overlay; empty disables it.
    pub font: Vec<u8>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            title: "miso viewer".to_string(),
            initial_size: LogicalSize::new(1280.0, 720.0),
            gpu: GpuInit::default(),
            renderer: RendererConfig::default(),
            font: Vec::new(),
        }
    }
}

/// Runs the viewer until the window closes.
pub fn run(config: ViewerConfig) -> Result<()> {
    let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
    let mut viewer = Viewer::new(config);

    event_loop
        .run_app(&mut viewer)
        .context("winit event loop terminated with error")?;

    match viewer.fatal.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[self_referencing]
struct ViewerWindow {
    window: Window,

    #[borrows(window)]
    #[covariant]
    renderer: Renderer<WgpuDevice<'this>>,
}

struct Viewer {
    config: ViewerConfig,
    window: Option<ViewerWindow>,
    scene: Option<Scene>,
    atlas: Option<GlyphAtlas>,
    ui: UiBatch,
    clock: FrameClock,
    overlay_visible: bool,
    /// Counters of the last completed frame; the overlay shows these.
    last_stats: FrameStats,
    fatal: Option<anyhow::Error>,
}

impl Viewer {
    fn new(config: ViewerConfig) -> Self {
        let atlas = if config.font.is_empty() {
            None
        } else {
            GlyphAtlas::new(&config.font)
                .inspect_err(|e| log::warn!("failed to load overlay font: {e:#}"))
                .ok()
        };

        Self {
            config,
            window: None,
            scene: None,
            atlas,
            ui: UiBatch::new(),
            clock: FrameClock::new(),
            overlay_visible: true,
            last_stats: FrameStats::default(),
            fatal: None,
        }
    }

    fn create_window(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(self.config.initial_size);

        let window = event_loop
            .create_window(attrs)
            .context("failed to create window")?;

        let gpu_init = self.config.gpu.clone();
        let renderer_config = self.config.renderer.clone();

        let mut entry = ViewerWindowTryBuilder {
            window,
            renderer_builder: |w| {
                let device = pollster::block_on(WgpuDevice::new(w, gpu_init))?;
                let info = device.adapter_info();
                log::info!("adapter: {} ({:?})", info.name, info.backend);
                let renderer = Renderer::new(device, renderer_config)?;
                Ok::<_, anyhow::Error>(renderer)
            },
        }
        .try_build()?;

        let tiles = entry.with_renderer_mut(|r| {
            let (w, h, px) = tile_sheet_pixels();
            r.device_mut().create_texture_rgba8("miso tile sheet", w, h, &px)
        })?;
        let scene = Scene::new(tiles);
        log::info!("scene ready: {} tiles", scene.tile_count());

        self.scene = Some(scene);
        self.window = Some(entry);
        self.clock.reset();
        Ok(())
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(window) = self.window.as_mut() else {
            return;
        };

        let ft = self.clock.tick();
        let fps = self.clock.fps();
        let show_overlay = self.overlay_visible;
        let (scene, atlas, ui, last_stats) = (
            self.scene.as_ref(),
            self.atlas.as_mut().filter(|_| show_overlay),
            &mut self.ui,
            &mut self.last_stats,
        );

        let lost = window.with_renderer_mut(|renderer| {
            if !renderer.begin_frame() {
                return renderer.device().is_lost();
            }

            if let Some(scene) = scene {
                let dropped = scene.draw(renderer, ft.elapsed);
                if dropped > 0 {
                    log::debug!("frame {}: {dropped} world draws dropped", ft.frame_index);
                }
            }

            if let Some(atlas) = atlas {
                let present_mode = format!("{:?}", renderer.device().present_mode());
                let info = OverlayInfo {
                    fps,
                    frame_index: ft.frame_index,
                    present_mode: &present_mode,
                    ui: ui.last_stats(),
                    atlas_pages: atlas.page_count(),
                };
                let lines = overlay_lines(last_stats, &info);
                if let Err(e) = draw_overlay(renderer.device_mut(), atlas, ui, &lines, 12.0, 12.0) {
                    log::warn!("overlay skipped: {e:#}");
                    ui.clear();
                }
            }

            ui.flush(renderer);
            renderer.end_frame();
            last_stats.clone_from(renderer.frame_stats());
            renderer.device().is_lost()
        });

        if lost {
            self.fatal = Some(anyhow::anyhow!("graphics surface lost"));
            event_loop.exit();
        }
    }

    fn handle_key(&mut self, event_loop: &ActiveEventLoop, event: &KeyEvent) {
        if event.state != ElementState::Pressed || event.repeat {
            return;
        }
        let PhysicalKey::Code(code) = event.physical_key else {
            return;
        };

        match code {
            KeyCode::Escape => event_loop.exit(),
            KeyCode::F1 => {
                self.overlay_visible = !self.overlay_visible;
                if self.atlas.is_none() {
                    log::info!("overlay unavailable: no font loaded");
                }
            }
            KeyCode::KeyV => {
                if let Some(window) = self.window.as_mut() {
                    window.with_renderer_mut(|r| {
                        let next = match r.device().present_mode() {
                            wgpu::PresentMode::Fifo => wgpu::PresentMode::Mailbox,
                            _ => wgpu::PresentMode::Fifo,
                        };
                        let applied = r.device_mut().set_present_mode(next);
                        log::info!("present mode: {applied:?}");
                    });
                }
            }
            _ => {}
        }
    }
}

impl ApplicationHandler for Viewer {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        if let Err(e) = self.create_window(event_loop) {
            log::error!("failed to create viewer window: {e:#}");
            self.fatal = Some(e);
            event_loop.exit();
            return;
        }

        if let Some(entry) = &self.window {
            entry.with_window(|w| w.request_redraw());
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        event_loop.set_control_flow(ControlFlow::Wait);

        // continuous redraw for the animation
        if let Some(entry) = &self.window {
            entry.with_window(|w| w.request_redraw());
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match &event {
            WindowEvent::CloseRequested => {
                // drop the renderer before the event loop winds down
                self.window = None;
                event_loop.exit();
            }

            WindowEvent::Resized(size) => {
                if let Some(entry) = self.window.as_mut() {
                    entry.with_renderer_mut(|r| r.resize(size.width, size.height));
                    entry.with_window(|w| w.request_redraw());
                }
            }

            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(entry) = self.window.as_mut() {
                    let size = entry.with_window(|w| w.inner_size());
                    entry.with_renderer_mut(|r| r.resize(size.width, size.height));
                }
            }

            WindowEvent::KeyboardInput { event, .. } => self.handle_key(event_loop, event),

            WindowEvent::RedrawRequested => self.redraw(event_loop),

            _ => {}
        }
    }
}
