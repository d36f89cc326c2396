//! Frame lifecycle and the per-frame recording API.
//!
//! A frame moves through `Idle → FrameOpen → Recording → Flushing → Idle`:
//! - `begin_frame` resets queues/stats, acquires a command context and the
//!   surface, then opens the next ring slot of every stream
//! - draw calls only write stream bytes and append queue entries
//! - `flush` (once per frame) uploads used bytes in one copy pass and records
//!   the world and UI passes
//! - `end_frame` flushes if needed and submits

use std::time::Instant;

use crate::color::Color;
use crate::config::{FRAMES_IN_FLIGHT, RendererConfig, STREAM_ALIGN};
use crate::device::{GraphicsDevice, TextureHandle};
use crate::error::RenderError;
use crate::frame::{Queues, Streams};
use crate::pass;
use crate::queue::{
    AtlasRange, BatchOutcome, CommandQueue, GeometryCmd, LineCmd, QueueKind, SpriteUniforms,
    TextCmd,
};
use crate::stats::{FrameStats, StreamKind};
use crate::stream::UploadStream;
use crate::vertex::{
    LineVertex, Mat4, SPRITE_INSTANCE_SIZE, SpriteInstance, TextVertex, Vertex, WaterParams,
    screen_projection,
};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FramePhase {
    Idle,
    /// `begin_frame` is acquiring device resources.
    FrameOpen,
    /// Draw calls are accepted.
    Recording,
    /// Queues were turned into passes; waiting for `end_frame`.
    Flushing,
}

/// Why a draw was dropped.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DropReason {
    StreamFull(StreamKind),
    QueueFull(QueueKind),
}

/// What happened to a draw request.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DrawOutcome {
    /// A new command was appended.
    Queued,
    /// Folded into the previous sprite batch.
    Merged,
    /// Nothing to draw, or no frame is recording.
    Skipped,
    Dropped(DropReason),
}

impl DrawOutcome {
    #[inline]
    pub fn is_recorded(self) -> bool {
        matches!(self, DrawOutcome::Queued | DrawOutcome::Merged)
    }

    #[inline]
    pub fn is_dropped(self) -> bool {
        matches!(self, DrawOutcome::Dropped(_))
    }
}

/// Owns every upload stream and command queue plus the device they feed.
pub struct Renderer<D: GraphicsDevice> {
    device: D,
    config: RendererConfig,
    streams: Streams,
    queues: Queues,
    phase: FramePhase,
    /// Slot the next successful `begin_frame` opens.
    next_slot: u32,
    slot: u32,
    frame_index: u64,
    sprite_uniforms: SpriteUniforms,
    screen_projection: Mat4,
    stats: FrameStats,
}

impl<D: GraphicsDevice> Renderer<D> {
    /// Creates all upload streams on `device`.
    pub fn new(mut device: D, config: RendererConfig) -> Result<Self, RenderError> {
        let streams = Streams::new(&mut device, &config.streams)?;
        let queues = Queues::new(&config.queues);
        let (w, h) = device.surface_size();

        log::info!(
            "renderer ready: {FRAMES_IN_FLIGHT} frames in flight, {w}x{h} surface"
        );

        Ok(Self {
            device,
            config,
            streams,
            queues,
            phase: FramePhase::Idle,
            next_slot: 0,
            slot: 0,
            frame_index: 0,
            sprite_uniforms: SpriteUniforms::default(),
            screen_projection: screen_projection(w, h),
            stats: FrameStats::default(),
        })
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn phase(&self) -> FramePhase {
        self.phase
    }

    /// Ring slot of the current (or last) frame.
    pub fn slot(&self) -> u32 {
        self.slot
    }

    /// Number of frames that reached `Recording`.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn frame_stats(&self) -> &FrameStats {
        &self.stats
    }

    pub fn stream(&self, kind: StreamKind) -> &UploadStream {
        self.streams.get(kind)
    }

    /// Pixel projection used by UI draws this frame.
    pub fn screen_projection(&self) -> &Mat4 {
        &self.screen_projection
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.device.resize(width, height);
    }

    // ── lifecycle ─────────────────────────────────────────────────────────

    /// Starts a frame. Returns `false` when the frame must be skipped.
    pub fn begin_frame(&mut self) -> bool {
        if self.phase != FramePhase::Idle {
            log::warn!("begin_frame while {:?}; ending the open frame first", self.phase);
            self.end_frame();
        }

        self.queues.clear();
        self.stats.reset();
        self.phase = FramePhase::FrameOpen;

        if !self.device.begin_commands() {
            log::debug!("no command context; skipping frame");
            self.phase = FramePhase::Idle;
            return false;
        }

        let started = Instant::now();
        let acquired = self.device.acquire_surface();
        self.stats.timing.surface_acquire_ms = started.elapsed().as_secs_f32() * 1000.0;

        if !acquired {
            log::trace!("surface unavailable; submitting empty frame");
            self.device.submit();
            self.phase = FramePhase::Idle;
            return false;
        }

        self.slot = self.next_slot;
        self.next_slot = (self.slot + 1) % FRAMES_IN_FLIGHT;
        self.streams.begin_frame(self.slot);

        let (w, h) = self.device.surface_size();
        self.screen_projection = screen_projection(w, h);

        self.frame_index += 1;
        self.phase = FramePhase::Recording;
        true
    }

    /// Uploads the frame's stream data and records both passes.
    ///
    /// Runs at most once per frame; later calls are no-ops.
    pub fn flush(&mut self) {
        if self.phase != FramePhase::Recording {
            return;
        }

        self.streams.end_frame();
        self.streams.record_stats(&mut self.stats);
        for kind in QueueKind::ALL {
            self.stats.queue_mut(kind).cmd_count = self.queues.len(kind) as u32;
        }

        self.streams.upload_used(&mut self.device);
        self.stats.copy_passes += 1;

        pass::record_passes(
            &mut self.device,
            &self.queues,
            &self.streams,
            self.config.clear_color,
            &mut self.stats,
        );

        self.phase = FramePhase::Flushing;
    }

    /// Flushes if needed and submits the frame.
    pub fn end_frame(&mut self) {
        match self.phase {
            FramePhase::Idle | FramePhase::FrameOpen => return,
            FramePhase::Recording => self.flush(),
            FramePhase::Flushing => {}
        }

        let started = Instant::now();
        self.device.submit();
        self.stats.timing.submit_ms = started.elapsed().as_secs_f32() * 1000.0;

        self.phase = FramePhase::Idle;
    }

    // ── uniform state ─────────────────────────────────────────────────────

    /// View-projection for sprites, world geometry and lines recorded after this call.
    pub fn set_view_projection(&mut self, view_projection: Mat4) {
        self.sprite_uniforms.view_projection = view_projection;
    }

    pub fn set_water_params(&mut self, water: WaterParams) {
        self.sprite_uniforms.water = water;
    }

    pub fn view_projection(&self) -> &Mat4 {
        &self.sprite_uniforms.view_projection
    }

    // ── draws ─────────────────────────────────────────────────────────────

    /// Streams sprite instances and records (or extends) a batch for `texture`.
    pub fn draw_sprite_instances(
        &mut self,
        texture: TextureHandle,
        instances: &[SpriteInstance],
    ) -> DrawOutcome {
        if self.phase != FramePhase::Recording || instances.is_empty() {
            return DrawOutcome::Skipped;
        }

        let stream = &mut self.streams.sprites;
        let sprites = &mut self.queues.sprites;

        let first = stream.peek_offset(SPRITE_INSTANCE_SIZE) / SPRITE_INSTANCE_SIZE;
        if !sprites.accepts(texture, &self.sprite_uniforms, first) {
            sprites.reject();
            return queue_full(&mut self.stats, QueueKind::Sprites);
        }

        let range = match stream.write(bytemuck::cast_slice(instances), SPRITE_INSTANCE_SIZE) {
            Ok(r) => r,
            Err(_) => {
                return dropped(
                    &mut self.stats,
                    QueueKind::Sprites,
                    DropReason::StreamFull(StreamKind::Sprites),
                );
            }
        };
        debug_assert_eq!(range.offset() / SPRITE_INSTANCE_SIZE, first);

        let count = range.len() / SPRITE_INSTANCE_SIZE;
        match sprites.record(texture, self.sprite_uniforms, first, count) {
            Ok(BatchOutcome::Merged) => DrawOutcome::Merged,
            Ok(BatchOutcome::Pushed) => DrawOutcome::Queued,
            Err(_) => queue_full(&mut self.stats, QueueKind::Sprites),
        }
    }

    /// Records one world-space line segment.
    pub fn draw_line(&mut self, from: [f32; 3], to: [f32; 3], color: Color) -> DrawOutcome {
        if self.phase != FramePhase::Recording {
            return DrawOutcome::Skipped;
        }

        let lines = &mut self.queues.lines;
        if lines.is_full() {
            lines.reject();
            return queue_full(&mut self.stats, QueueKind::Lines);
        }

        let verts = [LineVertex { position: from }, LineVertex { position: to }];
        let Ok(range) = self.streams.lines.write(bytemuck::cast_slice(&verts), STREAM_ALIGN) else {
            return dropped(
                &mut self.stats,
                QueueKind::Lines,
                DropReason::StreamFull(StreamKind::Lines),
            );
        };

        let cmd = LineCmd {
            vertex_offset: range.offset(),
            color,
            transform: self.sprite_uniforms.view_projection,
        };
        match lines.push(cmd) {
            Ok(()) => DrawOutcome::Queued,
            Err(_) => queue_full(&mut self.stats, QueueKind::Lines),
        }
    }

    /// Records a world-space triangle list, transformed by the view-projection.
    pub fn draw_world_geometry(&mut self, vertices: &[Vertex]) -> DrawOutcome {
        if self.phase != FramePhase::Recording {
            return DrawOutcome::Skipped;
        }
        record_geometry(
            &mut self.streams.world_geometry,
            &mut self.queues.world_geometry,
            &mut self.stats,
            StreamKind::WorldGeometry,
            vertices,
            self.sprite_uniforms.view_projection,
        )
    }

    /// Records a pixel-space triangle list for the UI pass.
    pub fn flush_ui_geometry(&mut self, vertices: &[Vertex]) -> DrawOutcome {
        if self.phase != FramePhase::Recording {
            return DrawOutcome::Skipped;
        }
        record_geometry(
            &mut self.streams.ui_geometry,
            &mut self.queues.ui_geometry,
            &mut self.stats,
            StreamKind::UiGeometry,
            vertices,
            self.screen_projection,
        )
    }

    /// Records indexed glyph geometry drawn once per atlas range.
    ///
    /// Range indices are relative to `indices`. Empty ranges are skipped, at most
    /// [`MAX_ATLAS_RANGES`](crate::config::MAX_ATLAS_RANGES) are kept.
    pub fn flush_ui_text(
        &mut self,
        vertices: &[TextVertex],
        indices: &[u32],
        atlases: &[AtlasRange],
    ) -> DrawOutcome {
        if self.phase != FramePhase::Recording || vertices.is_empty() || indices.is_empty() {
            return DrawOutcome::Skipped;
        }

        let text = &mut self.queues.ui_text;
        if text.is_full() {
            text.reject();
            return queue_full(&mut self.stats, QueueKind::UiText);
        }

        let mut cmd = TextCmd::new(
            0,
            0,
            vertices.len() as u32,
            indices.len() as u32,
            self.screen_projection,
        );
        for range in atlases {
            if !cmd.push_range(*range) {
                log::debug!(
                    "text command holds {} atlas ranges; ignoring the rest",
                    cmd.ranges().len()
                );
                break;
            }
        }
        if cmd.ranges().is_empty() {
            return DrawOutcome::Skipped;
        }

        let vertex_bytes: &[u8] = bytemuck::cast_slice(vertices);
        let index_bytes: &[u8] = bytemuck::cast_slice(indices);

        let index_stream = &mut self.streams.ui_text_indices;
        let fits = u32::try_from(index_bytes.len())
            .is_ok_and(|n| index_stream.can_fit(n, STREAM_ALIGN));
        if !fits {
            index_stream.note_overflow(index_bytes.len().min(u32::MAX as usize) as u32);
            return dropped(
                &mut self.stats,
                QueueKind::UiText,
                DropReason::StreamFull(StreamKind::UiTextIndices),
            );
        }

        let vertex_stream = &mut self.streams.ui_text_vertices;
        let Ok(vertex_range) = vertex_stream.write(vertex_bytes, STREAM_ALIGN) else {
            return dropped(
                &mut self.stats,
                QueueKind::UiText,
                DropReason::StreamFull(StreamKind::UiTextVertices),
            );
        };
        let Ok(index_range) = self.streams.ui_text_indices.write(index_bytes, STREAM_ALIGN) else {
            return dropped(
                &mut self.stats,
                QueueKind::UiText,
                DropReason::StreamFull(StreamKind::UiTextIndices),
            );
        };

        cmd.vertex_offset = vertex_range.offset();
        cmd.index_offset = index_range.offset();

        match text.push(cmd) {
            Ok(()) => DrawOutcome::Queued,
            Err(_) => queue_full(&mut self.stats, QueueKind::UiText),
        }
    }

    // ── debug helpers ─────────────────────────────────────────────────────

    /// Draws `texture` stretched over a pixel rectangle in the UI pass.
    pub fn draw_texture_debug(
        &mut self,
        texture: TextureHandle,
        x: f32,
        y: f32,
        w: f32,
        h: f32,
    ) -> DrawOutcome {
        let vertices = [
            TextVertex::new(x, y, 0.0, 0.0),
            TextVertex::new(x + w, y, 1.0, 0.0),
            TextVertex::new(x + w, y + h, 1.0, 1.0),
            TextVertex::new(x, y + h, 0.0, 1.0),
        ];
        let indices = [0, 1, 2, 0, 2, 3];
        self.flush_ui_text(&vertices, &indices, &[AtlasRange::new(texture, 0, 6)])
    }

    /// Draws a solid pixel rectangle in the UI pass.
    pub fn draw_filled_quad_debug(
        &mut self,
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        color: Color,
    ) -> DrawOutcome {
        let (x1, y1) = (x + w, y + h);
        let vertices = [
            Vertex::new(x, y, color),
            Vertex::new(x1, y, color),
            Vertex::new(x1, y1, color),
            Vertex::new(x, y, color),
            Vertex::new(x1, y1, color),
            Vertex::new(x, y1, color),
        ];
        self.flush_ui_geometry(&vertices)
    }
}

impl<D: GraphicsDevice> Drop for Renderer<D> {
    fn drop(&mut self) {
        if self.phase != FramePhase::Idle {
            self.end_frame();
        }
        self.streams.release(&mut self.device);
    }
}

fn dropped(stats: &mut FrameStats, queue: QueueKind, reason: DropReason) -> DrawOutcome {
    stats.queue_mut(queue).dropped += 1;
    DrawOutcome::Dropped(reason)
}

fn queue_full(stats: &mut FrameStats, queue: QueueKind) -> DrawOutcome {
    dropped(stats, queue, DropReason::QueueFull(queue))
}

fn record_geometry(
    stream: &mut UploadStream,
    queue: &mut CommandQueue<GeometryCmd>,
    stats: &mut FrameStats,
    stream_kind: StreamKind,
    vertices: &[Vertex],
    transform: Mat4,
) -> DrawOutcome {
    if vertices.is_empty() {
        return DrawOutcome::Skipped;
    }

    let queue_kind = queue.kind();
    if queue.is_full() {
        queue.reject();
        return queue_full(stats, queue_kind);
    }

    let Ok(range) = stream.write(bytemuck::cast_slice(vertices), STREAM_ALIGN) else {
        return dropped(stats, queue_kind, DropReason::StreamFull(stream_kind));
    };

    let cmd = GeometryCmd {
        vertex_offset: range.offset(),
        vertex_count: vertices.len() as u32,
        transform,
    };
    match queue.push(cmd) {
        Ok(()) => DrawOutcome::Queued,
        Err(_) => queue_full(stats, queue_kind),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{QueueLimits, StreamBudgets};
    use crate::device::{DeviceCall, PassKind, PipelineKind, RecordingDevice};

    const TEX_A: TextureHandle = TextureHandle(10);
    const TEX_B: TextureHandle = TextureHandle(11);

    fn renderer() -> Renderer<RecordingDevice> {
        Renderer::new(RecordingDevice::new(640, 480), RendererConfig::default()).unwrap()
    }

    fn small_renderer(streams: StreamBudgets, queues: QueueLimits) -> Renderer<RecordingDevice> {
        let config = RendererConfig {
            streams,
            queues,
            ..RendererConfig::default()
        };
        Renderer::new(RecordingDevice::new(640, 480), config).unwrap()
    }

    fn sprite(n: f32) -> SpriteInstance {
        SpriteInstance {
            x: n,
            y: n * 2.0,
            w: 32.0,
            h: 16.0,
            uw: 1.0,
            vh: 1.0,
            ..SpriteInstance::default()
        }
    }

    fn glyph_quads(count: u32, first_vertex: u32) -> (Vec<TextVertex>, Vec<u32>) {
        let mut verts = Vec::new();
        let mut idx = Vec::new();
        for g in 0..count {
            let x = g as f32 * 10.0;
            let base = first_vertex + g * 4;
            verts.extend_from_slice(&[
                TextVertex::new(x, 0.0, 0.0, 0.0),
                TextVertex::new(x + 8.0, 0.0, 1.0, 0.0),
                TextVertex::new(x + 8.0, 12.0, 1.0, 1.0),
                TextVertex::new(x, 12.0, 0.0, 1.0),
            ]);
            idx.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }
        (verts, idx)
    }

    // ── lifecycle ─────────────────────────────────────────────────────────

    #[test]
    fn frame_walks_through_all_phases() {
        let mut r = renderer();
        assert_eq!(r.phase(), FramePhase::Idle);
        assert!(r.begin_frame());
        assert_eq!(r.phase(), FramePhase::Recording);
        r.flush();
        assert_eq!(r.phase(), FramePhase::Flushing);
        r.end_frame();
        assert_eq!(r.phase(), FramePhase::Idle);
        assert_eq!(r.device().submissions(), 1);
    }

    #[test]
    fn flushing_twice_records_one_copy_and_two_passes() {
        let mut r = renderer();
        assert!(r.begin_frame());
        r.draw_sprite_instances(TEX_A, &[sprite(1.0)]);
        r.flush();
        r.flush();
        r.end_frame();
        r.end_frame();

        let dev = r.device();
        assert_eq!(dev.count(|c| matches!(c, DeviceCall::BeginCopyPass)), 1);
        assert_eq!(dev.count(|c| matches!(c, DeviceCall::BeginRenderPass(_))), 2);
        assert_eq!(dev.count(|c| matches!(c, DeviceCall::Submit)), 1);

        let stats = r.frame_stats();
        assert_eq!(stats.copy_passes, 1);
        assert_eq!(stats.passes.begin_count, 2);
        assert_eq!(stats.passes.end_count, 2);
        assert_eq!(stats.passes.world_passes, 1);
        assert_eq!(stats.passes.ui_passes, 1);
    }

    #[test]
    fn unavailable_surface_skips_frame_with_empty_submit() {
        let mut r = renderer();
        r.device_mut().set_surface_available(false);
        assert!(!r.begin_frame());
        assert_eq!(r.phase(), FramePhase::Idle);
        assert_eq!(r.draw_sprite_instances(TEX_A, &[sprite(0.0)]), DrawOutcome::Skipped);

        let dev = r.device();
        assert_eq!(
            dev.calls(),
            &[
                DeviceCall::BeginCommands,
                DeviceCall::AcquireSurface { acquired: false },
                DeviceCall::Submit,
            ]
        );
        assert_eq!(r.frame_index(), 0);
    }

    #[test]
    fn missing_command_context_submits_nothing() {
        let mut r = renderer();
        r.device_mut().set_commands_available(false);
        assert!(!r.begin_frame());
        assert_eq!(r.device().submissions(), 0);
    }

    #[test]
    fn skipped_frame_does_not_advance_the_slot() {
        let mut r = renderer();
        assert!(r.begin_frame());
        r.end_frame();
        assert_eq!(r.slot(), 0);

        r.device_mut().set_surface_available(false);
        assert!(!r.begin_frame());
        r.device_mut().set_surface_available(true);

        assert!(r.begin_frame());
        assert_eq!(r.slot(), 1);
        r.end_frame();
    }

    #[test]
    fn slot_base_is_periodic() {
        let mut r = renderer();
        let slot_size = r.stream(StreamKind::Sprites).slot_size();
        let mut bases = Vec::new();
        for _ in 0..(FRAMES_IN_FLIGHT * 3) {
            assert!(r.begin_frame());
            bases.push(r.stream(StreamKind::Sprites).slot_base());
            r.end_frame();
        }

        for (k, base) in bases.iter().enumerate() {
            assert_eq!(*base, (k as u32 % FRAMES_IN_FLIGHT) * slot_size);
        }
        // a slot is not reused by any of the next FRAMES_IN_FLIGHT - 1 frames
        let n = FRAMES_IN_FLIGHT as usize;
        for k in 0..bases.len() {
            for d in 1..n {
                if k + d < bases.len() {
                    assert_ne!(bases[k], bases[k + d]);
                }
            }
        }
    }

    #[test]
    fn draws_outside_a_frame_are_skipped() {
        let mut r = renderer();
        assert_eq!(r.draw_line([0.0; 3], [1.0; 3], Color::WHITE), DrawOutcome::Skipped);
        assert!(r.begin_frame());
        r.flush();
        assert_eq!(r.draw_world_geometry(&[Vertex::default(); 3]), DrawOutcome::Skipped);
        r.end_frame();
        assert!(r.device().count(|c| matches!(c, DeviceCall::Draw { .. })) == 0);
    }

    #[test]
    fn begin_while_recording_submits_the_open_frame() {
        let mut r = renderer();
        assert!(r.begin_frame());
        assert!(r.begin_frame());
        assert_eq!(r.device().submissions(), 1);
        r.end_frame();
        assert_eq!(r.device().submissions(), 2);
    }

    #[test]
    fn drop_releases_stream_buffers() {
        let mut dev = RecordingDevice::new(8, 8);
        {
            let r = Renderer::new(&mut dev, RendererConfig::default()).unwrap();
            assert_eq!(r.device().live_buffers(), StreamKind::COUNT);
        }
        assert_eq!(dev.live_buffers(), 0);
    }

    #[test]
    fn lost_device_fails_construction_as_unavailable() {
        let mut dev = RecordingDevice::new(8, 8);
        dev.set_lost(true);
        match Renderer::new(dev, RendererConfig::default()) {
            Err(RenderError::DeviceUnavailable(reason)) => assert!(reason.contains("adapter lost")),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("renderer built on a lost device"),
        }
    }

    // ── sprites ───────────────────────────────────────────────────────────

    #[test]
    fn sprite_runs_merge_greedily() {
        let mut r = renderer();
        assert!(r.begin_frame());
        let (first, second) = ([sprite(1.0), sprite(2.0)], [sprite(3.0), sprite(4.0)]);
        assert_eq!(r.draw_sprite_instances(TEX_A, &first), DrawOutcome::Queued);
        assert_eq!(r.draw_sprite_instances(TEX_A, &second), DrawOutcome::Merged);
        assert_eq!(r.draw_sprite_instances(TEX_B, &[sprite(5.0)]), DrawOutcome::Queued);
        assert_eq!(r.draw_sprite_instances(TEX_A, &[sprite(6.0)]), DrawOutcome::Queued);
        r.end_frame();

        let stats = r.frame_stats();
        assert_eq!(stats.queue(QueueKind::Sprites).cmd_count, 3);
        assert_eq!(stats.queue(QueueKind::Sprites).draw_calls, 3);

        let draws: Vec<_> = r
            .device()
            .calls()
            .iter()
            .filter_map(|c| match c {
                DeviceCall::Draw { vertices, instances } => {
                    Some((vertices.clone(), instances.clone()))
                }
                _ => None,
            })
            .collect();
        assert_eq!(draws, vec![(0..6, 0..4), (0..6, 4..5), (0..6, 5..6)]);
    }

    #[test]
    fn sprite_bytes_reach_the_device_buffer_intact() {
        let mut r = renderer();
        let input: Vec<_> = (0..6).map(|i| sprite(i as f32)).collect();
        assert!(r.begin_frame());
        r.draw_sprite_instances(TEX_A, &input[..2]);
        r.draw_sprite_instances(TEX_B, &input[2..]);
        r.end_frame();

        let buffer = r.stream(StreamKind::Sprites).buffer();
        let bytes = r.device().buffer_bytes(buffer).unwrap();
        let len = 6 * SPRITE_INSTANCE_SIZE as usize;
        let read: &[SpriteInstance] = bytemuck::cast_slice(&bytes[..len]);
        assert_eq!(read, input.as_slice());
    }

    #[test]
    fn sprite_instance_indices_are_absolute_in_later_slots() {
        let mut r = renderer();
        assert!(r.begin_frame());
        r.end_frame();
        assert!(r.begin_frame());
        r.draw_sprite_instances(TEX_A, &[sprite(0.0), sprite(1.0)]);
        r.end_frame();

        let slot_size = r.stream(StreamKind::Sprites).slot_size();
        let first = slot_size / SPRITE_INSTANCE_SIZE;
        assert!(r.device().calls().contains(&DeviceCall::Draw {
            vertices: 0..6,
            instances: first..first + 2,
        }));
    }

    #[test]
    fn sprite_texture_rebinds_only_on_change() {
        let mut r = renderer();
        assert!(r.begin_frame());
        r.draw_sprite_instances(TEX_A, &[sprite(0.0)]);
        r.set_water_params(WaterParams::new(1.0, 1.0, 0.1, 0.5));
        r.draw_sprite_instances(TEX_A, &[sprite(1.0)]); // same texture, new uniforms
        r.draw_sprite_instances(TEX_B, &[sprite(2.0)]);
        r.end_frame();

        let dev = r.device();
        assert_eq!(dev.count(|c| matches!(c, DeviceCall::BindTexture(_))), 2);
        assert_eq!(dev.count(|c| *c == DeviceCall::BindPipeline(PipelineKind::Sprite)), 2);
        assert_eq!(dev.count(|c| matches!(c, DeviceCall::PushUniforms(_))), 3);
    }

    #[test]
    fn over_capacity_sprite_draw_is_dropped_and_later_fits_succeed() {
        let mut r = small_renderer(
            StreamBudgets {
                sprite_bytes: SPRITE_INSTANCE_SIZE * 4,
                ..StreamBudgets::default()
            },
            QueueLimits::default(),
        );
        assert!(r.begin_frame());
        assert!(r.draw_sprite_instances(TEX_A, &[sprite(0.0); 3]).is_recorded());
        let cursor = r.stream(StreamKind::Sprites).cursor();

        let out = r.draw_sprite_instances(TEX_B, &[sprite(1.0); 2]);
        assert_eq!(out, DrawOutcome::Dropped(DropReason::StreamFull(StreamKind::Sprites)));
        assert_eq!(r.stream(StreamKind::Sprites).cursor(), cursor);

        assert_eq!(r.draw_sprite_instances(TEX_B, &[sprite(2.0)]), DrawOutcome::Queued);
        r.end_frame();

        let stats = r.frame_stats();
        assert_eq!(stats.queue(QueueKind::Sprites).dropped, 1);
        assert_eq!(stats.queue(QueueKind::Sprites).cmd_count, 2);
        assert_eq!(stats.stream(StreamKind::Sprites).used_bytes, SPRITE_INSTANCE_SIZE * 4);
    }

    #[test]
    fn full_sprite_queue_drops_without_consuming_stream_space() {
        let mut r = small_renderer(
            StreamBudgets::default(),
            QueueLimits {
                sprites: 1,
                ..QueueLimits::default()
            },
        );
        assert!(r.begin_frame());
        r.draw_sprite_instances(TEX_A, &[sprite(0.0)]);
        let cursor = r.stream(StreamKind::Sprites).cursor();
        assert_eq!(
            r.draw_sprite_instances(TEX_B, &[sprite(1.0)]),
            DrawOutcome::Dropped(DropReason::QueueFull(QueueKind::Sprites))
        );
        assert_eq!(r.stream(StreamKind::Sprites).cursor(), cursor);
        // contiguous same-texture run still merges into the held batch
        assert_eq!(r.draw_sprite_instances(TEX_A, &[sprite(2.0)]), DrawOutcome::Merged);
        r.end_frame();
    }

    // ── world geometry and lines ──────────────────────────────────────────

    #[test]
    fn world_pass_orders_sprites_geometry_lines() {
        let mut r = renderer();
        assert!(r.begin_frame());
        r.draw_line([0.0, 0.0, 0.0], [1.0, 1.0, 0.0], Color::BLACK);
        r.draw_world_geometry(&[Vertex::default(); 3]);
        r.draw_sprite_instances(TEX_A, &[sprite(0.0)]);
        r.end_frame();

        let pipelines: Vec<_> = r
            .device()
            .calls()
            .iter()
            .filter_map(|c| match c {
                DeviceCall::BindPipeline(p) => Some(*p),
                _ => None,
            })
            .collect();
        assert_eq!(
            pipelines,
            vec![PipelineKind::Sprite, PipelineKind::WorldGeometry, PipelineKind::Line]
        );
    }

    #[test]
    fn world_pass_clears_with_configured_color() {
        let mut r = renderer();
        assert!(r.begin_frame());
        r.end_frame();
        assert!(r.device().calls().contains(&DeviceCall::BeginRenderPass(PassKind::World {
            clear: Color::CORNFLOWER
        })));
        assert!(r.device().calls().contains(&DeviceCall::BeginRenderPass(PassKind::Ui)));
    }

    #[test]
    fn line_carries_color_and_view_projection() {
        let mut r = renderer();
        let mut vp = crate::vertex::IDENTITY;
        vp[0] = 0.5;
        r.set_view_projection(vp);
        assert!(r.begin_frame());
        r.draw_line([1.0, 2.0, 3.0], [4.0, 5.0, 6.0], Color::BLACK);
        r.end_frame();

        let uniforms = r.device().calls().iter().find_map(|c| match c {
            DeviceCall::PushUniforms(u) => Some(*u),
            _ => None,
        });
        let u = uniforms.unwrap();
        assert_eq!(u.transform, vp);
        assert_eq!(u.color, Color::BLACK.to_array());

        let buffer = r.stream(StreamKind::Lines).buffer();
        let bytes = r.device().buffer_bytes(buffer).unwrap();
        let verts: &[LineVertex] = bytemuck::cast_slice(&bytes[..24]);
        assert_eq!(verts, &[LineVertex::new(1.0, 2.0, 3.0), LineVertex::new(4.0, 5.0, 6.0)]);
    }

    #[test]
    fn full_line_queue_reports_drop() {
        let mut r = small_renderer(
            StreamBudgets::default(),
            QueueLimits {
                lines: 2,
                ..QueueLimits::default()
            },
        );
        assert!(r.begin_frame());
        for _ in 0..2 {
            assert_eq!(r.draw_line([0.0; 3], [1.0; 3], Color::WHITE), DrawOutcome::Queued);
        }
        let cursor = r.stream(StreamKind::Lines).cursor();
        assert_eq!(
            r.draw_line([0.0; 3], [1.0; 3], Color::WHITE),
            DrawOutcome::Dropped(DropReason::QueueFull(QueueKind::Lines))
        );
        assert_eq!(r.stream(StreamKind::Lines).cursor(), cursor);
        r.end_frame();
        assert_eq!(r.frame_stats().queue(QueueKind::Lines).dropped, 1);
        assert_eq!(r.frame_stats().queue(QueueKind::Lines).draw_calls, 2);
    }

    #[test]
    fn full_world_geometry_queue_reports_drop() {
        let mut r = small_renderer(
            StreamBudgets::default(),
            QueueLimits {
                world_geometry: 1,
                ..QueueLimits::default()
            },
        );
        let tri = [Vertex::default(); 3];
        assert!(r.begin_frame());
        assert_eq!(r.draw_world_geometry(&tri), DrawOutcome::Queued);
        let cursor = r.stream(StreamKind::WorldGeometry).cursor();
        assert_eq!(
            r.draw_world_geometry(&tri),
            DrawOutcome::Dropped(DropReason::QueueFull(QueueKind::WorldGeometry))
        );
        assert_eq!(r.stream(StreamKind::WorldGeometry).cursor(), cursor);
        r.end_frame();

        let q = r.frame_stats().queue(QueueKind::WorldGeometry);
        assert_eq!((q.cmd_count, q.draw_calls, q.dropped), (1, 1, 1));
    }

    #[test]
    fn full_text_queue_drops_without_touching_either_stream() {
        let mut r = small_renderer(
            StreamBudgets::default(),
            QueueLimits {
                ui_text: 1,
                ..QueueLimits::default()
            },
        );
        let (verts, indices) = glyph_quads(1, 0);
        let ranges = [AtlasRange::new(TEX_A, 0, 6)];
        assert!(r.begin_frame());
        assert_eq!(r.flush_ui_text(&verts, &indices, &ranges), DrawOutcome::Queued);

        let vertex_cursor = r.stream(StreamKind::UiTextVertices).cursor();
        let index_cursor = r.stream(StreamKind::UiTextIndices).cursor();
        assert_eq!(
            r.flush_ui_text(&verts, &indices, &ranges),
            DrawOutcome::Dropped(DropReason::QueueFull(QueueKind::UiText))
        );
        assert_eq!(r.stream(StreamKind::UiTextVertices).cursor(), vertex_cursor);
        assert_eq!(r.stream(StreamKind::UiTextIndices).cursor(), index_cursor);
        r.end_frame();

        let q = r.frame_stats().queue(QueueKind::UiText);
        assert_eq!((q.cmd_count, q.draw_calls, q.dropped), (1, 1, 1));
    }

    #[test]
    fn empty_geometry_is_skipped() {
        let mut r = renderer();
        assert!(r.begin_frame());
        assert_eq!(r.draw_world_geometry(&[]), DrawOutcome::Skipped);
        assert_eq!(r.flush_ui_geometry(&[]), DrawOutcome::Skipped);
        r.end_frame();
        assert_eq!(r.frame_stats().total_commands(), 0);
    }

    // ── UI ────────────────────────────────────────────────────────────────

    #[test]
    fn ui_geometry_uses_screen_projection() {
        let mut r = renderer();
        assert!(r.begin_frame());
        r.draw_filled_quad_debug(0.0, 0.0, 10.0, 10.0, Color::WHITE);
        r.end_frame();

        let expected = screen_projection(640, 480);
        assert!(r.device().calls().iter().any(|c| matches!(
            c,
            DeviceCall::PushUniforms(u) if u.transform == expected
        )));
        assert!(r.device().calls().contains(&DeviceCall::Draw {
            vertices: 0..6,
            instances: 0..1
        }));
    }

    #[test]
    fn text_spanning_two_atlases_draws_once_per_atlas() {
        let mut r = renderer();
        let (verts, indices) = glyph_quads(5, 0);
        let ranges = [AtlasRange::new(TEX_A, 0, 18), AtlasRange::new(TEX_B, 18, 12)];

        assert!(r.begin_frame());
        assert_eq!(r.flush_ui_text(&verts, &indices, &ranges), DrawOutcome::Queued);
        r.end_frame();

        let dev = r.device();
        let indexed: Vec<_> = dev
            .calls()
            .iter()
            .filter_map(|c| match c {
                DeviceCall::DrawIndexed { indices, .. } => Some(indices.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(indexed, vec![0..18, 18..30]);
        assert_eq!(dev.count(|c| matches!(c, DeviceCall::BindVertexBuffer { .. })), 1);
        assert_eq!(dev.count(|c| matches!(c, DeviceCall::BindIndexBuffer { .. })), 1);
        assert_eq!(
            dev.count(|c| matches!(c, DeviceCall::BindTexture(t) if *t == TEX_A || *t == TEX_B)),
            2
        );

        let stats = r.frame_stats();
        assert_eq!(stats.queue(QueueKind::UiText).cmd_count, 1);
        assert_eq!(stats.queue(QueueKind::UiText).draw_calls, 2);
    }

    #[test]
    fn text_without_usable_ranges_is_skipped() {
        let mut r = renderer();
        let (verts, indices) = glyph_quads(1, 0);
        assert!(r.begin_frame());
        assert_eq!(
            r.flush_ui_text(&verts, &indices, &[AtlasRange::new(TEX_A, 0, 0)]),
            DrawOutcome::Skipped
        );
        assert_eq!(r.stream(StreamKind::UiTextVertices).used_bytes(), 0);
        r.end_frame();
    }

    #[test]
    fn text_index_overflow_leaves_both_streams_untouched() {
        let mut r = small_renderer(
            StreamBudgets {
                ui_text_index_bytes: 16,
                ..StreamBudgets::default()
            },
            QueueLimits::default(),
        );
        let (verts, indices) = glyph_quads(1, 0); // 24 index bytes
        assert!(r.begin_frame());
        assert_eq!(
            r.flush_ui_text(&verts, &indices, &[AtlasRange::new(TEX_A, 0, 6)]),
            DrawOutcome::Dropped(DropReason::StreamFull(StreamKind::UiTextIndices))
        );
        assert_eq!(r.stream(StreamKind::UiTextVertices).used_bytes(), 0);
        assert_eq!(r.stream(StreamKind::UiTextIndices).used_bytes(), 0);
        r.end_frame();
    }

    #[test]
    fn texture_debug_goes_through_the_text_path() {
        let mut r = renderer();
        assert!(r.begin_frame());
        assert_eq!(r.draw_texture_debug(TEX_B, 4.0, 4.0, 64.0, 64.0), DrawOutcome::Queued);
        r.end_frame();
        let dev = r.device();
        assert_eq!(dev.count(|c| *c == DeviceCall::BindPipeline(PipelineKind::UiText)), 1);
        assert!(dev.calls().contains(&DeviceCall::BindTexture(TEX_B)));
    }

    // ── uploads ───────────────────────────────────────────────────────────

    #[test]
    fn copy_pass_uploads_only_streams_with_data() {
        let mut r = renderer();
        assert!(r.begin_frame());
        r.draw_line([0.0; 3], [1.0; 3], Color::WHITE);
        r.end_frame();

        let lines = r.stream(StreamKind::Lines).buffer();
        let uploads: Vec<_> = r
            .device()
            .calls()
            .iter()
            .filter(|c| matches!(c, DeviceCall::Upload { .. }))
            .cloned()
            .collect();
        assert_eq!(
            uploads,
            vec![DeviceCall::Upload {
                buffer: lines,
                offset: 0,
                len: 24
            }]
        );
        assert_eq!(r.frame_stats().stream(StreamKind::Lines).used_bytes, 24);
    }
}
