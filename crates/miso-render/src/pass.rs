//! Turns a frame's queues into the world and UI render passes.

use crate::color::Color;
use crate::device::{GraphicsDevice, PassKind, PipelineKind, TextureHandle};
use crate::frame::{Queues, Streams};
use crate::queue::{LineCmd, QueueKind};
use crate::stats::FrameStats;
use crate::vertex::DrawUniforms;

/// Vertices per sprite quad (two triangles, generated in the vertex shader).
const SPRITE_QUAD_VERTICES: u32 = 6;

pub(crate) fn record_passes<D: GraphicsDevice>(
    device: &mut D,
    queues: &Queues,
    streams: &Streams,
    clear_color: Color,
    stats: &mut FrameStats,
) {
    world_pass(device, queues, streams, clear_color, stats);
    ui_pass(device, queues, streams, stats);
}

/// Depth-tested pass: sprites, then world geometry, then lines.
fn world_pass<D: GraphicsDevice>(
    device: &mut D,
    queues: &Queues,
    streams: &Streams,
    clear_color: Color,
    stats: &mut FrameStats,
) {
    device.begin_render_pass(PassKind::World { clear: clear_color });
    stats.passes.begin_count += 1;
    stats.passes.world_passes += 1;

    let mut bound: Option<TextureHandle> = None;
    for batch in queues.sprites.batches() {
        if batch.instance_count == 0 {
            continue;
        }
        if bound != Some(batch.texture) {
            device.bind_pipeline(PipelineKind::Sprite);
            device.bind_texture(batch.texture);
            device.bind_instance_buffer(streams.sprites.buffer());
            bound = Some(batch.texture);
        }
        device.push_uniforms(&batch.uniforms.to_draw_uniforms());
        device.draw(0..SPRITE_QUAD_VERTICES, batch.first_instance..batch.end_instance());
        stats.queue_mut(QueueKind::Sprites).draw_calls += 1;
    }

    for cmd in queues.world_geometry.items() {
        if cmd.vertex_count == 0 {
            continue;
        }
        device.bind_pipeline(PipelineKind::WorldGeometry);
        device.bind_vertex_buffer(streams.world_geometry.buffer(), cmd.vertex_offset as u64);
        device.push_uniforms(&DrawUniforms::transform(cmd.transform));
        device.draw(0..cmd.vertex_count, 0..1);
        stats.queue_mut(QueueKind::WorldGeometry).draw_calls += 1;
    }

    for cmd in queues.lines.items() {
        device.bind_pipeline(PipelineKind::Line);
        device.bind_vertex_buffer(streams.lines.buffer(), cmd.vertex_offset as u64);
        device.push_uniforms(&DrawUniforms::tinted(cmd.transform, cmd.color));
        device.draw(0..LineCmd::VERTEX_COUNT, 0..1);
        stats.queue_mut(QueueKind::Lines).draw_calls += 1;
    }

    device.end_render_pass();
    stats.passes.end_count += 1;
}

/// Screen-space pass over the world image: UI geometry, then text.
fn ui_pass<D: GraphicsDevice>(
    device: &mut D,
    queues: &Queues,
    streams: &Streams,
    stats: &mut FrameStats,
) {
    device.begin_render_pass(PassKind::Ui);
    stats.passes.begin_count += 1;
    stats.passes.ui_passes += 1;

    for cmd in queues.ui_geometry.items() {
        if cmd.vertex_count == 0 {
            continue;
        }
        device.bind_pipeline(PipelineKind::UiGeometry);
        device.bind_vertex_buffer(streams.ui_geometry.buffer(), cmd.vertex_offset as u64);
        device.push_uniforms(&DrawUniforms::transform(cmd.transform));
        device.draw(0..cmd.vertex_count, 0..1);
        stats.queue_mut(QueueKind::UiGeometry).draw_calls += 1;
    }

    for cmd in queues.ui_text.items() {
        if cmd.ranges().is_empty() {
            continue;
        }
        device.bind_pipeline(PipelineKind::UiText);
        device.bind_vertex_buffer(streams.ui_text_vertices.buffer(), cmd.vertex_offset as u64);
        device.bind_index_buffer(streams.ui_text_indices.buffer(), cmd.index_offset as u64);
        device.push_uniforms(&DrawUniforms::transform(cmd.transform));
        for range in cmd.ranges() {
            device.bind_texture(range.atlas);
            device.draw_indexed(range.start_index..range.end_index(), 0);
            stats.queue_mut(QueueKind::UiText).draw_calls += 1;
        }
    }

    device.end_render_pass();
    stats.passes.end_count += 1;
}
