//! Per-frame counters.
//!
//! Reset at `begin_frame`; stream usage is sampled when the frame is flushed,
//! pass and draw counts as the assembler runs.

use crate::queue::QueueKind;
use crate::stream::StreamStats;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum StreamKind {
    Sprites,
    WorldGeometry,
    Lines,
    UiGeometry,
    UiTextVertices,
    UiTextIndices,
}

impl StreamKind {
    pub const COUNT: usize = 6;

    pub const ALL: [StreamKind; Self::COUNT] = [
        StreamKind::Sprites,
        StreamKind::WorldGeometry,
        StreamKind::Lines,
        StreamKind::UiGeometry,
        StreamKind::UiTextVertices,
        StreamKind::UiTextIndices,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn label(self) -> &'static str {
        match self {
            StreamKind::Sprites => "sprite instances",
            StreamKind::WorldGeometry => "world geometry",
            StreamKind::Lines => "lines",
            StreamKind::UiGeometry => "ui geometry",
            StreamKind::UiTextVertices => "ui text vertices",
            StreamKind::UiTextIndices => "ui text indices",
        }
    }
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct QueueStats {
    /// Entries in the queue after merging.
    pub cmd_count: u32,
    pub draw_calls: u32,
    /// Draws rejected for lack of queue or stream space.
    pub dropped: u32,
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct PassStats {
    pub begin_count: u32,
    pub end_count: u32,
    pub world_passes: u32,
    pub ui_passes: u32,
}

#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct FrameTiming {
    /// Time blocked acquiring the presentation surface.
    pub surface_acquire_ms: f32,
    pub submit_ms: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameStats {
    queues: [QueueStats; QueueKind::COUNT],
    streams: [StreamStats; StreamKind::COUNT],
    pub passes: PassStats,
    pub timing: FrameTiming,
    /// Number of copy passes recorded (0 or 1).
    pub copy_passes: u32,
}

impl FrameStats {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    #[inline]
    pub fn queue(&self, kind: QueueKind) -> &QueueStats {
        &self.queues[kind.index()]
    }

    #[inline]
    pub fn queue_mut(&mut self, kind: QueueKind) -> &mut QueueStats {
        &mut self.queues[kind.index()]
    }

    #[inline]
    pub fn stream(&self, kind: StreamKind) -> &StreamStats {
        &self.streams[kind.index()]
    }

    #[inline]
    pub fn stream_mut(&mut self, kind: StreamKind) -> &mut StreamStats {
        &mut self.streams[kind.index()]
    }

    pub fn total_draw_calls(&self) -> u32 {
        self.queues.iter().map(|q| q.draw_calls).sum()
    }

    pub fn total_commands(&self) -> u32 {
        self.queues.iter().map(|q| q.cmd_count).sum()
    }

    pub fn total_dropped(&self) -> u32 {
        self.queues.iter().map(|q| q.dropped).sum()
    }

    pub fn total_streamed_bytes(&self) -> u64 {
        self.streams.iter().map(|s| s.used_bytes as u64).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totals_sum_every_queue() {
        let mut s = FrameStats::default();
        s.queue_mut(QueueKind::Sprites).draw_calls = 3;
        s.queue_mut(QueueKind::UiText).draw_calls = 2;
        s.queue_mut(QueueKind::Lines).dropped = 4;
        assert_eq!(s.total_draw_calls(), 5);
        assert_eq!(s.total_dropped(), 4);

        s.reset();
        assert_eq!(s, FrameStats::default());
    }
}
