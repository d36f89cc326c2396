use bytemuck::{Pod, Zeroable};

use crate::device::TextureHandle;
use crate::vertex::{DrawUniforms, IDENTITY, Mat4, WaterParams};

use super::{CommandQueue, QueueFull, QueueKind};

/// Uniform state captured with each sprite batch.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct SpriteUniforms {
    pub view_projection: Mat4,
    pub water: WaterParams,
}

impl Default for SpriteUniforms {
    fn default() -> Self {
        Self {
            view_projection: IDENTITY,
            water: WaterParams::default(),
        }
    }
}

impl SpriteUniforms {
    pub fn to_draw_uniforms(&self) -> DrawUniforms {
        DrawUniforms {
            params: self.water.to_array(),
            ..DrawUniforms::transform(self.view_projection)
        }
    }
}

/// A run of sprite instances sharing one texture and uniform snapshot.
///
/// `first_instance` indexes the whole instance buffer, not the frame's slot.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SpriteBatch {
    pub texture: TextureHandle,
    pub uniforms: SpriteUniforms,
    pub first_instance: u32,
    pub instance_count: u32,
}

impl SpriteBatch {
    #[inline]
    pub fn end_instance(&self) -> u32 {
        self.first_instance + self.instance_count
    }

    /// Whether instances `[first, ..)` can extend this batch in place.
    #[inline]
    fn continues(&self, texture: TextureHandle, uniforms: &SpriteUniforms, first: u32) -> bool {
        self.texture == texture && self.uniforms == *uniforms && self.end_instance() == first
    }
}

/// Result of recording instances into a [`SpriteQueue`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BatchOutcome {
    Pushed,
    Merged,
}

/// Sprite batches with greedy merging against the previous entry.
///
/// Only the last batch is inspected, so `A B A` stays three batches even when
/// the two `A` runs could have been drawn together.
#[derive(Debug)]
pub struct SpriteQueue {
    batches: CommandQueue<SpriteBatch>,
}

impl SpriteQueue {
    pub fn new(limit: usize) -> Self {
        Self {
            batches: CommandQueue::new(QueueKind::Sprites, limit),
        }
    }

    pub fn clear(&mut self) {
        self.batches.clear();
    }

    /// Whether a run starting at `first` would be accepted (merged or pushed).
    pub fn accepts(&self, texture: TextureHandle, uniforms: &SpriteUniforms, first: u32) -> bool {
        self.would_merge(texture, uniforms, first) || !self.batches.is_full()
    }

    fn would_merge(&self, texture: TextureHandle, uniforms: &SpriteUniforms, first: u32) -> bool {
        self.batches
            .items()
            .last()
            .is_some_and(|b| b.continues(texture, uniforms, first))
    }

    /// Records `count` instances starting at `first`.
    pub fn record(
        &mut self,
        texture: TextureHandle,
        uniforms: SpriteUniforms,
        first: u32,
        count: u32,
    ) -> Result<BatchOutcome, QueueFull> {
        if let Some(last) = self.batches.last_mut() {
            if last.continues(texture, &uniforms, first) {
                last.instance_count += count;
                return Ok(BatchOutcome::Merged);
            }
        }

        self.batches.push(SpriteBatch {
            texture,
            uniforms,
            first_instance: first,
            instance_count: count,
        })?;
        Ok(BatchOutcome::Pushed)
    }

    /// Counts a run dropped before it reached the queue.
    pub(crate) fn reject(&mut self) {
        self.batches.reject();
    }

    pub fn batches(&self) -> &[SpriteBatch] {
        self.batches.items()
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    pub fn dropped(&self) -> u32 {
        self.batches.dropped()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEX_A: TextureHandle = TextureHandle(1);
    const TEX_B: TextureHandle = TextureHandle(2);

    fn uniforms() -> SpriteUniforms {
        SpriteUniforms::default()
    }

    // ── merging ───────────────────────────────────────────────────────────

    #[test]
    fn contiguous_same_texture_merges() {
        let mut q = SpriteQueue::new(16);
        assert_eq!(q.record(TEX_A, uniforms(), 0, 2), Ok(BatchOutcome::Pushed));
        assert_eq!(q.record(TEX_A, uniforms(), 2, 2), Ok(BatchOutcome::Merged));
        assert_eq!(q.len(), 1);
        assert_eq!(q.batches()[0].instance_count, 4);
    }

    #[test]
    fn interleaved_texture_breaks_the_run() {
        let mut q = SpriteQueue::new(16);
        q.record(TEX_A, uniforms(), 0, 2).unwrap();
        q.record(TEX_A, uniforms(), 2, 2).unwrap();
        q.record(TEX_B, uniforms(), 4, 1).unwrap();
        q.record(TEX_A, uniforms(), 5, 1).unwrap();

        let b = q.batches();
        assert_eq!(b.len(), 3);
        assert_eq!((b[0].texture, b[0].first_instance, b[0].instance_count), (TEX_A, 0, 4));
        assert_eq!((b[1].texture, b[1].first_instance, b[1].instance_count), (TEX_B, 4, 1));
        assert_eq!((b[2].texture, b[2].first_instance, b[2].instance_count), (TEX_A, 5, 1));
    }

    #[test]
    fn gap_in_instances_does_not_merge() {
        let mut q = SpriteQueue::new(16);
        q.record(TEX_A, uniforms(), 0, 2).unwrap();
        assert_eq!(q.record(TEX_A, uniforms(), 3, 1), Ok(BatchOutcome::Pushed));
    }

    #[test]
    fn changed_uniforms_do_not_merge() {
        let mut q = SpriteQueue::new(16);
        q.record(TEX_A, uniforms(), 0, 1).unwrap();
        let mut moved = uniforms();
        moved.water.time = 1.0;
        assert_eq!(q.record(TEX_A, moved, 1, 1), Ok(BatchOutcome::Pushed));
    }

    // ── capacity ──────────────────────────────────────────────────────────

    #[test]
    fn full_queue_still_merges_into_last() {
        let mut q = SpriteQueue::new(1);
        q.record(TEX_A, uniforms(), 0, 1).unwrap();
        assert!(q.accepts(TEX_A, &uniforms(), 1));
        assert!(!q.accepts(TEX_B, &uniforms(), 1));
        assert_eq!(q.record(TEX_A, uniforms(), 1, 1), Ok(BatchOutcome::Merged));
        assert_eq!(q.record(TEX_B, uniforms(), 2, 1), Err(QueueFull));
        assert_eq!(q.dropped(), 1);
    }

    #[test]
    fn sprite_uniforms_forward_water_params() {
        let mut u = uniforms();
        u.water = WaterParams::new(1.0, 2.0, 3.0, 4.0);
        assert_eq!(u.to_draw_uniforms().params, [1.0, 2.0, 3.0, 4.0]);
    }
}
