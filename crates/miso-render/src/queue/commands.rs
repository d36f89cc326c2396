use smallvec::SmallVec;

use crate::color::Color;
use crate::config::MAX_ATLAS_RANGES;
use crate::device::TextureHandle;
use crate::vertex::Mat4;

/// Triangle list in a vertex stream.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct GeometryCmd {
    pub vertex_offset: u32,
    pub vertex_count: u32,
    pub transform: Mat4,
}

/// A single two-vertex line segment.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LineCmd {
    pub vertex_offset: u32,
    pub color: Color,
    pub transform: Mat4,
}

impl LineCmd {
    pub const VERTEX_COUNT: u32 = 2;
}

/// Contiguous run of indices sampling one atlas texture.
///
/// `start_index` is relative to the owning [`TextCmd`]'s index range.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct AtlasRange {
    pub atlas: TextureHandle,
    pub start_index: u32,
    pub index_count: u32,
}

impl AtlasRange {
    pub const fn new(atlas: TextureHandle, start_index: u32, index_count: u32) -> Self {
        Self {
            atlas,
            start_index,
            index_count,
        }
    }

    #[inline]
    pub fn end_index(&self) -> u32 {
        self.start_index + self.index_count
    }
}

/// Indexed glyph geometry that may span several atlas textures.
#[derive(Debug, Clone, PartialEq)]
pub struct TextCmd {
    pub vertex_offset: u32,
    pub index_offset: u32,
    pub vertex_count: u32,
    pub index_count: u32,
    pub transform: Mat4,
    ranges: SmallVec<[AtlasRange; MAX_ATLAS_RANGES]>,
}

impl TextCmd {
    pub fn new(
        vertex_offset: u32,
        index_offset: u32,
        vertex_count: u32,
        index_count: u32,
        transform: Mat4,
    ) -> Self {
        Self {
            vertex_offset,
            index_offset,
            vertex_count,
            index_count,
            transform,
            ranges: SmallVec::new(),
        }
    }

    /// Appends an atlas range, keeping submission order.
    ///
    /// Empty ranges and ranges past the command's index count are ignored.
    /// Returns `false` once [`MAX_ATLAS_RANGES`] ranges are held.
    pub fn push_range(&mut self, range: AtlasRange) -> bool {
        if self.ranges.len() >= MAX_ATLAS_RANGES {
            return false;
        }
        if range.index_count == 0 {
            return true;
        }
        if range
            .start_index
            .checked_add(range.index_count)
            .is_none_or(|end| end > self.index_count)
        {
            log::debug!(
                "atlas range {}..+{} outside {} indices; skipped",
                range.start_index,
                range.index_count,
                self.index_count
            );
            return true;
        }
        self.ranges.push(range);
        true
    }

    pub fn ranges(&self) -> &[AtlasRange] {
        &self.ranges
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vertex::IDENTITY;

    #[test]
    fn push_range_skips_empty_and_out_of_bounds() {
        let mut cmd = TextCmd::new(0, 0, 8, 12, IDENTITY);
        assert!(cmd.push_range(AtlasRange::new(TextureHandle(1), 0, 0)));
        assert!(cmd.push_range(AtlasRange::new(TextureHandle(1), 6, 12)));
        assert!(cmd.push_range(AtlasRange::new(TextureHandle(2), 0, 6)));
        assert_eq!(cmd.ranges(), &[AtlasRange::new(TextureHandle(2), 0, 6)]);
    }

    #[test]
    fn push_range_caps_at_limit() {
        let mut cmd = TextCmd::new(0, 0, 4, 6 * 32, IDENTITY);
        for i in 0..MAX_ATLAS_RANGES as u32 {
            assert!(cmd.push_range(AtlasRange::new(TextureHandle(i as u64), i * 6, 6)));
        }
        assert!(!cmd.push_range(AtlasRange::new(TextureHandle(99), 0, 6)));
        assert_eq!(cmd.ranges().len(), MAX_ATLAS_RANGES);
    }
}
