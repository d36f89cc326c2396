//! Frame-sliced upload streams.
//!
//! An [`UploadStream`] pairs one device buffer with a CPU staging arena of the
//! same size. Both are split into [`FRAMES_IN_FLIGHT`] equal slots. Each frame
//! writes only into its own slot, so data the device may still be reading for
//! the previous `FRAMES_IN_FLIGHT - 1` frames is never touched.
//!
//! Allocation is a bump cursor inside the slot. Nothing is freed; the cursor
//! simply resets when the slot comes around again.

use crate::config::FRAMES_IN_FLIGHT;
use crate::device::{BufferId, BufferUsage, GraphicsDevice};
use crate::error::{AllocError, RenderError};
use crate::overflow::OverflowGate;

/// Byte range inside a stream's staging arena (and the matching device buffer).
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct StreamRange {
    offset: u32,
    len: u32,
}

impl StreamRange {
    /// Absolute byte offset from the start of the buffer.
    #[inline]
    pub fn offset(&self) -> u32 {
        self.offset
    }

    #[inline]
    pub fn len(&self) -> u32 {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn end(&self) -> u32 {
        self.offset + self.len
    }
}

/// Usage snapshot of one stream for the current frame.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct StreamStats {
    pub used_bytes: u32,
    pub peak_bytes: u32,
    pub capacity_bytes: u32,
}

#[derive(Debug)]
pub struct UploadStream {
    label: &'static str,
    buffer: BufferId,
    staging: Box<[u8]>,
    mapped: bool,
    slot_size: u32,
    slot_base: u32,
    cursor: u32,
    peak_used: u32,
    overflow: OverflowGate,
}

impl UploadStream {
    /// Creates the device buffer and staging arena.
    ///
    /// `slot_bytes` is rounded up to a multiple of `granule` so every slot base
    /// is aligned for the stream's element type.
    pub fn new<D: GraphicsDevice>(
        device: &mut D,
        label: &'static str,
        usage: BufferUsage,
        slot_bytes: u32,
        granule: u32,
    ) -> Result<Self, RenderError> {
        let slot_size = slot_bytes
            .max(1)
            .checked_next_multiple_of(granule.max(1))
            .ok_or_else(|| RenderError::BufferCreation {
                label,
                size: slot_bytes as u64,
                reason: "slot size overflows u32".into(),
            })?;

        let total = slot_size
            .checked_mul(FRAMES_IN_FLIGHT)
            .ok_or_else(|| RenderError::BufferCreation {
                label,
                size: slot_size as u64 * FRAMES_IN_FLIGHT as u64,
                reason: "total size overflows u32".into(),
            })?;

        let buffer = device.create_buffer(label, usage, total as u64)?;

        log::debug!(
            "upload stream '{label}': {FRAMES_IN_FLIGHT} slots x {slot_size} bytes"
        );

        Ok(Self {
            label,
            buffer,
            staging: vec![0u8; total as usize].into_boxed_slice(),
            mapped: false,
            slot_size,
            slot_base: 0,
            cursor: 0,
            peak_used: 0,
            overflow: OverflowGate::default(),
        })
    }

    /// Releases the device buffer. The stream must not be used afterwards.
    pub fn release<D: GraphicsDevice>(&mut self, device: &mut D) {
        self.mapped = false;
        device.release_buffer(self.buffer);
    }

    /// Points the stream at `slot` and opens it for writing.
    pub fn begin_frame(&mut self, slot: u32) {
        debug_assert!(slot < FRAMES_IN_FLIGHT);
        self.slot_base = (slot % FRAMES_IN_FLIGHT) * self.slot_size;
        self.cursor = self.slot_base;
        self.mapped = true;
        self.overflow.begin_frame();
    }

    /// Closes the stream for writing.
    pub fn end_frame(&mut self) {
        self.mapped = false;
    }

    /// Offset the next allocation with `align` would start at.
    pub fn peek_offset(&self, align: u32) -> u32 {
        self.cursor.next_multiple_of(align.max(1))
    }

    /// Whether `size` bytes at `align` fit in the rest of the slot.
    pub fn can_fit(&self, size: u32, align: u32) -> bool {
        self.peek_offset(align)
            .checked_add(size)
            .is_some_and(|end| end <= self.slot_end())
    }

    /// Reserves `size` bytes aligned to `align` (any non-zero alignment).
    ///
    /// On failure the cursor is unchanged and the first failure until a clean
    /// frame is logged.
    pub fn allocate(&mut self, size: u32, align: u32) -> Result<StreamRange, AllocError> {
        if !self.mapped {
            return Err(AllocError::NotMapped);
        }
        if size == 0 {
            return Err(AllocError::ZeroSize);
        }

        let offset = self.peek_offset(align);
        let limit = self.slot_end();
        match offset.checked_add(size) {
            Some(end) if end <= limit => {
                self.cursor = end;
                self.peak_used = self.peak_used.max(self.used_bytes());
                Ok(StreamRange { offset, len: size })
            }
            _ => {
                self.note_overflow(size);
                Err(AllocError::CapacityExceeded {
                    requested: size,
                    offset,
                    limit,
                })
            }
        }
    }

    /// Allocates and copies `src` into the staging arena.
    pub fn write(&mut self, src: &[u8], align: u32) -> Result<StreamRange, AllocError> {
        let size = u32::try_from(src.len()).map_err(|_| AllocError::CapacityExceeded {
            requested: u32::MAX,
            offset: self.cursor,
            limit: self.slot_end(),
        })?;
        let range = self.allocate(size, align)?;
        self.staging[range.offset as usize..range.end() as usize].copy_from_slice(src);
        Ok(range)
    }

    /// Mutable staging bytes for a range allocated from this stream.
    pub fn bytes_mut(&mut self, range: StreamRange) -> Option<&mut [u8]> {
        if !self.mapped {
            return None;
        }
        self.staging
            .get_mut(range.offset as usize..range.end() as usize)
    }

    /// Staged bytes for a range.
    pub fn staged(&self, range: StreamRange) -> Option<&[u8]> {
        self.staging.get(range.offset as usize..range.end() as usize)
    }

    /// Counts a rejected request; logs only the first one until a clean frame.
    pub(crate) fn note_overflow(&mut self, requested: u32) {
        if self.overflow.trip() {
            log::warn!(
                "upload stream '{}' full ({} of {} bytes, {requested} requested); dropping draws",
                self.label,
                self.used_bytes(),
                self.slot_size,
            );
        }
    }

    /// Copies `[slot_base, cursor)` into the device buffer.
    pub fn upload_used<D: GraphicsDevice>(&self, device: &mut D) {
        let used = self.used_bytes();
        if used == 0 {
            return;
        }
        let range = self.slot_base as usize..self.cursor as usize;
        device.upload(self.buffer, self.slot_base as u64, &self.staging[range]);
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn buffer(&self) -> BufferId {
        self.buffer
    }

    pub fn is_mapped(&self) -> bool {
        self.mapped
    }

    pub fn slot_size(&self) -> u32 {
        self.slot_size
    }

    pub fn total_size(&self) -> u32 {
        self.slot_size * FRAMES_IN_FLIGHT
    }

    pub fn slot_base(&self) -> u32 {
        self.slot_base
    }

    pub fn cursor(&self) -> u32 {
        self.cursor
    }

    pub fn used_bytes(&self) -> u32 {
        self.cursor - self.slot_base
    }

    pub fn peak_used(&self) -> u32 {
        self.peak_used
    }

    /// Requests rejected since this frame began.
    pub fn dropped(&self) -> u32 {
        self.overflow.dropped()
    }

    pub fn stats(&self) -> StreamStats {
        StreamStats {
            used_bytes: self.used_bytes(),
            peak_bytes: self.peak_used,
            capacity_bytes: self.slot_size,
        }
    }

    #[inline]
    fn slot_end(&self) -> u32 {
        self.slot_base + self.slot_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceCall, RecordingDevice};

    fn stream(dev: &mut RecordingDevice, slot_bytes: u32) -> UploadStream {
        UploadStream::new(dev, "test", BufferUsage::Vertex, slot_bytes, 16).unwrap()
    }

    // ── construction ──────────────────────────────────────────────────────

    #[test]
    fn buffer_covers_all_slots() {
        let mut dev = RecordingDevice::new(1, 1);
        let s = stream(&mut dev, 100);
        assert_eq!(s.slot_size(), 112);
        assert_eq!(s.total_size(), 112 * FRAMES_IN_FLIGHT);
        assert_eq!(dev.buffer_bytes(s.buffer()).unwrap().len(), 336);
    }

    #[test]
    fn granule_need_not_be_a_power_of_two() {
        let mut dev = RecordingDevice::new(1, 1);
        let s = UploadStream::new(&mut dev, "sprites", BufferUsage::Instance, 100, 48).unwrap();
        assert_eq!(s.slot_size(), 144);
    }

    // ── slots ─────────────────────────────────────────────────────────────

    #[test]
    fn begin_frame_moves_cursor_to_slot_base() {
        let mut dev = RecordingDevice::new(1, 1);
        let mut s = stream(&mut dev, 64);
        for slot in 0..FRAMES_IN_FLIGHT {
            s.begin_frame(slot);
            assert_eq!(s.slot_base(), slot * 64);
            assert_eq!(s.cursor(), slot * 64);
            assert!(s.is_mapped());
            s.end_frame();
            assert!(!s.is_mapped());
        }
    }

    #[test]
    fn allocations_stay_inside_the_slot() {
        let mut dev = RecordingDevice::new(1, 1);
        let mut s = stream(&mut dev, 64);
        s.begin_frame(1);
        let a = s.allocate(40, 16).unwrap();
        assert_eq!(a.offset(), 64);
        assert!(s.allocate(24, 16).is_err()); // 112 + 24 > 128
        let b = s.allocate(16, 16).unwrap();
        assert_eq!(b.offset(), 112);
        assert_eq!(b.end(), 128);
    }

    // ── allocation ────────────────────────────────────────────────────────

    #[test]
    fn allocate_aligns_cursor() {
        let mut dev = RecordingDevice::new(1, 1);
        let mut s = stream(&mut dev, 256);
        s.begin_frame(0);
        s.allocate(4, 4).unwrap();
        let r = s.allocate(8, 16).unwrap();
        assert_eq!(r.offset(), 16);
        assert_eq!(s.cursor(), 24);
    }

    #[test]
    fn non_power_of_two_alignment() {
        let mut dev = RecordingDevice::new(1, 1);
        let mut s = stream(&mut dev, 256);
        s.begin_frame(0);
        s.allocate(10, 1).unwrap();
        let r = s.allocate(48, 48).unwrap();
        assert_eq!(r.offset(), 48);
    }

    #[test]
    fn overflow_leaves_cursor_unchanged() {
        let mut dev = RecordingDevice::new(1, 1);
        let mut s = stream(&mut dev, 64);
        s.begin_frame(0);
        s.allocate(48, 16).unwrap();
        let before = s.cursor();

        let err = s.allocate(32, 16).unwrap_err();
        assert_eq!(
            err,
            AllocError::CapacityExceeded {
                requested: 32,
                offset: 48,
                limit: 64
            }
        );
        assert_eq!(s.cursor(), before);
        assert_eq!(s.dropped(), 1);

        // a request that still fits succeeds
        assert!(s.allocate(16, 16).is_ok());
    }

    #[test]
    fn unmapped_and_zero_sized_requests_fail() {
        let mut dev = RecordingDevice::new(1, 1);
        let mut s = stream(&mut dev, 64);
        assert_eq!(s.allocate(4, 4), Err(AllocError::NotMapped));
        s.begin_frame(0);
        assert_eq!(s.allocate(0, 4), Err(AllocError::ZeroSize));
    }

    #[test]
    fn can_fit_matches_allocate() {
        let mut dev = RecordingDevice::new(1, 1);
        let mut s = stream(&mut dev, 64);
        s.begin_frame(0);
        s.allocate(20, 4).unwrap();
        assert!(s.can_fit(32, 16));
        assert!(!s.can_fit(33, 16));
    }

    #[test]
    fn peak_tracks_high_water_mark() {
        let mut dev = RecordingDevice::new(1, 1);
        let mut s = stream(&mut dev, 128);
        s.begin_frame(0);
        s.allocate(96, 16).unwrap();
        s.end_frame();
        s.begin_frame(1);
        s.allocate(16, 16).unwrap();
        assert_eq!(s.used_bytes(), 16);
        assert_eq!(s.peak_used(), 96);
        assert_eq!(
            s.stats(),
            StreamStats {
                used_bytes: 16,
                peak_bytes: 96,
                capacity_bytes: 128
            }
        );
    }

    // ── upload ────────────────────────────────────────────────────────────

    #[test]
    fn upload_copies_only_used_bytes_of_the_slot() {
        let mut dev = RecordingDevice::new(1, 1);
        let mut s = stream(&mut dev, 32);
        s.begin_frame(2);
        let r = s.write(&[7u8; 12], 16).unwrap();
        assert_eq!(s.staged(r).unwrap(), &[7u8; 12]);
        s.end_frame();
        s.upload_used(&mut dev);

        assert_eq!(
            dev.calls(),
            &[DeviceCall::Upload {
                buffer: s.buffer(),
                offset: 64,
                len: 12
            }]
        );
        let bytes = dev.buffer_bytes(s.buffer()).unwrap();
        assert_eq!(&bytes[64..76], &[7u8; 12]);
        assert!(bytes[..64].iter().all(|&b| b == 0));
    }

    #[test]
    fn empty_stream_uploads_nothing() {
        let mut dev = RecordingDevice::new(1, 1);
        let mut s = stream(&mut dev, 32);
        s.begin_frame(0);
        s.end_frame();
        s.upload_used(&mut dev);
        assert!(dev.calls().is_empty());
    }

    #[test]
    fn bytes_mut_requires_mapping() {
        let mut dev = RecordingDevice::new(1, 1);
        let mut s = stream(&mut dev, 32);
        s.begin_frame(0);
        let r = s.allocate(4, 4).unwrap();
        s.bytes_mut(r).unwrap().copy_from_slice(&[1, 2, 3, 4]);
        s.end_frame();
        assert!(s.bytes_mut(r).is_none());
        assert_eq!(s.staged(r).unwrap(), &[1, 2, 3, 4]);
    }
}
