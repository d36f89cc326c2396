//! Per-frame command queues.
//!
//! Each queue is a bounded list of small records that point into an upload
//! stream. Queues are cleared (not freed) at the start of every frame and never
//! grow past their limit; a full queue rejects the new command.

mod commands;
mod sprite;

pub use commands::{AtlasRange, GeometryCmd, LineCmd, TextCmd};
pub use sprite::{BatchOutcome, SpriteBatch, SpriteQueue, SpriteUniforms};

use crate::overflow::OverflowGate;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum QueueKind {
    Sprites,
    WorldGeometry,
    Lines,
    UiGeometry,
    UiText,
}

impl QueueKind {
    pub const COUNT: usize = 5;

    pub const ALL: [QueueKind; Self::COUNT] = [
        QueueKind::Sprites,
        QueueKind::WorldGeometry,
        QueueKind::Lines,
        QueueKind::UiGeometry,
        QueueKind::UiText,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn name(self) -> &'static str {
        match self {
            QueueKind::Sprites => "sprites",
            QueueKind::WorldGeometry => "world geometry",
            QueueKind::Lines => "lines",
            QueueKind::UiGeometry => "ui geometry",
            QueueKind::UiText => "ui text",
        }
    }
}

/// Returned when a queue is at its entry limit.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct QueueFull;

/// Bounded, append-only command list.
///
/// - `push()` is O(1) and never reallocates once constructed
/// - `clear()` keeps the allocation for the next frame
#[derive(Debug)]
pub struct CommandQueue<T> {
    kind: QueueKind,
    items: Vec<T>,
    limit: usize,
    overflow: OverflowGate,
}

impl<T> CommandQueue<T> {
    pub fn new(kind: QueueKind, limit: usize) -> Self {
        Self {
            kind,
            items: Vec::with_capacity(limit),
            limit,
            overflow: OverflowGate::default(),
        }
    }

    /// Empties the queue for a new frame.
    pub fn clear(&mut self) {
        self.items.clear();
        self.overflow.begin_frame();
    }

    pub fn push(&mut self, item: T) -> Result<(), QueueFull> {
        if self.is_full() {
            self.reject();
            return Err(QueueFull);
        }
        self.items.push(item);
        Ok(())
    }

    /// Counts a command dropped because the queue is full.
    pub(crate) fn reject(&mut self) {
        if self.overflow.trip() {
            log::warn!(
                "{} queue full ({} commands); dropping draws",
                self.kind.name(),
                self.limit
            );
        }
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.items.len() >= self.limit
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[inline]
    pub fn limit(&self) -> usize {
        self.limit
    }

    #[inline]
    pub fn kind(&self) -> QueueKind {
        self.kind
    }

    /// Commands dropped since the last `clear`.
    #[inline]
    pub fn dropped(&self) -> u32 {
        self.overflow.dropped()
    }

    #[inline]
    pub fn items(&self) -> &[T] {
        &self.items
    }

    #[inline]
    pub fn last_mut(&mut self) -> Option<&mut T> {
        self.items.last_mut()
    }
}
