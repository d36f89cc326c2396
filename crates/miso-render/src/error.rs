use thiserror::Error;

/// Failures that prevent a [`Renderer`](crate::Renderer) from being constructed.
///
/// Nothing on the per-frame path returns this; frame-level problems are reported
/// through [`DrawOutcome`](crate::DrawOutcome) and `begin_frame() == false`.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("graphics device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("failed to create {label} buffer ({size} bytes): {reason}")]
    BufferCreation {
        label: &'static str,
        size: u64,
        reason: String,
    },
}

impl From<anyhow::Error> for RenderError {
    fn from(e: anyhow::Error) -> Self {
        RenderError::DeviceUnavailable(format!("{e:#}"))
    }
}

/// Upload-stream allocation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AllocError {
    #[error("stream slot exhausted: {requested} bytes at offset {offset}, slot ends at {limit}")]
    CapacityExceeded { requested: u32, offset: u32, limit: u32 },

    #[error("stream is not mapped for writing")]
    NotMapped,

    #[error("zero-sized allocation")]
    ZeroSize,
}
