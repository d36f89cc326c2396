//! Logger bring-up for binaries built on the renderer.
//!
//! The library itself only emits through the `log` facade; `env_logger` is
//! installed by whoever owns `main`.

mod init;

pub use init::{init_logging, LoggingConfig, DEFAULT_FILTER};
