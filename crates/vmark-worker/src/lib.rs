//! Watermark task worker.
//!
//! This crate provides:
//! - The single-consumer executor with per-task failure isolation
//! - The [`TaskProcessor`] seam and its FFmpeg-backed implementation
//! - Output registration and task artifact cleanup
//! - Environment configuration, structured task logging and metrics

pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod metrics;
pub mod processor;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::{ShutdownHandle, Worker};
pub use logging::{init_tracing, TaskLogger};
pub use processor::{ProgressFn, TaskProcessor, VideoTaskProcessor};
