//! Shared data models for the VMark backend.
//!
//! This crate provides Serde-serializable types for:
//! - Watermark tasks and their identifiers
//! - Processing status snapshots pushed to subscribers
//! - Registry records for finished outputs
//! - Application limits (strength bounds, text length, containers)

pub mod limits;
pub mod record;
pub mod status;
pub mod task;

// Re-export common types
pub use limits::{is_allowed_extension, ALLOWED_EXTENSIONS};
pub use record::FileRecord;
pub use status::{ProcessingStatus, TaskState};
pub use task::{Task, TaskId};
