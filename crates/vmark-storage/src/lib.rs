//! Output file registry.
//!
//! This crate provides:
//! - The [`FileRegistry`] seam used by the worker
//! - A JSON document implementation rewritten in full on each mutation

pub mod error;
pub mod registry;

pub use error::{StorageError, StorageResult};
pub use registry::{FileRegistry, JsonFileRegistry};
