//! Watermark task definitions for queue processing.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;
use validator::Validate;

use crate::limits::{strength_in_bounds, MAX_WATERMARK_LENGTH};

// `validator` length bounds are `u64`; mirror the shared limit in that type.
const MAX_WATERMARK_LENGTH_U64: u64 = MAX_WATERMARK_LENGTH as u64;

/// Unique identifier for a task.
///
/// Ids are caller-assigned; the core only relies on their uniqueness.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    /// Generate a new random task ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A single embed-watermark-into-video request.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Task {
    /// Unique task ID
    pub id: TaskId,

    /// Temporary input artifact (deleted on any terminal transition)
    pub input_path: PathBuf,

    /// Durable output artifact
    pub output_path: PathBuf,

    /// Text to embed
    #[validate(length(min = 1, max = MAX_WATERMARK_LENGTH_U64))]
    pub text: String,

    /// Embedding strength
    #[validate(range(min = 0.05, max = 0.3))]
    pub strength: f32,

    /// File name as uploaded by the user
    pub original_name: String,
}

impl Task {
    pub fn new(
        id: TaskId,
        input_path: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
        text: impl Into<String>,
        strength: f32,
        original_name: impl Into<String>,
    ) -> Self {
        Self {
            id,
            input_path: input_path.into(),
            output_path: output_path.into(),
            text: text.into(),
            strength,
            original_name: original_name.into(),
        }
    }

    /// Validate the task against the application limits.
    pub fn check(&self) -> Result<(), String> {
        if self.id.as_str().is_empty() {
            return Err("Task id is required".to_string());
        }

        if !strength_in_bounds(self.strength) {
            return Err(format!(
                "Strength must be between {} and {}",
                crate::limits::MIN_STRENGTH,
                crate::limits::MAX_STRENGTH
            ));
        }

        self.validate().map_err(|e| e.to_string())
    }

    /// File name of the output artifact.
    pub fn processed_name(&self) -> String {
        self.output_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(text: &str, strength: f32) -> Task {
        Task::new(
            TaskId::from_string("task-1"),
            "/tmp/uploads/task-1_in.mp4",
            "/tmp/processed/task-1_watermarked_in.mp4",
            text,
            strength,
            "in.mp4",
        )
    }

    #[test]
    fn test_task_id_generation() {
        let a = TaskId::new();
        let b = TaskId::new();
        assert_ne!(a, b);
        assert_eq!(TaskId::from("abc").to_string(), "abc");
    }

    #[test]
    fn test_valid_task() {
        assert!(sample("Copyright 2024", 0.1).check().is_ok());
        assert!(sample("x", 0.05).check().is_ok());
        assert!(sample("x", 0.3).check().is_ok());
    }

    #[test]
    fn test_invalid_strength() {
        assert!(sample("hello", 0.01).check().is_err());
        assert!(sample("hello", 0.5).check().is_err());
        assert!(sample("hello", f32::NAN).check().is_err());
    }

    #[test]
    fn test_invalid_text() {
        assert!(sample("", 0.1).check().is_err());
        let limit = MAX_WATERMARK_LENGTH;
        assert!(sample(&"a".repeat(limit + 1), 0.1).check().is_err());
        assert!(sample(&"a".repeat(limit), 0.1).check().is_ok());
        // Length is counted in characters, not bytes
        assert!(sample(&"é".repeat(limit), 0.1).check().is_ok());
    }

    #[test]
    fn test_processed_name() {
        let task = sample("hello", 0.1);
        assert_eq!(task.processed_name(), "task-1_watermarked_in.mp4");
    }

    #[test]
    fn test_task_serde_roundtrip() {
        let task = sample("hello", 0.15);
        let json = serde_json::to_string(&task).unwrap();
        let back: Task = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, task.id);
        assert_eq!(back.text, "hello");
        assert!(json.contains("\"id\":\"task-1\""));
    }
}
