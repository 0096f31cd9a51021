//! Registry record for a completed task's output.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::task::{Task, TaskId};

/// Durable description of one watermarked output file.
///
/// Created only when a task reaches `completed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FileRecord {
    pub id: TaskId,
    pub original_name: String,
    pub processed_name: String,
    pub text: String,
    pub strength: f32,
    pub timestamp: DateTime<Utc>,
    /// Output size in bytes
    pub size: u64,
}

impl FileRecord {
    /// Build the record for a finished task.
    pub fn from_task(task: &Task, size: u64) -> Self {
        Self {
            id: task.id.clone(),
            original_name: task.original_name.clone(),
            processed_name: task.processed_name(),
            text: task.text.clone(),
            strength: task.strength,
            timestamp: Utc::now(),
            size,
        }
    }

    /// Output size in megabytes.
    pub fn size_mb(&self) -> f64 {
        self.size as f64 / (1024.0 * 1024.0)
    }
}
