//! Task processing status snapshots.
//!
//! A [`ProcessingStatus`] is never patched field by field: every change
//! builds a fresh value that replaces the previous one wholesale and is
//! pushed to subscribers of the task.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::task::TaskId;

/// Task lifecycle state.
///
/// Transitions are one-way:
/// `Queued -> Processing -> Completed | Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Waiting in the queue
    #[default]
    Queued,
    /// Dequeued and running
    Processing,
    /// Output produced and registered
    Completed,
    /// Failed; all task artifacts removed
    Error,
}

impl TaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Queued => "queued",
            TaskState::Processing => "processing",
            TaskState::Completed => "completed",
            TaskState::Error => "error",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Error)
    }

    /// Whether `next` is a legal successor of this state.
    pub fn can_transition_to(&self, next: TaskState) -> bool {
        match (self, next) {
            (TaskState::Queued, TaskState::Processing) => true,
            (TaskState::Queued, TaskState::Error) => true,
            (TaskState::Processing, TaskState::Processing) => true,
            (TaskState::Processing, TaskState::Completed) => true,
            (TaskState::Processing, TaskState::Error) => true,
            _ => false,
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Latest known status of one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingStatus {
    pub task_id: TaskId,
    pub state: TaskState,
    /// Percentage in 0..=100
    pub progress: u8,
    pub message: String,
}

impl ProcessingStatus {
    pub fn queued(task_id: TaskId) -> Self {
        Self {
            task_id,
            state: TaskState::Queued,
            progress: 0,
            message: "Queued for processing...".to_string(),
        }
    }

    pub fn started(task_id: TaskId) -> Self {
        Self {
            task_id,
            state: TaskState::Processing,
            progress: 0,
            message: "Initializing...".to_string(),
        }
    }

    /// Per-frame progress snapshot.
    pub fn frame_progress(task_id: TaskId, frame: u64, total_frames: u64) -> Self {
        let progress = percentage(frame, total_frames);
        Self {
            task_id,
            state: TaskState::Processing,
            progress,
            message: format!(
                "Processing frame {}/{}... {}%",
                frame, total_frames, progress
            ),
        }
    }

    pub fn completed(task_id: TaskId) -> Self {
        Self {
            task_id,
            state: TaskState::Completed,
            progress: 100,
            message: "Processing completed successfully!".to_string(),
        }
    }

    pub fn failed(task_id: TaskId, error: impl fmt::Display) -> Self {
        Self {
            task_id,
            state: TaskState::Error,
            progress: 0,
            message: format!("Processing failed: {}", error),
        }
    }

    /// Check if the task is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

/// Integer percentage of `done` over `total`, clamped to 100.
///
/// Probed frame counts can undershoot the real stream, so the value
/// saturates instead of overflowing past 100.
pub fn percentage(done: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    ((done.saturating_mul(100)) / total).min(100) as u8
}
