//! Queue error types.

use thiserror::Error;
use vmark_models::TaskId;

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Invalid task: {0}")]
    InvalidTask(String),

    #[error("Task already submitted: {0}")]
    DuplicateTask(TaskId),

    #[error("Task queue is closed")]
    Closed,
}

impl QueueError {
    pub fn invalid_task(msg: impl Into<String>) -> Self {
        Self::InvalidTask(msg.into())
    }
}
