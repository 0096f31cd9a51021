//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),

    #[error("Task panicked: {0}")]
    Panicked(String),

    #[error("Registration failed: {0}")]
    RegistrationFailed(String),

    #[error("Media error: {0}")]
    Media(#[from] vmark_media::MediaError),

    #[error("Codec error: {0}")]
    Codec(#[from] vmark_media::CodecError),

    #[error("Storage error: {0}")]
    Storage(#[from] vmark_storage::StorageError),

    #[error("Queue error: {0}")]
    Queue(#[from] vmark_queue::QueueError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn processing_failed(msg: impl Into<String>) -> Self {
        Self::ProcessingFailed(msg.into())
    }

    pub fn panicked(msg: impl Into<String>) -> Self {
        Self::Panicked(msg.into())
    }

    pub fn registration_failed(msg: impl Into<String>) -> Self {
        Self::RegistrationFailed(msg.into())
    }
}
