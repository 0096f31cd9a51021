//! Error types for the watermark codec.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors raised while embedding into or extracting from a single frame.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Frame is empty")]
    EmptyFrame,

    #[error("Unsupported frame layout: {0}")]
    UnsupportedLayout(String),

    #[error("Invalid frame buffer: {0}")]
    InvalidBuffer(String),

    #[error("Invalid block size {0}: must be at least {min}", min = super::MIN_BLOCK_SIZE)]
    InvalidBlockSize(usize),

    #[error("Invalid strength: {0}")]
    InvalidStrength(f32),

    #[error("Invalid redundancy: {0}")]
    InvalidRedundancy(usize),

    #[error("Image codec error: {0}")]
    Image(#[from] image::ImageError),
}

impl CodecError {
    pub fn unsupported_layout(msg: impl Into<String>) -> Self {
        Self::UnsupportedLayout(msg.into())
    }

    pub fn invalid_buffer(msg: impl Into<String>) -> Self {
        Self::InvalidBuffer(msg.into())
    }
}
