//! Worker configuration.

use std::path::PathBuf;
use std::str::FromStr;

use vmark_media::{CodecConfig, CodecMode, OutputEncoding};
use vmark_models::limits::{DEFAULT_BLOCK_SIZE, FRAME_SAMPLE_RATE};
use vmark_queue::{StatusBoard, DEFAULT_CHANNEL_CAPACITY};

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Directory holding temporary uploaded inputs
    pub upload_dir: PathBuf,
    /// Directory holding durable watermarked outputs
    pub processed_dir: PathBuf,
    /// JSON document backing the file registry
    pub registry_path: PathBuf,
    /// Embedding strategy used by the worker
    pub codec_mode: CodecMode,
    /// DCT block edge length
    pub block_size: usize,
    /// FFmpeg encoder for watermarked outputs
    pub output_codec: String,
    /// Encoder quantizer (`-q:v`)
    pub output_quality: u8,
    /// Extraction samples every Nth frame
    pub frame_sample_rate: usize,
    /// Per-task status channel capacity
    pub status_channel_capacity: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        let encoding = OutputEncoding::default();
        Self {
            upload_dir: PathBuf::from("uploads"),
            processed_dir: PathBuf::from("processed"),
            registry_path: PathBuf::from("file_registry.json"),
            codec_mode: CodecMode::Basic,
            block_size: DEFAULT_BLOCK_SIZE,
            output_codec: encoding.codec,
            output_quality: encoding.quality,
            frame_sample_rate: FRAME_SAMPLE_RATE,
            status_channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            upload_dir: std::env::var("VMARK_UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            processed_dir: std::env::var("VMARK_PROCESSED_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.processed_dir),
            registry_path: std::env::var("VMARK_REGISTRY_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.registry_path),
            codec_mode: env_parse("VMARK_CODEC_MODE").unwrap_or(defaults.codec_mode),
            block_size: env_parse("VMARK_BLOCK_SIZE")
                .filter(|&size: &usize| size > 0)
                .unwrap_or(defaults.block_size),
            output_codec: std::env::var("VMARK_OUTPUT_CODEC").unwrap_or(defaults.output_codec),
            output_quality: env_parse("VMARK_OUTPUT_QUALITY").unwrap_or(defaults.output_quality),
            frame_sample_rate: env_parse("VMARK_FRAME_SAMPLE_RATE")
                .filter(|&rate: &usize| rate > 0)
                .unwrap_or(defaults.frame_sample_rate),
            status_channel_capacity: env_parse("VMARK_STATUS_CHANNEL_CAPACITY")
                .unwrap_or(defaults.status_channel_capacity),
        }
    }

    /// Codec parameters derived from this config.
    pub fn codec_config(&self) -> CodecConfig {
        CodecConfig::default().with_block_size(self.block_size)
    }

    /// Status board sized by `status_channel_capacity`.
    pub fn status_board(&self) -> StatusBoard {
        StatusBoard::new(self.status_channel_capacity)
    }

    pub fn output_encoding(&self) -> OutputEncoding {
        OutputEncoding {
            codec: self.output_codec.clone(),
            quality: self.output_quality,
            ..OutputEncoding::default()
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}
