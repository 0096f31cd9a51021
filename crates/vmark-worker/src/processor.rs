//! Task processing seam.
//!
//! The worker loop owns state transitions, registration and cleanup; a
//! [`TaskProcessor`] only turns a task's input into its output file.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use vmark_media::{build_codec, embed_in_stream, extract_from_stream, OutputEncoding, WatermarkCodec};
use vmark_models::Task;

use crate::config::WorkerConfig;
use crate::error::WorkerResult;

/// Per-frame progress callback: `(frame_index, total_frames)`, 1-based.
/// Invoked synchronously from the processing loop, so it must not block.
pub type ProgressFn = Box<dyn FnMut(u64, u64) + Send>;

#[async_trait]
pub trait TaskProcessor: Send + Sync {
    /// Produce `task.output_path` from `task.input_path`.
    ///
    /// Returns the output size in bytes.
    async fn process(&self, task: &Task, on_progress: ProgressFn) -> WorkerResult<u64>;
}

/// Watermarks every frame of the task's input video.
pub struct VideoTaskProcessor {
    codec: Arc<dyn WatermarkCodec>,
    encoding: OutputEncoding,
    sample_every: usize,
}

impl VideoTaskProcessor {
    pub fn new(codec: Arc<dyn WatermarkCodec>, encoding: OutputEncoding, sample_every: usize) -> Self {
        Self {
            codec,
            encoding,
            sample_every: sample_every.max(1),
        }
    }

    pub fn from_config(config: &WorkerConfig) -> WorkerResult<Self> {
        let codec = build_codec(config.codec_mode, &config.codec_config())?;
        Ok(Self::new(
            Arc::from(codec),
            config.output_encoding(),
            config.frame_sample_rate,
        ))
    }

    pub fn sample_every(&self) -> usize {
        self.sample_every
    }

    /// Read back a watermark with the same codec, sampling every
    /// `sample_every`-th frame.
    pub async fn extract(&self, source: &Path, expected_len: usize) -> WorkerResult<Option<String>> {
        let text = extract_from_stream(
            source,
            expected_len,
            Arc::clone(&self.codec),
            self.sample_every,
        )
        .await?;
        Ok(text)
    }
}

#[async_trait]
impl TaskProcessor for VideoTaskProcessor {
    async fn process(&self, task: &Task, on_progress: ProgressFn) -> WorkerResult<u64> {
        let report = embed_in_stream(
            &task.input_path,
            &task.output_path,
            &task.text,
            task.strength,
            Arc::clone(&self.codec),
            &self.encoding,
            on_progress,
        )
        .await?;

        debug!(
            task_id = %task.id,
            frames = report.frames_written,
            fallbacks = report.fallback_frames,
            elapsed_ms = report.elapsed_ms,
            "Embed finished"
        );

        Ok(report.output_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WorkerError;
    use vmark_media::CodecMode;

    #[test]
    fn test_from_config_uses_mode() {
        let config = WorkerConfig {
            codec_mode: CodecMode::Enhanced,
            ..WorkerConfig::default()
        };
        let processor = VideoTaskProcessor::from_config(&config).unwrap();
        assert_eq!(processor.codec.mode(), CodecMode::Enhanced);
    }

    #[test]
    fn test_from_config_uses_sample_rate() {
        let config = WorkerConfig {
            frame_sample_rate: 12,
            ..WorkerConfig::default()
        };
        let processor = VideoTaskProcessor::from_config(&config).unwrap();
        assert_eq!(processor.sample_every(), 12);
    }

    #[tokio::test]
    async fn test_extract_missing_source_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let processor = VideoTaskProcessor::from_config(&WorkerConfig::default()).unwrap();
        let result = processor.extract(&dir.path().join("missing.mp4"), 4).await;
        assert!(matches!(
            result,
            Err(WorkerError::Media(vmark_media::MediaError::FileNotFound(_)))
        ));
    }

    #[test]
    fn test_from_config_rejects_zero_block() {
        let config = WorkerConfig {
            block_size: 0,
            ..WorkerConfig::default()
        };
        assert!(VideoTaskProcessor::from_config(&config).is_err());
    }

    #[tokio::test]
    async fn test_missing_input_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let processor = VideoTaskProcessor::from_config(&WorkerConfig::default()).unwrap();
        let task = Task::new(
            "missing".into(),
            dir.path().join("missing.mp4"),
            dir.path().join("out.mp4"),
            "hello",
            0.1,
            "missing.mp4",
        );
        let result = processor.process(&task, Box::new(|_, _| {})).await;
        assert!(result.is_err());
    }
}
