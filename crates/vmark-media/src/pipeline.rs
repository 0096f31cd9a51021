//! Frame-by-frame watermarking of whole video files.
//!
//! The source is decoded to RGB24 frames, each frame goes through the codec
//! on the blocking pool, and the result is piped straight into an encoder.
//! A codec failure on one frame (error or panic) writes the original frame
//! and the job carries on.

use metrics::counter;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::codec::vote::majority_string;
use crate::codec::WatermarkCodec;
use crate::error::{MediaError, MediaResult};
use crate::frame::Frame;
use crate::frame_io::{FrameReader, FrameWriter, OutputEncoding};
use crate::fs_utils::non_empty_size;
use crate::probe::probe_video;

/// Extraction stops once this many frames produced a result.
pub const MAX_EXTRACTION_SAMPLES: usize = 10;

/// Metric names.
pub mod names {
    pub const FRAMES_PROCESSED: &str = "vmark_frames_processed_total";
    pub const FRAME_FALLBACKS: &str = "vmark_frame_fallbacks_total";
    pub const FRAMES_SAMPLED: &str = "vmark_frames_sampled_total";
}

/// Outcome of a successful embed.
#[derive(Debug, Clone, Serialize)]
pub struct EmbedReport {
    /// Frame count reported by the container
    pub frames_reported: u64,
    pub frames_written: u64,
    /// Frames written unmodified after a codec failure
    pub fallback_frames: u64,
    /// Output file size in bytes
    pub output_size: u64,
    pub elapsed_ms: u64,
}

struct PumpStats {
    frames: u64,
    fallbacks: u64,
}

/// Watermark every frame of `source` into `dest`.
///
/// `on_progress(frame_index, total_frames)` runs after each frame is
/// written, with a 1-based index. It must return quickly.
///
/// Succeeds only when `dest` exists and is non-empty afterwards.
pub async fn embed_in_stream<F>(
    source: &Path,
    dest: &Path,
    text: &str,
    strength: f32,
    codec: Arc<dyn WatermarkCodec>,
    encoding: &OutputEncoding,
    mut on_progress: F,
) -> MediaResult<EmbedReport>
where
    F: FnMut(u64, u64) + Send,
{
    let started = Instant::now();
    let info = probe_video(source).await?;
    if info.frame_count == 0 {
        return Err(MediaError::NoFrames(source.to_path_buf()));
    }

    info!(
        source = %source.display(),
        frames = info.frame_count,
        width = info.width,
        height = info.height,
        fps = info.fps,
        mode = %codec.mode(),
        "Embedding watermark"
    );

    let mut reader = FrameReader::open(source, &info)?;
    let mut writer = match FrameWriter::open(dest, info.width, info.height, info.fps, encoding) {
        Ok(writer) => writer,
        Err(e) => {
            let _ = reader.close().await;
            return Err(e);
        }
    };

    let text: Arc<str> = Arc::from(text);
    let pumped = pump_frames(
        &mut reader,
        &mut writer,
        &codec,
        &text,
        strength,
        info.frame_count,
        &mut on_progress,
    )
    .await;

    // Release both processes before looking at any result
    let reader_closed = reader.close().await;
    let writer_finished = writer.finish().await;

    let stats = match (pumped, writer_finished) {
        (Ok(stats), Ok(_)) => stats,
        (_, Err(e)) => return Err(e),
        (Err(e), Ok(_)) => return Err(e),
    };

    if let Err(e) = reader_closed {
        warn!(error = %e, frames = stats.frames, "Decoder exited with an error");
    }

    if stats.frames == 0 {
        return Err(MediaError::NoFrames(source.to_path_buf()));
    }

    let output_size = non_empty_size(dest)
        .await
        .ok_or_else(|| MediaError::EmptyOutput(dest.to_path_buf()))?;

    let report = EmbedReport {
        frames_reported: info.frame_count,
        frames_written: stats.frames,
        fallback_frames: stats.fallbacks,
        output_size,
        elapsed_ms: started.elapsed().as_millis() as u64,
    };

    info!(
        dest = %dest.display(),
        frames = report.frames_written,
        fallbacks = report.fallback_frames,
        size = report.output_size,
        elapsed_ms = report.elapsed_ms,
        "Video processing completed"
    );

    Ok(report)
}

async fn pump_frames<F>(
    reader: &mut FrameReader,
    writer: &mut FrameWriter,
    codec: &Arc<dyn WatermarkCodec>,
    text: &Arc<str>,
    strength: f32,
    total: u64,
    on_progress: &mut F,
) -> MediaResult<PumpStats>
where
    F: FnMut(u64, u64) + Send,
{
    let mut stats = PumpStats {
        frames: 0,
        fallbacks: 0,
    };

    while let Some(frame) = reader.next_frame().await? {
        stats.frames += 1;
        let frame = Arc::new(frame);

        match embed_frame(codec, &frame, text, strength).await {
            Ok(marked) => writer.write_frame(&marked).await?,
            Err(reason) => {
                warn!(frame = stats.frames, error = %reason, "Error processing frame, writing original");
                counter!(names::FRAME_FALLBACKS).increment(1);
                stats.fallbacks += 1;
                writer.write_frame(&frame).await?;
            }
        }

        counter!(names::FRAMES_PROCESSED).increment(1);
        on_progress(stats.frames, total);
    }

    Ok(stats)
}

/// Run the codec for one frame on the blocking pool. A panic inside the
/// codec is reported like any other failure.
async fn embed_frame(
    codec: &Arc<dyn WatermarkCodec>,
    frame: &Arc<Frame>,
    text: &Arc<str>,
    strength: f32,
) -> Result<Frame, String> {
    let codec = Arc::clone(codec);
    let frame = Arc::clone(frame);
    let text = Arc::clone(text);

    match tokio::task::spawn_blocking(move || codec.embed(&frame, &text, strength)).await {
        Ok(Ok(marked)) => Ok(marked),
        Ok(Err(e)) => Err(e.to_string()),
        Err(join) => Err(format!("codec panicked: {}", join)),
    }
}

/// Recover a watermark by sampling every `sample_every`-th frame.
///
/// Stops after [`MAX_EXTRACTION_SAMPLES`] frames yielded text and returns
/// the most common whole string, or `None` if nothing was recovered.
pub async fn extract_from_stream(
    source: &Path,
    expected_len: usize,
    codec: Arc<dyn WatermarkCodec>,
    sample_every: usize,
) -> MediaResult<Option<String>> {
    if expected_len == 0 {
        return Ok(None);
    }

    let sample_every = sample_every.max(1) as u64;
    let info = probe_video(source).await?;
    let mut reader = FrameReader::open(source, &info)?;

    let mut candidates = Vec::new();
    let mut index: u64 = 0;

    let scanned = loop {
        let frame = match reader.next_frame().await {
            Ok(Some(frame)) => frame,
            Ok(None) => break Ok(()),
            Err(e) => break Err(e),
        };

        if index % sample_every == 0 {
            counter!(names::FRAMES_SAMPLED).increment(1);
            let codec = Arc::clone(&codec);
            match tokio::task::spawn_blocking(move || codec.extract(&frame, expected_len)).await {
                Ok(Ok(Some(text))) => candidates.push(text),
                Ok(Ok(None)) => {}
                Ok(Err(e)) => debug!(frame = index, error = %e, "Extraction failed on frame"),
                Err(join) => debug!(frame = index, error = %join, "Extraction panicked on frame"),
            }
        }
        index += 1;

        if candidates.len() >= MAX_EXTRACTION_SAMPLES {
            break Ok(());
        }
    };

    if let Err(e) = reader.close().await {
        debug!(error = %e, "Decoder exited with an error during extraction");
    }
    scanned?;

    debug!(
        samples = candidates.len(),
        frames = index,
        "Extraction sampling finished"
    );
    Ok(majority_string(candidates))
}
