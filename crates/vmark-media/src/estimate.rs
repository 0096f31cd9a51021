//! Advisory processing-time estimate.

use serde::Serialize;
use std::path::Path;
use tracing::warn;

use crate::probe::{probe_video, VideoInfo};

/// Frames per second processed at the reference resolution and text length.
pub const BASE_FRAME_RATE: f64 = 30.0;

/// Pixels in the reference (1080p) frame.
pub const REFERENCE_PIXELS: f64 = 1920.0 * 1080.0;

/// Reference watermark length in characters.
pub const REFERENCE_TEXT_LENGTH: f64 = 20.0;

/// Confidence attached to every estimate.
pub const ESTIMATE_CONFIDENCE: f64 = 0.7;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EstimateFactors {
    pub resolution_factor: f64,
    pub text_length_factor: f64,
    /// Frames per second after scaling
    pub adjusted_rate: f64,
}

/// Estimated wall time to watermark a video. Never a guarantee.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TimeEstimate {
    pub estimated_seconds: f64,
    pub estimated_minutes: f64,
    pub confidence: f64,
    pub factors: Option<EstimateFactors>,
}

impl TimeEstimate {
    /// Zero estimate with zero confidence.
    pub fn unknown() -> Self {
        Self::default()
    }
}

/// Estimate from already-probed video info.
pub fn estimate_processing_time(info: &VideoInfo, text: &str) -> TimeEstimate {
    let resolution_factor = f64::from(info.width) * f64::from(info.height) / REFERENCE_PIXELS;
    let text_length_factor = text.chars().count() as f64 / REFERENCE_TEXT_LENGTH;
    let load = resolution_factor * text_length_factor;

    if load <= 0.0 || !load.is_finite() {
        return TimeEstimate::unknown();
    }

    let adjusted_rate = BASE_FRAME_RATE / load;
    let seconds = info.frame_count as f64 / adjusted_rate.max(1.0);

    TimeEstimate {
        estimated_seconds: round_to(seconds, 1),
        estimated_minutes: round_to(seconds / 60.0, 1),
        confidence: ESTIMATE_CONFIDENCE,
        factors: Some(EstimateFactors {
            resolution_factor: round_to(resolution_factor, 2),
            text_length_factor: round_to(text_length_factor, 2),
            adjusted_rate: round_to(adjusted_rate, 1),
        }),
    }
}

/// Probe `source` and estimate. Probe failures yield [`TimeEstimate::unknown`].
pub async fn estimate_for_source(source: impl AsRef<Path>, text: &str) -> TimeEstimate {
    match probe_video(source.as_ref()).await {
        Ok(info) => estimate_processing_time(&info, text),
        Err(e) => {
            warn!(source = %source.as_ref().display(), error = %e, "Cannot estimate processing time");
            TimeEstimate::unknown()
        }
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(width: u32, height: u32, frame_count: u64) -> VideoInfo {
        VideoInfo {
            duration: frame_count as f64 / 30.0,
            width,
            height,
            fps: 30.0,
            frame_count,
            codec: "h264".to_string(),
            size: 0,
            bitrate: 0,
            has_audio: false,
        }
    }

    #[test]
    fn test_reference_video() {
        // 1080p with a 20-char text runs at the base rate
        let estimate = estimate_processing_time(&info(1920, 1080, 900), &"a".repeat(20));
        assert!((estimate.estimated_seconds - 30.0).abs() < 1e-9);
        assert!((estimate.estimated_minutes - 0.5).abs() < 1e-9);
        assert!((estimate.confidence - ESTIMATE_CONFIDENCE).abs() < 1e-9);
        let factors = estimate.factors.unwrap();
        assert!((factors.adjusted_rate - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_rate_floored_at_one() {
        // Adjusted rate 0.5 fps is clamped to 1
        let estimate = estimate_processing_time(&info(1920, 1080, 100), &"a".repeat(1200));
        assert!((estimate.estimated_seconds - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_small_video_faster() {
        let small = estimate_processing_time(&info(640, 360, 300), "hello");
        let large = estimate_processing_time(&info(1920, 1080, 300), "hello");
        assert!(small.estimated_seconds < large.estimated_seconds);
    }

    #[test]
    fn test_degenerate_inputs() {
        assert_eq!(estimate_processing_time(&info(0, 0, 100), "abc"), TimeEstimate::unknown());
        assert_eq!(estimate_processing_time(&info(1920, 1080, 100), ""), TimeEstimate::unknown());
    }

    #[tokio::test]
    async fn test_missing_source_is_unknown() {
        let estimate = estimate_for_source("/nonexistent/video.mp4", "abc").await;
        assert_eq!(estimate.confidence, 0.0);
    }
}
