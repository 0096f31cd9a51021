//! Detailed video file validation report.

use serde::Serialize;
use std::path::Path;
use tracing::warn;

use crate::command::{FfmpegCommand, PIPE};
use crate::probe::{probe_video, VideoInfo};

pub const MIN_RESOLUTION: (u32, u32) = (320, 240);
pub const MAX_RESOLUTION: (u32, u32) = (3840, 2160);
pub const MIN_FPS: f64 = 1.0;
pub const MAX_FPS: f64 = 120.0;
pub const MIN_DURATION_SECS: f64 = 0.1;
pub const MAX_DURATION_SECS: f64 = 2.0 * 60.0 * 60.0;

/// Validation outcome. Errors make a file invalid; warnings do not.
#[derive(Debug, Clone, Default, Serialize)]
pub struct VideoValidation {
    pub valid: bool,
    pub file_exists: bool,
    pub file_size: u64,
    pub readable: bool,
    pub has_video_stream: bool,
    pub has_audio_stream: bool,
    pub duration: f64,
    pub frame_count: u64,
    pub fps: f64,
    pub resolution: (u32, u32),
    pub codec: Option<String>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Inspect a video file: existence, probe, first-frame decode, and limits.
pub async fn validate_video(path: impl AsRef<Path>) -> VideoValidation {
    let path = path.as_ref();
    let mut report = VideoValidation::default();

    let metadata = match tokio::fs::metadata(path).await {
        Ok(m) if m.is_file() => m,
        _ => {
            report.errors.push("File does not exist".to_string());
            return report;
        }
    };
    report.file_exists = true;
    report.file_size = metadata.len();

    if report.file_size == 0 {
        report.errors.push("File is empty".to_string());
        return report;
    }

    let info = match probe_video(path).await {
        Ok(info) => info,
        Err(e) => {
            report.errors.push(format!("Cannot open video: {}", e));
            return report;
        }
    };
    report.readable = true;
    fill_from_info(&mut report, &info);

    let first_frame = FfmpegCommand::new(path, PIPE)
        .frame_limit(1)
        .output_args(["-f", "null"])
        .run()
        .await;
    match first_frame {
        Ok(()) => report.has_video_stream = true,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "First frame did not decode");
            report.errors.push("Cannot read video frames".to_string());
        }
    }

    report.warnings.extend(limit_warnings(&report));
    report.valid = report.readable && report.has_video_stream && report.errors.is_empty();
    report
}

fn fill_from_info(report: &mut VideoValidation, info: &VideoInfo) {
    report.has_audio_stream = info.has_audio;
    report.frame_count = info.frame_count;
    report.fps = info.fps;
    report.resolution = (info.width, info.height);
    report.codec = (!info.codec.is_empty()).then(|| info.codec.clone());
    report.duration = if info.duration > 0.0 {
        info.duration
    } else if info.fps > 0.0 {
        info.frame_count as f64 / info.fps
    } else {
        0.0
    };
}

/// Non-fatal findings about resolution, frame rate and duration.
pub fn limit_warnings(report: &VideoValidation) -> Vec<String> {
    let mut warnings = Vec::new();
    let (width, height) = report.resolution;

    if width < MIN_RESOLUTION.0 || height < MIN_RESOLUTION.1 {
        warnings.push(format!(
            "Resolution {}x{} is below minimum {}x{}",
            width, height, MIN_RESOLUTION.0, MIN_RESOLUTION.1
        ));
    }
    if width > MAX_RESOLUTION.0 || height > MAX_RESOLUTION.1 {
        warnings.push(format!(
            "Resolution {}x{} exceeds maximum {}x{}",
            width, height, MAX_RESOLUTION.0, MAX_RESOLUTION.1
        ));
    }

    if report.fps < MIN_FPS || report.fps > MAX_FPS {
        warnings.push(format!("Unusual frame rate: {} FPS", report.fps));
    }

    if report.duration < MIN_DURATION_SECS {
        warnings.push("Video duration is very short".to_string());
    } else if report.duration > MAX_DURATION_SECS {
        warnings.push("Video duration is very long".to_string());
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn report(width: u32, height: u32, fps: f64, duration: f64) -> VideoValidation {
        VideoValidation {
            resolution: (width, height),
            fps,
            duration,
            ..Default::default()
        }
    }

    #[test]
    fn test_no_warnings_for_typical_video() {
        assert!(limit_warnings(&report(1280, 720, 30.0, 60.0)).is_empty());
    }

    #[test]
    fn test_resolution_warnings() {
        let low = limit_warnings(&report(160, 120, 30.0, 60.0));
        assert_eq!(low.len(), 1);
        assert!(low[0].contains("below minimum"));

        let high = limit_warnings(&report(7680, 4320, 30.0, 60.0));
        assert!(high[0].contains("exceeds maximum"));
    }

    #[test]
    fn test_fps_and_duration_warnings() {
        let warnings = limit_warnings(&report(1280, 720, 240.0, 0.05));
        assert_eq!(warnings.len(), 2);
        let long = limit_warnings(&report(1280, 720, 30.0, 3.0 * 3600.0));
        assert_eq!(long, vec!["Video duration is very long".to_string()]);
    }

    #[test]
    fn test_duration_from_frames() {
        let mut report = VideoValidation::default();
        let info = VideoInfo {
            duration: 0.0,
            width: 640,
            height: 480,
            fps: 25.0,
            frame_count: 50,
            codec: String::new(),
            size: 0,
            bitrate: 0,
            has_audio: true,
        };
        fill_from_info(&mut report, &info);
        assert!((report.duration - 2.0).abs() < 1e-9);
        assert!(report.codec.is_none());
        assert!(report.has_audio_stream);
    }

    #[tokio::test]
    async fn test_missing_file() {
        let result = validate_video("/nonexistent/clip.mp4").await;
        assert!(!result.valid);
        assert!(!result.file_exists);
        assert_eq!(result.errors, vec!["File does not exist".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.mp4");
        tokio::fs::write(&path, b"").await.unwrap();

        let result = validate_video(&path).await;
        assert!(result.file_exists);
        assert!(!result.valid);
        assert_eq!(result.errors, vec!["File is empty".to_string()]);
    }
}
