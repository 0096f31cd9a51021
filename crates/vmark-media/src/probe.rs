//! FFprobe video information.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};

/// Frame rate assumed when the container does not report one.
const FALLBACK_FPS: f64 = 30.0;

/// Video file information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoInfo {
    /// Duration in seconds
    pub duration: f64,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Frame rate (fps)
    pub fps: f64,
    /// Number of video frames (reported, or estimated from duration)
    pub frame_count: u64,
    /// Video codec
    pub codec: String,
    /// File size in bytes
    pub size: u64,
    /// Bitrate in bits/second
    pub bitrate: u64,
    /// Whether an audio stream is present
    pub has_audio: bool,
}

impl VideoInfo {
    /// Bytes in one decoded RGB24 frame.
    pub fn frame_bytes(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    size: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
    duration: Option<String>,
}

/// Probe a video file for information.
pub async fn probe_video(path: impl AsRef<Path>) -> MediaResult<VideoInfo> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    check_ffprobe()?;

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: "FFprobe failed".to_string(),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }

    let probe: FfprobeOutput = serde_json::from_slice(&output.stdout)?;
    parse_probe(probe)
}

fn parse_probe(probe: FfprobeOutput) -> MediaResult<VideoInfo> {
    let video_stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "video")
        .ok_or_else(|| MediaError::invalid_video("No video stream found"))?;
    let has_audio = probe.streams.iter().any(|s| s.codec_type == "audio");

    let format = probe.format.as_ref();
    let parse_u64 = |v: Option<&String>| v.and_then(|s| s.parse::<u64>().ok());
    let parse_f64 = |v: Option<&String>| v.and_then(|s| s.parse::<f64>().ok());

    let duration = parse_f64(format.and_then(|f| f.duration.as_ref()))
        .or_else(|| parse_f64(video_stream.duration.as_ref()))
        .unwrap_or(0.0);
    let size = parse_u64(format.and_then(|f| f.size.as_ref())).unwrap_or(0);
    let bitrate = parse_u64(format.and_then(|f| f.bit_rate.as_ref())).unwrap_or(0);

    let fps = video_stream
        .avg_frame_rate
        .as_ref()
        .and_then(|r| parse_frame_rate(r))
        .or_else(|| {
            video_stream
                .r_frame_rate
                .as_ref()
                .and_then(|r| parse_frame_rate(r))
        })
        .unwrap_or(FALLBACK_FPS);

    // Containers like webm/mkv omit nb_frames
    let frame_count = parse_u64(video_stream.nb_frames.as_ref())
        .filter(|n| *n > 0)
        .unwrap_or_else(|| (duration * fps).round().max(0.0) as u64);

    Ok(VideoInfo {
        duration,
        width: video_stream.width.unwrap_or(0),
        height: video_stream.height.unwrap_or(0),
        fps,
        frame_count,
        codec: video_stream.codec_name.clone().unwrap_or_default(),
        size,
        bitrate,
        has_audio,
    })
}

/// Parse frame rate string (e.g., "30/1" or "29.97"). Zero rates are rejected.
fn parse_frame_rate(s: &str) -> Option<f64> {
    let rate = match s.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.parse().ok()?;
            let den: f64 = den.parse().ok()?;
            if den <= 0.0 {
                return None;
            }
            num / den
        }
        None => s.parse().ok()?,
    };
    (rate > 0.0 && rate.is_finite()).then_some(rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_rate() {
        assert!((parse_frame_rate("30/1").unwrap() - 30.0).abs() < 0.01);
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert!((parse_frame_rate("29.97").unwrap() - 29.97).abs() < 0.01);
        assert!(parse_frame_rate("0/0").is_none());
        assert!(parse_frame_rate("0/1").is_none());
    }

    #[test]
    fn test_parse_probe_with_nb_frames() {
        let json = r#"{
            "format": {"duration": "2.000000", "size": "12345", "bit_rate": "400000"},
            "streams": [
                {"codec_type": "video", "codec_name": "h264", "width": 160, "height": 120,
                 "avg_frame_rate": "25/1", "r_frame_rate": "25/1", "nb_frames": "50"},
                {"codec_type": "audio", "codec_name": "aac"}
            ]
        }"#;
        let info = parse_probe(serde_json::from_str(json).unwrap()).unwrap();
        assert_eq!(info.frame_count, 50);
        assert_eq!((info.width, info.height), (160, 120));
        assert_eq!(info.codec, "h264");
        assert!(info.has_audio);
        assert_eq!(info.frame_bytes(), 160 * 120 * 3);
    }

    #[test]
    fn test_parse_probe_estimates_frames_from_duration() {
        let json = r#"{
            "format": {"duration": "4.0"},
            "streams": [
                {"codec_type": "video", "codec_name": "vp9", "width": 640, "height": 360,
                 "avg_frame_rate": "0/0", "r_frame_rate": "30/1"}
            ]
        }"#;
        let info = parse_probe(serde_json::from_str(json).unwrap()).unwrap();
        assert!((info.fps - 30.0).abs() < f64::EPSILON);
        assert_eq!(info.frame_count, 120);
        assert!(!info.has_audio);
    }

    #[test]
    fn test_parse_probe_without_video() {
        let json = r#"{"format": {}, "streams": [{"codec_type": "audio"}]}"#;
        assert!(matches!(
            parse_probe(serde_json::from_str(json).unwrap()),
            Err(MediaError::InvalidVideo(_))
        ));
    }
}
