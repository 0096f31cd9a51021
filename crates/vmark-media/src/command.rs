//! FFmpeg command builder and process helpers.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStderr, Command};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::{MediaError, MediaResult};

/// Placeholder path meaning stdin (as input) or stdout (as output).
pub const PIPE: &str = "-";

/// Cap on captured stderr, enough for FFmpeg's error summary.
const STDERR_LIMIT: usize = 16 * 1024;

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Input file path, or [`PIPE`]
    input: PathBuf,
    /// Output file path, or [`PIPE`]
    output: PathBuf,
    /// Input arguments (before -i)
    input_args: Vec<String>,
    /// Output arguments (after -i)
    output_args: Vec<String>,
    /// Whether to overwrite output
    overwrite: bool,
    /// Log level
    log_level: String,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command.
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            input_args: Vec::new(),
            output_args: Vec::new(),
            overwrite: true,
            log_level: "error".to_string(),
        }
    }

    /// Add input arguments (before -i).
    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        self.input_args.push(arg.into());
        self
    }

    /// Add output arguments (after -i).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Describe a raw RGB24 input stream of the given geometry.
    pub fn rawvideo_input(self, width: u32, height: u32, fps: f64) -> Self {
        self.input_arg("-f")
            .input_arg("rawvideo")
            .input_arg("-pix_fmt")
            .input_arg("rgb24")
            .input_arg("-s")
            .input_arg(format!("{}x{}", width, height))
            .input_arg("-r")
            .input_arg(format_fps(fps))
    }

    /// Decode to raw RGB24 frames.
    pub fn rawvideo_output(self) -> Self {
        self.output_args(["-an", "-f", "rawvideo", "-pix_fmt", "rgb24"])
    }

    /// Set video codec.
    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:v").output_arg(codec)
    }

    /// Set fixed quantizer quality (`-q:v`).
    pub fn quality(self, q: u8) -> Self {
        self.output_arg("-q:v").output_arg(q.to_string())
    }

    /// Set output pixel format.
    pub fn pixel_format(self, fmt: impl Into<String>) -> Self {
        self.output_arg("-pix_fmt").output_arg(fmt)
    }

    /// Drop audio streams.
    pub fn no_audio(self) -> Self {
        self.output_arg("-an")
    }

    /// Stop after `n` video frames.
    pub fn frame_limit(self, n: u64) -> Self {
        self.output_arg("-frames:v").output_arg(n.to_string())
    }

    /// Set log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }

        // Keyboard interaction must stay off unless frames arrive on stdin
        if self.input != Path::new(PIPE) {
            args.push("-nostdin".to_string());
        }
        args.push("-v".to_string());
        args.push(self.log_level.clone());

        args.extend(self.input_args.clone());

        args.push("-i".to_string());
        args.push(self.input.to_string_lossy().to_string());

        args.extend(self.output_args.clone());

        args.push(self.output.to_string_lossy().to_string());

        args
    }

    /// Spawn FFmpeg with the requested pipes attached.
    ///
    /// The child is killed if its handle is dropped, so an early return on
    /// any path never leaves a stray process behind.
    pub fn spawn(&self, pipe_stdin: bool, pipe_stdout: bool) -> MediaResult<Child> {
        check_ffmpeg()?;

        let args = self.build_args();
        debug!("Running FFmpeg: ffmpeg {}", args.join(" "));

        let mut command = Command::new("ffmpeg");
        command
            .args(&args)
            .stdin(if pipe_stdin { Stdio::piped() } else { Stdio::null() })
            .stdout(if pipe_stdout { Stdio::piped() } else { Stdio::null() })
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        Ok(command.spawn()?)
    }

    /// Run to completion, failing on a non-zero exit status.
    pub async fn run(&self) -> MediaResult<()> {
        let mut child = self.spawn(false, false)?;
        let stderr = drain_stderr(&mut child);
        let status = child.wait().await?;
        let stderr = collect_stderr(stderr).await;

        if status.success() {
            Ok(())
        } else {
            Err(MediaError::ffmpeg_failed(
                "FFmpeg exited with non-zero status",
                stderr,
                status.code(),
            ))
        }
    }
}

/// Format a frame rate the way FFmpeg expects it on the command line.
fn format_fps(fps: f64) -> String {
    let rounded = fps.round();
    if (fps - rounded).abs() < 1e-6 {
        format!("{}", rounded as u64)
    } else {
        format!("{:.6}", fps)
    }
}

/// Read the child's stderr in the background so the pipe never fills up.
pub(crate) fn drain_stderr(child: &mut Child) -> Option<JoinHandle<String>> {
    child.stderr.take().map(|stderr| tokio::spawn(read_limited(stderr)))
}

async fn read_limited(mut stderr: ChildStderr) -> String {
    let mut captured = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        match stderr.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let room = STDERR_LIMIT.saturating_sub(captured.len());
                captured.extend_from_slice(&buf[..n.min(room)]);
            }
        }
    }
    String::from_utf8_lossy(&captured).trim().to_string()
}

/// Await a drained stderr, returning `None` when it was empty.
pub(crate) async fn collect_stderr(handle: Option<JoinHandle<String>>) -> Option<String> {
    match handle {
        Some(handle) => handle.await.ok().filter(|s| !s.is_empty()),
        None => None,
    }
}

/// Check if FFmpeg is available.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}

/// Check if FFprobe is available.
pub fn check_ffprobe() -> MediaResult<PathBuf> {
    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decoder_args() {
        let args = FfmpegCommand::new("in.mp4", PIPE).rawvideo_output().build_args();
        let joined = args.join(" ");
        assert!(joined.starts_with("-y -nostdin -v error -i in.mp4"));
        assert!(joined.ends_with("-an -f rawvideo -pix_fmt rgb24 -"));
    }

    #[test]
    fn test_encoder_args() {
        let args = FfmpegCommand::new(PIPE, "out.mp4")
            .rawvideo_input(160, 120, 25.0)
            .no_audio()
            .video_codec("mpeg4")
            .quality(2)
            .pixel_format("yuv420p")
            .build_args();
        let joined = args.join(" ");
        assert!(joined.contains("-f rawvideo -pix_fmt rgb24 -s 160x120 -r 25 -i -"));
        assert!(joined.contains("-c:v mpeg4 -q:v 2 -pix_fmt yuv420p out.mp4"));
        assert!(!joined.contains("-nostdin"));
    }

    #[test]
    fn test_format_fps() {
        assert_eq!(format_fps(30.0), "30");
        assert_eq!(format_fps(30000.0 / 1001.0), "29.970030");
    }
}
