//! Streaming frame decode/encode over FFmpeg rawvideo pipes.
//!
//! Only one frame is held in memory at a time. Both ends own their FFmpeg
//! child with `kill_on_drop`, so dropping a reader or writer on an error
//! path releases the process.

use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::command::{collect_stderr, drain_stderr, FfmpegCommand, PIPE};
use crate::error::{MediaError, MediaResult};
use crate::frame::Frame;
use crate::probe::VideoInfo;

/// Channels in a decoded RGB24 frame.
const RGB_CHANNELS: usize = 3;

/// Output encoder settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputEncoding {
    /// FFmpeg encoder name; `mpeg4` matches the `mp4v` fourcc
    pub codec: String,
    /// Fixed quantizer (`-q:v`), lower is better
    pub quality: u8,
    pub pixel_format: String,
}

impl Default for OutputEncoding {
    fn default() -> Self {
        Self {
            codec: "mpeg4".to_string(),
            quality: 2,
            pixel_format: "yuv420p".to_string(),
        }
    }
}

/// Sequential RGB24 frame source.
pub struct FrameReader {
    child: Child,
    stdout: BufReader<ChildStdout>,
    stderr: Option<JoinHandle<String>>,
    width: u32,
    height: u32,
    frame_len: usize,
    frames_read: u64,
    exhausted: bool,
}

impl FrameReader {
    /// Start decoding `path` using the geometry from `info`.
    pub fn open(path: impl AsRef<Path>, info: &VideoInfo) -> MediaResult<Self> {
        let path = path.as_ref();
        if info.width == 0 || info.height == 0 {
            return Err(MediaError::invalid_video(format!(
                "{} has no usable resolution",
                path.display()
            )));
        }

        let mut child = FfmpegCommand::new(path, PIPE)
            .rawvideo_output()
            .spawn(false, true)?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::internal("FFmpeg stdout not captured"))?;
        let stderr = drain_stderr(&mut child);

        Ok(Self {
            child,
            stdout: BufReader::new(stdout),
            stderr,
            width: info.width,
            height: info.height,
            frame_len: info.frame_bytes(),
            frames_read: 0,
            exhausted: false,
        })
    }

    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    /// Read the next frame, or `None` once the stream is exhausted.
    pub async fn next_frame(&mut self) -> MediaResult<Option<Frame>> {
        if self.exhausted {
            return Ok(None);
        }

        let mut buf = vec![0u8; self.frame_len];
        let mut filled = 0;
        while filled < self.frame_len {
            let n = self.stdout.read(&mut buf[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        if filled < self.frame_len {
            self.exhausted = true;
            if filled > 0 {
                warn!(
                    bytes = filled,
                    expected = self.frame_len,
                    "Discarding truncated trailing frame"
                );
            }
            return Ok(None);
        }

        self.frames_read += 1;
        Ok(Some(Frame::from_raw(
            self.width,
            self.height,
            RGB_CHANNELS,
            buf,
        )?))
    }

    /// Release the decoder. A reader stopped before the end of the stream
    /// kills FFmpeg; a fully drained one is reaped and its exit status
    /// checked.
    pub async fn close(mut self) -> MediaResult<()> {
        if !self.exhausted {
            let _ = self.child.start_kill();
            let _ = self.child.wait().await;
            let _ = collect_stderr(self.stderr.take()).await;
            return Ok(());
        }

        let status = self.child.wait().await?;
        let stderr = collect_stderr(self.stderr.take()).await;
        if status.success() {
            Ok(())
        } else {
            Err(MediaError::ffmpeg_failed(
                "FFmpeg decoder exited with non-zero status",
                stderr,
                status.code(),
            ))
        }
    }
}

/// Sequential RGB24 frame sink encoding to a container file.
pub struct FrameWriter {
    child: Child,
    stdin: Option<ChildStdin>,
    stderr: Option<JoinHandle<String>>,
    path: PathBuf,
    width: u32,
    height: u32,
    frames_written: u64,
}

impl FrameWriter {
    /// Start an encoder writing `width x height` frames at `fps` to `path`.
    pub fn open(
        path: impl AsRef<Path>,
        width: u32,
        height: u32,
        fps: f64,
        encoding: &OutputEncoding,
    ) -> MediaResult<Self> {
        let path = path.as_ref().to_path_buf();

        let mut child = FfmpegCommand::new(PIPE, &path)
            .rawvideo_input(width, height, fps)
            .no_audio()
            .video_codec(encoding.codec.clone())
            .quality(encoding.quality)
            .pixel_format(encoding.pixel_format.clone())
            .spawn(true, false)?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| MediaError::internal("FFmpeg stdin not captured"))?;
        let stderr = drain_stderr(&mut child);

        Ok(Self {
            child,
            stdin: Some(stdin),
            stderr,
            path,
            width,
            height,
            frames_written: 0,
        })
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub async fn write_frame(&mut self, frame: &Frame) -> MediaResult<()> {
        if frame.width() != self.width
            || frame.height() != self.height
            || frame.channels() != RGB_CHANNELS
        {
            return Err(MediaError::internal(format!(
                "frame {}x{}x{} does not match writer {}x{}x{}",
                frame.width(),
                frame.height(),
                frame.channels(),
                self.width,
                self.height,
                RGB_CHANNELS
            )));
        }

        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| MediaError::internal("writer already finished"))?;
        stdin.write_all(&frame.to_raw()).await?;
        self.frames_written += 1;
        Ok(())
    }

    /// Close the input pipe and wait for the encoder to flush the container.
    pub async fn finish(mut self) -> MediaResult<u64> {
        if let Some(mut stdin) = self.stdin.take() {
            // The encoder may already be gone; its exit status reports why
            let _ = stdin.shutdown().await;
        }

        let status = self.child.wait().await?;
        let stderr = collect_stderr(self.stderr.take()).await;
        if !status.success() {
            return Err(MediaError::ffmpeg_failed(
                format!("FFmpeg encoder failed for {}", self.path.display()),
                stderr,
                status.code(),
            ));
        }

        debug!(
            frames = self.frames_written,
            path = %self.path.display(),
            "Encoder finished"
        );
        Ok(self.frames_written)
    }
}
