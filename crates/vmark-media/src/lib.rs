//! Video watermarking media layer.
//!
//! This crate provides:
//! - A block-DCT watermark codec with basic and enhanced strategies
//! - Streaming frame decode/encode over FFmpeg rawvideo pipes
//! - Whole-video embed and sampled extraction
//! - FFprobe inspection, validation reports and time estimates

pub mod codec;
pub mod command;
pub mod error;
pub mod estimate;
pub mod frame;
pub mod frame_io;
pub mod fs_utils;
pub mod pipeline;
pub mod probe;
pub mod validate;

pub use codec::{
    build_codec, CodecConfig, CodecError, CodecMode, CodecResult, RobustnessReport, WatermarkCodec,
};
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand};
pub use error::{MediaError, MediaResult};
pub use estimate::{estimate_for_source, estimate_processing_time, TimeEstimate};
pub use frame::Frame;
pub use frame_io::{FrameReader, FrameWriter, OutputEncoding};
pub use pipeline::{embed_in_stream, extract_from_stream, EmbedReport};
pub use probe::{probe_video, VideoInfo};
pub use validate::{validate_video, VideoValidation};
