//! Block-DCT watermark codec.
//!
//! Two strategies share one block traversal contract ([`plane`]):
//!
//! - [`BasicCodec`]: one carrier plane, one sign-coded coefficient per block.
//! - [`EnhancedCodec`]: every plane, QIM-coded coefficients, per-bit
//!   redundancy with majority voting and a cross-channel whole-string vote.
//!
//! Extraction has no integrity check. Any frame large enough decodes to a
//! string of the requested length; `None` only means no full character
//! could be read.

mod basic;
mod dct;
mod enhanced;
mod error;
pub mod payload;
pub mod plane;
pub mod positions;
pub mod robustness;
pub mod vote;

pub use basic::BasicCodec;
pub use dct::Dct;
pub use enhanced::{parity, quantize, EnhancedCodec};
pub use error::{CodecError, CodecResult};
pub use robustness::{test_robustness, Perturbation, RobustnessReport};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::frame::Frame;
use vmark_models::limits::DEFAULT_BLOCK_SIZE;

/// Smallest accepted block edge length.
pub const MIN_BLOCK_SIZE: usize = 1;

/// Default bit repetition for the enhanced codec.
pub const DEFAULT_REDUNDANCY: usize = 3;

/// Strength assumed by enhanced extraction unless configured otherwise.
pub const DEFAULT_DETECTION_STRENGTH: f32 = 0.15;

/// Blue plane of an RGB24 frame.
pub const DEFAULT_CARRIER_CHANNEL: usize = 2;

/// Embedding strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CodecMode {
    #[default]
    Basic,
    Enhanced,
}

impl CodecMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CodecMode::Basic => "basic",
            CodecMode::Enhanced => "enhanced",
        }
    }
}

impl fmt::Display for CodecMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CodecMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "basic" => Ok(CodecMode::Basic),
            "enhanced" => Ok(CodecMode::Enhanced),
            other => Err(format!("Unknown codec mode: {}", other)),
        }
    }
}

/// Codec parameters shared by both strategies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodecConfig {
    pub block_size: usize,
    /// Plane used by the basic codec on multi-channel frames
    pub carrier_channel: usize,
    /// Times each bit is repeated by the enhanced codec
    pub redundancy: usize,
    /// Majority-vote redundant bits on enhanced extraction
    pub voting: bool,
    /// Strength assumed when extracting in enhanced mode
    pub detection_strength: f32,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            carrier_channel: DEFAULT_CARRIER_CHANNEL,
            redundancy: DEFAULT_REDUNDANCY,
            voting: true,
            detection_strength: DEFAULT_DETECTION_STRENGTH,
        }
    }
}

impl CodecConfig {
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn with_redundancy(mut self, redundancy: usize) -> Self {
        self.redundancy = redundancy;
        self
    }

    pub fn with_voting(mut self, voting: bool) -> Self {
        self.voting = voting;
        self
    }

    pub fn with_detection_strength(mut self, strength: f32) -> Self {
        self.detection_strength = strength;
        self
    }

    pub fn validate(&self) -> CodecResult<()> {
        if self.block_size < MIN_BLOCK_SIZE {
            return Err(CodecError::InvalidBlockSize(self.block_size));
        }
        if self.redundancy == 0 {
            return Err(CodecError::InvalidRedundancy(self.redundancy));
        }
        check_strength(self.detection_strength)
    }
}

/// A frame watermarking strategy.
pub trait WatermarkCodec: Send + Sync {
    fn mode(&self) -> CodecMode;

    /// Embed `text` into a copy of `frame`. Output dimensions always equal
    /// input dimensions.
    fn embed(&self, frame: &Frame, text: &str, strength: f32) -> CodecResult<Frame>;

    /// Recover `expected_len` bytes of text from `frame`.
    fn extract(&self, frame: &Frame, expected_len: usize) -> CodecResult<Option<String>>;
}

/// Build a codec for the given mode.
pub fn build_codec(mode: CodecMode, config: &CodecConfig) -> CodecResult<Box<dyn WatermarkCodec>> {
    config.validate()?;
    Ok(match mode {
        CodecMode::Basic => Box::new(BasicCodec::new(config)),
        CodecMode::Enhanced => Box::new(EnhancedCodec::new(config)),
    })
}

/// Embed with the default configuration.
pub fn embed(frame: &Frame, text: &str, strength: f32, mode: CodecMode) -> CodecResult<Frame> {
    build_codec(mode, &CodecConfig::default())?.embed(frame, text, strength)
}

/// Extract with the default configuration.
pub fn extract(frame: &Frame, expected_len: usize, mode: CodecMode) -> CodecResult<Option<String>> {
    build_codec(mode, &CodecConfig::default())?.extract(frame, expected_len)
}

pub(crate) fn check_frame(frame: &Frame) -> CodecResult<()> {
    if frame.is_empty() {
        return Err(CodecError::EmptyFrame);
    }
    Ok(())
}

pub(crate) fn check_strength(strength: f32) -> CodecResult<()> {
    if !strength.is_finite() || strength <= 0.0 {
        return Err(CodecError::InvalidStrength(strength));
    }
    Ok(())
}
