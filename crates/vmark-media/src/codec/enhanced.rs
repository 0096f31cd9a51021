//! Quantization-index-modulation codec with redundancy and voting.
//!
//! Every channel carries a full copy of the payload with each bit repeated
//! `redundancy` times. A bit is stored in the parity of the quantization
//! index of one mid-frequency coefficient; successive bits cycle through the
//! positions of the strength tier. On extraction each channel is majority
//! voted per bit, then the decoded strings are voted across channels.

use ndarray::Array2;
use rayon::prelude::*;
use tracing::trace;

use super::dct::Dct;
use super::payload::{bits_to_text, expand_bits, text_to_bits};
use super::plane::{embed_plane, extract_plane, BlockModulator};
use super::positions::{fits, Position, StrengthTier};
use super::vote::{majority_bits, majority_string};
use super::{check_frame, check_strength, CodecConfig, CodecMode, CodecResult, WatermarkCodec};
use crate::frame::Frame;

/// Quantization step per unit of strength.
const QUANT_SCALE: f64 = 16.0;

/// Snap `value` to the nearest odd (bit 1) or even (bit 0) multiple of `step`.
pub fn quantize(value: f64, step: f64, bit: u8) -> f64 {
    let index = if bit == 1 {
        2.0 * ((value / step - 1.0) / 2.0).round() + 1.0
    } else {
        2.0 * (value / (2.0 * step)).round()
    };
    index * step
}

/// Parity of the nearest quantization index of `value`.
pub fn parity(value: f64, step: f64) -> u8 {
    ((value / step).round() as i64).rem_euclid(2) as u8
}

struct QimModulator {
    positions: &'static [Position],
    step: f64,
    block_size: usize,
}

impl QimModulator {
    fn for_strength(strength: f32, block_size: usize) -> Self {
        Self {
            positions: StrengthTier::for_strength(strength).positions(),
            step: f64::from(strength) * QUANT_SCALE,
            block_size,
        }
    }

    fn position(&self, bit_index: usize) -> Option<Position> {
        let pos = self.positions[bit_index % self.positions.len()];
        fits(pos, self.block_size).then_some(pos)
    }
}

impl BlockModulator for QimModulator {
    fn embed_bit(&self, coeffs: &mut Array2<f64>, bit: u8, bit_index: usize) {
        if let Some(pos) = self.position(bit_index) {
            coeffs[pos] = quantize(coeffs[pos], self.step, bit);
        }
    }

    fn extract_bit(&self, coeffs: &Array2<f64>, bit_index: usize) -> u8 {
        self.position(bit_index)
            .map(|pos| parity(coeffs[pos], self.step))
            .unwrap_or(0)
    }
}

/// Multi-channel QIM codec.
#[derive(Debug, Clone)]
pub struct EnhancedCodec {
    dct: Dct,
    redundancy: usize,
    voting: bool,
    detection_strength: f32,
}

impl EnhancedCodec {
    pub fn new(config: &CodecConfig) -> Self {
        Self {
            dct: Dct::new(config.block_size),
            redundancy: config.redundancy.max(1),
            voting: config.voting,
            detection_strength: config.detection_strength,
        }
    }

    pub fn redundancy(&self) -> usize {
        self.redundancy
    }

    fn decode_channel(&self, raw: &[u8], expected_len: usize) -> String {
        let bit_len = expected_len * 8;
        let bits = if self.voting && self.redundancy > 1 {
            majority_bits(raw, self.redundancy)
        } else {
            raw.iter().take(bit_len).copied().collect()
        };
        bits_to_text(&bits)
    }
}

impl WatermarkCodec for EnhancedCodec {
    fn mode(&self) -> CodecMode {
        CodecMode::Enhanced
    }

    fn embed(&self, frame: &Frame, text: &str, strength: f32) -> CodecResult<Frame> {
        check_frame(frame)?;
        check_strength(strength)?;

        let bits = expand_bits(&text_to_bits(text), self.redundancy);
        let modulator = QimModulator::for_strength(strength, self.dct.size());

        let planes: Vec<Array2<u8>> = (0..frame.channels())
            .into_par_iter()
            .map(|channel| embed_plane(frame.plane(channel), &bits, &self.dct, &modulator))
            .collect();

        let mut out = frame.clone();
        for (channel, plane) in planes.iter().enumerate() {
            out.set_plane(channel, plane.view());
        }
        Ok(out)
    }

    fn extract(&self, frame: &Frame, expected_len: usize) -> CodecResult<Option<String>> {
        check_frame(frame)?;
        check_strength(self.detection_strength)?;

        let modulator = QimModulator::for_strength(self.detection_strength, self.dct.size());
        let raw_len = expected_len * 8 * self.redundancy;

        let candidates: Vec<String> = (0..frame.channels())
            .into_par_iter()
            .map(|channel| {
                let raw = extract_plane(frame.plane(channel), raw_len, &self.dct, &modulator);
                self.decode_channel(&raw, expected_len)
            })
            .filter(|text| !text.is_empty())
            .collect();

        trace!(channels = candidates.len(), "Channel candidates decoded");
        Ok(majority_string(candidates))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn textured_frame(width: u32, height: u32) -> Frame {
        Frame::from_fn(width, height, 3, |(y, x, c)| {
            (60 + (x * 3 + y * 2 + c * 20) % 120) as u8
        })
    }

    fn codec_with(detection_strength: f32) -> EnhancedCodec {
        EnhancedCodec::new(&CodecConfig {
            detection_strength,
            ..CodecConfig::default()
        })
    }

    #[test]
    fn test_quantize_parity() {
        for value in [-37.3, -2.0, 0.0, 0.4, 5.5, 12.0, 99.9] {
            for step in [0.8, 1.6, 2.4, 4.8] {
                assert_eq!(parity(quantize(value, step, 1), step), 1, "{} {}", value, step);
                assert_eq!(parity(quantize(value, step, 0), step), 0, "{} {}", value, step);
            }
        }
    }

    #[test]
    fn test_quantize_stays_close() {
        let step = 2.4;
        for value in [-10.0, -1.1, 0.0, 3.3, 50.0] {
            for bit in [0, 1] {
                assert!((quantize(value, step, bit) - value).abs() <= step + 1e-9);
            }
        }
    }

    #[test]
    fn test_roundtrip() {
        let frame = textured_frame(160, 120);
        let codec = codec_with(0.3);
        let marked = codec.embed(&frame, "Test", 0.3).unwrap();
        assert_eq!(codec.extract(&marked, 4).unwrap().as_deref(), Some("Test"));
    }

    #[test]
    fn test_roundtrip_longer_text() {
        let frame = textured_frame(160, 120);
        let codec = codec_with(0.3);
        let marked = codec.embed(&frame, "VMark 2024", 0.3).unwrap();
        assert_eq!(
            codec.extract(&marked, 10).unwrap().as_deref(),
            Some("VMark 2024")
        );
    }

    #[test]
    fn test_all_channels_modified() {
        let frame = textured_frame(64, 64);
        let marked = codec_with(0.3).embed(&frame, "ab", 0.3).unwrap();
        for channel in 0..3 {
            assert_ne!(marked.plane(channel), frame.plane(channel));
        }
    }

    #[test]
    fn test_odd_dimensions_preserved() {
        let frame = textured_frame(37, 29);
        let marked = codec_with(0.15).embed(&frame, "abc", 0.15).unwrap();
        assert_eq!((marked.width(), marked.height()), (37, 29));
    }

    #[test]
    fn test_capacity_overflow_is_not_an_error() {
        let frame = textured_frame(16, 16);
        let marked = codec_with(0.1).embed(&frame, "overflow", 0.1);
        assert!(marked.is_ok());
    }

    #[test]
    fn test_garbage_frame_yields_requested_length() {
        let frame = Frame::from_fn(96, 96, 3, |(y, x, c)| ((y * 31 + x * 17 + c * 7) % 256) as u8);
        let text = codec_with(0.15).extract(&frame, 5).unwrap().unwrap();
        assert_eq!(text.chars().count(), 5);
    }

    #[test]
    fn test_without_voting_reads_raw_prefix() {
        let codec = EnhancedCodec::new(&CodecConfig {
            voting: false,
            redundancy: 1,
            detection_strength: 0.3,
            ..CodecConfig::default()
        });
        let frame = textured_frame(96, 96);
        let marked = codec.embed(&frame, "raw", 0.3).unwrap();
        assert_eq!(codec.extract(&marked, 3).unwrap().as_deref(), Some("raw"));
    }
}
