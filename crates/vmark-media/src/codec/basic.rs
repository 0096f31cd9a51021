//! Sign-based single-coefficient codec.
//!
//! One mid-frequency coefficient per block of the carrier plane carries one
//! bit: the coefficient is forced positive for `1` and pushed toward the
//! negative side for `0`. No redundancy, no error correction.

use ndarray::Array2;

use super::dct::Dct;
use super::payload::{bits_to_text, text_to_bits};
use super::plane::{embed_plane, extract_plane, BlockModulator};
use super::positions::{first_fitting, Position, BASIC_POSITIONS};
use super::{check_frame, check_strength, CodecConfig, CodecMode, CodecResult, WatermarkCodec};
use crate::frame::Frame;

/// Scale applied to strength to get the coefficient offset.
const SIGN_SCALE: f64 = 255.0;

struct SignModulator {
    position: Option<Position>,
    offset: f64,
}

impl BlockModulator for SignModulator {
    fn embed_bit(&self, coeffs: &mut Array2<f64>, bit: u8, _bit_index: usize) {
        if let Some(pos) = self.position {
            let magnitude = coeffs[pos].abs();
            coeffs[pos] = if bit == 1 {
                magnitude + self.offset
            } else {
                magnitude - self.offset
            };
        }
    }

    fn extract_bit(&self, coeffs: &Array2<f64>, _bit_index: usize) -> u8 {
        self.position
            .map(|pos| u8::from(coeffs[pos] > 0.0))
            .unwrap_or(0)
    }
}

/// Basic watermark codec operating on a single carrier channel.
#[derive(Debug, Clone)]
pub struct BasicCodec {
    dct: Dct,
    carrier_channel: usize,
}

impl BasicCodec {
    pub fn new(config: &CodecConfig) -> Self {
        Self {
            dct: Dct::new(config.block_size),
            carrier_channel: config.carrier_channel,
        }
    }

    fn carrier(&self, frame: &Frame) -> usize {
        if frame.channels() == 1 {
            0
        } else {
            self.carrier_channel.min(frame.channels() - 1)
        }
    }

    fn position(&self) -> Option<Position> {
        first_fitting(&BASIC_POSITIONS, self.dct.size())
    }
}

impl WatermarkCodec for BasicCodec {
    fn mode(&self) -> CodecMode {
        CodecMode::Basic
    }

    fn embed(&self, frame: &Frame, text: &str, strength: f32) -> CodecResult<Frame> {
        check_frame(frame)?;
        check_strength(strength)?;

        let channel = self.carrier(frame);
        let modulator = SignModulator {
            position: self.position(),
            offset: f64::from(strength) * SIGN_SCALE,
        };
        let marked = embed_plane(frame.plane(channel), &text_to_bits(text), &self.dct, &modulator);

        let mut out = frame.clone();
        out.set_plane(channel, marked.view());
        Ok(out)
    }

    fn extract(&self, frame: &Frame, expected_len: usize) -> CodecResult<Option<String>> {
        check_frame(frame)?;

        let modulator = SignModulator {
            position: self.position(),
            offset: 0.0,
        };
        let bits = extract_plane(
            frame.plane(self.carrier(frame)),
            expected_len * 8,
            &self.dct,
            &modulator,
        );
        let text = bits_to_text(&bits);
        Ok((!text.is_empty()).then_some(text))
    }
}
