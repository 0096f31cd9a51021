//! Diagnostic robustness self-test.
//!
//! Embeds a sample text with the enhanced codec, applies a set of common
//! degradations to the marked frame independently, and reports whether the
//! text survives each one. Not used on the embedding hot path.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ColorType, ImageFormat};
use rand::Rng;
use serde::Serialize;
use tracing::debug;

use super::{CodecConfig, CodecResult, EnhancedCodec, WatermarkCodec};
use crate::frame::Frame;

/// Text embedded by [`test_robustness`].
pub const ROBUSTNESS_SAMPLE_TEXT: &str = "VMark-Robust";

/// JPEG quality used for the recompression check.
pub const JPEG_QUALITY: u8 = 50;

/// Standard deviation of the additive noise check.
pub const NOISE_SIGMA: f64 = 5.0;

/// Downscale factor of the rescale check.
pub const RESCALE_FACTOR: f64 = 0.5;

/// Degradation applied before re-extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Perturbation {
    /// No change
    NoAttack,
    /// Lossy JPEG re-encode
    JpegCompression,
    /// Additive Gaussian noise
    GaussianNoise,
    /// Downscale then upscale back to the original size
    Scaling,
}

impl Perturbation {
    pub const ALL: [Perturbation; 4] = [
        Perturbation::NoAttack,
        Perturbation::JpegCompression,
        Perturbation::GaussianNoise,
        Perturbation::Scaling,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Perturbation::NoAttack => "no_attack",
            Perturbation::JpegCompression => "jpeg_compression",
            Perturbation::GaussianNoise => "gaussian_noise",
            Perturbation::Scaling => "scaling",
        }
    }
}

/// Pass/fail per perturbation.
#[derive(Debug, Clone, Serialize)]
pub struct RobustnessReport {
    pub text: String,
    pub strength: f32,
    pub results: Vec<(Perturbation, bool)>,
}

impl RobustnessReport {
    pub fn passed(&self, perturbation: Perturbation) -> Option<bool> {
        self.results
            .iter()
            .find(|(p, _)| *p == perturbation)
            .map(|(_, ok)| *ok)
    }

    pub fn all_passed(&self) -> bool {
        self.results.iter().all(|(_, ok)| *ok)
    }
}

/// Run the self-test with [`ROBUSTNESS_SAMPLE_TEXT`] and a thread-local RNG.
pub fn test_robustness(frame: &Frame, strength: f32, config: &CodecConfig) -> CodecResult<RobustnessReport> {
    test_robustness_with(frame, ROBUSTNESS_SAMPLE_TEXT, strength, config, &mut rand::rng())
}

/// Run the self-test with a caller-supplied text and RNG.
///
/// Extraction assumes the embedding strength, so each check measures the
/// perturbation rather than a strength mismatch.
pub fn test_robustness_with<R: Rng>(
    frame: &Frame,
    text: &str,
    strength: f32,
    config: &CodecConfig,
    rng: &mut R,
) -> CodecResult<RobustnessReport> {
    let codec = EnhancedCodec::new(&config.clone().with_detection_strength(strength));
    let marked = codec.embed(frame, text, strength)?;
    let expected_len = text.len();

    let mut results = Vec::with_capacity(Perturbation::ALL.len());
    for perturbation in Perturbation::ALL {
        let degraded = perturb(&marked, perturbation, rng)?;
        let extracted = codec.extract(&degraded, expected_len)?;
        let ok = extracted.as_deref() == Some(text);
        debug!(
            perturbation = perturbation.as_str(),
            passed = ok,
            "Robustness check"
        );
        results.push((perturbation, ok));
    }

    Ok(RobustnessReport {
        text: text.to_string(),
        strength,
        results,
    })
}

/// Apply one perturbation to a frame.
pub fn perturb<R: Rng>(frame: &Frame, perturbation: Perturbation, rng: &mut R) -> CodecResult<Frame> {
    match perturbation {
        Perturbation::NoAttack => Ok(frame.clone()),
        Perturbation::JpegCompression => jpeg_roundtrip(frame, JPEG_QUALITY),
        Perturbation::GaussianNoise => Ok(add_gaussian_noise(frame, NOISE_SIGMA, rng)),
        Perturbation::Scaling => rescale_roundtrip(frame, RESCALE_FACTOR),
    }
}

fn jpeg_roundtrip(frame: &Frame, quality: u8) -> CodecResult<Frame> {
    let color = match frame.channels() {
        1 => ColorType::L8,
        _ => ColorType::Rgb8,
    };
    let image = frame.to_dynamic_image()?;
    let raw = image.as_bytes();

    let mut encoded = Vec::new();
    JpegEncoder::new_with_quality(&mut encoded, quality).encode(
        raw,
        frame.width(),
        frame.height(),
        color,
    )?;

    let decoded = image::load_from_memory_with_format(&encoded, ImageFormat::Jpeg)?;
    Frame::from_image(&decoded, frame.channels())
}

fn add_gaussian_noise<R: Rng>(frame: &Frame, sigma: f64, rng: &mut R) -> Frame {
    let noisy = frame.pixels().mapv(|v| {
        let noise = standard_normal(rng) * sigma;
        (f64::from(v) + noise).round().clamp(0.0, 255.0) as u8
    });
    Frame::new(noisy)
}

/// Box-Muller sample from N(0, 1).
fn standard_normal<R: Rng>(rng: &mut R) -> f64 {
    let u1: f64 = 1.0 - rng.random::<f64>();
    let u2: f64 = rng.random::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

fn rescale_roundtrip(frame: &Frame, factor: f64) -> CodecResult<Frame> {
    let (width, height) = (frame.width(), frame.height());
    let small_w = ((f64::from(width) * factor).round() as u32).max(1);
    let small_h = ((f64::from(height) * factor).round() as u32).max(1);

    let image = frame.to_dynamic_image()?;
    let restored = image
        .resize_exact(small_w, small_h, FilterType::Triangle)
        .resize_exact(width, height, FilterType::Triangle);
    Frame::from_image(&restored, frame.channels())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn textured_frame() -> Frame {
        Frame::from_fn(160, 120, 3, |(y, x, c)| {
            (60 + (x * 3 + y * 2 + c * 20) % 120) as u8
        })
    }

    #[test]
    fn test_report_covers_all_perturbations() {
        let mut rng = StdRng::seed_from_u64(7);
        let report = test_robustness_with(
            &textured_frame(),
            ROBUSTNESS_SAMPLE_TEXT,
            0.3,
            &CodecConfig::default(),
            &mut rng,
        )
        .unwrap();

        assert_eq!(report.results.len(), 4);
        for perturbation in Perturbation::ALL {
            assert!(report.passed(perturbation).is_some());
        }
        assert_eq!(report.passed(Perturbation::NoAttack), Some(true));
    }

    #[test]
    fn test_perturbations_preserve_shape() {
        let frame = textured_frame();
        let mut rng = StdRng::seed_from_u64(1);
        for perturbation in Perturbation::ALL {
            let out = perturb(&frame, perturbation, &mut rng).unwrap();
            assert_eq!((out.width(), out.height(), out.channels()), (160, 120, 3));
        }
    }

    #[test]
    fn test_noise_changes_pixels() {
        let frame = textured_frame();
        let mut rng = StdRng::seed_from_u64(3);
        let noisy = add_gaussian_noise(&frame, NOISE_SIGMA, &mut rng);
        assert_ne!(noisy, frame);
    }

    #[test]
    fn test_standard_normal_is_centered() {
        let mut rng = StdRng::seed_from_u64(11);
        let n = 20_000;
        let mean: f64 = (0..n).map(|_| standard_normal(&mut rng)).sum::<f64>() / n as f64;
        assert!(mean.abs() < 0.05, "mean {}", mean);
    }

    #[test]
    fn test_perturbation_names() {
        assert_eq!(Perturbation::JpegCompression.as_str(), "jpeg_compression");
        let json = serde_json::to_string(&Perturbation::NoAttack).unwrap();
        assert_eq!(json, "\"no_attack\"");
    }
}
