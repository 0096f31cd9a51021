//! Application-wide limits and defaults.

use std::path::Path;

/// Lowest accepted embedding strength.
pub const MIN_STRENGTH: f32 = 0.05;

/// Highest accepted embedding strength.
pub const MAX_STRENGTH: f32 = 0.3;

/// Strength used when the caller does not pick one.
pub const DEFAULT_STRENGTH: f32 = 0.1;

/// Maximum watermark text length in characters.
pub const MAX_WATERMARK_LENGTH: usize = 50;

/// Default DCT block edge length.
pub const DEFAULT_BLOCK_SIZE: usize = 8;

/// Extraction samples every Nth frame by default.
pub const FRAME_SAMPLE_RATE: usize = 30;

/// Container extensions accepted upstream (lowercase, without the dot).
pub const ALLOWED_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "wmv", "flv", "webm"];

/// Check whether a path carries one of the allow-listed container extensions.
pub fn is_allowed_extension(path: impl AsRef<Path>) -> bool {
    path.as_ref()
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            ALLOWED_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Check whether a strength value is finite and inside the configured bounds.
pub fn strength_in_bounds(strength: f32) -> bool {
    strength.is_finite() && (MIN_STRENGTH..=MAX_STRENGTH).contains(&strength)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_extensions() {
        assert!(is_allowed_extension("clip.mp4"));
        assert!(is_allowed_extension("/tmp/upload/CLIP.MKV"));
        assert!(is_allowed_extension("a.b.webm"));
        assert!(!is_allowed_extension("clip.gif"));
        assert!(!is_allowed_extension("no_extension"));
    }

    #[test]
    fn test_strength_bounds() {
        assert!(strength_in_bounds(MIN_STRENGTH));
        assert!(strength_in_bounds(MAX_STRENGTH));
        assert!(strength_in_bounds(DEFAULT_STRENGTH));
        assert!(!strength_in_bounds(0.01));
        assert!(!strength_in_bounds(0.31));
        assert!(!strength_in_bounds(f32::NAN));
    }
}
