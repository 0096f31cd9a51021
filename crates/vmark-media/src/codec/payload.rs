//! Watermark payload bit encoding.
//!
//! Text is carried as its UTF-8 bytes, most significant bit first. Decoding
//! maps each recovered byte back to a single character, so ASCII text
//! round-trips exactly.

/// Convert text into a bit sequence (one `0`/`1` per element).
pub fn text_to_bits(text: &str) -> Vec<u8> {
    text.bytes()
        .flat_map(|byte| (0..8).rev().map(move |shift| (byte >> shift) & 1))
        .collect()
}

/// Convert bits back to text. Trailing bits that do not form a full byte
/// are ignored.
pub fn bits_to_text(bits: &[u8]) -> String {
    bits.chunks_exact(8)
        .map(|chunk| {
            let byte = chunk.iter().fold(0u8, |acc, bit| (acc << 1) | (bit & 1));
            char::from(byte)
        })
        .collect()
}

/// Render bits as a `0`/`1` string.
pub fn bits_to_string(bits: &[u8]) -> String {
    bits.iter().map(|b| if *b == 0 { '0' } else { '1' }).collect()
}

/// Repeat every bit `redundancy` times in place: `abc` -> `aaabbbccc`.
pub fn expand_bits(bits: &[u8], redundancy: usize) -> Vec<u8> {
    let redundancy = redundancy.max(1);
    bits.iter()
        .flat_map(|bit| std::iter::repeat(*bit).take(redundancy))
        .collect()
}
