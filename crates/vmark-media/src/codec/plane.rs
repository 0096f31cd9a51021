//! Block traversal shared by both codecs.
//!
//! A plane is padded up to a multiple of the block size by replicating the
//! last row and column, cut into blocks in row-major order, and bit `i` is
//! carried by block `i`. Bits past the block capacity are dropped silently.
//! Samples are rounded and clamped back to `0..=255` and the padding is
//! cropped away, so output dimensions always equal input dimensions.

use ndarray::{s, Array2, ArrayView2};
use tracing::debug;

use super::dct::Dct;

/// Per-block bit modulation strategy.
pub trait BlockModulator {
    /// Adjust the coefficients of one transformed block to carry `bit`.
    fn embed_bit(&self, coeffs: &mut Array2<f64>, bit: u8, bit_index: usize);

    /// Read back the bit carried by one transformed block.
    fn extract_bit(&self, coeffs: &Array2<f64>, bit_index: usize) -> u8;
}

/// Number of blocks (and therefore bits) a plane of the given size can carry.
pub fn block_capacity(height: usize, width: usize, block_size: usize) -> usize {
    if block_size == 0 {
        return 0;
    }
    height.div_ceil(block_size) * width.div_ceil(block_size)
}

fn pad_plane(plane: ArrayView2<'_, u8>, block_size: usize) -> Array2<f64> {
    let (h, w) = plane.dim();
    let padded_h = h.div_ceil(block_size) * block_size;
    let padded_w = w.div_ceil(block_size) * block_size;
    Array2::from_shape_fn((padded_h, padded_w), |(y, x)| {
        plane[[y.min(h - 1), x.min(w - 1)]] as f64
    })
}

fn block_origin(index: usize, blocks_wide: usize, block_size: usize) -> (usize, usize) {
    (
        (index / blocks_wide) * block_size,
        (index % blocks_wide) * block_size,
    )
}

/// Embed `bits` into a plane and return the modified plane.
///
/// The plane must be non-empty.
pub fn embed_plane(
    plane: ArrayView2<'_, u8>,
    bits: &[u8],
    dct: &Dct,
    modulator: &impl BlockModulator,
) -> Array2<u8> {
    let (h, w) = plane.dim();
    let n = dct.size();
    let mut padded = pad_plane(plane, n);
    let blocks_wide = padded.ncols() / n;
    let capacity = block_capacity(h, w, n);

    if bits.len() > capacity {
        debug!(
            bits = bits.len(),
            capacity = capacity,
            "Payload exceeds plane capacity, truncating"
        );
    }

    for (index, bit) in bits.iter().take(capacity).enumerate() {
        let (y0, x0) = block_origin(index, blocks_wide, n);
        let mut block = padded.slice_mut(s![y0..y0 + n, x0..x0 + n]);
        let mut coeffs = dct.forward(block.view());
        modulator.embed_bit(&mut coeffs, *bit, index);
        block.assign(&dct.inverse(coeffs.view()));
    }

    padded
        .slice(s![..h, ..w])
        .mapv(|v| v.round().clamp(0.0, 255.0) as u8)
}

/// Extract `count` bits from a plane. Blocks past the capacity yield nothing,
/// so the result may be shorter than `count`.
pub fn extract_plane(
    plane: ArrayView2<'_, u8>,
    count: usize,
    dct: &Dct,
    modulator: &impl BlockModulator,
) -> Vec<u8> {
    let (h, w) = plane.dim();
    let n = dct.size();
    let padded = pad_plane(plane, n);
    let blocks_wide = padded.ncols() / n;
    let capacity = block_capacity(h, w, n);

    (0..count.min(capacity))
        .map(|index| {
            let (y0, x0) = block_origin(index, blocks_wide, n);
            let coeffs = dct.forward(padded.slice(s![y0..y0 + n, x0..x0 + n]));
            modulator.extract_bit(&coeffs, index)
        })
        .collect()
}
