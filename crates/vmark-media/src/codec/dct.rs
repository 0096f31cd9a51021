//! Orthonormal 2-D DCT-II over square blocks.
//!
//! The transform is expressed as a basis matrix `C` so that the forward
//! transform is `C * B * C^T` and the inverse is `C^T * F * C`. With the
//! orthonormal scaling the pair is an exact inverse up to float rounding.

use ndarray::{Array2, ArrayView2};
use std::f64::consts::PI;

/// Precomputed DCT basis for one block size.
#[derive(Debug, Clone)]
pub struct Dct {
    size: usize,
    basis: Array2<f64>,
}

impl Dct {
    pub fn new(size: usize) -> Self {
        let n = size as f64;
        let basis = Array2::from_shape_fn((size, size), |(u, x)| {
            let alpha = if u == 0 {
                (1.0 / n).sqrt()
            } else {
                (2.0 / n).sqrt()
            };
            alpha * (((2 * x + 1) as f64) * (u as f64) * PI / (2.0 * n)).cos()
        });
        Self { size, basis }
    }

    /// Block edge length this transform was built for.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn forward(&self, block: ArrayView2<'_, f64>) -> Array2<f64> {
        self.basis.dot(&block).dot(&self.basis.t())
    }

    pub fn inverse(&self, coeffs: ArrayView2<'_, f64>) -> Array2<f64> {
        self.basis.t().dot(&coeffs).dot(&self.basis)
    }
}
