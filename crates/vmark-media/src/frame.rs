//! Decoded video frame buffer.

use image::{DynamicImage, RgbImage};
use ndarray::{Array3, ArrayView2, Axis};

use crate::codec::{CodecError, CodecResult};

/// Packed 8-bit frame laid out as `height x width x channels`.
///
/// Frames off the decoder are RGB24 (3 channels); single-channel frames are
/// accepted by the codec for grayscale material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pixels: Array3<u8>,
}

impl Frame {
    pub fn new(pixels: Array3<u8>) -> Self {
        Self { pixels }
    }

    /// Wrap a raw interleaved buffer as produced by `-pix_fmt rgb24`.
    pub fn from_raw(width: u32, height: u32, channels: usize, data: Vec<u8>) -> CodecResult<Self> {
        let shape = (height as usize, width as usize, channels);
        Array3::from_shape_vec(shape, data)
            .map(Self::new)
            .map_err(|e| CodecError::invalid_buffer(e.to_string()))
    }

    /// Build a frame from a per-sample function `f(y, x, c)`.
    pub fn from_fn(
        width: u32,
        height: u32,
        channels: usize,
        f: impl FnMut((usize, usize, usize)) -> u8,
    ) -> Self {
        Self::new(Array3::from_shape_fn(
            (height as usize, width as usize, channels),
            f,
        ))
    }

    pub fn width(&self) -> u32 {
        self.pixels.shape()[1] as u32
    }

    pub fn height(&self) -> u32 {
        self.pixels.shape()[0] as u32
    }

    pub fn channels(&self) -> usize {
        self.pixels.shape()[2]
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    pub fn pixels(&self) -> &Array3<u8> {
        &self.pixels
    }

    /// Borrow one channel as a 2-D plane.
    pub fn plane(&self, channel: usize) -> ArrayView2<'_, u8> {
        self.pixels.index_axis(Axis(2), channel)
    }

    /// Overwrite one channel. The plane must match the frame's dimensions.
    pub fn set_plane(&mut self, channel: usize, plane: ArrayView2<'_, u8>) {
        self.pixels.index_axis_mut(Axis(2), channel).assign(&plane);
    }

    /// Interleaved bytes in row-major order.
    pub fn to_raw(&self) -> Vec<u8> {
        match self.pixels.as_slice() {
            Some(slice) => slice.to_vec(),
            None => self.pixels.iter().copied().collect(),
        }
    }

    /// Convert an RGB frame to an `image` buffer.
    pub fn to_rgb_image(&self) -> CodecResult<RgbImage> {
        if self.channels() != 3 {
            return Err(CodecError::unsupported_layout(format!(
                "expected 3 channels, got {}",
                self.channels()
            )));
        }
        RgbImage::from_raw(self.width(), self.height(), self.to_raw())
            .ok_or_else(|| CodecError::invalid_buffer("RGB buffer size mismatch"))
    }

    /// Convert a decoded image back into a frame with `channels` channels.
    pub fn from_image(image: &DynamicImage, channels: usize) -> CodecResult<Self> {
        let (width, height, data) = match channels {
            1 => {
                let gray = image.to_luma8();
                (gray.width(), gray.height(), gray.into_raw())
            }
            3 => {
                let rgb = image.to_rgb8();
                (rgb.width(), rgb.height(), rgb.into_raw())
            }
            n => {
                return Err(CodecError::unsupported_layout(format!(
                    "cannot convert image to {} channels",
                    n
                )))
            }
        };
        Self::from_raw(width, height, channels, data)
    }

    /// Convert to an `image` value regardless of channel count.
    pub fn to_dynamic_image(&self) -> CodecResult<DynamicImage> {
        match self.channels() {
            1 => image::GrayImage::from_raw(self.width(), self.height(), self.to_raw())
                .map(DynamicImage::ImageLuma8)
                .ok_or_else(|| CodecError::invalid_buffer("gray buffer size mismatch")),
            3 => self.to_rgb_image().map(DynamicImage::ImageRgb8),
            n => Err(CodecError::unsupported_layout(format!(
                "cannot convert {}-channel frame to image",
                n
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_layout() {
        let data: Vec<u8> = (0..2 * 3 * 3).map(|v| v as u8).collect();
        let frame = Frame::from_raw(3, 2, 3, data.clone()).unwrap();
        assert_eq!(frame.width(), 3);
        assert_eq!(frame.height(), 2);
        assert_eq!(frame.channels(), 3);
        // Pixel (y=1, x=0) blue sample
        assert_eq!(frame.pixels()[[1, 0, 2]], data[9 + 2]);
        assert_eq!(frame.to_raw(), data);
    }

    #[test]
    fn test_raw_size_mismatch() {
        assert!(Frame::from_raw(4, 4, 3, vec![0; 10]).is_err());
    }

    #[test]
    fn test_set_plane() {
        let mut frame = Frame::from_fn(4, 2, 3, |_| 10);
        let plane = ndarray::Array2::from_elem((2, 4), 200u8);
        frame.set_plane(2, plane.view());
        assert_eq!(frame.pixels()[[1, 3, 2]], 200);
        assert_eq!(frame.pixels()[[1, 3, 1]], 10);
    }

    #[test]
    fn test_image_roundtrip() {
        let frame = Frame::from_fn(5, 3, 3, |(y, x, c)| (y * 40 + x * 10 + c) as u8);
        let image = frame.to_dynamic_image().unwrap();
        let back = Frame::from_image(&image, 3).unwrap();
        assert_eq!(back, frame);
    }
}
