//! # Frame module
//!
//! Provides the raw buffer delivered by a camera and the dense colour frame every other part of
//! the pipeline works on.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use derive_more::Display;
use image::{ImageBuffer, Rgb, RgbImage};
use serde::Deserialize;

use crate::error::{Error, Result};

// -----------------------------------------------------------------------------------------------
// CONSTANTS
// -----------------------------------------------------------------------------------------------

/// Number of interleaved channels in a [`Frame`].
pub const CHANNELS: usize = 3;

// -----------------------------------------------------------------------------------------------
// ENUMERATIONS
// -----------------------------------------------------------------------------------------------

/// Arrangement of the colour filter array on a raw Bayer sensor, named by the top-left 2x2 cell.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BayerPattern {
    #[display(fmt = "RGGB")]
    Rggb,
    #[display(fmt = "BGGR")]
    Bggr,
    #[display(fmt = "GRBG")]
    Grbg,
    #[display(fmt = "GBRG")]
    Gbrg,
}

/// Pixel layouts a camera can deliver.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// 8 bit grayscale
    #[display(fmt = "MONO8")]
    Mono8,

    /// 8 bit raw Bayer mosaic
    #[display(fmt = "RAW8 ({})", _0)]
    Raw8(BayerPattern),

    /// Interleaved 8 bit red, green, blue
    #[display(fmt = "RGB8")]
    Rgb8,

    /// Interleaved 8 bit blue, green, red
    #[display(fmt = "BGR8")]
    Bgr8,

    /// Interleaved 8 bit blue, green, red plus one unused byte
    #[display(fmt = "BGRU8")]
    Bgru8,

    /// Packed YUV 4:2:2, two pixels in every four bytes
    #[display(fmt = "YUYV")]
    Yuyv,

    /// Motion JPEG, one compressed image per buffer
    #[display(fmt = "MJPEG")]
    Mjpeg,
}

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// A buffer exactly as retrieved from the camera.
#[derive(Debug, Clone)]
pub struct RawFrame {
    /// Number of image rows
    pub rows: usize,

    /// Number of image columns
    pub cols: usize,

    /// Layout of `data`
    pub format: PixelFormat,

    /// Received bytes, rows may be padded
    pub data: Vec<u8>,
}

/// A dense 3 channel image in blue, green, red order.
///
/// Rows may be padded, so `stride` can be larger than `cols * 3`. Frames are not mutated once
/// they are built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    rows: usize,
    cols: usize,
    stride: usize,
    data: Vec<u8>,
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl PixelFormat {
    /// Number of bytes one pixel occupies in an uncompressed buffer.
    ///
    /// Returns `None` for compressed formats.
    pub fn bytes_per_pixel(&self) -> Option<usize> {
        match self {
            PixelFormat::Mono8 | PixelFormat::Raw8(_) => Some(1),
            PixelFormat::Yuyv => Some(2),
            PixelFormat::Rgb8 | PixelFormat::Bgr8 => Some(3),
            PixelFormat::Bgru8 => Some(4),
            PixelFormat::Mjpeg => None,
        }
    }
}

impl RawFrame {
    pub fn new(rows: usize, cols: usize, format: PixelFormat, data: Vec<u8>) -> Self {
        Self {
            rows,
            cols,
            format,
            data,
        }
    }

    /// Bytes per row, derived from the number of received bytes.
    ///
    /// Fails if the buffer does not split evenly into `rows` rows.
    pub fn stride(&self) -> Result<usize> {
        if self.rows == 0 {
            return Err(Error::ConversionError(String::from("raw frame has zero rows")));
        }

        if self.data.len() % self.rows != 0 {
            return Err(Error::ConversionError(format!(
                "{} received bytes do not divide into {} rows",
                self.data.len(),
                self.rows
            )));
        }

        Ok(self.data.len() / self.rows)
    }
}

impl Frame {
    /// Create a black frame of the given size with no row padding.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            stride: cols * CHANNELS,
            data: vec![0; rows * cols * CHANNELS],
        }
    }

    /// Build a frame by evaluating `f(row, col)` for every pixel, `f` returns `[b, g, r]`.
    pub fn from_fn<F>(rows: usize, cols: usize, mut f: F) -> Self
    where
        F: FnMut(usize, usize) -> [u8; CHANNELS],
    {
        let mut data = Vec::with_capacity(rows * cols * CHANNELS);
        for r in 0..rows {
            for c in 0..cols {
                data.extend_from_slice(&f(r, c));
            }
        }

        Self {
            rows,
            cols,
            stride: cols * CHANNELS,
            data,
        }
    }

    /// Wrap an existing BGR buffer whose rows are `stride` bytes apart.
    pub fn from_raw_parts(rows: usize, cols: usize, stride: usize, data: Vec<u8>) -> Result<Self> {
        if stride < cols * CHANNELS {
            return Err(Error::ConversionError(format!(
                "stride of {} bytes cannot hold {} BGR pixels",
                stride, cols
            )));
        }

        if data.len() < rows * stride {
            return Err(Error::ConversionError(format!(
                "{} bytes is too small for {} rows of {} bytes",
                data.len(),
                rows,
                stride
            )));
        }

        Ok(Self {
            rows,
            cols,
            stride,
            data,
        })
    }

    /// Convert an RGB image from the `image` crate.
    pub fn from_rgb_image(img: &RgbImage) -> Self {
        Self::from_fn(img.height() as usize, img.width() as usize, |r, c| {
            let Rgb([red, green, blue]) = *img.get_pixel(c as u32, r as u32);
            [blue, green, red]
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }

    /// The underlying bytes, including any row padding.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// The pixel bytes of row `r`, without padding.
    pub fn row(&self, r: usize) -> &[u8] {
        let start = r * self.stride;
        &self.data[start..start + self.cols * CHANNELS]
    }

    /// The `[b, g, r]` value at the given position.
    pub fn pixel(&self, r: usize, c: usize) -> [u8; CHANNELS] {
        let i = r * self.stride + c * CHANNELS;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    /// Convert the frame into an RGB image from the `image` crate.
    pub fn to_rgb_image(&self) -> RgbImage {
        ImageBuffer::from_fn(self.cols as u32, self.rows as u32, |x, y| {
            let [b, g, r] = self.pixel(y as usize, x as usize);
            Rgb([r, g, b])
        })
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
