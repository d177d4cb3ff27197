//! # Frame codec
//!
//! Converts raw camera buffers into dense BGR [`Frame`]s.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use image::ImageFormat;

use crate::error::{Error, Result};
use crate::frame::{BayerPattern, Frame, PixelFormat, RawFrame, CHANNELS};

// -----------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Convert a raw buffer into a BGR frame.
///
/// The row stride of uncompressed buffers is derived from the number of received bytes, which
/// must divide evenly by the number of rows and leave room for `cols` pixels per row.
pub fn convert(raw: &RawFrame) -> Result<Frame> {
    if raw.rows == 0 || raw.cols == 0 {
        return Err(Error::ConversionError(format!(
            "raw frame has an empty size of {}x{}",
            raw.cols, raw.rows
        )));
    }

    let bpp = match raw.format.bytes_per_pixel() {
        Some(b) => b,
        None => return decode_mjpeg(raw),
    };

    let stride = raw.stride()?;
    if stride < raw.cols * bpp {
        return Err(Error::ConversionError(format!(
            "row stride of {} bytes is too short for {} {} pixels",
            stride, raw.cols, raw.format
        )));
    }

    let src = Source {
        data: &raw.data,
        stride,
        rows: raw.rows,
        cols: raw.cols,
    };

    match raw.format {
        PixelFormat::Mono8 => Ok(Frame::from_fn(raw.rows, raw.cols, |r, c| {
            let v = src.at(r, c);
            [v, v, v]
        })),
        PixelFormat::Raw8(pattern) => demosaic(&src, pattern),
        PixelFormat::Rgb8 => Ok(Frame::from_fn(raw.rows, raw.cols, |r, c| {
            let i = c * 3;
            [src.at(r, i + 2), src.at(r, i + 1), src.at(r, i)]
        })),
        PixelFormat::Bgr8 => Ok(Frame::from_fn(raw.rows, raw.cols, |r, c| {
            let i = c * 3;
            [src.at(r, i), src.at(r, i + 1), src.at(r, i + 2)]
        })),
        PixelFormat::Bgru8 => Ok(Frame::from_fn(raw.rows, raw.cols, |r, c| {
            let i = c * 4;
            [src.at(r, i), src.at(r, i + 1), src.at(r, i + 2)]
        })),
        PixelFormat::Yuyv => yuyv_to_bgr(&src),
        PixelFormat::Mjpeg => decode_mjpeg(raw),
    }
}

// -----------------------------------------------------------------------------------------------
// PRIVATE
// -----------------------------------------------------------------------------------------------

/// Row-addressed view of an uncompressed raw buffer.
struct Source<'a> {
    data: &'a [u8],
    stride: usize,
    rows: usize,
    cols: usize,
}

impl<'a> Source<'a> {
    /// Byte `i` of row `r`.
    fn at(&self, r: usize, i: usize) -> u8 {
        self.data[r * self.stride + i]
    }
}

/// Demosaic a Bayer buffer by giving every pixel the colour of its 2x2 cell.
///
/// A trailing odd row or column reuses the last complete cell.
fn demosaic(src: &Source, pattern: BayerPattern) -> Result<Frame> {
    if src.rows < 2 || src.cols < 2 {
        return Err(Error::ConversionError(format!(
            "Bayer frame of {}x{} is smaller than one 2x2 cell",
            src.cols, src.rows
        )));
    }

    // Offsets of the red and blue sites inside a cell, greens are the other two
    let (red, blue) = match pattern {
        BayerPattern::Rggb => ((0, 0), (1, 1)),
        BayerPattern::Bggr => ((1, 1), (0, 0)),
        BayerPattern::Grbg => ((0, 1), (1, 0)),
        BayerPattern::Gbrg => ((1, 0), (0, 1)),
    };
    let (green_a, green_b) = ((red.0, blue.1), (blue.0, red.1));

    let last_row = (src.rows / 2 - 1) * 2;
    let last_col = (src.cols / 2 - 1) * 2;

    Ok(Frame::from_fn(src.rows, src.cols, |r, c| {
        let r0 = (r / 2 * 2).min(last_row);
        let c0 = (c / 2 * 2).min(last_col);
        let site = |(dr, dc): (usize, usize)| src.at(r0 + dr, c0 + dc);

        let g = (site(green_a) as u16 + site(green_b) as u16) / 2;
        [site(blue), g as u8, site(red)]
    }))
}

/// Convert packed YUV 4:2:2 into BGR using the BT.601 integer approximation.
fn yuyv_to_bgr(src: &Source) -> Result<Frame> {
    if src.cols % 2 != 0 {
        return Err(Error::ConversionError(format!(
            "YUYV frames need an even number of columns, got {}",
            src.cols
        )));
    }

    Ok(Frame::from_fn(src.rows, src.cols, |r, c| {
        let pair = (c / 2) * 4;
        let y = src.at(r, pair + (c % 2) * 2) as i32 - 16;
        let u = src.at(r, pair + 1) as i32 - 128;
        let v = src.at(r, pair + 3) as i32 - 128;

        let clamp = |x: i32| ((x + 128) >> 8).max(0).min(255) as u8;
        [
            clamp(298 * y + 516 * u),
            clamp(298 * y - 100 * u - 208 * v),
            clamp(298 * y + 409 * v),
        ]
    }))
}

/// Decode a motion JPEG buffer, checking it against the declared size.
fn decode_mjpeg(raw: &RawFrame) -> Result<Frame> {
    let img = image::load_from_memory_with_format(&raw.data, ImageFormat::Jpeg)
        .map_err(|e| Error::ImageError(e))?
        .to_rgb8();

    if img.height() as usize != raw.rows || img.width() as usize != raw.cols {
        return Err(Error::ConversionError(format!(
            "decoded MJPEG frame is {}x{} but {}x{} was declared",
            img.width(),
            img.height(),
            raw.cols,
            raw.rows
        )));
    }

    let frame = Frame::from_rgb_image(&img);
    debug_assert_eq!(frame.stride(), raw.cols * CHANNELS);

    Ok(frame)
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
