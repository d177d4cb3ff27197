//! # Morphology
//!
//! Per channel grayscale erosion and dilation of [`Frame`]s.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use crate::error::{Error, Result};
use crate::frame::{Frame, CHANNELS};

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// Neighbourhood used by erosion and dilation, stored as offsets from the anchor pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuringElement {
    size: usize,
    offsets: Vec<(isize, isize)>,
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl StructuringElement {
    /// Elliptical element inscribed in a `size` x `size` square, anchored at its centre.
    ///
    /// Rows are filled the same way OpenCV fills `MORPH_ELLIPSE`, so a size of 5 gives the
    /// familiar disc with single pixel tips at the top and bottom.
    pub fn ellipse(size: usize) -> Result<Self> {
        if size == 0 || size % 2 == 0 {
            return Err(Error::ConfigurationError(format!(
                "structuring element size must be odd and positive, got {}",
                size
            )));
        }

        let r = (size / 2) as isize;
        let inv_r2 = if r > 0 { 1.0 / (r * r) as f64 } else { 0.0 };

        let mut offsets = Vec::new();
        for dy in -r..=r {
            let dx = (r as f64 * (((r * r - dy * dy) as f64) * inv_r2).sqrt()).round() as isize;
            for x in -dx..=dx {
                offsets.push((dy, x));
            }
        }

        Ok(Self { size, offsets })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether the element covers the given offset from its anchor.
    pub fn contains(&self, dy: isize, dx: isize) -> bool {
        self.offsets.contains(&(dy, dx))
    }
}

// -----------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Replace every channel value by the minimum over the element's neighbourhood.
///
/// Neighbours outside the frame are ignored.
pub fn erode(frame: &Frame, element: &StructuringElement) -> Frame {
    filter(frame, element, u8::MAX, u8::min)
}

/// Replace every channel value by the maximum over the element's neighbourhood.
///
/// Neighbours outside the frame are ignored.
pub fn dilate(frame: &Frame, element: &StructuringElement) -> Frame {
    filter(frame, element, u8::MIN, u8::max)
}

/// Erosion followed by dilation, removes specks smaller than the element.
pub fn open(frame: &Frame, element: &StructuringElement) -> Frame {
    dilate(&erode(frame, element), element)
}

// -----------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// -----------------------------------------------------------------------------------------------

fn filter(frame: &Frame, element: &StructuringElement, init: u8, fold: fn(u8, u8) -> u8) -> Frame {
    let rows = frame.rows() as isize;
    let cols = frame.cols() as isize;

    Frame::from_fn(frame.rows(), frame.cols(), |r, c| {
        let mut acc = [init; CHANNELS];

        for &(dy, dx) in &element.offsets {
            let (y, x) = (r as isize + dy, c as isize + dx);
            if y < 0 || y >= rows || x < 0 || x >= cols {
                continue;
            }

            let px = frame.pixel(y as usize, x as usize);
            for ch in 0..CHANNELS {
                acc[ch] = fold(acc[ch], px[ch]);
            }
        }

        acc
    })
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
