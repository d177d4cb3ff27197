//! # Band detection
//!
//! Finds the rows lit by the projector's scan line. The live frame is compared against a
//! reference frame captured without the projector line, the difference is cleaned with a
//! morphological opening and thresholded on brightness. Every detection widens a running
//! envelope, so repeated calls over a sweep converge on the full vertical extent of the line.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use log::{debug, trace};
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::frame::{Frame, CHANNELS};
use crate::morphology::{self, StructuringElement};

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// Tuning of the band detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DetectorParams {
    /// A pixel is illuminated if its HSV value is strictly greater than this
    pub threshold: u8,

    /// Side length of the elliptical opening element, must be odd
    pub kernel_size: usize,
}

/// An inclusive range of rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Band {
    pub top: usize,
    pub bottom: usize,
}

/// Detects the illuminated band and accumulates its envelope.
#[derive(Debug, Clone)]
pub struct BandDetector {
    params: DetectorParams,
    element: StructuringElement,
    envelope: Option<Band>,
}

/// A pixel in 8 bit HSV, hue is halved to fit in `0..180`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hsv {
    pub h: u8,
    pub s: u8,
    pub v: u8,
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            threshold: 90,
            kernel_size: 5,
        }
    }
}

impl Band {
    /// Smallest band covering both `self` and `other`.
    pub fn union(self, other: Band) -> Band {
        Band {
            top: self.top.min(other.top),
            bottom: self.bottom.max(other.bottom),
        }
    }

    /// Number of rows in the band.
    pub fn height(&self) -> usize {
        self.bottom - self.top + 1
    }
}

impl BandDetector {
    pub fn new(params: DetectorParams) -> Result<Self> {
        Ok(Self {
            element: StructuringElement::ellipse(params.kernel_size)?,
            params,
            envelope: None,
        })
    }

    pub fn params(&self) -> &DetectorParams {
        &self.params
    }

    /// The rows illuminated in any detection so far, `None` before the first hit.
    pub fn envelope(&self) -> Option<Band> {
        self.envelope
    }

    pub fn top_line(&self) -> Option<usize> {
        self.envelope.map(|b| b.top)
    }

    pub fn bottom_line(&self) -> Option<usize> {
        self.envelope.map(|b| b.bottom)
    }

    /// Forget the envelope, for starting a new calibration.
    pub fn reset_envelope(&mut self) {
        self.envelope = None;
    }

    /// Detect the illuminated rows of `live` against `reference` and widen the envelope.
    ///
    /// Returns the band observed in this pair, or `None` if no pixel passed the threshold, in
    /// which case the envelope is left as it was. Frames of different sizes are rejected
    /// without touching the envelope.
    pub fn detect(&mut self, reference: &Frame, live: &Frame) -> Result<Option<Band>> {
        if reference.is_empty() || live.is_empty() {
            return Err(Error::InvalidFrameError(String::from("frame has no pixels")));
        }

        if reference.rows() != live.rows() || reference.cols() != live.cols() {
            return Err(Error::InvalidFrameError(format!(
                "reference is {}x{} but live frame is {}x{}",
                reference.cols(),
                reference.rows(),
                live.cols(),
                live.rows()
            )));
        }

        // Keep only what the projector added on top of the ambient scene
        let diff = saturating_difference(live, reference);
        let cleaned = morphology::open(&diff, &self.element);

        let hsv = to_hsv(&cleaned);
        let observed = self.illuminated_rows(&hsv, cleaned.cols());

        match observed {
            Some(band) => {
                let envelope = match self.envelope {
                    Some(env) => env.union(band),
                    None => band,
                };
                trace!("Observed band {:?}, envelope now {:?}", band, envelope);
                self.envelope = Some(envelope);
            }
            None => debug!("No pixel above brightness {} in frame", self.params.threshold),
        }

        Ok(observed)
    }

    /// First and last row holding a pixel brighter than the threshold, scanning every pixel.
    fn illuminated_rows(&self, hsv: &[Hsv], cols: usize) -> Option<Band> {
        let mut band: Option<Band> = None;

        for (r, row) in hsv.chunks_exact(cols).enumerate() {
            if row.iter().any(|px| px.v > self.params.threshold) {
                band = Some(match band {
                    Some(b) => Band { top: b.top, bottom: r },
                    None => Band { top: r, bottom: r },
                });
            }
        }

        band
    }
}

impl Hsv {
    /// Convert a `[b, g, r]` pixel.
    pub fn from_bgr([b, g, r]: [u8; CHANNELS]) -> Self {
        let v = b.max(g).max(r);
        let min = b.min(g).min(r);
        let delta = (v - min) as f32;

        if v == 0 || delta == 0.0 {
            return Self { h: 0, s: 0, v };
        }

        let s = (255.0 * delta / v as f32).round() as u8;

        let (b, g, r) = (b as f32, g as f32, r as f32);
        let mut h = if v as f32 == r {
            60.0 * (g - b) / delta
        } else if v as f32 == g {
            120.0 + 60.0 * (b - r) / delta
        } else {
            240.0 + 60.0 * (r - g) / delta
        };
        if h < 0.0 {
            h += 360.0;
        }

        let h = ((h / 2.0).round() as u16 % 180) as u8;

        Self { h, s, v }
    }
}

/// Convert a whole frame to HSV, row major.
pub fn to_hsv(frame: &Frame) -> Vec<Hsv> {
    (0..frame.rows())
        .flat_map(|r| {
            frame
                .row(r)
                .chunks_exact(CHANNELS)
                .map(|px| Hsv::from_bgr([px[0], px[1], px[2]]))
                .collect::<Vec<_>>()
        })
        .collect()
}

/// `live - reference` per channel, clamping negative results to zero.
pub fn saturating_difference(live: &Frame, reference: &Frame) -> Frame {
    Frame::from_fn(live.rows(), live.cols(), |r, c| {
        let (l, f) = (live.pixel(r, c), reference.pixel(r, c));
        [
            l[0].saturating_sub(f[0]),
            l[1].saturating_sub(f[1]),
            l[2].saturating_sub(f[2]),
        ]
    })
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
