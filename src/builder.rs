//! # `SessionBuilder` implementation
//!
//! This module implements the builder for acquisition session objects.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use std::path::Path;

use crate::band::{BandDetector, DetectorParams};
use crate::camera::CameraBus;
use crate::error::Result;
use crate::profile::AcquisitionProfile;
use crate::ring::FrameRingBuffer;
use crate::session::AcquisitionSession;

// -----------------------------------------------------------------------------------------------
// CONSTANTS
// -----------------------------------------------------------------------------------------------

/// Default number of frames kept by the session's ring buffer.
pub const DEFAULT_RING_CAPACITY: usize = 10;

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// Collects the settings of an [`AcquisitionSession`] before it is created.
#[derive(Debug, Clone)]
pub struct SessionBuilder {
    profile: AcquisitionProfile,

    ring_capacity: usize,

    detector_params: DetectorParams,

    warmup_frames: u64,
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionBuilder {
    pub fn new() -> Self {
        Self {
            profile: AcquisitionProfile::default(),
            ring_capacity: DEFAULT_RING_CAPACITY,
            detector_params: DetectorParams::default(),
            warmup_frames: 0,
        }
    }

    /// Set the acquisition profile applied by `configure`.
    pub fn profile(mut self, profile: AcquisitionProfile) -> Self {
        self.profile = profile;

        self
    }

    /// Load the acquisition profile from a file, see [`AcquisitionProfile::from_file`].
    pub fn profile_from_file<P: AsRef<Path>>(self, path: P) -> Result<Self> {
        Ok(self.profile(AcquisitionProfile::from_file(path)?))
    }

    /// Set the number of frames kept in the ring buffer.
    ///
    /// Default value is 10, must be at least 1.
    pub fn ring_capacity(mut self, capacity: usize) -> Self {
        self.ring_capacity = capacity;

        self
    }

    /// Set the band detector's threshold and opening size.
    pub fn detector_params(mut self, params: DetectorParams) -> Self {
        self.detector_params = params;

        self
    }

    /// Set the number of retrievals after connecting whose failures are not counted as drops.
    ///
    /// Default value is 0.
    pub fn warmup_frames(mut self, frames: u64) -> Self {
        self.warmup_frames = frames;

        self
    }

    /// Build a disconnected session on the given bus.
    ///
    /// This function fails if the ring capacity or detector parameters are invalid.
    pub fn build<B: CameraBus>(self, bus: B) -> Result<AcquisitionSession<B>> {
        let ring = FrameRingBuffer::new(self.ring_capacity)?;
        let detector = BandDetector::new(self.detector_params)?;

        Ok(AcquisitionSession::new(
            bus,
            self.profile,
            ring,
            detector,
            self.warmup_frames,
        ))
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
