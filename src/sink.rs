//! # Frame sinks
//!
//! Destinations for recorded frames.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use std::path::Path;

use log::debug;

use crate::error::{Error, Result};
use crate::frame::Frame;

// -----------------------------------------------------------------------------------------------
// TRAITS
// -----------------------------------------------------------------------------------------------

pub trait FrameSink {
    /// Persist `frame` at `path`.
    fn save(&mut self, frame: &Frame, path: &Path) -> Result<()>;
}

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// Saves frames as image files, the format is picked from the file extension.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageFileSink;

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl FrameSink for ImageFileSink {
    fn save(&mut self, frame: &Frame, path: &Path) -> Result<()> {
        debug!("Saving {}x{} frame to {:?}", frame.cols(), frame.rows(), path);

        frame
            .to_rgb_image()
            .save(path)
            .map_err(|e| Error::ImageError(e))
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
