//! # `scanline_camstream` Error module
//!
//! Provides abstractions over errors which can occur during this crate's use.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use std::path::PathBuf;

use serde_any;
use thiserror;

use crate::camera::BusError;
use crate::session::SessionState;

// -----------------------------------------------------------------------------------------------
// ENUMERATIONS
// -----------------------------------------------------------------------------------------------

/// Result type used by faillible functions inside the `scanline_camstream` crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents errors which can occur during use of the `scanline_camstream` crate.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Camera bus error while {context}: {source}")]
    DeviceError {
        context: &'static str,
        #[source]
        source: BusError,
    },

    #[error("No camera detected on the bus")]
    NoDeviceError,

    #[error("Camera rejected the acquisition configuration: {0}")]
    ConfigurationError(String),

    #[error("Isochronous bandwidth exceeded, lower the resolution or frame rate")]
    BandwidthError,

    #[error("Failed to start image capture: {0}")]
    StartError(BusError),

    #[error("Error capturing camera image: {0}")]
    CaptureError(BusError),

    #[error("Error converting raw camera buffer: {0}")]
    ConversionError(String),

    #[error("Invalid frame passed to the band detector: {0}")]
    InvalidFrameError(String),

    #[error("Cannot {operation} while the session is {state}")]
    InvalidStateError {
        operation: &'static str,
        state: SessionState,
    },

    #[error("Cannot find file at {0:?}")]
    FileNotFound(PathBuf),

    #[error("Error deserialising data: {0}")]
    DeserialisationError(serde_any::Error),

    #[error("Error occured while encoding or decoding an image: {0}")]
    ImageError(image::ImageError),
}
