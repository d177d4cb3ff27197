//! # Acquisition profile
//!
//! The camera settings applied by [`AcquisitionSession::configure`](crate::AcquisitionSession).
//! The defaults are the settings used on the projection rig; a profile file only needs to name
//! the fields it changes.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use serde_any;

use crate::camera::TriggerMode;
use crate::error::{Error, Result};
use crate::frame::{BayerPattern, PixelFormat};

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// Format, shutter, trigger and exposure settings for a capture session.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AcquisitionProfile {
    /// Custom video mode to configure
    pub mode: u32,

    /// Pixel format requested from the mode, captured at the mode's maximum resolution
    pub pixel_format: PixelFormat,

    /// Shutter time in milliseconds
    pub shutter_ms: f64,

    /// External trigger settings
    pub trigger: TriggerMode,

    /// Trigger delay applied once the trigger is enabled, in microseconds
    pub trigger_delay_us: u64,

    /// Black level in percent
    pub brightness: f64,

    /// Exposure bias in EV
    pub exposure_ev: f64,

    /// Frame rate to negotiate after configuration, the camera's rate is kept if unset
    pub frame_rate: Option<f64>,
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl Default for AcquisitionProfile {
    fn default() -> Self {
        Self {
            mode: 2,
            pixel_format: PixelFormat::Raw8(BayerPattern::Rggb),
            shutter_ms: 0.009,
            trigger: TriggerMode {
                enabled: true,
                mode: 0,
                source: 0,
                parameter: 0,
                polarity: 0,
            },
            trigger_delay_us: 0,
            brightness: 0.0,
            exposure_ev: -2.0,
            frame_rate: None,
        }
    }
}

impl AcquisitionProfile {
    /// Load a profile from a file.
    ///
    /// The file type will be guessed at runtime, any file type supported by
    /// [`serde_any`](https://docs.rs/serde_any/0.5.0/serde_any/) is supported. Missing fields
    /// take their default value.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        // Check the file exitsts
        if !path.as_ref().exists() {
            return Err(Error::FileNotFound(path.as_ref().to_path_buf()));
        }

        serde_any::from_file(path).map_err(|e| Error::DeserialisationError(e))
    }

    pub fn trigger_delay(&self) -> Duration {
        Duration::from_micros(self.trigger_delay_us)
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {

    use std::io::Write;

    use super::*;

    #[test]
    fn test_missing_file() {
        let res = AcquisitionProfile::from_file("does/not/exist.toml");
        assert!(matches!(res, Err(Error::FileNotFound(_))));
    }

    #[test]
    fn test_partial_profile_keeps_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "shutter_ms = 0.5").unwrap();
        writeln!(file, "pixel_format = \"mono8\"").unwrap();
        writeln!(file, "frame_rate = 30.0").unwrap();

        let profile = AcquisitionProfile::from_file(file.path()).unwrap();

        assert_eq!(profile.shutter_ms, 0.5);
        assert_eq!(profile.pixel_format, PixelFormat::Mono8);
        assert_eq!(profile.frame_rate, Some(30.0));
        assert_eq!(profile.exposure_ev, -2.0);
        assert!(profile.trigger.enabled);
    }
}
