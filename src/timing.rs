//! # Trigger timing
//!
//! The projector fires the camera's external trigger. Shifting the trigger delay moves the
//! exposure window relative to the projected line, which is how the capture phase is swept
//! during calibration. Frame rate negotiation lives here too as it is the other half of the
//! capture timing.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use std::time::Duration;

use log::{debug, info, warn};

use crate::camera::{CameraDevice, Property, PropertyKind};

// -----------------------------------------------------------------------------------------------
// CONSTANTS
// -----------------------------------------------------------------------------------------------

/// Amount one call to [`TriggerTimingController::increment_delay`] advances the delay by.
pub const DELAY_STEP: Duration = Duration::from_micros(200);

/// Exclusive upper bound of the trigger delay, reaching it wraps the delay back to zero.
pub const DELAY_MAX: Duration = Duration::from_micros(11_000);

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// Owns the trigger delay and applies it to a camera.
#[derive(Debug, Clone, Default)]
pub struct TriggerTimingController {
    delay: Duration,
    supports_delay: bool,
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl TriggerTimingController {
    pub fn new() -> Self {
        Self::default()
    }

    /// The delay most recently set, whether or not the camera accepted it.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Whether the connected camera has a trigger delay property.
    pub fn supports_delay(&self) -> bool {
        self.supports_delay
    }

    /// Ask the camera whether it supports a trigger delay.
    ///
    /// A failed query is logged and treated as unsupported.
    pub fn discover<C: CameraDevice + ?Sized>(&mut self, camera: &mut C) -> bool {
        self.supports_delay = match camera.property_info(PropertyKind::TriggerDelay) {
            Ok(info) => info.present,
            Err(e) => {
                warn!("Could not query trigger delay support: {}", e);
                false
            }
        };

        debug!("Camera trigger delay support: {}", self.supports_delay);
        self.supports_delay
    }

    /// Set the trigger delay.
    ///
    /// The value is not range checked. It is always recorded, but only written to the camera if
    /// the camera supports a trigger delay. Failing to write it is logged and otherwise ignored.
    pub fn set_delay<C: CameraDevice + ?Sized>(&mut self, camera: &mut C, delay: Duration) {
        if self.supports_delay {
            // Start from the camera's current property so unrelated fields are kept
            match camera.property(PropertyKind::TriggerDelay) {
                Ok(mut prop) => {
                    prop.on = true;
                    prop.auto = false;
                    prop.value = delay.as_secs_f64();

                    if let Err(e) = camera.set_property(&prop) {
                        warn!("Camera rejected trigger delay of {:?}: {}", delay, e);
                    }
                }
                Err(e) => warn!("Could not read the trigger delay property: {}", e),
            }
        } else {
            debug!("Trigger delay of {:?} recorded but not applied, camera has no support", delay);
        }

        self.delay = delay;
    }

    /// Advance the delay by [`DELAY_STEP`], wrapping to zero at [`DELAY_MAX`], and apply it.
    ///
    /// Returns the new delay.
    pub fn increment_delay<C: CameraDevice + ?Sized>(&mut self, camera: &mut C) -> Duration {
        self.set_delay(camera, next_delay(self.delay));
        self.delay
    }
}

/// Request a frame rate and return the rate the camera actually settled on.
///
/// If the camera has no frame rate property nothing is written. The rate is read back either
/// way, since bus speed may force a slower rate than requested.
pub fn negotiate_frame_rate<C: CameraDevice + ?Sized>(camera: &mut C, fps: f64) -> Option<f64> {
    match camera.property_info(PropertyKind::FrameRate) {
        Ok(info) if info.present => match camera.property(PropertyKind::FrameRate) {
            Ok(mut prop) => {
                prop.auto = false;
                prop.value = fps;
                if let Err(e) = camera.set_property(&prop) {
                    warn!("Camera rejected frame rate of {:.1} fps: {}", fps, e);
                }
            }
            Err(e) => warn!("Could not read the frame rate property: {}", e),
        },
        Ok(_) => debug!("Camera has no frame rate property, keeping its rate"),
        Err(e) => {
            warn!("Could not query frame rate support: {}", e);
            return None;
        }
    }

    info!("Asked for a frame rate of {:.1} fps", fps);
    read_frame_rate(camera)
}

/// Read the camera's current frame rate.
///
/// Returns `None` if the camera has no frame rate property or it cannot be read.
pub fn read_frame_rate<C: CameraDevice + ?Sized>(camera: &mut C) -> Option<f64> {
    match camera.property_info(PropertyKind::FrameRate) {
        Ok(info) if info.present => {}
        Ok(_) => return None,
        Err(e) => {
            warn!("Could not query frame rate support: {}", e);
            return None;
        }
    }

    match camera.property(PropertyKind::FrameRate) {
        Ok(Property { value, .. }) => {
            info!("Using frame rate of {:.1} fps", value);
            Some(value)
        }
        Err(e) => {
            warn!("Could not read the frame rate property: {}", e);
            None
        }
    }
}

/// The delay following `delay` in the sweep.
fn next_delay(delay: Duration) -> Duration {
    let next = delay + DELAY_STEP;
    if next >= DELAY_MAX {
        Duration::from_secs(0)
    } else {
        next
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
