//! # Scan line camera stream for structured light rigs
//!
//! This crate drives a machine vision camera that is triggered by a line projector. It
//! configures the camera's format, shutter, trigger and exposure, pulls frames into a ring
//! buffer, and finds the rows lit by the projected scan line by comparing each frame against a
//! reference frame taken without the line.
//!
//! Cameras are reached through the [`CameraBus`] and [`CameraDevice`] traits. With the `v4l2`
//! feature enabled the crate provides an implementation over
//! [`rscam`](https://github.com/loyd/rscam) for V4L2 devices on Linux.
//!
//! ## Installation
//!
//! ```toml
//! [dependencies]
//! scanline_camstream = { version = "0.1", features = ["v4l2"] }
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! let mut session = SessionBuilder::new()
//!     // Camera settings, alternatively use .profile(...) or skip to use the defaults
//!     .profile_from_file("rig_profile.toml")
//!     .expect("Cannot load the acquisition profile")
//!     // Number of frames kept around
//!     .ring_capacity(16)
//!     .build(V4l2Bus::new())
//!     .expect("Invalid session settings");
//!
//! session.connect()?;
//! session.configure()?;
//! session.start()?;
//!
//! // Projector off: capture the reference frame
//! session.capture_reference(0)?;
//!
//! // Projector on: sweep the trigger delay and accumulate the lit rows
//! for i in 1..=55 {
//!     if session.capture_one(i)?.is_some() {
//!         session.detect(i)?;
//!     }
//!     session.increment_trigger_delay()?;
//! }
//!
//! println!("Scan line envelope: {:?}", session.detector().envelope());
//! session.stop()?;
//! ```

// -----------------------------------------------------------------------------------------------
// EXPORTS
// -----------------------------------------------------------------------------------------------

pub use band::{Band, BandDetector, DetectorParams, Hsv};
pub use builder::{SessionBuilder, DEFAULT_RING_CAPACITY};
pub use camera::{
    BusError, CameraBus, CameraDevice, CameraInfo, DeviceId, FormatInfo, FormatSettings,
    Property, PropertyInfo, PropertyKind, TriggerMode,
};
pub use error::{Error, Result};
pub use frame::{BayerPattern, Frame, PixelFormat, RawFrame};
pub use morphology::StructuringElement;
pub use profile::AcquisitionProfile;
pub use ring::FrameRingBuffer;
pub use session::{AcquisitionSession, CaptureStats, SessionState};
pub use sink::{FrameSink, ImageFileSink};
pub use timing::{TriggerTimingController, DELAY_MAX, DELAY_STEP};
#[cfg(feature = "v4l2")]
pub use v4l2::{V4l2Bus, V4l2Camera};

// -----------------------------------------------------------------------------------------------
// MODULES
// -----------------------------------------------------------------------------------------------

pub mod band;
mod builder;
mod camera;
pub mod codec;
mod error;
mod frame;
pub mod morphology;
mod profile;
mod ring;
mod session;
mod sink;
pub mod timing;
#[cfg(feature = "v4l2")]
mod v4l2;

pub mod prelude {
    pub use crate::{AcquisitionSession, SessionBuilder, SessionState};
    pub use crate::{CameraBus, CameraDevice, Frame, FrameSink, ImageFileSink};
}
