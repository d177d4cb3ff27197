//! # Camera abstraction
//!
//! The acquisition pipeline never talks to a vendor SDK directly. Instead a camera is reached
//! through a [`CameraBus`], which finds devices and connects to them, and a [`CameraDevice`],
//! which exposes the property, trigger and buffer calls of a connected camera.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use derive_more::Display;
use serde::Deserialize;
use thiserror;

use crate::frame::{PixelFormat, RawFrame};

// -----------------------------------------------------------------------------------------------
// TRAITS
// -----------------------------------------------------------------------------------------------

/// Discovers cameras and opens connections to them.
pub trait CameraBus {
    type Device: CameraDevice;

    /// List the cameras currently attached to the bus, in bus order.
    fn discover(&mut self) -> Result<Vec<DeviceId>, BusError>;

    /// Open a connection to the given camera.
    fn connect(&mut self, id: &DeviceId) -> Result<Self::Device, BusError>;
}

/// A connected camera.
///
/// Every call may block on the underlying bus. `retrieve_buffer` blocks until the camera
/// delivers a frame or the bus times out.
pub trait CameraDevice {
    /// Identifying information about the camera.
    fn info(&mut self) -> Result<CameraInfo, BusError>;

    /// Capabilities of a custom video mode.
    fn format_info(&mut self, mode: u32) -> Result<FormatInfo, BusError>;

    /// Check whether the camera would accept the given format settings.
    fn validate_format(&mut self, settings: &FormatSettings) -> Result<bool, BusError>;

    /// Apply format settings previously validated with `validate_format`.
    fn apply_format(&mut self, settings: &FormatSettings) -> Result<(), BusError>;

    fn property_info(&mut self, kind: PropertyKind) -> Result<PropertyInfo, BusError>;

    fn property(&mut self, kind: PropertyKind) -> Result<Property, BusError>;

    fn set_property(&mut self, property: &Property) -> Result<(), BusError>;

    fn set_trigger_mode(&mut self, trigger: &TriggerMode) -> Result<(), BusError>;

    fn start_capture(&mut self) -> Result<(), BusError>;

    fn stop_capture(&mut self) -> Result<(), BusError>;

    /// Retrieve the next raw buffer from the camera.
    fn retrieve_buffer(&mut self) -> Result<RawFrame, BusError>;

    fn disconnect(&mut self) -> Result<(), BusError>;
}

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// Bus specific identifier of a camera, such as a device path or a GUID.
#[derive(Debug, Display, Clone, PartialEq, Eq, Hash)]
pub struct DeviceId(pub String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraInfo {
    pub serial_number: String,
    pub model: String,
}

/// What a custom video mode can do.
#[derive(Debug, Clone, PartialEq)]
pub struct FormatInfo {
    /// Largest image width the mode supports
    pub max_width: u32,

    /// Largest image height the mode supports
    pub max_height: u32,

    /// Pixel formats the mode can deliver
    pub pixel_formats: Vec<PixelFormat>,
}

/// Region and pixel format requested from a custom video mode.
#[derive(Debug, Clone, PartialEq)]
pub struct FormatSettings {
    pub mode: u32,
    pub offset_x: u32,
    pub offset_y: u32,
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PropertyInfo {
    /// Whether the camera has this property at all
    pub present: bool,
    pub min: f64,
    pub max: f64,
}

/// An absolute-valued camera property.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Property {
    pub kind: PropertyKind,

    /// Whether the property is switched on
    pub on: bool,

    /// Automatic (camera controlled) or manual mode
    pub auto: bool,

    /// Absolute value in the property's unit
    pub value: f64,
}

/// External hardware trigger settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct TriggerMode {
    pub enabled: bool,
    pub mode: u32,
    pub source: u32,
    pub parameter: u32,
    pub polarity: u32,
}

// -----------------------------------------------------------------------------------------------
// ENUMERATIONS
// -----------------------------------------------------------------------------------------------

/// Properties the pipeline reads or writes, with the unit of their absolute value.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyKind {
    /// Shutter time in milliseconds
    #[display(fmt = "shutter")]
    Shutter,

    /// Black level in percent
    #[display(fmt = "brightness")]
    Brightness,

    /// Exposure value in EV
    #[display(fmt = "auto exposure")]
    AutoExposure,

    /// Frames per second
    #[display(fmt = "frame rate")]
    FrameRate,

    /// Delay between the trigger edge and integration start, in seconds
    #[display(fmt = "trigger delay")]
    TriggerDelay,
}

/// Errors reported by camera bus adapters.
#[derive(thiserror::Error, Debug)]
pub enum BusError {
    #[error("isochronous bandwidth exceeded")]
    BandwidthExceeded,

    #[error("timed out waiting for the camera")]
    Timeout,

    #[error("{0} is not supported by this camera")]
    Unsupported(String),

    #[error("camera rejected the request: {0}")]
    Rejected(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl Property {
    /// A manually controlled, switched on property with the given value.
    pub fn manual(kind: PropertyKind, value: f64) -> Self {
        Self {
            kind,
            on: true,
            auto: false,
            value,
        }
    }
}

impl PropertyInfo {
    /// Info for a property the camera does not have.
    pub fn absent() -> Self {
        Self {
            present: false,
            min: 0.0,
            max: 0.0,
        }
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
