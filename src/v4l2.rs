//! # V4L2 camera adapter
//!
//! Implements [`CameraBus`] and [`CameraDevice`] over [`rscam`](https://github.com/loyd/rscam),
//! so any UVC camera can feed the pipeline on Linux.
//!
//! V4L2 has no notion of an external trigger or trigger delay, so trigger settings are accepted
//! and ignored and the trigger delay is reported as absent. Shutter, brightness and exposure
//! bias map onto the standard V4L2 controls, and the frame rate onto the capture interval.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use std::fs;
use std::io;
use std::path::PathBuf;

use log::{debug, warn};
use rscam::{Camera, Config, ResolutionInfo};

use crate::camera::{
    BusError, CameraBus, CameraDevice, CameraInfo, DeviceId, FormatInfo, FormatSettings,
    Property, PropertyInfo, PropertyKind, TriggerMode,
};
use crate::frame::{BayerPattern, PixelFormat, RawFrame};

// -----------------------------------------------------------------------------------------------
// CONSTANTS
// -----------------------------------------------------------------------------------------------

const CID_BRIGHTNESS: u32 = 0x0098_0900;
const CID_EXPOSURE_AUTO: u32 = 0x009a_0901;
const CID_EXPOSURE_ABSOLUTE: u32 = 0x009a_0902;
const CID_AUTO_EXPOSURE_BIAS: u32 = 0x009a_0913;

/// `V4L2_EXPOSURE_MANUAL` value of the exposure auto control
const EXPOSURE_MANUAL: i32 = 1;

/// Streaming fails with `ENOSPC` when the USB bus cannot reserve enough bandwidth
const ENOSPC: i32 = 28;

/// FourCC codes the codec can convert, with their pixel format
const FORMATS: &[(&[u8; 4], PixelFormat)] = &[
    (b"GREY", PixelFormat::Mono8),
    (b"RGGB", PixelFormat::Raw8(BayerPattern::Rggb)),
    (b"BA81", PixelFormat::Raw8(BayerPattern::Bggr)),
    (b"GRBG", PixelFormat::Raw8(BayerPattern::Grbg)),
    (b"GBRG", PixelFormat::Raw8(BayerPattern::Gbrg)),
    (b"RGB3", PixelFormat::Rgb8),
    (b"BGR3", PixelFormat::Bgr8),
    (b"YUYV", PixelFormat::Yuyv),
    (b"MJPG", PixelFormat::Mjpeg),
];

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// Finds V4L2 capture devices as `video*` nodes in a directory, `/dev` by default.
pub struct V4l2Bus {
    dir: PathBuf,
}

/// A V4L2 device opened through `rscam`.
pub struct V4l2Camera {
    camera: Camera,
    path: String,

    fourcc: [u8; 4],
    resolution: (u32, u32),

    /// Capture interval as a `(numerator, denominator)` fraction of a second
    interval: (u32, u32),
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl V4l2Bus {
    pub fn new() -> Self {
        Self::in_dir("/dev")
    }

    pub fn in_dir<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }
}

impl Default for V4l2Bus {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraBus for V4l2Bus {
    type Device = V4l2Camera;

    fn discover(&mut self) -> Result<Vec<DeviceId>, BusError> {
        let mut ids = Vec::new();

        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let is_video = path
                .file_name()
                .and_then(|n| n.to_str())
                .map_or(false, |n| n.starts_with("video"));

            if is_video {
                ids.push(DeviceId(path.to_string_lossy().into_owned()));
            }
        }

        // Bus order is the device number order
        ids.sort_by_key(|id| device_number(&id.0));
        debug!("Found V4L2 devices: {:?}", ids);

        Ok(ids)
    }

    fn connect(&mut self, id: &DeviceId) -> Result<Self::Device, BusError> {
        let camera = Camera::new(&id.0)?;
        let config = Config::default();

        Ok(V4l2Camera {
            camera,
            path: id.0.clone(),
            fourcc: *b"YUYV",
            resolution: config.resolution,
            interval: config.interval,
        })
    }
}

impl CameraDevice for V4l2Camera {
    fn info(&mut self) -> Result<CameraInfo, BusError> {
        let serial_number = self.path.rsplit('/').next().unwrap_or(&self.path).to_string();

        Ok(CameraInfo {
            serial_number,
            model: String::from("V4L2 camera"),
        })
    }

    fn format_info(&mut self, mode: u32) -> Result<FormatInfo, BusError> {
        debug!("V4L2 has no custom modes, ignoring mode {}", mode);

        let mut info = FormatInfo {
            max_width: 0,
            max_height: 0,
            pixel_formats: Vec::new(),
        };

        for (fourcc, format) in FORMATS {
            if let Some((w, h)) = self.max_resolution(&fourcc[..]) {
                info.pixel_formats.push(*format);
                if w * h > info.max_width * info.max_height {
                    info.max_width = w;
                    info.max_height = h;
                }
            }
        }

        Ok(info)
    }

    fn validate_format(&mut self, settings: &FormatSettings) -> Result<bool, BusError> {
        let fourcc = match fourcc_of(settings.pixel_format) {
            Some(f) => f,
            None => return Ok(false),
        };

        if settings.offset_x != 0 || settings.offset_y != 0 {
            return Ok(false);
        }

        let valid = match self.camera.resolutions(&fourcc[..]) {
            Ok(ResolutionInfo::Discretes(sizes)) => {
                sizes.contains(&(settings.width, settings.height))
            }
            Ok(ResolutionInfo::Stepwise { min, max, .. }) => {
                (min.0..=max.0).contains(&settings.width)
                    && (min.1..=max.1).contains(&settings.height)
            }
            Err(_) => false,
        };

        Ok(valid)
    }

    fn apply_format(&mut self, settings: &FormatSettings) -> Result<(), BusError> {
        self.fourcc = fourcc_of(settings.pixel_format)
            .ok_or_else(|| BusError::Unsupported(settings.pixel_format.to_string()))?;
        self.resolution = (settings.width, settings.height);

        Ok(())
    }

    fn property_info(&mut self, kind: PropertyKind) -> Result<PropertyInfo, BusError> {
        Ok(match kind {
            PropertyKind::TriggerDelay => PropertyInfo::absent(),
            _ => PropertyInfo {
                present: true,
                min: f64::MIN,
                max: f64::MAX,
            },
        })
    }

    fn property(&mut self, kind: PropertyKind) -> Result<Property, BusError> {
        match kind {
            PropertyKind::FrameRate => {
                let (num, den) = self.interval;
                Ok(Property::manual(kind, den as f64 / num.max(1) as f64))
            }
            _ => Err(BusError::Unsupported(format!("reading {}", kind))),
        }
    }

    fn set_property(&mut self, property: &Property) -> Result<(), BusError> {
        match property.kind {
            PropertyKind::Shutter => {
                // V4L2 exposure is in units of 100us
                let units = (property.value * 10.0).round().max(1.0) as i32;
                self.camera.set_control(CID_EXPOSURE_AUTO, &EXPOSURE_MANUAL)?;
                self.camera.set_control(CID_EXPOSURE_ABSOLUTE, &units)?;
            }
            PropertyKind::Brightness => {
                self.camera
                    .set_control(CID_BRIGHTNESS, &(property.value.round() as i32))?;
            }
            PropertyKind::AutoExposure => {
                // Bias is in units of 0.001 EV
                let bias = (property.value * 1000.0).round() as i32;
                self.camera.set_control(CID_AUTO_EXPOSURE_BIAS, &bias)?;
            }
            PropertyKind::FrameRate => {
                if property.value <= 0.0 {
                    return Err(BusError::Rejected(format!(
                        "frame rate of {} fps",
                        property.value
                    )));
                }
                // Takes effect the next time streaming starts
                self.interval = (1, property.value.round() as u32);
            }
            PropertyKind::TriggerDelay => {
                return Err(BusError::Unsupported(property.kind.to_string()))
            }
        }

        Ok(())
    }

    fn set_trigger_mode(&mut self, trigger: &TriggerMode) -> Result<(), BusError> {
        if trigger.enabled {
            warn!("{} has no hardware trigger, capturing free running", self.path);
        }

        Ok(())
    }

    fn start_capture(&mut self) -> Result<(), BusError> {
        let config = Config {
            interval: self.interval,
            resolution: self.resolution,
            format: &self.fourcc,
            ..Config::default()
        };

        self.camera.start(&config).map_err(|e| match e {
            rscam::Error::Io(ref io) if io.raw_os_error() == Some(ENOSPC) => {
                BusError::BandwidthExceeded
            }
            rscam::Error::Io(io) => BusError::Io(io),
            other => BusError::Rejected(other.to_string()),
        })
    }

    fn stop_capture(&mut self) -> Result<(), BusError> {
        Ok(self.camera.stop()?)
    }

    fn retrieve_buffer(&mut self) -> Result<RawFrame, BusError> {
        let frame = self.camera.capture().map_err(|e| match e.kind() {
            io::ErrorKind::TimedOut => BusError::Timeout,
            _ => BusError::Io(e),
        })?;

        let format = FORMATS
            .iter()
            .find(|(fourcc, _)| **fourcc == frame.format)
            .map(|(_, format)| *format)
            .ok_or_else(|| {
                BusError::Unsupported(format!(
                    "FourCC {}",
                    String::from_utf8_lossy(&frame.format)
                ))
            })?;

        let (cols, rows) = frame.resolution;

        Ok(RawFrame::new(rows as usize, cols as usize, format, frame.to_vec()))
    }

    fn disconnect(&mut self) -> Result<(), BusError> {
        // The device is closed when the camera is dropped
        debug!("Releasing {}", self.path);

        Ok(())
    }
}

impl V4l2Camera {
    /// Largest resolution the device offers for a FourCC, `None` if the format is not offered.
    fn max_resolution(&self, fourcc: &[u8]) -> Option<(u32, u32)> {
        match self.camera.resolutions(fourcc) {
            Ok(ResolutionInfo::Discretes(sizes)) => {
                sizes.into_iter().max_by_key(|&(w, h)| w * h)
            }
            Ok(ResolutionInfo::Stepwise { max, .. }) => Some(max),
            Err(_) => None,
        }
    }
}

// -----------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// -----------------------------------------------------------------------------------------------

fn fourcc_of(format: PixelFormat) -> Option<[u8; 4]> {
    FORMATS
        .iter()
        .find(|(_, f)| *f == format)
        .map(|(fourcc, _)| **fourcc)
}

/// Number at the end of a `/dev/videoN` path, unnumbered paths sort last.
fn device_number(path: &str) -> u32 {
    path.rsplit("video")
        .next()
        .and_then(|n| n.parse().ok())
        .unwrap_or(u32::MAX)
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
