//! # Acquisition session
//!
//! This module provides the session object which owns a camera for the duration of an
//! acquisition. A session walks the camera through
//! `Disconnected -> Connected -> Configured -> Capturing -> Stopped`, pulls frames into a ring
//! buffer and runs band detection on them against a cached reference frame.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use std::path::{Path, PathBuf};
use std::time::Duration;

use derive_more::Display;
use log::{debug, error, info, warn};

use crate::band::{Band, BandDetector};
use crate::camera::{BusError, CameraBus, CameraDevice, FormatSettings, Property, PropertyKind};
use crate::codec;
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::profile::AcquisitionProfile;
use crate::ring::FrameRingBuffer;
use crate::sink::FrameSink;
use crate::timing::{self, TriggerTimingController};

// -----------------------------------------------------------------------------------------------
// DATA STRUCTS
// -----------------------------------------------------------------------------------------------

/// Drives one camera from connection to teardown.
///
/// All calls are synchronous and the session is not meant to be shared between threads without
/// external locking. Capturing blocks until the camera delivers a buffer or the bus times out.
pub struct AcquisitionSession<B: CameraBus> {
    bus: B,
    camera: Option<B::Device>,
    state: SessionState,

    profile: AcquisitionProfile,
    timing: TriggerTimingController,

    ring: FrameRingBuffer,
    detector: BandDetector,
    reference: Option<Frame>,

    stats: CaptureStats,
    warmup_frames: u64,
}

/// Counters of the frames retrieved since the last connection.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CaptureStats {
    /// Frames retrieved, converted and stored
    pub captured: u64,

    /// Failed retrievals after the warm-up period
    pub dropped: u64,

    /// Failed retrievals since the last successful one, after warm-up
    pub consecutive_drops: u64,

    /// Retrieval attempts, successful or not
    pub attempts: u64,
}

// -----------------------------------------------------------------------------------------------
// ENUMERATIONS
// -----------------------------------------------------------------------------------------------

/// Lifecycle of an [`AcquisitionSession`].
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    #[display(fmt = "disconnected")]
    Disconnected,

    #[display(fmt = "connected")]
    Connected,

    #[display(fmt = "configured")]
    Configured,

    #[display(fmt = "capturing")]
    Capturing,

    #[display(fmt = "stopped")]
    Stopped,
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl<B: CameraBus> AcquisitionSession<B> {
    /// Create a new, disconnected session.
    ///
    /// Use [`SessionBuilder`](crate::SessionBuilder) to construct sessions.
    pub(crate) fn new(
        bus: B,
        profile: AcquisitionProfile,
        ring: FrameRingBuffer,
        detector: BandDetector,
        warmup_frames: u64,
    ) -> Self {
        Self {
            bus,
            camera: None,
            state: SessionState::Disconnected,
            profile,
            timing: TriggerTimingController::new(),
            ring,
            detector,
            reference: None,
            stats: CaptureStats::default(),
            warmup_frames,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn stats(&self) -> CaptureStats {
        self.stats
    }

    pub fn profile(&self) -> &AcquisitionProfile {
        &self.profile
    }

    pub fn timing(&self) -> &TriggerTimingController {
        &self.timing
    }

    pub fn ring(&self) -> &FrameRingBuffer {
        &self.ring
    }

    pub fn detector(&self) -> &BandDetector {
        &self.detector
    }

    pub fn detector_mut(&mut self) -> &mut BandDetector {
        &mut self.detector
    }

    pub fn reference(&self) -> Option<&Frame> {
        self.reference.as_ref()
    }

    /// The connected camera, if any.
    pub fn camera(&self) -> Option<&B::Device> {
        self.camera.as_ref()
    }

    /// Connect to the first camera found on the bus.
    ///
    /// Allowed from `Disconnected` and `Stopped`. If several cameras are attached the first one
    /// reported by the bus is used.
    pub fn connect(&mut self) -> Result<()> {
        self.require("connect", &[SessionState::Disconnected, SessionState::Stopped])?;

        let ids = self.bus.discover().map_err(|e| Error::DeviceError {
            context: "discovering cameras",
            source: e,
        })?;

        let id = match ids.first() {
            Some(id) => id,
            None => return Err(Error::NoDeviceError),
        };
        info!("Number of cameras detected: {}", ids.len());
        if ids.len() > 1 {
            warn!("More than one camera detected, using {}", id);
        }

        let camera = self.bus.connect(id).map_err(|e| Error::DeviceError {
            context: "connecting to the camera",
            source: e,
        })?;

        info!("Connected to camera {}", id);
        self.camera = Some(camera);
        self.timing = TriggerTimingController::new();
        self.stats = CaptureStats::default();
        self.state = SessionState::Connected;

        Ok(())
    }

    /// Apply the acquisition profile to the connected camera.
    ///
    /// On failure the camera is left with whatever settings were applied before the rejected
    /// one, and the session stays `Connected`. Such a session must not be started.
    pub fn configure(&mut self) -> Result<()> {
        self.require("configure the camera", &[SessionState::Connected])?;
        let camera = camera_mut(&mut self.camera, self.state)?;
        let profile = &self.profile;

        // Custom video mode at the largest size the mode allows
        let fmt_info = camera
            .format_info(profile.mode)
            .map_err(|e| rejected(format!("querying mode {}", profile.mode), e))?;

        if !fmt_info.pixel_formats.contains(&profile.pixel_format) {
            return Err(Error::ConfigurationError(format!(
                "pixel format {} is not supported by mode {}",
                profile.pixel_format, profile.mode
            )));
        }

        let settings = FormatSettings {
            mode: profile.mode,
            offset_x: 0,
            offset_y: 0,
            width: fmt_info.max_width,
            height: fmt_info.max_height,
            pixel_format: profile.pixel_format,
        };

        let valid = camera
            .validate_format(&settings)
            .map_err(|e| rejected(String::from("validating format settings"), e))?;
        if !valid {
            return Err(Error::ConfigurationError(format!(
                "format settings {:?} are not valid",
                settings
            )));
        }

        camera
            .apply_format(&settings)
            .map_err(|e| rejected(String::from("applying format settings"), e))?;
        debug!(
            "Mode {} set to {}x{} {}",
            settings.mode, settings.width, settings.height, settings.pixel_format
        );

        set_manual(camera, PropertyKind::Shutter, profile.shutter_ms)?;

        camera
            .set_trigger_mode(&profile.trigger)
            .map_err(|e| rejected(String::from("setting the trigger mode"), e))?;

        self.timing.discover(camera);
        self.timing.set_delay(camera, profile.trigger_delay());

        set_manual(camera, PropertyKind::Brightness, profile.brightness)?;
        set_manual(camera, PropertyKind::AutoExposure, profile.exposure_ev)?;

        if let Some(fps) = profile.frame_rate {
            timing::negotiate_frame_rate(camera, fps);
        }

        info!("Camera configured");
        self.state = SessionState::Configured;

        Ok(())
    }

    /// Start capturing.
    ///
    /// A bandwidth failure is reported as [`Error::BandwidthError`], which can be recovered from
    /// by configuring a smaller format or lower frame rate.
    pub fn start(&mut self) -> Result<()> {
        self.require("start capture", &[SessionState::Configured])?;
        let camera = camera_mut(&mut self.camera, self.state)?;

        match camera.start_capture() {
            Ok(()) => (),
            Err(BusError::BandwidthExceeded) => {
                error!("Bandwidth exceeded");
                return Err(Error::BandwidthError);
            }
            Err(e) => {
                error!("Failed to start image capture: {}", e);
                return Err(Error::StartError(e));
            }
        }

        if let Some(fps) = timing::read_frame_rate(camera) {
            info!("Frame rate is {:.2} fps", fps);
        }

        self.state = SessionState::Capturing;

        Ok(())
    }

    /// Retrieve one frame, convert it and store it in the ring buffer at `index`.
    ///
    /// Blocks until the camera delivers. A failed retrieval is logged and counted and yields
    /// `Ok(None)`, the session keeps capturing. A buffer that cannot be converted is an error.
    pub fn capture_one(&mut self, index: u64) -> Result<Option<&Frame>> {
        self.require("capture a frame", &[SessionState::Capturing])?;

        let frame = match self.retrieve_frame() {
            Ok(f) => f,
            Err(Error::CaptureError(e)) => {
                self.record_drop(index, &e);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        self.ring.put(frame, index);

        Ok(self.ring.get(index))
    }

    /// Capture a frame and keep it as the reference for band detection.
    ///
    /// Returns whether a frame was captured, a dropped frame leaves the previous reference.
    pub fn capture_reference(&mut self, index: u64) -> Result<bool> {
        let frame = match self.capture_one(index)? {
            Some(f) => f.clone(),
            None => return Ok(false),
        };

        debug!("Reference frame captured at index {}", index);
        self.reference = Some(frame);

        Ok(true)
    }

    /// Use `frame` as the reference for band detection.
    pub fn set_reference(&mut self, frame: Frame) {
        self.reference = Some(frame);
    }

    /// Run band detection on the frame stored at `index` against the reference frame.
    pub fn detect(&mut self, index: u64) -> Result<Option<Band>> {
        let reference = match self.reference {
            Some(ref r) => r,
            None => {
                return Err(Error::InvalidStateError {
                    operation: "detect a band without a reference frame",
                    state: self.state,
                })
            }
        };

        let live = self.ring.get(index).ok_or_else(|| {
            Error::InvalidFrameError(format!("no frame stored for index {}", index))
        })?;

        self.detector.detect(reference, live)
    }

    /// Set the trigger delay, see [`TriggerTimingController::set_delay`].
    pub fn set_trigger_delay(&mut self, delay: Duration) -> Result<()> {
        self.require(
            "set the trigger delay",
            &[SessionState::Configured, SessionState::Capturing],
        )?;
        let camera = camera_mut(&mut self.camera, self.state)?;

        self.timing.set_delay(camera, delay);

        Ok(())
    }

    /// Advance the trigger delay by one step, see
    /// [`TriggerTimingController::increment_delay`].
    pub fn increment_trigger_delay(&mut self) -> Result<Duration> {
        self.require(
            "increment the trigger delay",
            &[SessionState::Configured, SessionState::Capturing],
        )?;
        let camera = camera_mut(&mut self.camera, self.state)?;

        Ok(self.timing.increment_delay(camera))
    }

    /// Ask for a frame rate and return the rate the camera settled on.
    pub fn set_frame_rate(&mut self, fps: f64) -> Result<Option<f64>> {
        self.require("set the frame rate", CONNECTED_STATES)?;
        let camera = camera_mut(&mut self.camera, self.state)?;

        Ok(timing::negotiate_frame_rate(camera, fps))
    }

    /// The camera's current frame rate, `None` if the camera cannot report it.
    pub fn frame_rate(&mut self) -> Result<Option<f64>> {
        self.require("read the frame rate", CONNECTED_STATES)?;
        let camera = camera_mut(&mut self.camera, self.state)?;

        Ok(timing::read_frame_rate(camera))
    }

    /// Retrieve `count` frames and save each one to `dir` as `<serial>-<n>.bmp`.
    ///
    /// Dropped frames are skipped, so fewer than `count` files may be written. Returns the paths
    /// of the saved files.
    pub fn record_images<S: FrameSink>(
        &mut self,
        count: usize,
        dir: &Path,
        sink: &mut S,
    ) -> Result<Vec<PathBuf>> {
        self.require("record images", &[SessionState::Capturing])?;
        let camera = camera_mut(&mut self.camera, self.state)?;

        let serial = camera
            .info()
            .map_err(|e| Error::DeviceError {
                context: "reading camera info",
                source: e,
            })?
            .serial_number;

        let mut saved = Vec::with_capacity(count);
        for n in 0..count {
            let frame = match self.retrieve_frame() {
                Ok(f) => f,
                Err(Error::CaptureError(e)) => {
                    self.record_drop(n as u64, &e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            let path = dir.join(format!("{}-{}.bmp", serial, n));
            sink.save(&frame, &path)?;
            saved.push(path);
        }

        info!("Finished grabbing images, {} of {} saved", saved.len(), count);

        Ok(saved)
    }

    /// Stop capturing and disconnect the camera.
    ///
    /// Both steps are always attempted. Failures are logged and the first one is returned, the
    /// session is `Stopped` either way.
    pub fn stop(&mut self) -> Result<()> {
        self.require("stop", CONNECTED_STATES)?;

        let res = match self.camera.take() {
            Some(mut camera) => teardown(&mut camera, self.state == SessionState::Capturing),
            None => Ok(()),
        };

        self.state = SessionState::Stopped;
        info!("Camera stopped and disconnected");

        res
    }

    /// Retrieve and convert one frame, a failed retrieval is an [`Error::CaptureError`].
    fn retrieve_frame(&mut self) -> Result<Frame> {
        let camera = camera_mut(&mut self.camera, self.state)?;

        self.stats.attempts += 1;
        let raw = camera.retrieve_buffer().map_err(|e| Error::CaptureError(e))?;
        let frame = codec::convert(&raw)?;

        self.stats.captured += 1;
        self.stats.consecutive_drops = 0;

        Ok(frame)
    }

    fn require(&self, operation: &'static str, allowed: &[SessionState]) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(Error::InvalidStateError {
                operation,
                state: self.state,
            })
        }
    }

    fn record_drop(&mut self, index: u64, e: &BusError) {
        if self.stats.attempts <= self.warmup_frames {
            debug!("Frame {} dropped during warm-up: {}", index, e);
            return;
        }

        self.stats.dropped += 1;
        self.stats.consecutive_drops += 1;
        warn!(
            "Error retrieving frame {} ({} in a row): {}",
            index, self.stats.consecutive_drops, e
        );
    }
}

impl<B: CameraBus> Drop for AcquisitionSession<B> {
    fn drop(&mut self) {
        if let Some(mut camera) = self.camera.take() {
            debug!("Session dropped while {}, releasing camera", self.state);
            // Errors are already logged by teardown
            let _ = teardown(&mut camera, self.state == SessionState::Capturing);
        }
    }
}

// -----------------------------------------------------------------------------------------------
// PRIVATE
// -----------------------------------------------------------------------------------------------

/// States in which the session holds a camera.
const CONNECTED_STATES: &[SessionState] = &[
    SessionState::Connected,
    SessionState::Configured,
    SessionState::Capturing,
];

fn camera_mut<D>(camera: &mut Option<D>, state: SessionState) -> Result<&mut D> {
    camera.as_mut().ok_or(Error::InvalidStateError {
        operation: "use the camera",
        state,
    })
}

fn rejected(step: String, e: BusError) -> Error {
    error!("Configuration failed while {}: {}", step, e);
    Error::ConfigurationError(format!("{}: {}", step, e))
}

fn set_manual<D: CameraDevice + ?Sized>(camera: &mut D, kind: PropertyKind, value: f64) -> Result<()> {
    camera
        .set_property(&Property::manual(kind, value))
        .map_err(|e| rejected(format!("setting {} to {}", kind, value), e))
}

/// Best effort stop and disconnect, returns the first failure.
fn teardown<D: CameraDevice + ?Sized>(camera: &mut D, capturing: bool) -> Result<()> {
    let mut first = None;

    if capturing {
        if let Err(e) = camera.stop_capture() {
            error!("Failed to stop capture: {}", e);
            first = Some(Error::DeviceError {
                context: "stopping capture",
                source: e,
            });
        }
    }

    if let Err(e) = camera.disconnect() {
        error!("Failed to disconnect the camera: {}", e);
        if first.is_none() {
            first = Some(Error::DeviceError {
                context: "disconnecting",
                source: e,
            });
        }
    }

    match first {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
