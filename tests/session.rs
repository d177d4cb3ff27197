//! # Acquisition session tests
//!
//! Drives sessions against the scripted camera in `common`.

mod common;

use std::path::{Path, PathBuf};
use std::time::Duration;

use common::{mono_black, mono_stripe, Delivery, MockBus, StartFailure};
use scanline_camstream::prelude::*;
use scanline_camstream::{
    Band, Error, PixelFormat, PropertyKind, RawFrame, DELAY_STEP,
};

// -----------------------------------------------------------------------------------------------
// HELPERS
// -----------------------------------------------------------------------------------------------

fn capturing_session(bus: &MockBus) -> AcquisitionSession<MockBus> {
    let mut session = SessionBuilder::new().build(bus.clone()).unwrap();

    session.connect().unwrap();
    session.configure().unwrap();
    session.start().unwrap();

    session
}

/// Collects saved frames instead of writing files.
#[derive(Default)]
struct MemorySink {
    saved: Vec<(PathBuf, Frame)>,
}

impl FrameSink for MemorySink {
    fn save(&mut self, frame: &Frame, path: &Path) -> scanline_camstream::Result<()> {
        self.saved.push((path.to_path_buf(), frame.clone()));
        Ok(())
    }
}

// -----------------------------------------------------------------------------------------------
// LIFECYCLE
// -----------------------------------------------------------------------------------------------

#[test]
fn test_full_lifecycle() {
    let bus = MockBus::new();
    let mut session = SessionBuilder::new().build(bus.clone()).unwrap();
    assert_eq!(session.state(), SessionState::Disconnected);

    session.connect().unwrap();
    assert_eq!(session.state(), SessionState::Connected);

    session.configure().unwrap();
    assert_eq!(session.state(), SessionState::Configured);

    session.start().unwrap();
    assert_eq!(session.state(), SessionState::Capturing);

    bus.deliver(Delivery::Frame(mono_black()));
    assert!(session.capture_one(0).unwrap().is_some());

    session.stop().unwrap();
    assert_eq!(session.state(), SessionState::Stopped);

    let calls = bus.calls();
    assert_eq!(&calls[calls.len() - 2..], &["stop_capture", "disconnect"]);
}

#[test]
fn test_configure_applies_profile_in_order() {
    let bus = MockBus::new();
    bus.state.borrow_mut().trigger_delay_present = true;

    let mut session = SessionBuilder::new().build(bus.clone()).unwrap();
    session.connect().unwrap();
    bus.clear_calls();

    session.configure().unwrap();

    let calls = bus.calls();
    let expected = [
        "format_info 2",
        "validate_format",
        "apply_format",
        "set_property shutter 0.009",
        "set_trigger_mode",
        "property_info trigger delay",
        "property trigger delay",
        "set_property trigger delay 0",
        "set_property brightness 0",
        "set_property auto exposure -2",
    ];
    assert_eq!(calls, expected);

    let state = bus.state.borrow();
    let format = state.format.as_ref().unwrap();
    assert_eq!((format.width, format.height), (common::COLS as u32, common::ROWS as u32));
    assert!(state.trigger.unwrap().enabled);
}

#[test]
fn test_configure_before_connect_makes_no_calls() {
    let bus = MockBus::new();
    let mut session = SessionBuilder::new().build(bus.clone()).unwrap();

    let res = session.configure();
    assert!(matches!(
        res,
        Err(Error::InvalidStateError {
            state: SessionState::Disconnected,
            ..
        })
    ));
    assert!(bus.calls().is_empty());
}

#[test]
fn test_start_twice_is_an_error() {
    let bus = MockBus::new();
    let mut session = capturing_session(&bus);

    assert!(matches!(session.start(), Err(Error::InvalidStateError { .. })));
    assert_eq!(session.state(), SessionState::Capturing);
}

#[test]
fn test_no_camera() {
    let mut bus = MockBus::new();
    bus.devices = 0;
    let mut session = SessionBuilder::new().build(bus).unwrap();

    assert!(matches!(session.connect(), Err(Error::NoDeviceError)));
    assert_eq!(session.state(), SessionState::Disconnected);
}

#[test]
fn test_first_of_several_cameras_is_used() {
    let mut bus = MockBus::new();
    bus.devices = 3;
    let mut session = SessionBuilder::new().build(bus.clone()).unwrap();

    session.connect().unwrap();
    assert_eq!(bus.calls(), vec!["discover", "connect cam0"]);
}

// -----------------------------------------------------------------------------------------------
// FAILURES
// -----------------------------------------------------------------------------------------------

#[test]
fn test_partial_configuration_stays_connected() {
    let bus = MockBus::new();
    bus.state.borrow_mut().reject = Some(PropertyKind::Brightness);

    let mut session = SessionBuilder::new().build(bus.clone()).unwrap();
    session.connect().unwrap();

    assert!(matches!(session.configure(), Err(Error::ConfigurationError(_))));
    assert_eq!(session.state(), SessionState::Connected);

    // Settings before the rejected one stay applied, the ones after were never sent
    assert!(bus.property(PropertyKind::Shutter).is_some());
    assert!(bus.property(PropertyKind::AutoExposure).is_none());

    assert!(matches!(session.start(), Err(Error::InvalidStateError { .. })));
}

#[test]
fn test_unsupported_pixel_format() {
    let bus = MockBus::new();
    bus.state.borrow_mut().pixel_formats = vec![PixelFormat::Mono8];

    let mut session = SessionBuilder::new().build(bus.clone()).unwrap();
    session.connect().unwrap();

    assert!(matches!(session.configure(), Err(Error::ConfigurationError(_))));
    assert!(!bus.calls().contains(&String::from("apply_format")));
}

#[test]
fn test_start_failures_are_distinguished() {
    for &(failure, bandwidth) in &[(StartFailure::Bandwidth, true), (StartFailure::Other, false)] {
        let bus = MockBus::new();
        bus.state.borrow_mut().start_failure = Some(failure);

        let mut session = SessionBuilder::new().build(bus.clone()).unwrap();
        session.connect().unwrap();
        session.configure().unwrap();

        match session.start() {
            Err(Error::BandwidthError) => assert!(bandwidth),
            Err(Error::StartError(_)) => assert!(!bandwidth),
            other => panic!("unexpected start result {:?}", other),
        }
        assert_eq!(session.state(), SessionState::Configured);
    }
}

#[test]
fn test_capture_error_is_skipped() {
    let bus = MockBus::new();
    let mut session = capturing_session(&bus);

    bus.deliver(Delivery::Timeout);
    bus.deliver(Delivery::Frame(mono_black()));

    assert!(session.capture_one(0).unwrap().is_none());
    assert_eq!(session.state(), SessionState::Capturing);

    assert!(session.capture_one(1).unwrap().is_some());

    let stats = session.stats();
    assert_eq!((stats.captured, stats.dropped, stats.attempts), (1, 1, 2));
    assert_eq!(stats.consecutive_drops, 0);
}

#[test]
fn test_warmup_drops_are_not_counted() {
    let bus = MockBus::new();
    let mut session = SessionBuilder::new().warmup_frames(2).build(bus.clone()).unwrap();
    session.connect().unwrap();
    session.configure().unwrap();
    session.start().unwrap();

    for i in 0..3 {
        assert!(session.capture_one(i).unwrap().is_none());
    }

    let stats = session.stats();
    assert_eq!(stats.dropped, 1);
    assert_eq!(stats.consecutive_drops, 1);
}

#[test]
fn test_corrupt_buffer_is_a_conversion_error() {
    let bus = MockBus::new();
    let mut session = capturing_session(&bus);

    bus.deliver(Delivery::Frame(RawFrame::new(3, 4, PixelFormat::Mono8, vec![0; 13])));

    assert!(matches!(session.capture_one(0), Err(Error::ConversionError(_))));
    assert!(session.ring().get(0).is_none());
}

#[test]
fn test_stop_is_best_effort() {
    let bus = MockBus::new();
    bus.state.borrow_mut().stop_fails = true;
    let mut session = capturing_session(&bus);

    let res = session.stop();
    assert!(matches!(
        res,
        Err(Error::DeviceError {
            context: "stopping capture",
            ..
        })
    ));
    assert_eq!(session.state(), SessionState::Stopped);

    let calls = bus.calls();
    assert_eq!(calls.last().map(String::as_str), Some("disconnect"));

    // A stopped session can be brought up again
    bus.state.borrow_mut().stop_fails = false;
    session.connect().unwrap();
    assert_eq!(session.state(), SessionState::Connected);
}

#[test]
fn test_drop_releases_camera() {
    let bus = MockBus::new();
    {
        let _session = capturing_session(&bus);
        bus.clear_calls();
    }

    assert_eq!(bus.calls(), vec!["stop_capture", "disconnect"]);
}

// -----------------------------------------------------------------------------------------------
// TIMING
// -----------------------------------------------------------------------------------------------

#[test]
fn test_trigger_sweep_is_applied() {
    let bus = MockBus::new();
    bus.state.borrow_mut().trigger_delay_present = true;
    let mut session = capturing_session(&bus);

    assert!(session.timing().supports_delay());
    assert_eq!(session.increment_trigger_delay().unwrap(), DELAY_STEP);

    let prop = bus.property(PropertyKind::TriggerDelay).unwrap();
    assert_eq!(prop.value, DELAY_STEP.as_secs_f64());
    assert!(prop.on && !prop.auto);

    // Sweep wraps after 55 steps from zero
    for _ in 1..54 {
        session.increment_trigger_delay().unwrap();
    }
    assert_eq!(session.timing().delay(), DELAY_STEP * 54);
    assert_eq!(session.increment_trigger_delay().unwrap(), Duration::from_secs(0));
}

#[test]
fn test_trigger_delay_without_support_is_local() {
    let bus = MockBus::new();
    let mut session = capturing_session(&bus);
    bus.clear_calls();

    session.set_trigger_delay(Duration::from_micros(4_000)).unwrap();

    assert_eq!(session.timing().delay(), Duration::from_micros(4_000));
    assert!(bus.calls().is_empty());
    assert!(bus.property(PropertyKind::TriggerDelay).is_none());
}

#[test]
fn test_trigger_delay_needs_configuration() {
    let bus = MockBus::new();
    let mut session = SessionBuilder::new().build(bus).unwrap();
    session.connect().unwrap();

    assert!(matches!(
        session.increment_trigger_delay(),
        Err(Error::InvalidStateError { .. })
    ));
}

#[test]
fn test_frame_rate_negotiation() {
    let bus = MockBus::new();
    let mut session = SessionBuilder::new().build(bus.clone()).unwrap();
    session.connect().unwrap();

    assert_eq!(session.frame_rate().unwrap(), Some(15.0));
    assert_eq!(session.set_frame_rate(30.0).unwrap(), Some(30.0));

    bus.state.borrow_mut().frame_rate_present = false;
    assert_eq!(session.frame_rate().unwrap(), None);
}

// -----------------------------------------------------------------------------------------------
// PIPELINE
// -----------------------------------------------------------------------------------------------

#[test]
fn test_reference_and_detection() {
    let bus = MockBus::new();
    let mut session = capturing_session(&bus);

    bus.deliver(Delivery::Frame(mono_black()));
    bus.deliver(Delivery::Frame(mono_stripe(40..=60, 255)));
    bus.deliver(Delivery::Frame(mono_stripe(30..=50, 255)));
    bus.deliver(Delivery::Frame(mono_black()));

    assert!(session.capture_reference(0).unwrap());

    session.capture_one(1).unwrap();
    assert_eq!(session.detect(1).unwrap(), Some(Band { top: 40, bottom: 60 }));

    session.capture_one(2).unwrap();
    assert_eq!(session.detect(2).unwrap(), Some(Band { top: 30, bottom: 50 }));

    session.capture_one(3).unwrap();
    assert_eq!(session.detect(3).unwrap(), None);

    assert_eq!(session.detector().envelope(), Some(Band { top: 30, bottom: 60 }));
}

#[test]
fn test_detect_needs_reference_and_frame() {
    let bus = MockBus::new();
    let mut session = capturing_session(&bus);

    assert!(matches!(session.detect(0), Err(Error::InvalidStateError { .. })));

    session.set_reference(Frame::new(common::ROWS, common::COLS));
    assert!(matches!(session.detect(0), Err(Error::InvalidFrameError(_))));
}

#[test]
fn test_ring_slots_alias() {
    let bus = MockBus::new();
    let mut session = SessionBuilder::new().ring_capacity(2).build(bus.clone()).unwrap();
    session.connect().unwrap();
    session.configure().unwrap();
    session.start().unwrap();

    bus.deliver(Delivery::Frame(mono_black()));
    bus.deliver(Delivery::Frame(mono_stripe(10..=20, 200)));
    bus.deliver(Delivery::Frame(mono_stripe(70..=80, 100)));
    for i in 0..3 {
        session.capture_one(i).unwrap();
    }

    // Index 0 was overwritten by index 2
    assert_eq!(session.ring().get(0).unwrap().pixel(75, 0), [100, 100, 100]);
    assert_eq!(session.ring().get(1).unwrap().pixel(15, 0), [200, 200, 200]);
}

#[test]
fn test_record_images_skips_drops() {
    let bus = MockBus::new();
    let mut session = capturing_session(&bus);

    bus.deliver(Delivery::Frame(mono_black()));
    bus.deliver(Delivery::Timeout);
    bus.deliver(Delivery::Frame(mono_stripe(0..=3, 50)));

    let mut sink = MemorySink::default();
    let saved = session.record_images(3, Path::new("Results"), &mut sink).unwrap();

    assert_eq!(
        saved,
        vec![PathBuf::from("Results/SN123-0.bmp"), PathBuf::from("Results/SN123-2.bmp")]
    );
    assert_eq!(sink.saved.len(), 2);
    assert_eq!(sink.saved[1].1.pixel(2, 5), [50, 50, 50]);
    assert_eq!(session.stats().dropped, 1);
}
