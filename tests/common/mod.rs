//! # Scripted camera bus
//!
//! An in-memory camera whose behaviour is set up by each test, and which records every call
//! made to it.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use scanline_camstream::{
    BusError, CameraBus, CameraDevice, CameraInfo, DeviceId, FormatInfo, FormatSettings,
    PixelFormat, Property, PropertyInfo, PropertyKind, RawFrame, TriggerMode,
};

pub const ROWS: usize = 100;
pub const COLS: usize = 80;

/// How `start_capture` should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartFailure {
    Bandwidth,
    Other,
}

/// What a scripted frame retrieval returns.
pub enum Delivery {
    Frame(RawFrame),
    Timeout,
}

#[derive(Default)]
pub struct MockState {
    /// Every call made to the bus or camera, in order
    pub calls: Vec<String>,

    /// Current property values
    pub properties: HashMap<PropertyKind, Property>,

    pub pixel_formats: Vec<PixelFormat>,
    pub trigger_delay_present: bool,
    pub frame_rate_present: bool,
    pub reject: Option<PropertyKind>,
    pub trigger: Option<TriggerMode>,
    pub format: Option<FormatSettings>,

    pub start_failure: Option<StartFailure>,
    pub stop_fails: bool,
    pub disconnect_fails: bool,

    /// Retrievals to play back, an empty queue times out
    pub deliveries: VecDeque<Delivery>,
}

#[derive(Clone)]
pub struct MockBus {
    pub state: Rc<RefCell<MockState>>,
    pub devices: usize,
}

pub struct MockCamera {
    state: Rc<RefCell<MockState>>,
}

impl MockBus {
    /// A bus with one camera that can deliver RAW8 and MONO8 frames.
    pub fn new() -> Self {
        let state = MockState {
            pixel_formats: vec![
                PixelFormat::Raw8(scanline_camstream::BayerPattern::Rggb),
                PixelFormat::Mono8,
            ],
            frame_rate_present: true,
            ..MockState::default()
        };

        Self {
            state: Rc::new(RefCell::new(state)),
            devices: 1,
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.borrow().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    pub fn deliver(&self, delivery: Delivery) {
        self.state.borrow_mut().deliveries.push_back(delivery);
    }

    pub fn property(&self, kind: PropertyKind) -> Option<Property> {
        self.state.borrow().properties.get(&kind).copied()
    }
}

impl CameraBus for MockBus {
    type Device = MockCamera;

    fn discover(&mut self) -> Result<Vec<DeviceId>, BusError> {
        self.state.borrow_mut().calls.push(String::from("discover"));

        Ok((0..self.devices).map(|i| DeviceId(format!("cam{}", i))).collect())
    }

    fn connect(&mut self, id: &DeviceId) -> Result<Self::Device, BusError> {
        self.state.borrow_mut().calls.push(format!("connect {}", id));

        Ok(MockCamera {
            state: Rc::clone(&self.state),
        })
    }
}

impl MockCamera {
    fn record(&self, call: String) {
        self.state.borrow_mut().calls.push(call);
    }
}

impl CameraDevice for MockCamera {
    fn info(&mut self) -> Result<CameraInfo, BusError> {
        self.record(String::from("info"));

        Ok(CameraInfo {
            serial_number: String::from("SN123"),
            model: String::from("Mock"),
        })
    }

    fn format_info(&mut self, mode: u32) -> Result<FormatInfo, BusError> {
        self.record(format!("format_info {}", mode));

        Ok(FormatInfo {
            max_width: COLS as u32,
            max_height: ROWS as u32,
            pixel_formats: self.state.borrow().pixel_formats.clone(),
        })
    }

    fn validate_format(&mut self, settings: &FormatSettings) -> Result<bool, BusError> {
        self.record(String::from("validate_format"));

        Ok(settings.width as usize <= COLS && settings.height as usize <= ROWS)
    }

    fn apply_format(&mut self, settings: &FormatSettings) -> Result<(), BusError> {
        self.record(String::from("apply_format"));
        self.state.borrow_mut().format = Some(settings.clone());

        Ok(())
    }

    fn property_info(&mut self, kind: PropertyKind) -> Result<PropertyInfo, BusError> {
        self.record(format!("property_info {}", kind));
        let state = self.state.borrow();

        let present = match kind {
            PropertyKind::TriggerDelay => state.trigger_delay_present,
            PropertyKind::FrameRate => state.frame_rate_present,
            _ => true,
        };

        Ok(PropertyInfo {
            present,
            min: 0.0,
            max: 100.0,
        })
    }

    fn property(&mut self, kind: PropertyKind) -> Result<Property, BusError> {
        self.record(format!("property {}", kind));

        Ok(self
            .state
            .borrow()
            .properties
            .get(&kind)
            .copied()
            .unwrap_or(Property {
                kind,
                on: false,
                auto: true,
                value: if kind == PropertyKind::FrameRate { 15.0 } else { 0.0 },
            }))
    }

    fn set_property(&mut self, property: &Property) -> Result<(), BusError> {
        self.record(format!("set_property {} {}", property.kind, property.value));
        let mut state = self.state.borrow_mut();

        if state.reject == Some(property.kind) {
            return Err(BusError::Rejected(property.kind.to_string()));
        }
        state.properties.insert(property.kind, *property);

        Ok(())
    }

    fn set_trigger_mode(&mut self, trigger: &TriggerMode) -> Result<(), BusError> {
        self.record(String::from("set_trigger_mode"));
        self.state.borrow_mut().trigger = Some(*trigger);

        Ok(())
    }

    fn start_capture(&mut self) -> Result<(), BusError> {
        self.record(String::from("start_capture"));

        match self.state.borrow().start_failure {
            Some(StartFailure::Bandwidth) => Err(BusError::BandwidthExceeded),
            Some(StartFailure::Other) => Err(BusError::Rejected(String::from("busy"))),
            None => Ok(()),
        }
    }

    fn stop_capture(&mut self) -> Result<(), BusError> {
        self.record(String::from("stop_capture"));

        if self.state.borrow().stop_fails {
            Err(BusError::Rejected(String::from("stop")))
        } else {
            Ok(())
        }
    }

    fn retrieve_buffer(&mut self) -> Result<RawFrame, BusError> {
        self.record(String::from("retrieve_buffer"));

        match self.state.borrow_mut().deliveries.pop_front() {
            Some(Delivery::Frame(raw)) => Ok(raw),
            Some(Delivery::Timeout) | None => Err(BusError::Timeout),
        }
    }

    fn disconnect(&mut self) -> Result<(), BusError> {
        self.record(String::from("disconnect"));

        if self.state.borrow().disconnect_fails {
            Err(BusError::Rejected(String::from("disconnect")))
        } else {
            Ok(())
        }
    }
}

/// A mono frame that is black except for rows in `lit`, which have value `level`.
pub fn mono_stripe(lit: std::ops::RangeInclusive<usize>, level: u8) -> RawFrame {
    let mut data = vec![0; ROWS * COLS];
    for r in lit {
        for c in 0..COLS {
            data[r * COLS + c] = level;
        }
    }

    RawFrame::new(ROWS, COLS, PixelFormat::Mono8, data)
}

/// An all black mono frame.
pub fn mono_black() -> RawFrame {
    RawFrame::new(ROWS, COLS, PixelFormat::Mono8, vec![0; ROWS * COLS])
}
