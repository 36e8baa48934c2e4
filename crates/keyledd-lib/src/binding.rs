//! Binding declarations, pre-rendered payloads, and resolved bindings.

use std::path::PathBuf;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::indicator::Indicator;

/// One raw binding record, as declared in the config file or on the command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BindingDecl {
    /// Diagnostic label used in error messages.
    pub name: String,

    /// Indicator to mirror: "caps_lock", "scroll_lock", "num_lock" (or "number_lock").
    pub keyboard_led: String,

    /// Evdev input device to watch, e.g. "/dev/input/event0".
    pub input_device: PathBuf,

    /// LED class device directory, e.g. "/sys/class/leds/input0::kana".
    pub led_device: PathBuf,

    /// Brightness written when the indicator is on. Default: 1.
    #[serde(default = "default_brightness_on")]
    pub brightness_on: u32,

    /// Brightness written when the indicator is off. Default: 0.
    #[serde(default)]
    pub brightness_off: u32,
}

pub fn default_brightness_on() -> u32 {
    1
}

impl BindingDecl {
    /// Declaration with default brightness values.
    pub fn new(
        name: impl Into<String>,
        keyboard_led: impl Into<String>,
        input_device: impl Into<PathBuf>,
        led_device: impl Into<PathBuf>,
    ) -> Self {
        BindingDecl {
            name: name.into(),
            keyboard_led: keyboard_led.into(),
            input_device: input_device.into(),
            led_device: led_device.into(),
            brightness_on: default_brightness_on(),
            brightness_off: 0,
        }
    }

    pub fn with_brightness(mut self, on: u32, off: u32) -> Self {
        self.brightness_on = on;
        self.brightness_off = off;
        self
    }
}

/// A brightness value rendered once into the bytes written to sysfs.
#[derive(Debug, PartialEq, Eq)]
pub struct Payload {
    value: u32,
    bytes: Box<[u8]>,
}

impl Payload {
    pub fn render(value: u32) -> Self {
        Payload {
            value,
            bytes: format!("{value}\n").into_bytes().into_boxed_slice(),
        }
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Index of an opened input device in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InputId(pub usize);

/// Index of an opened output device in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutputId(pub usize);

/// A resolved binding: one indicator on one input device mirrored to one output.
///
/// Devices are referenced by registry index; payloads are shared with every
/// other binding using the same brightness value.
#[derive(Debug, Clone)]
pub struct Binding {
    pub name: String,
    pub indicator: Indicator,
    pub input: InputId,
    pub output: OutputId,
    pub on_payload: Rc<Payload>,
    pub off_payload: Rc<Payload>,
}

impl Binding {
    /// Payload for a reported indicator value. Only `1` means on.
    pub fn payload_for(&self, value: i32) -> &Payload {
        if value == 1 {
            &self.on_payload
        } else {
            &self.off_payload
        }
    }
}
