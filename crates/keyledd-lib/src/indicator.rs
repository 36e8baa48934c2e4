//! Keyboard lock indicators and their kernel LED codes.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// `EV_LED` event type from `linux/input-event-codes.h`.
pub const EV_LED: u16 = 0x11;

pub const LED_NUML: u16 = 0x00;
pub const LED_CAPSL: u16 = 0x01;
pub const LED_SCROLLL: u16 = 0x02;

/// One of the three keyboard lock indicators that can be mirrored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Indicator {
    CapsLock,
    ScrollLock,
    NumLock,
}

impl Indicator {
    pub const ALL: [Indicator; 3] = [Indicator::CapsLock, Indicator::ScrollLock, Indicator::NumLock];

    /// Kernel LED code (`LED_*`) for this indicator.
    pub fn code(self) -> u16 {
        match self {
            Indicator::CapsLock => LED_CAPSL,
            Indicator::ScrollLock => LED_SCROLLL,
            Indicator::NumLock => LED_NUML,
        }
    }

    /// Map a kernel LED code back to an indicator. Codes for LEDs we don't
    /// mirror (compose, kana, ...) return `None`.
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            LED_CAPSL => Some(Indicator::CapsLock),
            LED_SCROLLL => Some(Indicator::ScrollLock),
            LED_NUML => Some(Indicator::NumLock),
            _ => None,
        }
    }

    /// Canonical config spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            Indicator::CapsLock => "caps_lock",
            Indicator::ScrollLock => "scroll_lock",
            Indicator::NumLock => "num_lock",
        }
    }
}

impl fmt::Display for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string names no known indicator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownIndicator(pub String);

impl fmt::Display for UnknownIndicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown keyboard LED \"{}\" (expected caps_lock, scroll_lock or num_lock)",
            self.0
        )
    }
}

impl std::error::Error for UnknownIndicator {}

impl FromStr for Indicator {
    type Err = UnknownIndicator;

    /// Case-insensitive; `number_lock` is accepted as an alias of `num_lock`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("caps_lock") {
            Ok(Indicator::CapsLock)
        } else if s.eq_ignore_ascii_case("scroll_lock") {
            Ok(Indicator::ScrollLock)
        } else if s.eq_ignore_ascii_case("num_lock") || s.eq_ignore_ascii_case("number_lock") {
            Ok(Indicator::NumLock)
        } else {
            Err(UnknownIndicator(s.to_string()))
        }
    }
}
