//! Unified error type for the keyledd-lib crate.
//!
//! [`KeyleddError`] wraps the module-specific errors (`BindingError`,
//! `DeviceError`) plus config and plain I/O failures. `From` impls allow `?`
//! to propagate across module boundaries.

use std::fmt;

use crate::device::DeviceError;
use crate::registry::BindingError;

/// Unified error type for keyledd-lib operations.
#[derive(Debug)]
pub enum KeyleddError {
    /// Invalid or conflicting binding declarations.
    Binding(BindingError),
    /// Device open, read, or write failure.
    Device(DeviceError),
    /// Configuration file or command-line problem.
    Config(String),
    /// Standard I/O error (wake channel, PID file).
    Io(std::io::Error),
}

impl fmt::Display for KeyleddError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyleddError::Binding(e) => write!(f, "{e}"),
            KeyleddError::Device(e) => write!(f, "{e}"),
            KeyleddError::Config(e) => write!(f, "Config error: {e}"),
            KeyleddError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for KeyleddError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            KeyleddError::Binding(e) => Some(e),
            KeyleddError::Device(e) => Some(e),
            KeyleddError::Io(e) => Some(e),
            KeyleddError::Config(_) => None,
        }
    }
}

impl From<BindingError> for KeyleddError {
    fn from(e: BindingError) -> Self {
        KeyleddError::Binding(e)
    }
}

impl From<DeviceError> for KeyleddError {
    fn from(e: DeviceError) -> Self {
        KeyleddError::Device(e)
    }
}

impl From<std::io::Error> for KeyleddError {
    fn from(e: std::io::Error) -> Self {
        KeyleddError::Io(e)
    }
}

/// Crate-level Result alias using [`KeyleddError`].
pub type Result<T> = std::result::Result<T, KeyleddError>;
