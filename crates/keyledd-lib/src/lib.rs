//! keyledd: mirror keyboard lock indicators onto arbitrary LED class devices.

pub mod binding;
pub mod config;
pub mod device;
pub mod error;
pub mod indicator;
#[cfg(all(target_os = "linux", feature = "logind"))]
pub mod logind;
#[cfg(target_os = "linux")]
pub mod multiplexer;
pub mod pidfile;
pub mod registry;
pub mod sync;
pub mod table;
#[cfg(unix)]
pub mod wake;

pub use error::KeyleddError;
