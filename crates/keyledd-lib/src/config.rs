//! Daemon configuration: TOML file plus an optional command-line binding.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::binding::{BindingDecl, default_brightness_on};
use crate::error::{KeyleddError, Result};

/// System-wide config location, used when no per-user file exists.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/keyledd/config.toml";

/// Name given to the binding declared with command-line options.
pub const COMMAND_LINE_BINDING: &str = "command-line";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Write the daemon's PID here while it runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid_file: Option<PathBuf>,

    /// `[[binding]]` tables, in declaration order.
    #[serde(default, rename = "binding")]
    pub bindings: Vec<BindingDecl>,
}

impl Config {
    /// Per-user config directory.
    pub fn dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("keyledd"))
    }

    /// Per-user config file.
    pub fn user_path() -> Option<PathBuf> {
        Self::dir().map(|d| d.join("config.toml"))
    }

    /// Default locations, most specific first.
    pub fn search_paths() -> Vec<PathBuf> {
        Self::user_path()
            .into_iter()
            .chain(std::iter::once(PathBuf::from(SYSTEM_CONFIG_PATH)))
            .collect()
    }

    /// First default location that exists.
    pub fn find() -> Option<PathBuf> {
        Self::search_paths().into_iter().find(|p| p.is_file())
    }

    pub fn parse(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| KeyleddError::Config(e.to_string()))
    }

    /// Load from `path`. A missing or malformed file is an error.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| KeyleddError::Config(format!("cannot read {}: {e}", path.display())))?;
        toml::from_str(&contents)
            .map_err(|e| KeyleddError::Config(format!("{}: {e}", path.display())))
    }

    /// Load from `explicit` if given, otherwise from the first default
    /// location that exists. With no file at all, returns an empty config.
    ///
    /// Also returns the path actually loaded.
    pub fn load(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        let path = match explicit {
            Some(p) => Some(p.to_path_buf()),
            None => Self::find(),
        };
        match path {
            Some(p) => {
                let config = Self::load_from(&p)?;
                log::debug!("[config] loaded {}", p.display());
                Ok((config, Some(p)))
            }
            None => {
                log::debug!("[config] no config file found");
                Ok((Self::default(), None))
            }
        }
    }
}

/// A single binding given with command-line options.
#[derive(Debug, Clone, Default)]
pub struct CommandLineBinding {
    pub input_device: Option<PathBuf>,
    pub led_device: Option<PathBuf>,
    pub keyboard_led: Option<String>,
    pub brightness_on: Option<u32>,
    pub brightness_off: Option<u32>,
}

impl CommandLineBinding {
    fn is_empty(&self) -> bool {
        self.input_device.is_none()
            && self.led_device.is_none()
            && self.keyboard_led.is_none()
            && self.brightness_on.is_none()
            && self.brightness_off.is_none()
    }

    /// Turn the options into a declaration. `Ok(None)` if none were given;
    /// a `Config` error naming the first missing option if only some were.
    pub fn into_decl(self) -> Result<Option<BindingDecl>> {
        if self.is_empty() {
            return Ok(None);
        }
        let missing = |flag: &str| {
            KeyleddError::Config(format!(
                "{flag} is required when declaring a binding on the command line"
            ))
        };
        let input_device = self.input_device.ok_or_else(|| missing("--input-device"))?;
        let led_device = self.led_device.ok_or_else(|| missing("--led-device"))?;
        let keyboard_led = self.keyboard_led.ok_or_else(|| missing("--keyboard-led"))?;
        Ok(Some(BindingDecl {
            name: COMMAND_LINE_BINDING.into(),
            keyboard_led,
            input_device,
            led_device,
            brightness_on: self.brightness_on.unwrap_or_else(default_brightness_on),
            brightness_off: self.brightness_off.unwrap_or(0),
        }))
    }
}
