//! CLI subcommands: run the daemon, validate bindings.

mod check;
mod run;

use std::path::PathBuf;

use clap::{Args, Subcommand};
use serde::Serialize;

pub(super) use keyledd_lib::binding::BindingDecl;
pub(super) use keyledd_lib::config::{CommandLineBinding, Config};
pub(super) use keyledd_lib::error::Result;
pub(super) use keyledd_lib::indicator::Indicator;
pub(super) use keyledd_lib::registry;

const PADDING: usize = 2;

/// Compute alignment width for a command's key-value output.
/// Ensures at least PADDING spaces after the longest key in either level,
/// with top-level and indent values aligned to the same column.
pub(super) fn kv_width(top: &[&str], indent: &[&str]) -> usize {
    let top_max = top.iter().map(|k| k.len()).max().unwrap_or(0);
    let indent_max = indent.iter().map(|k| k.len()).max().unwrap_or(0);
    let top_need = if top.is_empty() { 0 } else { top_max + PADDING };
    // Indent keys lose 2 chars of inner width to the "  " prefix
    let indent_need = if indent.is_empty() {
        0
    } else {
        indent_max + PADDING + 2
    };
    top_need.max(indent_need)
}

pub(super) fn format_kv(key: &str, value: impl std::fmt::Display, w: usize) -> String {
    format!("{key:<width$}{value}", width = w)
}

pub(super) fn kv(key: &str, value: impl std::fmt::Display, w: usize) {
    println!("{}", format_kv(key, value, w));
}

pub(super) fn kv_indent(key: &str, value: impl std::fmt::Display, w: usize) {
    println!("  {}", format_kv(key, value, w - 2));
}

// ── JSON output structs ──

#[derive(Serialize)]
pub(super) struct CheckOutput {
    pub config_file: Option<String>,
    pub inputs: Vec<String>,
    pub payloads: usize,
    pub bindings: Vec<BindingJson>,
}

#[derive(Serialize)]
pub(super) struct BindingJson {
    pub name: String,
    pub keyboard_led: Indicator,
    pub input_device: String,
    pub led_device: String,
    pub brightness_on: u32,
    pub brightness_off: u32,
}

// ── Arguments ──

/// A single binding declared on the command line.
#[derive(Args, Debug, Default)]
pub struct BindingArgs {
    /// Evdev device to monitor
    #[arg(short, long, global = true, value_name = "/dev/input/eventX")]
    input_device: Option<PathBuf>,

    /// LED device to bind to
    #[arg(short = 'o', long, global = true, value_name = "/sys/class/leds/some_led")]
    led_device: Option<PathBuf>,

    /// Keyboard LED to mirror
    #[arg(short = 'l', long, global = true, value_name = "(caps|scroll|num[ber])_lock")]
    keyboard_led: Option<String>,

    /// Brightness value when the LED is on (default: 1)
    #[arg(long, global = true, value_name = "BRIGHTNESS")]
    brightness_on: Option<u32>,

    /// Brightness value when the LED is off (default: 0)
    #[arg(long, global = true, value_name = "BRIGHTNESS")]
    brightness_off: Option<u32>,
}

impl From<BindingArgs> for CommandLineBinding {
    fn from(a: BindingArgs) -> Self {
        CommandLineBinding {
            input_device: a.input_device,
            led_device: a.led_device,
            keyboard_led: a.keyboard_led,
            brightness_on: a.brightness_on,
            brightness_off: a.brightness_off,
        }
    }
}

/// Options shared by every subcommand.
pub struct Options {
    pub config: Option<PathBuf>,
    pub pid_file: Option<PathBuf>,
    pub binding: CommandLineBinding,
}

#[derive(Subcommand, Default)]
pub enum Command {
    /// Mirror indicators until interrupted (default)
    #[default]
    Run,

    /// Validate bindings and show the resolved topology without opening devices
    Check {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Binding declarations gathered from the config file and command line.
pub(super) struct Declarations {
    pub config: Config,
    pub source: Option<PathBuf>,
    pub bindings: Vec<BindingDecl>,
}

/// Load the config file and append the command-line binding, if any.
pub(super) fn load_declarations(opts: Options) -> Result<(Declarations, Option<PathBuf>)> {
    let (config, source) = Config::load(opts.config.as_deref())?;
    let mut bindings = config.bindings.clone();
    if let Some(decl) = opts.binding.into_decl()? {
        bindings.push(decl);
    }
    let pid_file = opts.pid_file.or_else(|| config.pid_file.clone());
    Ok((
        Declarations {
            config,
            source,
            bindings,
        },
        pid_file,
    ))
}

pub fn run(cmd: Command, opts: Options) -> Result<()> {
    let (decls, pid_file) = load_declarations(opts)?;
    match cmd {
        Command::Run => run::cmd_run(decls, pid_file),
        Command::Check { json } => check::cmd_check(&decls, json),
    }
}

#[cfg(test)]
mod format_tests {
    use super::*;

    #[test]
    fn kv_width_top_only() {
        let w = kv_width(&["Inputs:", "Config file:"], &[]);
        // "Config file:" = 12 + PADDING = 14
        assert_eq!(w, 14);
    }

    #[test]
    fn kv_width_indent_drives_width() {
        let w = kv_width(&["A:"], &["Very long indent key:"]);
        // "Very long indent key:" = 21 + PADDING + 2 = 25
        assert_eq!(w, 25);
    }

    #[test]
    fn kv_width_empty_both() {
        assert_eq!(kv_width(&[], &[]), 0);
    }

    #[test]
    fn values_align_across_levels() {
        let w = kv_width(&["Bindings:"], &["Brightness:"]);
        let top = format_kv("Bindings:", "V", w);
        let indent = format!("  {}", format_kv("Brightness:", "V", w - 2));
        assert_eq!(top.find('V'), indent.find('V'));
    }

    #[test]
    fn format_kv_basic() {
        assert_eq!(format_kv("Key:", "value", 10), "Key:      value");
    }

    #[test]
    fn format_kv_exact_width() {
        // "ExactWidth:" is 11 chars, wider than the column: no padding
        assert_eq!(format_kv("ExactWidth:", "val", 10), "ExactWidth:val");
    }
}
