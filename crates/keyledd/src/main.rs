//! keyledd: mirror keyboard lock indicators onto arbitrary LED class devices.
//!
//! Runs in the foreground; meant to be supervised by a service manager.

use std::path::PathBuf;

use clap::Parser;

mod cli;

#[derive(Parser)]
#[command(
    name = "keyledd",
    version,
    about = "Mirror keyboard lock indicators onto arbitrary LED class devices",
    long_about = "keyledd helps users whose keyboard lacks an LED for some lock key \
                  (for example caps lock) by mirroring that indicator onto a \
                  different LED on the machine. Bindings come from a TOML config \
                  file and/or the --input-device, --led-device and --keyboard-led \
                  options."
)]
struct Args {
    /// Config file (default: ~/.config/keyledd/config.toml, then /etc/keyledd/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Write the daemon's PID to this file (overrides `pid_file` in the config)
    #[arg(long, global = true)]
    pid_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(flatten)]
    binding: cli::BindingArgs,

    #[command(subcommand)]
    command: Option<cli::Command>,
}

fn main() {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .format_target(false)
        .init();

    let opts = cli::Options {
        config: args.config,
        pid_file: args.pid_file,
        binding: args.binding.into(),
    };

    if let Err(e) = cli::run(args.command.unwrap_or_default(), opts) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
