//! `run`: resolve bindings, synchronize, and mirror until interrupted.

use std::path::PathBuf;

use super::{Declarations, Result};

#[cfg(target_os = "linux")]
pub(super) fn cmd_run(decls: Declarations, pid_file: Option<PathBuf>) -> Result<()> {
    use keyledd_lib::device::LinuxDevices;
    use keyledd_lib::multiplexer::EventMux;
    use keyledd_lib::pidfile::PidFile;
    use keyledd_lib::wake;

    match &decls.source {
        Some(path) => log::info!("[config] {}", path.display()),
        None => log::info!("[config] no config file, using command-line binding"),
    }

    let registry = super::registry::resolve(&decls.bindings, &LinuxDevices)?;
    log::info!(
        "[setup]  {} binding(s) over {} input device(s)",
        registry.table().len(),
        registry.inputs().len()
    );

    let _pid_file = match pid_file {
        Some(path) => Some(PidFile::create(&path)?),
        None => None,
    };

    let (notifier, wake_rx) = wake::channel()?;

    let on_signal = notifier.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        if let Err(e) = on_signal.shutdown() {
            log::warn!("[signal] failed to post shutdown: {e}");
        }
    }) {
        log::warn!("[signal] could not install termination handler: {e}");
    }

    #[cfg(feature = "logind")]
    if let Err(e) = keyledd_lib::logind::spawn_resume_listener(notifier.clone()) {
        log::warn!("[logind] resume notifications unavailable: {e}");
    }

    let mut mux = EventMux::new(registry, wake_rx);
    mux.resync()?;
    mux.run()?;

    // Keep one sender alive for the whole loop.
    drop(notifier);
    log::info!("[exit]   shutting down");
    Ok(())
}

#[cfg(not(target_os = "linux"))]
pub(super) fn cmd_run(_decls: Declarations, _pid_file: Option<PathBuf>) -> Result<()> {
    Err(keyledd_lib::KeyleddError::Config(
        "LED mirroring is only supported on Linux".into(),
    ))
}
