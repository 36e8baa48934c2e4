//! Resume-from-sleep notifications over the system bus.
//!
//! logind broadcasts `org.freedesktop.login1.Manager.PrepareForSleep(bool)`:
//! `true` before suspending (ignored here), `false` after resuming. Some
//! hardware resets LED class devices across suspend, so each resume is
//! forwarded to the event loop as [`Wake::Resume`].

use std::thread;

use zbus::blocking::Connection;
use zbus::proxy;

use crate::wake::{Notifier, Wake};

#[proxy(
    interface = "org.freedesktop.login1.Manager",
    default_service = "org.freedesktop.login1",
    default_path = "/org/freedesktop/login1"
)]
trait Manager {
    #[zbus(signal)]
    fn prepare_for_sleep(&self, start: bool) -> zbus::Result<()>;
}

/// What a `PrepareForSleep` signal asks of the event loop.
pub fn wake_for_sleep_signal(start: bool) -> Option<Wake> {
    if start { None } else { Some(Wake::Resume) }
}

/// Connect to the system bus and forward resume notifications on a
/// background thread.
///
/// Returns an error only if the bus can't be reached; the caller decides
/// whether that matters. The listener thread logs and exits if the
/// subscription fails or the signal stream breaks.
pub fn spawn_resume_listener(notifier: Notifier) -> zbus::Result<()> {
    let connection = Connection::system()?;

    thread::Builder::new()
        .name("logind".into())
        .spawn(move || {
            if let Err(e) = forward_resumes(&connection, &notifier) {
                log::warn!("[logind] {e}");
            }
            log::warn!("[logind] resume notifications disabled");
        })?;

    log::info!("[logind] listening for resume notifications");
    Ok(())
}

fn forward_resumes(connection: &Connection, notifier: &Notifier) -> zbus::Result<()> {
    let proxy = ManagerProxyBlocking::new(connection)?;
    for signal in proxy.receive_prepare_for_sleep()? {
        let start = match signal.args() {
            Ok(args) => args.start,
            Err(e) => {
                log::warn!("[logind] malformed PrepareForSleep signal: {e}");
                continue;
            }
        };
        log::debug!("[logind] PrepareForSleep({start})");
        if let Some(wake) = wake_for_sleep_signal(start) {
            notifier.send(wake)?;
        }
    }
    Ok(())
}
