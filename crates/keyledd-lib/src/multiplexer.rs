//! Event multiplexer: one `poll(2)` over every input device and the wake channel.
//!
//! Each wakeup drains every ready input completely, in kernel delivery
//! order, before moving to the next one. Every drained LED transition is
//! written; bursts are not coalesced to their final value. Wake messages are
//! handled after the inputs of the same wakeup.

use std::io;
use std::os::fd::AsFd;

use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};

use crate::binding::InputId;
use crate::device::{self, DeviceError, InputDevice, OutputDevice};
use crate::error::Result;
use crate::registry::Registry;
use crate::wake::{Wake, WakeReceiver};

/// Readiness reported by one `poll` call.
#[derive(Debug, Default)]
struct Ready {
    /// Ready inputs and whether each reported a hangup/error condition.
    inputs: Vec<(InputId, bool)>,
    /// Wake channel readiness, `Some(true)` if its writers are all gone.
    wake: Option<bool>,
}

pub struct EventMux<I, O> {
    registry: Registry<I, O>,
    wake: WakeReceiver,
    wake_open: bool,
}

impl<I: InputDevice + AsFd, O: OutputDevice> EventMux<I, O> {
    pub fn new(registry: Registry<I, O>, wake: WakeReceiver) -> Self {
        EventMux {
            registry,
            wake,
            wake_open: true,
        }
    }

    pub fn registry(&self) -> &Registry<I, O> {
        &self.registry
    }

    pub fn into_registry(self) -> Registry<I, O> {
        self.registry
    }

    /// Rewrite every output from the current input state.
    pub fn resync(&mut self) -> Result<()> {
        Ok(self.registry.resync()?)
    }

    /// Block on all inputs and the wake channel until a `Shutdown` arrives.
    ///
    /// Any device read or write failure ends the loop with an error.
    pub fn run(&mut self) -> Result<()> {
        loop {
            let ready = self.wait()?;

            for (input, hangup) in ready.inputs {
                self.drain_input(input)?;
                if hangup {
                    let slot = &self.registry.inputs[input.0];
                    return Err(DeviceError::ReadFailed {
                        path: slot.path.clone(),
                        source: io::Error::new(io::ErrorKind::BrokenPipe, "device hung up"),
                    }
                    .into());
                }
            }

            if let Some(hangup) = ready.wake {
                for wake in self.wake.drain()? {
                    match wake {
                        Wake::Resume => {
                            log::info!("[sync]   system resumed, resynchronizing");
                            self.registry.resync()?;
                        }
                        Wake::Shutdown => {
                            log::info!("shutdown requested");
                            return Ok(());
                        }
                    }
                }
                if hangup {
                    log::warn!("wake channel closed, resume notifications disabled");
                    self.wake_open = false;
                }
            }
        }
    }

    /// Dispatch every event currently queued on `input`. Returns the number
    /// of outputs written.
    pub fn drain_input(&mut self, input: InputId) -> device::Result<usize> {
        let events = self.registry.inputs[input.0].device.drain_events()?;
        let mut written = 0;
        for event in events {
            let Some(indicator) = event.indicator() else {
                continue;
            };
            if self.registry.update(input, indicator, event.value)? {
                written += 1;
            }
        }
        Ok(written)
    }

    fn wait(&self) -> Result<Ready> {
        let input_count = self.registry.inputs.len();
        let mut fds: Vec<PollFd<'_>> = self
            .registry
            .inputs
            .iter()
            .map(|slot| PollFd::new(slot.device.as_fd(), PollFlags::POLLIN))
            .collect();
        if self.wake_open {
            fds.push(PollFd::new(self.wake.as_fd(), PollFlags::POLLIN));
        }

        loop {
            match poll(&mut fds, PollTimeout::NONE) {
                Ok(_) => break,
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(io::Error::from(e).into()),
            }
        }

        let mut ready = Ready::default();
        for (i, fd) in fds.iter().enumerate() {
            let Some(revents) = fd.revents() else {
                continue;
            };
            if revents.is_empty() {
                continue;
            }
            let hangup =
                revents.intersects(PollFlags::POLLHUP | PollFlags::POLLERR | PollFlags::POLLNVAL);
            if i < input_count {
                ready.inputs.push((InputId(i), hangup));
            } else {
                ready.wake = Some(hangup);
            }
        }
        Ok(ready)
    }
}
