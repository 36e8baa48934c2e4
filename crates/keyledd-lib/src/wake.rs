//! Wake channel: lets other threads interrupt the event loop.
//!
//! A Unix socket pair: the read end sits in the multiplexer's `poll` set next
//! to the input devices, the write end is handed to the resume listener and
//! the signal handler. Each message is a single byte.

use std::io::{self, Read, Write};
use std::os::fd::{AsFd, BorrowedFd};
use std::os::unix::net::UnixStream;
use std::sync::Arc;

const RESUME: u8 = b'r';
const SHUTDOWN: u8 = b'q';

/// Requests delivered to the event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// The system resumed from sleep: rewrite every output.
    Resume,
    /// Stop the event loop cleanly.
    Shutdown,
}

/// Sending half. Cheap to clone, usable from any thread.
#[derive(Debug, Clone)]
pub struct Notifier {
    stream: Arc<UnixStream>,
}

impl Notifier {
    pub fn send(&self, wake: Wake) -> io::Result<()> {
        let byte = match wake {
            Wake::Resume => RESUME,
            Wake::Shutdown => SHUTDOWN,
        };
        match (&*self.stream).write(&[byte]) {
            Ok(_) => Ok(()),
            // Socket buffer full: the loop already has a wakeup pending.
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(()),
            Err(e) => Err(e),
        }
    }

    pub fn resume(&self) -> io::Result<()> {
        self.send(Wake::Resume)
    }

    pub fn shutdown(&self) -> io::Result<()> {
        self.send(Wake::Shutdown)
    }
}

/// Receiving half, owned by the event loop.
#[derive(Debug)]
pub struct WakeReceiver {
    stream: UnixStream,
}

impl WakeReceiver {
    /// Read every pending message without blocking.
    pub fn drain(&mut self) -> io::Result<Vec<Wake>> {
        let mut wakes = Vec::new();
        let mut buf = [0u8; 64];
        loop {
            match self.stream.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => wakes.extend(buf[..n].iter().filter_map(|&b| match b {
                    RESUME => Some(Wake::Resume),
                    SHUTDOWN => Some(Wake::Shutdown),
                    _ => None,
                })),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(wakes)
    }
}

impl AsFd for WakeReceiver {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.stream.as_fd()
    }
}

/// Create a connected notifier/receiver pair. Both ends are non-blocking.
pub fn channel() -> io::Result<(Notifier, WakeReceiver)> {
    let (tx, rx) = UnixStream::pair()?;
    tx.set_nonblocking(true)?;
    rx.set_nonblocking(true)?;
    Ok((
        Notifier {
            stream: Arc::new(tx),
        },
        WakeReceiver { stream: rx },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_empty_channel() {
        let (_tx, mut rx) = channel().unwrap();
        assert!(rx.drain().unwrap().is_empty());
    }

    #[test]
    fn messages_arrive_in_order() {
        let (tx, mut rx) = channel().unwrap();
        tx.resume().unwrap();
        tx.resume().unwrap();
        tx.shutdown().unwrap();
        assert_eq!(
            rx.drain().unwrap(),
            [Wake::Resume, Wake::Resume, Wake::Shutdown]
        );
        assert!(rx.drain().unwrap().is_empty());
    }

    #[test]
    fn notifier_works_from_another_thread() {
        let (tx, mut rx) = channel().unwrap();
        let remote = tx.clone();
        std::thread::spawn(move || remote.resume().unwrap())
            .join()
            .unwrap();
        assert_eq!(rx.drain().unwrap(), [Wake::Resume]);
    }

    #[test]
    fn closed_notifier_drains_to_empty() {
        let (tx, mut rx) = channel().unwrap();
        tx.shutdown().unwrap();
        drop(tx);
        assert_eq!(rx.drain().unwrap(), [Wake::Shutdown]);
    }
}
