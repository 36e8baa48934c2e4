//! Device access: traits, path normalization, Linux backend (evdev + sysfs).

use std::ffi::OsStr;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use crate::indicator::{EV_LED, Indicator};

// ── Error type ──

/// Device I/O errors. Every variant carries the offending path and the
/// underlying system error.
#[derive(Debug)]
pub enum DeviceError {
    OpenFailed { path: PathBuf, source: io::Error },
    WriteFailed { path: PathBuf, source: io::Error },
    ReadFailed { path: PathBuf, source: io::Error },
}

impl DeviceError {
    pub fn path(&self) -> &Path {
        match self {
            DeviceError::OpenFailed { path, .. }
            | DeviceError::WriteFailed { path, .. }
            | DeviceError::ReadFailed { path, .. } => path,
        }
    }
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::OpenFailed { path, source } => {
                write!(f, "Failed to open {}: {source}", path.display())
            }
            DeviceError::WriteFailed { path, source } => {
                write!(f, "Failed to write to {}: {source}", path.display())
            }
            DeviceError::ReadFailed { path, source } => {
                write!(f, "Failed to read from {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for DeviceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DeviceError::OpenFailed { source, .. }
            | DeviceError::WriteFailed { source, .. }
            | DeviceError::ReadFailed { source, .. } => Some(source),
        }
    }
}

pub type Result<T> = std::result::Result<T, DeviceError>;

// ── Events ──

/// A decoded input event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputEvent {
    pub event_type: u16,
    pub code: u16,
    pub value: i32,
}

impl InputEvent {
    pub fn new(event_type: u16, code: u16, value: i32) -> Self {
        InputEvent {
            event_type,
            code,
            value,
        }
    }

    /// An `EV_LED` event for `indicator`.
    pub fn led(indicator: Indicator, value: i32) -> Self {
        Self::new(EV_LED, indicator.code(), value)
    }

    /// The mirrored indicator this event reports on, if it is an LED event for one.
    pub fn indicator(&self) -> Option<Indicator> {
        if self.event_type == EV_LED {
            Indicator::from_code(self.code)
        } else {
            None
        }
    }
}

// ── Traits ──

/// A decoded source of indicator state changes.
pub trait InputDevice {
    fn path(&self) -> &Path;

    /// Read every event currently queued on the device, in delivery order.
    /// Never blocks; returns an empty list when nothing is pending.
    fn drain_events(&mut self) -> Result<Vec<InputEvent>>;

    /// Current value of `indicator` as held by the kernel (1 = lit, 0 = off).
    fn led_value(&self, indicator: Indicator) -> Result<i32>;
}

/// A writable brightness attribute.
pub trait OutputDevice {
    fn path(&self) -> &Path;

    /// Write `payload` verbatim. Must reach the device before returning.
    fn write_payload(&mut self, payload: &[u8]) -> Result<()>;
}

/// Opens input and output devices by (already normalized) path.
pub trait DeviceOpener {
    type Input: InputDevice;
    type Output: OutputDevice;

    fn open_input(&self, path: &Path) -> Result<Self::Input>;
    fn open_output(&self, path: &Path) -> Result<Self::Output>;
}

// ── Path normalization ──

/// Attribute written under an LED class device directory.
pub const BRIGHTNESS_ATTR: &str = "brightness";

/// Resolve symlinks so two spellings of one device compare equal.
///
/// Falls back to the path as given when it can't be resolved; opening it
/// later reports the real error.
pub fn canonical_path(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Normalized brightness attribute path for an LED class device.
///
/// `brightness` is appended to the device directory. A path that already
/// names the attribute is kept as-is.
pub fn brightness_path(led_device: &Path) -> PathBuf {
    let path = canonical_path(led_device);
    if path.file_name() == Some(OsStr::new(BRIGHTNESS_ATTR)) {
        path
    } else {
        path.join(BRIGHTNESS_ATTR)
    }
}

// ── Linux implementation ──

#[cfg(target_os = "linux")]
mod linux_impl {
    use super::*;
    use std::fs::{File, OpenOptions};
    use std::io::Write;
    use std::os::fd::{AsFd, AsRawFd, BorrowedFd};

    use evdev::LedType;
    use nix::fcntl::{FcntlArg, OFlag, fcntl};

    /// Evdev input device, switched to non-blocking reads so it can be drained.
    pub struct EvdevInput {
        path: PathBuf,
        device: evdev::Device,
    }

    impl EvdevInput {
        pub fn open(path: &Path) -> Result<Self> {
            let open_failed = |source| DeviceError::OpenFailed {
                path: path.to_path_buf(),
                source,
            };
            let device = evdev::Device::open(path).map_err(open_failed)?;
            set_nonblocking(&device).map_err(open_failed)?;
            log::debug!(
                "[input] {} ({})",
                path.display(),
                device.name().unwrap_or("unnamed")
            );
            Ok(EvdevInput {
                path: path.to_path_buf(),
                device,
            })
        }
    }

    fn set_nonblocking(device: &evdev::Device) -> io::Result<()> {
        let fd = device.as_raw_fd();
        let flags = OFlag::from_bits_truncate(fcntl(fd, FcntlArg::F_GETFL)?);
        fcntl(fd, FcntlArg::F_SETFL(flags | OFlag::O_NONBLOCK))?;
        Ok(())
    }

    impl AsFd for EvdevInput {
        fn as_fd(&self) -> BorrowedFd<'_> {
            // SAFETY: the fd is owned by `self.device`, which outlives the borrow.
            unsafe { BorrowedFd::borrow_raw(self.device.as_raw_fd()) }
        }
    }

    impl InputDevice for EvdevInput {
        fn path(&self) -> &Path {
            &self.path
        }

        fn drain_events(&mut self) -> Result<Vec<InputEvent>> {
            let mut drained = Vec::new();
            loop {
                match self.device.fetch_events() {
                    Ok(events) => {
                        let before = drained.len();
                        drained.extend(
                            events.map(|ev| InputEvent::new(ev.event_type().0, ev.code(), ev.value())),
                        );
                        if drained.len() == before {
                            break;
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(source) => {
                        return Err(DeviceError::ReadFailed {
                            path: self.path.clone(),
                            source,
                        });
                    }
                }
            }
            Ok(drained)
        }

        fn led_value(&self, indicator: Indicator) -> Result<i32> {
            let leds = self
                .device
                .get_led_state()
                .map_err(|source| DeviceError::ReadFailed {
                    path: self.path.clone(),
                    source,
                })?;
            Ok(leds.contains(LedType(indicator.code())) as i32)
        }
    }

    /// LED class `brightness` attribute opened write-only.
    ///
    /// Plain `File` with no userspace buffer: every payload is one `write(2)`.
    pub struct SysfsLed {
        path: PathBuf,
        file: File,
    }

    impl SysfsLed {
        pub fn open(path: &Path) -> Result<Self> {
            let file = OpenOptions::new()
                .write(true)
                .open(path)
                .map_err(|source| DeviceError::OpenFailed {
                    path: path.to_path_buf(),
                    source,
                })?;
            Ok(SysfsLed {
                path: path.to_path_buf(),
                file,
            })
        }
    }

    impl OutputDevice for SysfsLed {
        fn path(&self) -> &Path {
            &self.path
        }

        fn write_payload(&mut self, payload: &[u8]) -> Result<()> {
            self.file
                .write_all(payload)
                .map_err(|source| DeviceError::WriteFailed {
                    path: self.path.clone(),
                    source,
                })
        }
    }

    /// Opens real devices: evdev nodes for input, sysfs attributes for output.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct LinuxDevices;

    impl DeviceOpener for LinuxDevices {
        type Input = EvdevInput;
        type Output = SysfsLed;

        fn open_input(&self, path: &Path) -> Result<EvdevInput> {
            EvdevInput::open(path)
        }

        fn open_output(&self, path: &Path) -> Result<SysfsLed> {
            SysfsLed::open(path)
        }
    }
}

#[cfg(target_os = "linux")]
pub use linux_impl::{EvdevInput, LinuxDevices, SysfsLed};

// ── Mock devices for testing ──

/// In-memory devices for unit and integration tests.
///
/// Inputs are backed by a socket pair so they take part in `poll` like a
/// real evdev node: queuing an event makes the input readable.
#[cfg(unix)]
#[doc(hidden)]
pub mod mock {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::{HashMap, HashSet, VecDeque};
    use std::io::{Read, Write};
    use std::os::fd::{AsFd, BorrowedFd};
    use std::os::unix::net::UnixStream;
    use std::rc::Rc;

    /// Shared state of one mock input device. Tests keep a handle to queue
    /// events and change the kernel-side LED state.
    #[derive(Default)]
    pub struct MockInputState {
        pending: RefCell<VecDeque<InputEvent>>,
        leds: RefCell<HashMap<Indicator, i32>>,
        /// Write end of the readiness socket, present once the device is open.
        signal: RefCell<Option<UnixStream>>,
        /// If true, reads return an error.
        pub fail_read: Cell<bool>,
    }

    impl MockInputState {
        /// Queue an arbitrary event.
        pub fn push_event(&self, event: InputEvent) {
            self.pending.borrow_mut().push_back(event);
            self.raise();
        }

        /// Queue an LED event and update the kernel-side state to match.
        pub fn push_led(&self, indicator: Indicator, value: i32) {
            self.leds.borrow_mut().insert(indicator, value);
            self.push_event(InputEvent::led(indicator, value));
        }

        /// Change the kernel-side LED state without queuing an event
        /// (a transition that happened while nobody was reading).
        pub fn set_led(&self, indicator: Indicator, value: i32) {
            self.leds.borrow_mut().insert(indicator, value);
        }

        pub fn pending_len(&self) -> usize {
            self.pending.borrow().len()
        }

        fn raise(&self) {
            if let Some(signal) = self.signal.borrow().as_ref() {
                let _ = (&*signal).write(&[1]);
            }
        }
    }

    pub struct MockInput {
        path: PathBuf,
        state: Rc<MockInputState>,
        ready: UnixStream,
    }

    impl AsFd for MockInput {
        fn as_fd(&self) -> BorrowedFd<'_> {
            self.ready.as_fd()
        }
    }

    impl MockInput {
        fn read_failed(&self) -> DeviceError {
            DeviceError::ReadFailed {
                path: self.path.clone(),
                source: io::Error::other("mock: read failure injected"),
            }
        }
    }

    impl InputDevice for MockInput {
        fn path(&self) -> &Path {
            &self.path
        }

        fn drain_events(&mut self) -> Result<Vec<InputEvent>> {
            let mut buf = [0u8; 64];
            while let Ok(n) = self.ready.read(&mut buf) {
                if n == 0 {
                    break;
                }
            }
            if self.state.fail_read.get() {
                return Err(self.read_failed());
            }
            Ok(self.state.pending.borrow_mut().drain(..).collect())
        }

        fn led_value(&self, indicator: Indicator) -> Result<i32> {
            if self.state.fail_read.get() {
                return Err(self.read_failed());
            }
            Ok(self
                .state
                .leds
                .borrow()
                .get(&indicator)
                .copied()
                .unwrap_or(0))
        }
    }

    #[derive(Default)]
    struct WriteLog {
        writes: RefCell<Vec<(PathBuf, Vec<u8>)>>,
        failing: RefCell<HashSet<PathBuf>>,
    }

    pub struct MockOutput {
        path: PathBuf,
        log: Rc<WriteLog>,
    }

    impl OutputDevice for MockOutput {
        fn path(&self) -> &Path {
            &self.path
        }

        fn write_payload(&mut self, payload: &[u8]) -> Result<()> {
            if self.log.failing.borrow().contains(&self.path) {
                return Err(DeviceError::WriteFailed {
                    path: self.path.clone(),
                    source: io::Error::other("mock: write failure injected"),
                });
            }
            self.log
                .writes
                .borrow_mut()
                .push((self.path.clone(), payload.to_vec()));
            Ok(())
        }
    }

    /// Opener that records every open and hands out mock devices.
    #[derive(Default)]
    pub struct MockOpener {
        inputs: RefCell<HashMap<PathBuf, Rc<MockInputState>>>,
        log: Rc<WriteLog>,
        missing: RefCell<HashSet<PathBuf>>,
        /// Recorded input opens, in order.
        pub input_opens: RefCell<Vec<PathBuf>>,
        /// Recorded output opens, in order.
        pub output_opens: RefCell<Vec<PathBuf>>,
    }

    impl MockOpener {
        pub fn new() -> Self {
            Self::default()
        }

        /// State handle for the input at `path` (created on first use).
        pub fn input(&self, path: impl AsRef<Path>) -> Rc<MockInputState> {
            self.inputs
                .borrow_mut()
                .entry(path.as_ref().to_path_buf())
                .or_default()
                .clone()
        }

        /// Make opening `path` fail with `NotFound`.
        pub fn make_missing(&self, path: impl AsRef<Path>) {
            self.missing
                .borrow_mut()
                .insert(path.as_ref().to_path_buf());
        }

        /// Make writes to `path` fail.
        pub fn fail_writes(&self, path: impl AsRef<Path>) {
            self.log
                .failing
                .borrow_mut()
                .insert(path.as_ref().to_path_buf());
        }

        /// Every successful write, across all outputs, in order.
        pub fn writes(&self) -> Vec<(PathBuf, String)> {
            self.log
                .writes
                .borrow()
                .iter()
                .map(|(p, data)| (p.clone(), String::from_utf8_lossy(data).into_owned()))
                .collect()
        }

        /// Successful writes to one output, in order.
        pub fn writes_to(&self, path: impl AsRef<Path>) -> Vec<String> {
            self.writes()
                .into_iter()
                .filter(|(p, _)| p == path.as_ref())
                .map(|(_, data)| data)
                .collect()
        }

        pub fn clear_writes(&self) {
            self.log.writes.borrow_mut().clear();
        }

        fn check_missing(&self, path: &Path) -> Result<()> {
            if self.missing.borrow().contains(path) {
                return Err(DeviceError::OpenFailed {
                    path: path.to_path_buf(),
                    source: io::Error::from(io::ErrorKind::NotFound),
                });
            }
            Ok(())
        }
    }

    impl DeviceOpener for MockOpener {
        type Input = MockInput;
        type Output = MockOutput;

        fn open_input(&self, path: &Path) -> Result<MockInput> {
            self.input_opens.borrow_mut().push(path.to_path_buf());
            self.check_missing(path)?;
            let open_failed = |source| DeviceError::OpenFailed {
                path: path.to_path_buf(),
                source,
            };
            let (signal, ready) = UnixStream::pair().map_err(open_failed)?;
            ready.set_nonblocking(true).map_err(open_failed)?;
            signal.set_nonblocking(true).map_err(open_failed)?;
            let state = self.input(path);
            *state.signal.borrow_mut() = Some(signal);
            if state.pending_len() > 0 {
                state.raise();
            }
            Ok(MockInput {
                path: path.to_path_buf(),
                state,
                ready,
            })
        }

        fn open_output(&self, path: &Path) -> Result<MockOutput> {
            self.output_opens.borrow_mut().push(path.to_path_buf());
            self.check_missing(path)?;
            Ok(MockOutput {
                path: path.to_path_buf(),
                log: Rc::clone(&self.log),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockOpener;
    use super::*;

    #[test]
    fn led_event_maps_to_indicator() {
        let ev = InputEvent::led(Indicator::NumLock, 1);
        assert_eq!(ev.indicator(), Some(Indicator::NumLock));
    }

    #[test]
    fn key_event_is_not_an_indicator() {
        // EV_KEY / KEY_CAPSLOCK
        let ev = InputEvent::new(0x01, 58, 1);
        assert_eq!(ev.indicator(), None);
    }

    #[test]
    fn unmirrored_led_is_not_an_indicator() {
        // EV_LED / LED_KANA
        let ev = InputEvent::new(EV_LED, 4, 1);
        assert_eq!(ev.indicator(), None);
    }

    #[test]
    fn brightness_path_appends_attribute() {
        let p = brightness_path(Path::new("/nonexistent/leds/x"));
        assert_eq!(p, PathBuf::from("/nonexistent/leds/x/brightness"));
    }

    #[test]
    fn brightness_path_keeps_explicit_attribute() {
        let p = brightness_path(Path::new("/nonexistent/leds/x/brightness"));
        assert_eq!(p, PathBuf::from("/nonexistent/leds/x/brightness"));
    }

    #[test]
    fn brightness_path_trailing_slash() {
        let p = brightness_path(Path::new("/nonexistent/leds/x/"));
        assert_eq!(p, PathBuf::from("/nonexistent/leds/x/brightness"));
    }

    #[cfg(unix)]
    #[test]
    fn canonical_path_resolves_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("event7");
        std::fs::write(&target, b"").unwrap();
        let link = dir.path().join("by-id-keyboard");
        std::os::unix::fs::symlink(&target, &link).unwrap();

        assert_eq!(canonical_path(&link), canonical_path(&target));
    }

    #[test]
    fn canonical_path_falls_back_to_input() {
        let p = Path::new("/nonexistent/dev/input/event0");
        assert_eq!(canonical_path(p), p.to_path_buf());
    }

    #[test]
    fn open_failed_display_names_path_and_cause() {
        let e = DeviceError::OpenFailed {
            path: "/dev/input/event9".into(),
            source: io::Error::from(io::ErrorKind::PermissionDenied),
        };
        let msg = e.to_string();
        assert!(msg.contains("/dev/input/event9"), "{msg}");
        assert!(msg.to_lowercase().contains("permission denied"), "{msg}");
    }

    #[test]
    fn write_failed_source_chains_io_error() {
        let e = DeviceError::WriteFailed {
            path: "/sys/class/leds/x/brightness".into(),
            source: io::Error::other("EIO"),
        };
        let source = std::error::Error::source(&e).unwrap();
        assert!(source.to_string().contains("EIO"));
        assert_eq!(e.path(), Path::new("/sys/class/leds/x/brightness"));
    }

    #[test]
    fn mock_records_opens_and_writes() {
        let opener = MockOpener::new();
        let mut out = opener.open_output(Path::new("/leds/a/brightness")).unwrap();
        out.write_payload(b"1\n").unwrap();
        out.write_payload(b"0\n").unwrap();
        assert_eq!(opener.output_opens.borrow().len(), 1);
        assert_eq!(opener.writes_to("/leds/a/brightness"), vec!["1\n", "0\n"]);
    }

    #[test]
    fn mock_input_drains_in_order() {
        let opener = MockOpener::new();
        let mut input = opener.open_input(Path::new("/dev/input/event0")).unwrap();
        let state = opener.input("/dev/input/event0");
        state.push_led(Indicator::CapsLock, 1);
        state.push_led(Indicator::CapsLock, 0);

        let events = input.drain_events().unwrap();
        assert_eq!(
            events,
            vec![
                InputEvent::led(Indicator::CapsLock, 1),
                InputEvent::led(Indicator::CapsLock, 0)
            ]
        );
        assert!(input.drain_events().unwrap().is_empty());
        assert_eq!(input.led_value(Indicator::CapsLock).unwrap(), 0);
    }

    #[test]
    fn mock_missing_path_fails_open() {
        let opener = MockOpener::new();
        opener.make_missing("/dev/input/event5");
        let err = match opener.open_input(Path::new("/dev/input/event5")) {
            Err(e) => e,
            Ok(_) => panic!("open should fail"),
        };
        assert!(matches!(err, DeviceError::OpenFailed { .. }));
    }
}
