//! PID file: records the running daemon and refuses a second instance.

use std::io;
use std::path::{Path, PathBuf};

/// A PID file owned by this process. Removed on drop.
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Write the current PID to `path`.
    ///
    /// Fails with `AlreadyExists` if the file names a process that is still
    /// alive. A stale file (dead or unparseable PID) is overwritten.
    pub fn create(path: &Path) -> io::Result<Self> {
        if let Some(pid) = read_pid(path)
            && pid != std::process::id()
            && process_alive(pid)
        {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} names running process {pid}", path.display()),
            ));
        }
        if let Some(dir) = path.parent()
            && !dir.as_os_str().is_empty()
        {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, format!("{}\n", std::process::id()))?;
        log::debug!("[pid]    wrote {}", path.display());
        Ok(PidFile {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            log::warn!("could not remove {}: {e}", self.path.display());
        }
    }
}

fn read_pid(path: &Path) -> Option<u32> {
    std::fs::read_to_string(path).ok()?.trim().parse().ok()
}

fn process_alive(pid: u32) -> bool {
    Path::new("/proc").join(pid.to_string()).exists()
}
