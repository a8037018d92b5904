//! PID file management
//!
//! The running controller holds a PID file so `stop` and `status` can find
//! it. A file naming a dead process is stale and may be replaced.

use std::fs;
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use poe_core::constants::paths;
use tracing::{debug, warn};

/// Default PID file path, preferring /run
pub fn default_pid_path() -> PathBuf {
    if Path::new("/run").exists() {
        PathBuf::from(paths::PID_FILE)
    } else {
        PathBuf::from(paths::PID_FILE_FALLBACK)
    }
}

/// Whether a process with this PID exists
pub fn is_process_alive(pid: i32) -> bool {
    if pid <= 0 {
        return false;
    }
    // SAFETY: kill with signal 0 only checks whether the process exists.
    // pid > 0 so this never addresses a process group.
    if unsafe { libc::kill(pid, 0) } == 0 {
        return true;
    }
    io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

/// Read the PID stored in a PID file
///
/// Returns `Ok(None)` when the file does not exist or holds no valid PID.
pub fn read_pid(path: &Path) -> io::Result<Option<i32>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(content.trim().parse::<i32>().ok().filter(|pid| *pid > 0)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// State of the instance recorded in a PID file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceStatus {
    Running(i32),
    Stale(i32),
    NotRunning,
}

pub fn instance_status(path: &Path) -> io::Result<InstanceStatus> {
    Ok(match read_pid(path)? {
        Some(pid) if is_process_alive(pid) => InstanceStatus::Running(pid),
        Some(pid) => InstanceStatus::Stale(pid),
        None => InstanceStatus::NotRunning,
    })
}

/// PID file owned by this process; removed on drop
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Write our PID, refusing if a live instance already holds the file
    pub fn acquire(path: &Path) -> io::Result<Self> {
        if path.exists() {
            if let InstanceStatus::Running(pid) = instance_status(path)? {
                if pid as u32 != std::process::id() {
                    return Err(io::Error::new(
                        io::ErrorKind::AddrInUse,
                        format!("Another instance is running (PID {})", pid),
                    ));
                }
            }
            // Stale PID file, remove it
            let _ = fs::remove_file(path);
        }

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(0o644)
            .open(path)?;
        writeln!(file, "{}", std::process::id())?;
        file.sync_all()?;

        debug!("PID file written: {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!("Failed to remove PID file {}: {}", self.path.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // Far above any kernel pid_max
    const DEAD_PID: i32 = 999_999_999;

    #[test]
    fn test_acquire_writes_and_removes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("poe.pid");

        {
            let pid_file = PidFile::acquire(&path).unwrap();
            assert_eq!(pid_file.path(), path.as_path());
            assert_eq!(read_pid(&path).unwrap(), Some(std::process::id() as i32));
            assert!(matches!(instance_status(&path).unwrap(), InstanceStatus::Running(_)));
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_stale_file_is_replaced() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("poe.pid");
        fs::write(&path, format!("{}\n", DEAD_PID)).unwrap();

        assert_eq!(instance_status(&path).unwrap(), InstanceStatus::Stale(DEAD_PID));
        let _pid_file = PidFile::acquire(&path).unwrap();
        assert_eq!(read_pid(&path).unwrap(), Some(std::process::id() as i32));
    }

    #[test]
    fn test_live_instance_blocks_acquire() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("poe.pid");
        // PID 1 always exists
        fs::write(&path, "1\n").unwrap();

        let err = PidFile::acquire(&path).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AddrInUse);
        assert!(path.exists());
    }

    #[test]
    fn test_garbage_and_missing_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("poe.pid");
        assert_eq!(instance_status(&path).unwrap(), InstanceStatus::NotRunning);

        fs::write(&path, "not-a-pid").unwrap();
        assert_eq!(read_pid(&path).unwrap(), None);

        fs::write(&path, "-1").unwrap();
        assert_eq!(read_pid(&path).unwrap(), None);
    }

    #[test]
    fn test_is_process_alive() {
        assert!(is_process_alive(std::process::id() as i32));
        assert!(!is_process_alive(0));
        assert!(!is_process_alive(-5));
        assert!(!is_process_alive(DEAD_PID));
    }
}
