//! Fatal pre-loop checks: privileges and single-instance locking.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::os::unix::io::AsRawFd;
use std::path::Path;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StartupError {
    /// Raw hidraw access needs root unless udev rules grant it.
    #[error("must run as root (set startup.allow_unprivileged with udev rules in place)")]
    Privilege,

    /// Another instance holds the pidfile lock.
    #[error("another instance is already running (lock held on {path})")]
    SingleInstance { path: String },

    #[error("failed to open pidfile {path}: {source}")]
    Pidfile {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Verifies the effective uid unless the configuration opts out.
pub fn ensure_privileges(allow_unprivileged: bool) -> Result<(), StartupError> {
    // SAFETY: geteuid has no preconditions and cannot fail.
    if !allow_unprivileged && unsafe { libc::geteuid() } != 0 {
        return Err(StartupError::Privilege);
    }
    Ok(())
}

/// Holds the pidfile flock for the process lifetime.
pub struct InstanceLock {
    _file: File,
}

/// Takes a non-blocking exclusive flock on the pidfile. A held lock means
/// another instance is running.
pub fn acquire_instance_lock(path: &Path) -> Result<InstanceLock, StartupError> {
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|source| StartupError::Pidfile {
            path: path.display().to_string(),
            source,
        })?;

    // SAFETY: the fd belongs to `file`, which outlives the lock by living
    // inside the returned InstanceLock.
    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if rc != 0 {
        return Err(StartupError::SingleInstance {
            path: path.display().to_string(),
        });
    }

    let _ = file.set_len(0);
    let _ = writeln!(file, "{}", std::process::id());

    Ok(InstanceLock { _file: file })
}
