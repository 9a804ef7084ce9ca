//! Single-instance guard backed by a pid file.
//!
//! Starters serialize on an exclusive `flock` over the pid file, held for the
//! guard's lifetime, so only the holder ever inspects or rewrites the recorded
//! pid. The pid itself is advisory: a stale file whose pid has since been
//! reused by an unrelated process is indistinguishable from a live holder.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{JanitorError, Result};

/// Holds the pid file, and the lock on it, for the lifetime of a run.
/// Dropping the guard deletes the file.
#[derive(Debug)]
pub struct LockGuard {
    file: File,
    path: PathBuf,
    pid: u32,
}

impl LockGuard {
    /// Take the lock at `path` for the current process.
    ///
    /// Fails with `AlreadyRunning` when another guard holds the file or the
    /// file names a live process, and with `LockCreateFailed` when the file
    /// cannot be written. A file naming a dead process, or holding anything
    /// but a pid, is replaced.
    pub fn acquire(path: &Path) -> Result<Self> {
        Self::acquire_for(path, std::process::id())
    }

    fn acquire_for(path: &Path, pid: u32) -> Result<Self> {
        let mut file = loop {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(path)
                .map_err(|source| create_failed(path, source))?;

            if !try_lock_exclusive(&file).map_err(|source| create_failed(path, source))? {
                return Err(JanitorError::AlreadyRunning {
                    pid: recorded_pid(path).unwrap_or(0),
                    path: path.to_path_buf(),
                });
            }

            // The previous holder unlinks the file before unlocking it; a lock
            // on that orphaned inode guards nothing, so start over.
            if is_current_file(&file, path) {
                break file;
            }
        };

        let mut content = String::new();
        file.read_to_string(&mut content)
            .map_err(|source| create_failed(path, source))?;
        let content = content.trim();

        if !content.is_empty() {
            match content.parse::<u32>() {
                Ok(holder) if is_process_alive(holder) => {
                    return Err(JanitorError::AlreadyRunning {
                        pid: holder,
                        path: path.to_path_buf(),
                    });
                }
                Ok(holder) => warn!(pid = holder, path = %path.display(), "Replacing stale lock file"),
                Err(_) => warn!(content = %content, path = %path.display(), "Lock file has no valid pid, replacing it"),
            }
        }

        if let Err(source) = write_pid(&mut file, pid) {
            let _ = fs::remove_file(path);
            return Err(create_failed(path, source));
        }

        debug!(pid, path = %path.display(), "Acquired lock");
        Ok(Self {
            file,
            path: path.to_path_buf(),
            pid,
        })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        // Unlink while still locked
        match fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Released lock"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove lock file"),
        }
        unlock(&self.file);
    }
}

fn create_failed(path: &Path, source: std::io::Error) -> JanitorError {
    JanitorError::LockCreateFailed {
        path: path.to_path_buf(),
        source,
    }
}

fn write_pid(file: &mut File, pid: u32) -> std::io::Result<()> {
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    writeln!(file, "{}", pid)?;
    file.sync_all()
}

/// Pid recorded at `path`, if it can be read and parsed.
fn recorded_pid(path: &Path) -> Option<u32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

/// `Ok(false)` when another open file description holds the lock.
#[cfg(unix)]
fn try_lock_exclusive(file: &File) -> std::io::Result<bool> {
    use std::os::unix::io::AsRawFd;

    if unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) } == 0 {
        return Ok(true);
    }
    let err = std::io::Error::last_os_error();
    if err.kind() == ErrorKind::WouldBlock {
        Ok(false)
    } else {
        Err(err)
    }
}

#[cfg(not(unix))]
fn try_lock_exclusive(_file: &File) -> std::io::Result<bool> {
    Ok(true)
}

#[cfg(unix)]
fn unlock(file: &File) {
    use std::os::unix::io::AsRawFd;

    unsafe {
        libc::flock(file.as_raw_fd(), libc::LOCK_UN);
    }
}

#[cfg(not(unix))]
fn unlock(_file: &File) {}

#[cfg(unix)]
fn is_current_file(file: &File, path: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    match (file.metadata(), fs::metadata(path)) {
        (Ok(held), Ok(linked)) => held.dev() == linked.dev() && held.ino() == linked.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
fn is_current_file(_file: &File, path: &Path) -> bool {
    path.exists()
}

/// Check whether a process with the given pid exists.
///
/// Sends the null signal; `EPERM` means the process exists but belongs to
/// another user, which still counts as alive.
#[cfg(unix)]
pub fn is_process_alive(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    if pid <= 0 {
        return false;
    }

    if unsafe { libc::kill(pid, 0) } == 0 {
        return true;
    }
    std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(not(unix))]
pub fn is_process_alive(_pid: u32) -> bool {
    // No cheap probe available; never treat an existing lock as stale.
    true
}
