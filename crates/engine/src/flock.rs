//! Exclusive ownership of the engine root directory.
//!
//! A `LOCK` file under the root carries an advisory `flock`; a second
//! engine instance opening the same directory fails fast instead of
//! corrupting shared state. The OS releases the lock when the file
//! handle closes, so a crashed process never leaves a stale lock.

use std::fs::{File, OpenOptions};
use std::io::{self, Write as _};
use std::path::Path;

pub(crate) struct DirLock {
    _file: File,
}

impl DirLock {
    /// Creates (or reopens) the lock file and takes the exclusive lock,
    /// without blocking. The file records the holder's PID for
    /// debugging.
    pub(crate) fn acquire(path: &Path) -> io::Result<Self> {
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        try_lock(&file)?;

        writeln!(file, "{}", std::process::id())?;
        file.flush()?;

        Ok(Self { _file: file })
    }
}

#[cfg(unix)]
fn try_lock(file: &File) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;

    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(not(unix))]
fn try_lock(_file: &File) -> io::Result<()> {
    Ok(())
}
