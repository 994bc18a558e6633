//! Cross-process file locking for cache installation.
//!
//! Every destination gets a sibling `<dest>.lock` file. Installers take an
//! exclusive advisory lock on it before touching the destination, so only one
//! process at a time may finalise a given cache entry. On Unix the lock is
//! `flock(2)`; elsewhere the standard library's file lock is used.
//!
//! Lock files are created lazily and never removed. Deleting one while an
//! installer holds it breaks mutual exclusion for later callers; that is an
//! environment fault and is not recovered from.

use camino::{Utf8Path, Utf8PathBuf};
use std::fs::{File, OpenOptions};
use std::io;

#[cfg(unix)]
use std::os::unix::io::AsRawFd;

/// Suffix appended to a destination path to name its lock file.
pub(crate) const LOCK_SUFFIX: &str = ".lock";

/// Returns the lock file path guarding `destination`.
///
/// The name is derived purely from the destination so unrelated processes
/// converge on the same file.
///
/// # Examples
///
/// ```
/// use camino::Utf8Path;
/// use native_format_cache::cache::lock_path_for;
///
/// let dest = Utf8Path::new("/cache/formatter-2.50.0.bin");
/// assert_eq!(lock_path_for(dest), "/cache/formatter-2.50.0.bin.lock");
/// ```
#[must_use]
pub fn lock_path_for(destination: &Utf8Path) -> Utf8PathBuf {
    Utf8PathBuf::from(format!("{destination}{LOCK_SUFFIX}"))
}

/// Guard that holds an exclusive install lock until dropped.
#[derive(Debug)]
pub struct InstallLock {
    path: Utf8PathBuf,
    _file: File,
}

impl InstallLock {
    /// Blocks until the exclusive lock for `destination` is held.
    ///
    /// The parent directory of `destination` must already exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock file cannot be opened or the lock cannot
    /// be acquired.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use camino::Utf8Path;
    /// use native_format_cache::cache::InstallLock;
    ///
    /// let dest = Utf8Path::new("/tmp/native-format/formatter.bin");
    /// let _lock = InstallLock::acquire(dest)?;
    /// // Exclusive access to the destination until `_lock` drops.
    /// # Ok::<(), std::io::Error>(())
    /// ```
    pub fn acquire(destination: &Utf8Path) -> io::Result<Self> {
        let path = lock_path_for(destination);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        lock_exclusive(&file)?;
        Ok(Self { path, _file: file })
    }

    /// Path of the lock file this guard holds.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

#[cfg(unix)]
fn lock_exclusive(file: &File) -> io::Result<()> {
    loop {
        // SAFETY: The descriptor comes from `file`, which is borrowed for the
        // whole call and therefore stays open until `flock` returns.
        let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX) };
        if result == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

#[cfg(not(unix))]
fn lock_exclusive(file: &File) -> io::Result<()> {
    file.lock()
}
