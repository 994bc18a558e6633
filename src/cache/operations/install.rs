//! Atomic, idempotent installation of a binary into the shared cache.
//!
//! Installation follows a check, lock, re-check, stage, rename sequence:
//!
//! 1. If the destination already exists the call returns immediately without
//!    locking.
//! 2. Otherwise the installer blocks on the destination's `.lock` sibling.
//! 3. Under the lock the destination is checked again; a peer may have
//!    finished in the meantime.
//! 4. The source is copied into a private staging directory, flushed, and
//!    renamed onto the destination so readers never see a partial file.
//!
//! When the staging directory and the destination live on different
//! filesystems the rename cannot be atomic. The installer then copies the
//! staged file over the destination instead. That copy is visible while it is
//! being written, so readers that skip the lock may observe a truncated file.
//! Staging defaults to the destination's own directory, which keeps this
//! fallback out of the common path.

use camino::{Utf8Path, Utf8PathBuf};
use color_eyre::eyre::{Context, Report};
use std::fs;
use std::io::{self, ErrorKind};
use tracing::{debug, info, info_span, warn};

use super::stage::StagingArea;
use crate::cache::lock::InstallLock;
use crate::error::InstallResult;
use crate::observability::CACHE_TARGET;

/// How a successful install made the staged binary visible.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum InstallMethod {
    /// Atomic rename from the staging directory.
    AtomicRename,
    /// Non-atomic copy, used when the rename crossed filesystems.
    CopyFallback,
}

/// How an install call concluded.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum InstallOutcome {
    /// The destination existed before the call; no lock was taken.
    AlreadyPresent,
    /// Another installer finished first; observed under the lock.
    InstalledByPeer,
    /// This call finalised the destination.
    Installed(InstallMethod),
}

/// Result of an install call: the cache entry and how it came to exist.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Installation {
    /// Path of the complete cache entry.
    pub path: Utf8PathBuf,
    /// How the call concluded.
    pub outcome: InstallOutcome,
}

impl Installation {
    const fn new(path: Utf8PathBuf, outcome: InstallOutcome) -> Self {
        Self { path, outcome }
    }

    /// Returns true when this call wrote the cache entry.
    #[must_use]
    pub const fn installed_here(&self) -> bool {
        matches!(self.outcome, InstallOutcome::Installed(_))
    }
}

/// Installs `source` at `destination`, once, across all cooperating
/// processes.
///
/// Every caller, including those that lose the race, receives the same
/// destination path.
///
/// # Errors
///
/// Returns an error if the destination directory cannot be created, the lock
/// cannot be taken, or copying or moving the binary fails. Failures are not
/// retried.
///
/// # Examples
///
/// ```no_run
/// use camino::Utf8Path;
/// use native_format_cache::cache::install;
///
/// let installed = install(
///     Utf8Path::new("/downloads/formatter.bin"),
///     Utf8Path::new("/home/dev/.cache/native-format/binaries/formatter.bin"),
/// )?;
/// println!("formatter ready at {}", installed.path);
/// # Ok::<(), native_format_cache::InstallError>(())
/// ```
pub fn install(source: &Utf8Path, destination: &Utf8Path) -> InstallResult<Installation> {
    CacheInstaller::new(source, destination).install()
}

/// Installer for a single `(source, destination)` pair.
#[derive(Debug, Clone, Copy)]
pub struct CacheInstaller<'a> {
    source: &'a Utf8Path,
    destination: &'a Utf8Path,
    staging_root: Option<&'a Utf8Path>,
}

impl<'a> CacheInstaller<'a> {
    /// Creates an installer that stages next to the destination.
    #[must_use]
    pub const fn new(source: &'a Utf8Path, destination: &'a Utf8Path) -> Self {
        Self {
            source,
            destination,
            staging_root: None,
        }
    }

    /// Stages under `root` instead of the destination's directory.
    ///
    /// A root on another filesystem forces the non-atomic copy fallback.
    #[must_use]
    pub const fn with_staging_root(mut self, root: &'a Utf8Path) -> Self {
        self.staging_root = Some(root);
        self
    }

    /// Runs the install.
    ///
    /// # Errors
    ///
    /// See [`install`].
    pub fn install(&self) -> InstallResult<Installation> {
        let destination = self.destination;
        if destination.exists() {
            debug!(
                target: CACHE_TARGET,
                destination = %destination,
                "cache entry already present"
            );
            return Ok(self.installation(InstallOutcome::AlreadyPresent));
        }

        let span = info_span!(target: CACHE_TARGET, "cache_install", destination = %destination);
        let _entered = span.enter();

        let parent = parent_dir(destination);
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create cache directory {parent}"))?;

        let lock = InstallLock::acquire(destination)
            .with_context(|| format!("failed to lock cache entry {destination}"))?;
        debug!(target: CACHE_TARGET, lock = %lock.path(), "acquired install lock");

        if destination.exists() {
            debug!(
                target: CACHE_TARGET,
                destination = %destination,
                "cache entry installed by another process"
            );
            return Ok(self.installation(InstallOutcome::InstalledByPeer));
        }

        let outcome = self.stage_and_finalize(parent)?;
        drop(lock);
        info!(
            target: CACHE_TARGET,
            source = %self.source,
            destination = %destination,
            outcome = ?outcome,
            "installed formatter binary"
        );
        Ok(self.installation(outcome))
    }

    fn installation(&self, outcome: InstallOutcome) -> Installation {
        Installation::new(self.destination.to_path_buf(), outcome)
    }

    fn stage_and_finalize(&self, parent: &Utf8Path) -> InstallResult<InstallOutcome> {
        let staging = StagingArea::create(self.staging_root.unwrap_or(parent))?;
        let result = staging
            .stage(self.source)
            .and_then(|staged| finalize(&staged, self.destination));
        let cleanup = staging.remove();
        match (result, cleanup) {
            (Ok(outcome), Ok(())) => Ok(outcome),
            (Err(err), Ok(())) | (Ok(_), Err(err)) => Err(err),
            (Err(err), Err(cleanup_err)) => {
                warn!(
                    target: CACHE_TARGET,
                    error = %cleanup_err,
                    "failed to remove staging directory after a failed install"
                );
                Err(err)
            }
        }
    }
}

/// Directory holding `destination`; relative single-component paths resolve
/// to the working directory.
fn parent_dir(destination: &Utf8Path) -> &Utf8Path {
    match destination.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    }
}

/// Makes `staged` visible at `destination`.
pub(super) fn finalize(staged: &Utf8Path, destination: &Utf8Path) -> InstallResult<InstallOutcome> {
    match fs::rename(staged, destination) {
        Ok(()) => Ok(InstallOutcome::Installed(InstallMethod::AtomicRename)),
        Err(err) if is_cross_device(&err) => {
            warn!(
                target: CACHE_TARGET,
                staged = %staged,
                destination = %destination,
                "atomic rename unavailable across filesystems; copying non-atomically"
            );
            copy_fallback(staged, destination)?;
            Ok(InstallOutcome::Installed(InstallMethod::CopyFallback))
        }
        Err(err) if err.kind() == ErrorKind::AlreadyExists => {
            debug!(
                target: CACHE_TARGET,
                destination = %destination,
                "destination appeared during the move; keeping the existing entry"
            );
            Ok(InstallOutcome::InstalledByPeer)
        }
        Err(err) => Err(Report::new(err)
            .wrap_err(format!("failed to move {staged} onto {destination}"))
            .into()),
    }
}

/// Copies `staged` over `destination`, replacing any existing file.
pub(super) fn copy_fallback(staged: &Utf8Path, destination: &Utf8Path) -> InstallResult<()> {
    fs::copy(staged, destination)
        .with_context(|| format!("failed to copy {staged} onto {destination}"))?;
    Ok(())
}

pub(super) fn is_cross_device(err: &io::Error) -> bool {
    err.kind() == ErrorKind::CrossesDevices
}
