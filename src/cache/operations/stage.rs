//! Private staging area used to assemble a binary before it becomes visible.

use camino::{Utf8Path, Utf8PathBuf};
use color_eyre::eyre::{Context, eyre};
use std::fs::{self, File};
use std::io;
use tempfile::TempDir;
use tracing::debug;

use crate::error::InstallResult;
use crate::observability::CACHE_TARGET;

/// Prefix of staging directory names; lets leftovers from crashed installs be
/// recognised next to cache entries.
pub(crate) const STAGING_PREFIX: &str = ".staging-";

/// File name used for the staged copy when the source has none.
const FALLBACK_STAGED_NAME: &str = "artifact";

/// Temporary directory owned by one install attempt.
#[derive(Debug)]
pub(super) struct StagingArea {
    dir: TempDir,
    path: Utf8PathBuf,
}

impl StagingArea {
    /// Creates a fresh staging directory under `root`.
    pub(super) fn create(root: &Utf8Path) -> InstallResult<Self> {
        let dir = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(root)
            .with_context(|| format!("failed to create staging directory in {root}"))?;
        let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).map_err(|path| {
            eyre!("staging directory is not valid UTF-8: {}", path.display())
        })?;
        debug!(target: CACHE_TARGET, staging = %path, "created staging directory");
        Ok(Self { dir, path })
    }

    /// Copies `source` into the staging area and flushes it to disk.
    ///
    /// Returns the path of the staged file.
    pub(super) fn stage(&self, source: &Utf8Path) -> InstallResult<Utf8PathBuf> {
        let staged = self
            .path
            .join(source.file_name().unwrap_or(FALLBACK_STAGED_NAME));
        copy_and_sync(source, &staged)
            .with_context(|| format!("failed to stage {source} at {staged}"))?;
        debug!(
            target: CACHE_TARGET,
            source = %source,
            staged = %staged,
            "staged formatter binary"
        );
        Ok(staged)
    }

    /// Removes the staging directory and everything left inside it.
    pub(super) fn remove(self) -> InstallResult<()> {
        let Self { dir, path } = self;
        dir.close()
            .with_context(|| format!("failed to remove staging directory {path}"))?;
        Ok(())
    }
}

fn copy_and_sync(source: &Utf8Path, staged: &Utf8Path) -> io::Result<()> {
    fs::copy(source, staged)?;
    File::open(staged)?.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn stage_copies_source_bytes() {
        let temp = tempdir().expect("tempdir");
        let root = Utf8Path::from_path(temp.path()).expect("utf8 path");
        let source = root.join("formatter.bin");
        fs::write(&source, b"BINARYDATA").expect("write source");

        let staging = StagingArea::create(root).expect("create staging");
        let staged = staging.stage(&source).expect("stage");

        assert_eq!(staged.file_name(), Some("formatter.bin"));
        assert_eq!(fs::read(&staged).expect("read staged"), b"BINARYDATA");
        staging.remove().expect("remove staging");
        assert!(!staged.exists());
    }

    #[test]
    fn staging_directories_carry_the_prefix() {
        let temp = tempdir().expect("tempdir");
        let root = Utf8Path::from_path(temp.path()).expect("utf8 path");

        let staging = StagingArea::create(root).expect("create staging");
        let name = staging.path.file_name().expect("staging name").to_owned();

        assert!(name.starts_with(STAGING_PREFIX));
        staging.remove().expect("remove staging");
    }

    #[test]
    fn staging_a_missing_source_fails() {
        let temp = tempdir().expect("tempdir");
        let root = Utf8Path::from_path(temp.path()).expect("utf8 path");

        let staging = StagingArea::create(root).expect("create staging");
        let err = staging
            .stage(&root.join("missing.bin"))
            .expect_err("missing source must fail");

        assert!(err.to_string().contains("failed to stage"));
    }
}
