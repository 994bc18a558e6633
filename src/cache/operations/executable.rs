//! Execute permission helper for freshly downloaded artifacts.
//!
//! [`install`](crate::cache::install) copies bytes and permissions verbatim. Callers
//! whose download lacks the execute bit run this on the source before
//! installing, or on the destination they own.

use camino::Utf8Path;
use color_eyre::eyre::Context;
use tracing::debug;

use crate::error::InstallResult;
use crate::observability::CACHE_TARGET;

/// Adds owner, group and other execute bits to `path`.
///
/// Existing permission bits are preserved. On non-Unix platforms this is a
/// no-op.
///
/// # Errors
///
/// Returns an error if the file's metadata cannot be read or its permissions
/// cannot be updated.
#[cfg(unix)]
pub fn make_executable(path: &Utf8Path) -> InstallResult<()> {
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = fs::metadata(path)
        .with_context(|| format!("failed to read permissions of {path}"))?
        .permissions();
    let mode = permissions.mode() | 0o111;
    permissions.set_mode(mode);
    fs::set_permissions(path, permissions)
        .with_context(|| format!("failed to set execute permissions on {path}"))?;
    debug!(target: CACHE_TARGET, path = %path, mode = format_args!("{mode:o}"), "marked executable");
    Ok(())
}

/// Adds owner, group and other execute bits to `path`.
///
/// Existing permission bits are preserved. On non-Unix platforms this is a
/// no-op.
///
/// # Errors
///
/// Returns an error if `path` does not exist.
#[cfg(not(unix))]
pub fn make_executable(path: &Utf8Path) -> InstallResult<()> {
    std::fs::metadata(path).with_context(|| format!("failed to read metadata of {path}"))?;
    debug!(target: CACHE_TARGET, path = %path, "execute bits not applicable on this platform");
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::tempdir;

    #[test]
    fn adds_execute_bits_and_keeps_existing_ones() {
        let temp = tempdir().expect("tempdir");
        let dir = Utf8Path::from_path(temp.path()).expect("utf8 path");
        let path = dir.join("formatter.bin");
        fs::write(&path, b"#!/bin/sh\n").expect("write binary");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o640)).expect("chmod");

        make_executable(&path).expect("make executable");

        let mode = fs::metadata(&path).expect("metadata").permissions().mode() & 0o777;
        assert_eq!(mode, 0o751);
    }

    #[test]
    fn missing_file_is_an_error() {
        let temp = tempdir().expect("tempdir");
        let dir = Utf8Path::from_path(temp.path()).expect("utf8 path");

        let err = make_executable(&dir.join("absent")).expect_err("missing file");
        assert!(err.to_string().contains("failed to read permissions"));
    }
}
