//! Shell-script stand-ins for the formatter binary.

use camino::{Utf8Path, Utf8PathBuf};
use color_eyre::eyre::{Context, Result, eyre};
use std::fs;
use tempfile::TempDir;

/// Creates a temporary directory whose path is valid UTF-8.
///
/// # Errors
///
/// Returns an error when the directory cannot be created or its path is not
/// UTF-8.
pub fn utf8_temp_dir() -> Result<(TempDir, Utf8PathBuf)> {
    let dir = tempfile::tempdir().context("create temporary directory")?;
    let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf())
        .map_err(|path| eyre!("temporary path is not UTF-8: {}", path.display()))?;
    Ok((dir, path))
}

/// Writes an executable `/bin/sh` script named `name` into `dir`.
///
/// `body` is appended after the shebang line, so it can read the document
/// from stdin and inspect `"$@"` like the real binary would.
///
/// # Errors
///
/// Returns an error when the script cannot be written or made executable.
pub fn write_fake_formatter(dir: &Utf8Path, name: &str, body: &str) -> Result<Utf8PathBuf> {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n"))
        .with_context(|| format!("write fake formatter {path}"))?;
    mark_executable(&path)?;
    Ok(path)
}

#[cfg(unix)]
fn mark_executable(path: &Utf8Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = fs::metadata(path)
        .context("fake formatter metadata")?
        .permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).context("set fake formatter permissions")
}

#[cfg(not(unix))]
fn mark_executable(_path: &Utf8Path) -> Result<()> {
    Ok(())
}
