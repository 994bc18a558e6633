//! Configuration for the shared formatter cache.
//!
//! Resolves the cache directory from environment variables with XDG-compliant
//! fallback paths.

use camino::{Utf8Path, Utf8PathBuf};
use std::path::PathBuf;

use super::coordinates::ArtifactCoordinates;

/// Environment variable overriding the cache root.
pub const CACHE_DIR_ENV: &str = "NATIVE_FORMAT_CACHE_DIR";

/// Subdirectory path within the XDG cache home.
const CACHE_SUBDIR: &str = "native-format/binaries";

/// Configuration for the shared formatter cache.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CacheConfig {
    /// Root directory holding cached binaries and their lock files.
    pub cache_dir: Utf8PathBuf,
}

impl CacheConfig {
    /// Creates a new cache configuration using the resolved cache directory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cache_dir: resolve_cache_dir(),
        }
    }

    /// Creates a cache configuration with a custom directory.
    #[must_use]
    pub const fn with_dir(cache_dir: Utf8PathBuf) -> Self {
        Self { cache_dir }
    }

    /// Destination of the binary identified by `coordinates`.
    #[must_use]
    pub fn destination(&self, coordinates: &ArtifactCoordinates) -> Utf8PathBuf {
        self.cache_dir.join(coordinates.file_name())
    }

    /// Destination for `source`, keyed by the source artifact's file name.
    ///
    /// Returns `None` when `source` has no file name component.
    #[must_use]
    pub fn destination_for(&self, source: &Utf8Path) -> Option<Utf8PathBuf> {
        destination_for(&self.cache_dir, source)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns the cache destination for `source` inside `cache_dir`.
///
/// # Examples
///
/// ```
/// use camino::Utf8Path;
/// use native_format_cache::cache::destination_for;
///
/// let dest = destination_for(
///     Utf8Path::new("/home/dev/.cache/native-format/binaries"),
///     Utf8Path::new("/downloads/formatter-2.50.0.bin"),
/// );
/// assert_eq!(
///     dest.as_deref(),
///     Some(Utf8Path::new("/home/dev/.cache/native-format/binaries/formatter-2.50.0.bin"))
/// );
/// ```
#[must_use]
pub fn destination_for(cache_dir: &Utf8Path, source: &Utf8Path) -> Option<Utf8PathBuf> {
    source.file_name().map(|name| cache_dir.join(name))
}

/// Resolves the cache directory from environment and XDG conventions.
///
/// The resolution order is:
///
/// 1. `NATIVE_FORMAT_CACHE_DIR` if set, non-blank and valid UTF-8
/// 2. `$XDG_CACHE_HOME/native-format/binaries` if `XDG_CACHE_HOME` is set
/// 3. `~/.cache/native-format/binaries`
/// 4. `native-format/binaries` under the system temporary directory
#[must_use]
pub fn resolve_cache_dir() -> Utf8PathBuf {
    resolve_from_env()
        .or_else(resolve_from_xdg_cache)
        .or_else(resolve_from_home)
        .unwrap_or_else(resolve_from_temp)
}

fn non_blank_env(key: &str) -> Option<Utf8PathBuf> {
    let raw = std::env::var(key).ok()?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Utf8PathBuf::from_path_buf(PathBuf::from(trimmed)).ok()
}

fn resolve_from_env() -> Option<Utf8PathBuf> {
    non_blank_env(CACHE_DIR_ENV)
}

fn resolve_from_xdg_cache() -> Option<Utf8PathBuf> {
    non_blank_env("XDG_CACHE_HOME").map(|path| path.join(CACHE_SUBDIR))
}

fn resolve_from_home() -> Option<Utf8PathBuf> {
    let home = dirs::home_dir()?;
    let path = Utf8PathBuf::from_path_buf(home).ok()?;
    Some(path.join(".cache").join(CACHE_SUBDIR))
}

fn resolve_from_temp() -> Utf8PathBuf {
    let temp = Utf8PathBuf::from_path_buf(std::env::temp_dir())
        .unwrap_or_else(|_| Utf8PathBuf::from("/tmp"));
    temp.join(CACHE_SUBDIR)
}
