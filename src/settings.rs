//! Layered settings for the cache and formatter client.

use camino::{Utf8Path, Utf8PathBuf};
use color_eyre::eyre::eyre;
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::time::Duration;

use crate::cache::{CacheConfig, destination_for, resolve_cache_dir};
use crate::error::{ConfigError, ConfigResult};
use crate::formatter::FormatterOptions;

/// Settings supplied via `NATIVE_FORMAT_*` environment variables or config
/// files.
///
/// # Examples
/// ```
/// use native_format_cache::FormatSettings;
///
/// let settings = FormatSettings::default();
/// assert!(settings.timeout_secs.is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, OrthoConfig, Default, Eq, PartialEq)]
#[ortho_config(prefix = "NATIVE_FORMAT")]
pub struct FormatSettings {
    /// Root of the shared binary cache.
    pub cache_dir: Option<Utf8PathBuf>,
    /// Downloaded formatter artifact to install into the cache.
    pub source: Option<Utf8PathBuf>,
    /// Installed formatter binary; overrides the cache lookup.
    pub binary: Option<Utf8PathBuf>,
    /// Per-call formatter timeout in seconds. Unset waits indefinitely.
    pub timeout_secs: Option<u64>,
}

impl FormatSettings {
    /// Loads settings from the environment and config files without parsing
    /// CLI arguments.
    ///
    /// # Errors
    ///
    /// Returns an error when a configured value cannot be parsed.
    pub fn load() -> ConfigResult<Self> {
        let args = [OsString::from("native-format")];
        Self::load_from_iter(args).map_err(|err| ConfigError::from(eyre!(err)))
    }

    /// Cache configuration, falling back to the resolved default root.
    #[must_use]
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::with_dir(self.cache_dir.clone().unwrap_or_else(resolve_cache_dir))
    }

    /// Formatter options derived from these settings.
    #[must_use]
    pub fn formatter_options(&self) -> FormatterOptions {
        FormatterOptions {
            timeout: self.timeout_secs.map(Duration::from_secs),
        }
    }

    /// Where the installed binary lives: the explicit `binary` when set,
    /// otherwise the cache destination of `source`.
    ///
    /// # Errors
    ///
    /// Returns an error when neither is configured, or `source` has no file
    /// name.
    pub fn installed_binary(&self) -> ConfigResult<Utf8PathBuf> {
        if let Some(binary) = &self.binary {
            return Ok(binary.clone());
        }
        let source = self.source.as_deref().ok_or_else(|| {
            ConfigError::from(eyre!(
                "no formatter binary configured; set NATIVE_FORMAT_BINARY or NATIVE_FORMAT_SOURCE"
            ))
        })?;
        self.destination_of(source)
    }

    /// Cache destination for `source` under the configured cache root.
    ///
    /// # Errors
    ///
    /// Returns an error when `source` has no file name.
    pub fn destination_of(&self, source: &Utf8Path) -> ConfigResult<Utf8PathBuf> {
        destination_for(&self.cache_config().cache_dir, source).ok_or_else(|| {
            ConfigError::from(eyre!("formatter source {source} has no file name"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> FormatSettings {
        FormatSettings {
            cache_dir: Some(Utf8PathBuf::from("/cache")),
            source: Some(Utf8PathBuf::from("/downloads/formatter-2.50.0.bin")),
            binary: None,
            timeout_secs: Some(20),
        }
    }

    #[test]
    fn installed_binary_defaults_to_cache_destination() {
        assert_eq!(
            settings().installed_binary().expect("binary"),
            Utf8PathBuf::from("/cache/formatter-2.50.0.bin")
        );
    }

    #[test]
    fn explicit_binary_wins() {
        let cfg = FormatSettings {
            binary: Some(Utf8PathBuf::from("/opt/fmt")),
            ..settings()
        };
        assert_eq!(
            cfg.installed_binary().expect("binary"),
            Utf8PathBuf::from("/opt/fmt")
        );
    }

    #[test]
    fn missing_binary_and_source_is_an_error() {
        let err = FormatSettings::default()
            .installed_binary()
            .expect_err("nothing configured");
        assert!(err.to_string().contains("NATIVE_FORMAT_BINARY"));
    }

    #[test]
    fn timeout_maps_to_formatter_options() {
        assert_eq!(
            settings().formatter_options().timeout,
            Some(Duration::from_secs(20))
        );
        assert_eq!(FormatSettings::default().formatter_options().timeout, None);
    }
}
