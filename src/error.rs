//! Domain error types for the formatter cache and subprocess client.

use color_eyre::Report;
use thiserror::Error;

/// Result alias for operations that may return a [`NativeFormatError`].
pub type Result<T> = std::result::Result<T, NativeFormatError>;

/// Result alias for cache installation.
pub type InstallResult<T> = std::result::Result<T, InstallError>;

/// Result alias for formatter invocations.
pub type FormatResult<T> = std::result::Result<T, FormatError>;

/// Result alias for configuration fallible operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Top-level error exposed by the crate.
#[derive(Debug, Error)]
pub enum NativeFormatError {
    /// Installing the formatter binary into the cache failed.
    #[error("cache installation failed")]
    Install(#[from] InstallError),
    /// Running the formatter binary failed.
    #[error("formatting failed")]
    Format(#[from] FormatError),
    /// Loading configuration failed.
    #[error("configuration parsing failed")]
    Config(#[from] ConfigError),
}

/// Captures I/O failures raised while installing a cache entry.
///
/// The report always names the destination path. Races with other installers
/// are never reported through this type; they resolve to an
/// [`InstallOutcome`](crate::cache::InstallOutcome) instead.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct InstallError(#[from] Report);

impl InstallError {
    /// Extracts the underlying diagnostic report.
    pub fn into_report(self) -> Report {
        self.0
    }
}

/// Categorises formatter failures so callers can branch on structured errors.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum FormatErrorKind {
    /// The binary could not be spawned: missing, not executable, or refused
    /// by the operating system.
    Launch,
    /// Writing the document to stdin or draining the child's output failed.
    Io,
    /// The binary exited unsuccessfully. `code` is `None` when the process
    /// was terminated by a signal.
    NonZeroExit {
        /// Exit code reported by the operating system.
        code: Option<i32>,
    },
    /// The binary's output could not be decoded.
    Decode,
    /// The binary overran the configured timeout and was killed.
    Timeout,
}

/// Captures formatter failures.
#[derive(Debug, Error)]
#[error("{report}")]
pub struct FormatError {
    kind: FormatErrorKind,
    #[source]
    report: Report,
}

impl FormatError {
    /// Constructs a new formatter error with the provided kind and diagnostic
    /// report.
    #[must_use]
    pub const fn new(kind: FormatErrorKind, report: Report) -> Self {
        Self { kind, report }
    }

    /// Returns the semantic category for this failure.
    #[must_use]
    pub const fn kind(&self) -> FormatErrorKind {
        self.kind
    }

    /// Returns the exit code when the failure was an unsuccessful exit.
    #[must_use]
    pub const fn exit_code(&self) -> Option<i32> {
        match self.kind {
            FormatErrorKind::NonZeroExit { code } => code,
            _ => None,
        }
    }

    /// Extracts the underlying diagnostic report.
    pub fn into_report(self) -> Report {
        self.report
    }
}

/// Captures configuration failures.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct ConfigError(#[from] Report);

#[cfg(test)]
mod tests {
    use super::*;
    use color_eyre::eyre::eyre;

    #[test]
    fn exit_code_is_only_reported_for_non_zero_exits() {
        let exited = FormatError::new(
            FormatErrorKind::NonZeroExit { code: Some(3) },
            eyre!("boom"),
        );
        assert_eq!(exited.exit_code(), Some(3));

        let decode = FormatError::new(FormatErrorKind::Decode, eyre!("bad json"));
        assert_eq!(decode.exit_code(), None);
    }

    #[test]
    fn format_error_displays_its_report_and_keeps_its_kind() {
        let err = FormatError::new(FormatErrorKind::Timeout, eyre!("formatter timed out"));
        assert_eq!(err.kind(), FormatErrorKind::Timeout);
        assert_eq!(err.to_string(), "formatter timed out");
        assert_eq!(err.into_report().to_string(), "formatter timed out");
    }

    #[test]
    fn top_level_error_wraps_install_failures() {
        let err = NativeFormatError::from(InstallError::from(eyre!("disk full")));
        assert!(matches!(err, NativeFormatError::Install(_)));
        assert_eq!(err.to_string(), "cache installation failed");
    }
}
