//! Installs an ahead-of-time compiled formatter binary into a per-user cache
//! and drives it as a subprocess.
//!
//! The [`cache`] module materialises a binary at a stable path exactly once,
//! even when many processes race to do so. The [`formatter`] module spawns
//! the installed binary per request and decodes its output into either the
//! rewritten document or a list of minimal replacements.

pub mod cache;
mod cli;
mod error;
pub mod formatter;
mod observability;
mod settings;
#[doc(hidden)]
pub mod test_support;

pub use cache::{InstallOutcome, Installation, install};
pub use cli::{Cli, Command, FormatArgs, InstallArgs, execute, run};
pub use error::{
    ConfigError, ConfigResult, FormatError, FormatErrorKind, FormatResult, InstallError,
    InstallResult, NativeFormatError, Result,
};
pub use formatter::{FormatterService, NativeFormatter};
pub use settings::FormatSettings;
