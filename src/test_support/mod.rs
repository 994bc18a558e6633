//! Internal helpers re-exported for integration tests.
//!
//! Exposes log capture for asserting on tracing output and a writer for
//! shell-script stand-ins of the formatter binary.

mod fake_formatter;
mod logging;

pub use fake_formatter::{utf8_temp_dir, write_fake_formatter};
pub use logging::capture_logs;
