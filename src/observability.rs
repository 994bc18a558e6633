//! Shared tracing configuration for observability instrumentation.
//!
//! Centralises the log targets used by the crate so subscribers can filter
//! cache, formatter and CLI events without pulling in unrelated application logs.

/// Target used by cache installation events.
pub(crate) const CACHE_TARGET: &str = "native_format::cache";

/// Target used by formatter subprocess spans and events.
pub(crate) const FORMATTER_TARGET: &str = "native_format::formatter";

/// Target used by command-line front end events.
pub(crate) const CLI_TARGET: &str = "native_format::cli";
