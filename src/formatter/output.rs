//! Output truncation and error rendering for formatter subprocesses.

use color_eyre::eyre::eyre;
use std::borrow::Cow;

use super::runner::CapturedOutput;
use crate::error::{FormatError, FormatErrorKind};

pub(super) const OUTPUT_CHAR_LIMIT: usize = 2_048;
pub(super) const TRUNCATION_SUFFIX: &str = "… [truncated]";

/// Builds an error carrying the child's truncated stdout and stderr.
pub(super) fn render_failure(
    kind: FormatErrorKind,
    context: &str,
    output: &CapturedOutput,
) -> FormatError {
    let stdout = truncate_output(String::from_utf8_lossy(&output.stdout));
    let stderr = truncate_output(String::from_utf8_lossy(&output.stderr));
    FormatError::new(kind, eyre!("{context}\nstdout: {stdout}\nstderr: {stderr}"))
}

pub(super) fn truncate_output(text: Cow<'_, str>) -> String {
    let mut out = String::with_capacity(OUTPUT_CHAR_LIMIT + TRUNCATION_SUFFIX.len());
    let mut chars = text.chars();
    for _ in 0..OUTPUT_CHAR_LIMIT {
        match chars.next() {
            Some(ch) => out.push(ch),
            None => return text.into_owned(),
        }
    }

    if chars.next().is_none() {
        return text.into_owned();
    }

    out.push_str(TRUNCATION_SUFFIX);
    out
}
