//! Applying replacement lists to the document they were computed against.

use color_eyre::eyre::eyre;

use super::protocol::{Replacement, decode_error};
use crate::error::FormatResult;

/// Checks that replacements are sorted by start offset and do not overlap.
///
/// # Errors
///
/// Returns a decode error naming the first offending pair.
pub(super) fn validate_order(replacements: &[Replacement]) -> FormatResult<()> {
    for edit in replacements {
        if edit.range.end < edit.range.start {
            return Err(decode_error(eyre!(
                "replacement range {} ends before it starts",
                edit.range
            )));
        }
    }
    for pair in replacements.windows(2) {
        if let [previous, next] = pair
            && next.range.start < previous.range.end
        {
            return Err(decode_error(eyre!(
                "replacement ranges {} and {} overlap or are out of order",
                previous.range,
                next.range
            )));
        }
    }
    Ok(())
}

/// Applies `replacements` to `document`, the text they were computed against.
///
/// Ranges refer to the original document, so each edit is placed after
/// accounting for the length change of every edit before it. The result
/// equals the full-text output the binary would produce for the same
/// request.
///
/// # Errors
///
/// Returns a decode error when replacements are unsorted or overlapping,
/// extend past the end of the document, or split a surrogate pair.
///
/// # Examples
///
/// ```
/// use native_format_cache::formatter::{CharacterRange, Replacement, apply_replacements};
///
/// let formatted = apply_replacements(
///     "class A{int x;}",
///     &[
///         Replacement::new(CharacterRange::new(7, 7), " "),
///         Replacement::new(CharacterRange::new(8, 8), "\n    "),
///         Replacement::new(CharacterRange::new(14, 14), "\n"),
///     ],
/// )?;
/// assert_eq!(formatted, "class A {\n    int x;\n}");
/// # Ok::<(), native_format_cache::FormatError>(())
/// ```
pub fn apply_replacements(document: &str, replacements: &[Replacement]) -> FormatResult<String> {
    validate_order(replacements)?;
    let units: Vec<u16> = document.encode_utf16().collect();
    let mut output: Vec<u16> = Vec::with_capacity(units.len());
    let mut cursor = 0;
    for edit in replacements {
        let kept = units.get(cursor..edit.range.start).ok_or_else(|| {
            decode_error(eyre!(
                "replacement range {} exceeds document length {}",
                edit.range,
                units.len()
            ))
        })?;
        if edit.range.end > units.len() {
            return Err(decode_error(eyre!(
                "replacement range {} exceeds document length {}",
                edit.range,
                units.len()
            )));
        }
        output.extend_from_slice(kept);
        output.extend(edit.replacement.encode_utf16());
        cursor = edit.range.end;
    }
    output.extend_from_slice(units.get(cursor..).unwrap_or_default());
    String::from_utf16(&output)
        .map_err(|err| decode_error(eyre!("replacements split a surrogate pair: {err}")))
}
