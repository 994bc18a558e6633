//! Request and response records for the formatter binary's command line.
//!
//! Encoding and decoding are pure functions so the protocol can be exercised
//! without spawning a process.
//!
//! Offsets count UTF-16 code units of the document, which is how the
//! formatter binary indexes strings.

use camino::Utf8Path;
use color_eyre::eyre::Report;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::replacements::validate_order;
use crate::error::{FormatError, FormatErrorKind, FormatResult};

/// Flag introducing the comma-separated range list.
pub const CHARACTER_RANGES_FLAG: &str = "--character-ranges";
/// Flag selecting structured replacement output.
pub const OUTPUT_REPLACEMENTS_FLAG: &str = "--output-replacements";
/// Flag selecting the house formatting style.
pub const STYLE_FLAG: &str = "--palantir";
/// Trailing argument telling the binary to read stdin and write stdout.
pub const STDIN_SENTINEL: &str = "-";

/// Half-open `[start, end)` range of UTF-16 offsets into a document.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct CharacterRange {
    /// Inclusive start offset.
    pub start: usize,
    /// Exclusive end offset.
    pub end: usize,
}

impl CharacterRange {
    /// Creates a range from its bounds.
    #[must_use]
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Number of code units covered.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Returns true when the range covers nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

impl fmt::Display for CharacterRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start, self.end)
    }
}

impl FromStr for CharacterRange {
    type Err = String;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let (start, end) = token
            .split_once(':')
            .ok_or_else(|| format!("range `{token}` must look like <start>:<end>"))?;
        let start_offset = start
            .trim()
            .parse::<usize>()
            .map_err(|err| format!("invalid range start in `{token}`: {err}"))?;
        let end_offset = end
            .trim()
            .parse::<usize>()
            .map_err(|err| format!("invalid range end in `{token}`: {err}"))?;
        if end_offset < start_offset {
            return Err(format!("range `{token}` ends before it starts"));
        }
        Ok(Self::new(start_offset, end_offset))
    }
}

/// What the binary should write to stdout.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub enum ResponseMode {
    /// The whole rewritten document.
    #[default]
    FullText,
    /// A JSON list of minimal edits.
    Replacements,
}

/// Immutable description of one formatting call.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct FormatRequest {
    document: String,
    ranges: Vec<CharacterRange>,
    mode: ResponseMode,
}

impl FormatRequest {
    /// Requests the full rewritten document.
    #[must_use]
    pub fn full_text(document: impl Into<String>) -> Self {
        Self {
            document: document.into(),
            ranges: Vec::new(),
            mode: ResponseMode::FullText,
        }
    }

    /// Requests replacements restricted to `ranges`.
    #[must_use]
    pub fn replacements(document: impl Into<String>, ranges: Vec<CharacterRange>) -> Self {
        Self {
            document: document.into(),
            ranges,
            mode: ResponseMode::Replacements,
        }
    }

    /// Restricts formatting to `ranges`, preserving their order.
    #[must_use]
    pub fn with_ranges(mut self, ranges: Vec<CharacterRange>) -> Self {
        self.ranges = ranges;
        self
    }

    /// Document to format.
    #[must_use]
    pub fn document(&self) -> &str {
        &self.document
    }

    /// Ranges in caller order.
    #[must_use]
    pub fn ranges(&self) -> &[CharacterRange] {
        &self.ranges
    }

    /// Requested response mode.
    #[must_use]
    pub const fn mode(&self) -> ResponseMode {
        self.mode
    }
}

/// A minimal edit: replace `range` of the original document with
/// `replacement`.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Replacement {
    /// Range in the original document.
    pub range: CharacterRange,
    /// Literal replacement text.
    pub replacement: String,
}

impl Replacement {
    /// Creates a replacement.
    #[must_use]
    pub fn new(range: CharacterRange, replacement: impl Into<String>) -> Self {
        Self {
            range,
            replacement: replacement.into(),
        }
    }
}

/// Decoded output of one formatting call.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum FormatResponse {
    /// The whole rewritten document.
    Text(String),
    /// Sorted, non-overlapping edits against the original document.
    Replacements(Vec<Replacement>),
}

/// Builds the argument vector for `request`, starting with `binary` itself.
///
/// # Examples
///
/// ```
/// use camino::Utf8Path;
/// use native_format_cache::formatter::{CharacterRange, FormatRequest, encode_args};
///
/// let request = FormatRequest::replacements(
///     "class A {}",
///     vec![CharacterRange::new(10, 20), CharacterRange::new(30, 40)],
/// );
/// let args = encode_args(Utf8Path::new("/cache/formatter.bin"), &request);
/// assert_eq!(
///     args,
///     [
///         "/cache/formatter.bin",
///         "--character-ranges",
///         "10:20,30:40",
///         "--output-replacements",
///         "--palantir",
///         "-",
///     ]
/// );
/// ```
#[must_use]
pub fn encode_args(binary: &Utf8Path, request: &FormatRequest) -> Vec<String> {
    let mut args = vec![binary.to_string()];
    if !request.ranges.is_empty() {
        args.push(CHARACTER_RANGES_FLAG.to_owned());
        args.push(join_ranges(&request.ranges));
    }
    if request.mode == ResponseMode::Replacements {
        args.push(OUTPUT_REPLACEMENTS_FLAG.to_owned());
    }
    args.push(STYLE_FLAG.to_owned());
    args.push(STDIN_SENTINEL.to_owned());
    args
}

fn join_ranges(ranges: &[CharacterRange]) -> String {
    ranges
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Decodes stdout of a successful run according to `request`'s mode.
///
/// # Errors
///
/// Returns a [`FormatErrorKind::Decode`] error when the output is not valid
/// UTF-8, is not a replacement list, or lists replacements out of order.
pub fn decode_response(request: &FormatRequest, stdout: &[u8]) -> FormatResult<FormatResponse> {
    match request.mode {
        ResponseMode::FullText => decode_text(request.document(), stdout).map(FormatResponse::Text),
        ResponseMode::Replacements => decode_replacements(stdout).map(FormatResponse::Replacements),
    }
}

/// Decodes full-text output; empty output means the document is unchanged.
///
/// # Errors
///
/// Returns a [`FormatErrorKind::Decode`] error when the output is not UTF-8.
pub fn decode_text(document: &str, stdout: &[u8]) -> FormatResult<String> {
    if stdout.is_empty() {
        return Ok(document.to_owned());
    }
    String::from_utf8(stdout.to_vec()).map_err(|err| {
        decode_error(Report::new(err).wrap_err("formatter output is not valid UTF-8"))
    })
}

/// Decodes a JSON replacement list; empty output means no replacements.
///
/// # Errors
///
/// Returns a [`FormatErrorKind::Decode`] error when the output is malformed
/// or the replacements are unsorted or overlapping.
pub fn decode_replacements(stdout: &[u8]) -> FormatResult<Vec<Replacement>> {
    if stdout.is_empty() {
        return Ok(Vec::new());
    }
    let replacements: Vec<Replacement> = serde_json::from_slice(stdout).map_err(|err| {
        decode_error(Report::new(err).wrap_err("failed to parse formatter replacements"))
    })?;
    validate_order(&replacements)?;
    Ok(replacements)
}

pub(super) fn decode_error(report: Report) -> FormatError {
    FormatError::new(FormatErrorKind::Decode, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const BINARY: &str = "/opt/formatter/formatter.bin";

    #[rstest]
    #[case(FormatRequest::full_text("x"), &[BINARY, "--palantir", "-"][..])]
    #[case(
        FormatRequest::replacements("x", Vec::new()),
        &[BINARY, "--output-replacements", "--palantir", "-"][..]
    )]
    #[case(
        FormatRequest::full_text("x").with_ranges(vec![CharacterRange::new(0, 1)]),
        &[BINARY, "--character-ranges", "0:1", "--palantir", "-"][..]
    )]
    fn encode_args_layout(#[case] request: FormatRequest, #[case] expected: &[&str]) {
        assert_eq!(encode_args(Utf8Path::new(BINARY), &request), expected);
    }

    #[test]
    fn ranges_keep_caller_order() {
        let request = FormatRequest::replacements(
            "",
            vec![
                CharacterRange::new(30, 40),
                CharacterRange::new(10, 20),
            ],
        );
        let args = encode_args(Utf8Path::new(BINARY), &request);
        let flag_count = args.iter().filter(|arg| *arg == CHARACTER_RANGES_FLAG).count();
        assert_eq!(flag_count, 1);
        assert_eq!(args.get(2).map(String::as_str), Some("30:40,10:20"));
    }

    #[rstest]
    #[case("10:20", Ok(CharacterRange::new(10, 20)))]
    #[case(" 3 : 7 ", Ok(CharacterRange::new(3, 7)))]
    #[case("5", Err(()))]
    #[case("9:2", Err(()))]
    #[case("a:2", Err(()))]
    fn parse_range_tokens(#[case] token: &str, #[case] expected: Result<CharacterRange, ()>) {
        assert_eq!(token.parse::<CharacterRange>().map_err(|_| ()), expected);
    }

    #[test]
    fn empty_full_text_output_returns_input() {
        let request = FormatRequest::full_text("class A {}\n");
        let response = decode_response(&request, b"").expect("decode");
        assert_eq!(response, FormatResponse::Text("class A {}\n".to_owned()));
    }

    #[test]
    fn full_text_output_is_used_verbatim() {
        let request = FormatRequest::full_text("class A{}");
        let response = decode_response(&request, b"class A {}\n").expect("decode");
        assert_eq!(response, FormatResponse::Text("class A {}\n".to_owned()));
    }

    #[test]
    fn empty_replacement_output_means_no_edits() {
        let request = FormatRequest::replacements("class A{}", Vec::new());
        let response = decode_response(&request, b"").expect("decode");
        assert_eq!(response, FormatResponse::Replacements(Vec::new()));
    }

    #[test]
    fn replacement_records_are_parsed() {
        let stdout = br#"[
            {"range": {"start": 7, "end": 7}, "replacement": " "},
            {"range": {"start": 8, "end": 9}, "replacement": " }\n"}
        ]"#;
        let replacements = decode_replacements(stdout).expect("decode");
        assert_eq!(
            replacements,
            vec![
                Replacement::new(CharacterRange::new(7, 7), " "),
                Replacement::new(CharacterRange::new(8, 9), " }\n"),
            ]
        );
    }

    #[rstest]
    #[case(&b"not json"[..])]
    #[case(&br#"[{"range": {"start": 1}, "replacement": "x"}]"#[..])]
    #[case(&br#"{"range": {"start": 1, "end": 2}, "replacement": "x"}"#[..])]
    fn malformed_replacements_are_decode_errors(#[case] stdout: &[u8]) {
        let err = decode_replacements(stdout).expect_err("malformed output");
        assert_eq!(err.kind(), FormatErrorKind::Decode);
    }

    #[test]
    fn invalid_utf8_text_is_a_decode_error() {
        let err = decode_text("x", &[0xff, 0xfe]).expect_err("invalid utf8");
        assert_eq!(err.kind(), FormatErrorKind::Decode);
    }
}
