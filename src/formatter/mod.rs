//! Client for the out-of-process formatter binary.
//!
//! Each call spawns the installed binary, writes the document to its stdin,
//! and decodes stdout as either the rewritten document or a JSON list of
//! replacements. Calls share no state and may run concurrently from any
//! number of threads.

mod output;
mod protocol;
mod replacements;
mod runner;

pub use protocol::{
    CHARACTER_RANGES_FLAG, CharacterRange, FormatRequest, FormatResponse,
    OUTPUT_REPLACEMENTS_FLAG, Replacement, ResponseMode, STDIN_SENTINEL, STYLE_FLAG,
    decode_replacements, decode_response, decode_text, encode_args,
};
pub use replacements::apply_replacements;
pub use runner::{CapturedOutput, Invocation, ProcessRunner, SubprocessRunner};

use camino::{Utf8Path, Utf8PathBuf};
use color_eyre::eyre::{Report, eyre};
use std::time::Duration;
use tracing::{debug, info_span};

use self::output::render_failure;
use crate::error::{FormatError, FormatErrorKind, FormatResult};
use crate::observability::FORMATTER_TARGET;

/// Formatting entry points shared by every formatter implementation.
pub trait FormatterService {
    /// Computes minimal edits that format `ranges` of `document`.
    ///
    /// An empty `ranges` slice formats the whole document.
    ///
    /// # Errors
    ///
    /// Returns an error when the formatter fails or its output is malformed.
    fn format_replacements(
        &self,
        document: &str,
        ranges: &[CharacterRange],
    ) -> FormatResult<Vec<Replacement>>;

    /// Formats the whole document, reflowing strings and fixing imports.
    ///
    /// # Errors
    ///
    /// Returns an error when the formatter fails or its output is malformed.
    fn format_full(&self, document: &str) -> FormatResult<String>;

    /// Fixes imports in `document`.
    ///
    /// # Errors
    ///
    /// Returns an error when the formatter fails or its output is malformed.
    fn fix_imports(&self, document: &str) -> FormatResult<String>;
}

/// Per-call execution options.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct FormatterOptions {
    /// Kill the binary if a call runs longer than this. `None` waits
    /// indefinitely and leaves hung children to the caller's own policy.
    pub timeout: Option<Duration>,
}

/// Formatter backed by an installed binary.
///
/// # Examples
///
/// ```no_run
/// use native_format_cache::formatter::{FormatterService, NativeFormatter};
///
/// let formatter = NativeFormatter::new("/home/dev/.cache/native-format/binaries/formatter.bin")?;
/// let formatted = formatter.format_full("class A{}")?;
/// # let _ = formatted;
/// # Ok::<(), native_format_cache::FormatError>(())
/// ```
#[derive(Debug, Clone)]
pub struct NativeFormatter<R = SubprocessRunner> {
    binary: Utf8PathBuf,
    runner: R,
    options: FormatterOptions,
}

impl NativeFormatter<SubprocessRunner> {
    /// Creates a formatter that spawns `binary` for every call.
    ///
    /// # Errors
    ///
    /// Returns a launch error when `binary` cannot be made absolute.
    pub fn new(binary: impl AsRef<Utf8Path>) -> FormatResult<Self> {
        Self::with_runner(binary, SubprocessRunner)
    }
}

impl<R: ProcessRunner> NativeFormatter<R> {
    /// Creates a formatter that hands invocations to `runner`.
    ///
    /// # Errors
    ///
    /// Returns a launch error when `binary` cannot be made absolute.
    pub fn with_runner(binary: impl AsRef<Utf8Path>, runner: R) -> FormatResult<Self> {
        Ok(Self {
            binary: absolute(binary.as_ref())?,
            runner,
            options: FormatterOptions::default(),
        })
    }

    /// Replaces the execution options.
    #[must_use]
    pub const fn with_options(mut self, options: FormatterOptions) -> Self {
        self.options = options;
        self
    }

    /// Absolute path of the binary this formatter runs.
    #[must_use]
    pub fn binary(&self) -> &Utf8Path {
        &self.binary
    }

    /// Builds the invocation for `request` without running it.
    #[must_use]
    pub fn invocation(&self, request: &FormatRequest) -> Invocation {
        Invocation {
            args: encode_args(&self.binary, request),
            working_dir: self.binary.parent().map(Utf8Path::to_path_buf),
            stdin: request.document().as_bytes().to_vec(),
            timeout: self.options.timeout,
        }
    }

    /// Runs `request` and decodes the binary's response.
    ///
    /// # Errors
    ///
    /// Returns an error when the binary cannot be launched, exits
    /// unsuccessfully, overruns the timeout, or prints undecodable output.
    pub fn format(&self, request: &FormatRequest) -> FormatResult<FormatResponse> {
        let stdout = self.run(request)?;
        decode_response(request, &stdout)
    }

    fn run(&self, request: &FormatRequest) -> FormatResult<Vec<u8>> {
        let span = info_span!(
            target: FORMATTER_TARGET,
            "format",
            binary = %self.binary,
            mode = ?request.mode(),
            ranges = request.ranges().len(),
            document_len = request.document().len()
        );
        let _entered = span.enter();

        let output = self.runner.run(&self.invocation(request))?;
        if !output.succeeded() {
            return Err(render_failure(
                FormatErrorKind::NonZeroExit {
                    code: output.exit_code,
                },
                &exit_context(&self.binary, output.exit_code),
                &output,
            ));
        }
        debug!(
            target: FORMATTER_TARGET,
            stdout_bytes = output.stdout.len(),
            "formatter succeeded"
        );
        Ok(output.stdout)
    }

    fn run_full_text(&self, document: &str) -> FormatResult<String> {
        let request = FormatRequest::full_text(document);
        let stdout = self.run(&request)?;
        decode_text(document, &stdout)
    }
}

impl<R: ProcessRunner> FormatterService for NativeFormatter<R> {
    fn format_replacements(
        &self,
        document: &str,
        ranges: &[CharacterRange],
    ) -> FormatResult<Vec<Replacement>> {
        let request = FormatRequest::replacements(document, ranges.to_vec());
        let stdout = self.run(&request)?;
        decode_replacements(&stdout)
    }

    fn format_full(&self, document: &str) -> FormatResult<String> {
        self.run_full_text(document)
    }

    fn fix_imports(&self, document: &str) -> FormatResult<String> {
        self.run_full_text(document)
    }
}

fn exit_context(binary: &Utf8Path, code: Option<i32>) -> String {
    match code {
        Some(status) => format!("formatter {binary} exited with status {status}"),
        None => format!("formatter {binary} was terminated by a signal"),
    }
}

fn absolute(binary: &Utf8Path) -> FormatResult<Utf8PathBuf> {
    let path = std::path::absolute(binary).map_err(|err| {
        FormatError::new(
            FormatErrorKind::Launch,
            Report::new(err).wrap_err(format!("failed to resolve formatter path {binary}")),
        )
    })?;
    Utf8PathBuf::from_path_buf(path).map_err(|path| {
        FormatError::new(
            FormatErrorKind::Launch,
            eyre!("formatter path is not valid UTF-8: {}", path.display()),
        )
    })
}
