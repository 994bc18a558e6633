//! Command-line front end composing the cache installer and formatter client.

use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Context, Report, eyre};
use std::fs;
use std::io::{self, Read, Write};
use std::time::Duration;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::cache::{Installation, install, make_executable};
use crate::error::{ConfigError, FormatError, FormatErrorKind, FormatResult, Result};
use crate::formatter::{
    CharacterRange, FormatterOptions, FormatterService, NativeFormatter, apply_replacements,
};
use crate::observability::CLI_TARGET;
use crate::settings::FormatSettings;

/// Installs formatter binaries into the shared cache and formats documents
/// with them.
#[derive(Debug, Parser)]
#[command(name = "native-format", version, about)]
pub struct Cli {
    /// Operation to perform.
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands understood by the binary.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Installs a downloaded formatter into the cache and prints its path.
    Install(InstallArgs),
    /// Formats a document with an installed formatter.
    Format(FormatArgs),
}

/// Arguments for `native-format install`.
#[derive(Debug, Args)]
pub struct InstallArgs {
    /// Downloaded formatter binary. Defaults to `NATIVE_FORMAT_SOURCE`.
    #[arg(long)]
    pub source: Option<Utf8PathBuf>,
    /// Cache destination. Defaults to the source's file name under the cache
    /// root.
    #[arg(long)]
    pub dest: Option<Utf8PathBuf>,
    /// Leave the installed file's permissions untouched.
    #[arg(long)]
    pub no_chmod: bool,
}

/// Arguments for `native-format format`.
#[derive(Debug, Args)]
pub struct FormatArgs {
    /// Installed formatter binary. Defaults to the configured cache entry.
    #[arg(long)]
    pub binary: Option<Utf8PathBuf>,
    /// Ranges to format as `start:end`, comma separated.
    #[arg(long, value_delimiter = ',')]
    pub ranges: Vec<CharacterRange>,
    /// Print a JSON list of replacements instead of the formatted document.
    #[arg(long)]
    pub replacements: bool,
    /// Only fix imports.
    #[arg(long, conflicts_with_all = ["ranges", "replacements"])]
    pub fix_imports: bool,
    /// Kill the formatter after this many seconds.
    #[arg(long)]
    pub timeout_secs: Option<u64>,
    /// Document to format. Reads stdin when absent or `-`.
    pub file: Option<Utf8PathBuf>,
}

/// Parses the process arguments, loads settings and runs the command.
///
/// # Errors
///
/// Returns an error when settings cannot be loaded or the command fails.
pub fn run() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let settings = FormatSettings::load()?;
    let stdin = io::stdin();
    let stdout = io::stdout();
    execute(cli, &settings, &mut stdin.lock(), &mut stdout.lock())
}

/// Runs a parsed command against explicit streams.
///
/// # Errors
///
/// Returns an error when the command fails or output cannot be written.
pub fn execute(
    cli: Cli,
    settings: &FormatSettings,
    input: &mut impl Read,
    output: &mut impl Write,
) -> Result<()> {
    match cli.command {
        Command::Install(args) => {
            let installation = install_command(&args, settings)?;
            writeln!(output, "{}", installation.path).map_err(write_failure)?;
        }
        Command::Format(args) => format_command(&args, settings, input, output)?,
    }
    Ok(())
}

fn install_command(args: &InstallArgs, settings: &FormatSettings) -> Result<Installation> {
    let source = args
        .source
        .clone()
        .or_else(|| settings.source.clone())
        .ok_or_else(|| {
            ConfigError::from(eyre!(
                "no formatter source given; pass --source or set NATIVE_FORMAT_SOURCE"
            ))
        })?;
    let destination = match &args.dest {
        Some(dest) => dest.clone(),
        None => settings.destination_of(&source)?,
    };
    let installation = install(&source, &destination)?;
    if !args.no_chmod {
        make_executable(&installation.path)?;
    }
    debug!(
        target: CLI_TARGET,
        path = %installation.path,
        outcome = ?installation.outcome,
        "install command finished"
    );
    Ok(installation)
}

fn format_command(
    args: &FormatArgs,
    settings: &FormatSettings,
    input: &mut impl Read,
    output: &mut impl Write,
) -> Result<()> {
    let binary = match &args.binary {
        Some(binary) => binary.clone(),
        None => settings.installed_binary()?,
    };
    let options = FormatterOptions {
        timeout: args
            .timeout_secs
            .map(Duration::from_secs)
            .or(settings.formatter_options().timeout),
    };
    let formatter = NativeFormatter::new(&binary)?.with_options(options);
    let document = read_document(args.file.as_deref(), input)?;

    if args.replacements {
        let replacements = formatter.format_replacements(&document, &args.ranges)?;
        serde_json::to_writer(&mut *output, &replacements)
            .map_err(|err| FormatError::new(FormatErrorKind::Io, Report::new(err)))?;
        writeln!(output).map_err(write_failure)?;
    } else {
        let formatted = if args.fix_imports {
            formatter.fix_imports(&document)?
        } else if args.ranges.is_empty() {
            formatter.format_full(&document)?
        } else {
            let replacements = formatter.format_replacements(&document, &args.ranges)?;
            apply_replacements(&document, &replacements)?
        };
        output
            .write_all(formatted.as_bytes())
            .map_err(write_failure)?;
    }
    output.flush().map_err(write_failure)?;
    Ok(())
}

fn read_document(file: Option<&Utf8Path>, input: &mut impl Read) -> FormatResult<String> {
    match file {
        Some(path) if path.as_str() != "-" => fs::read_to_string(path)
            .with_context(|| format!("failed to read document {path}"))
            .map_err(|err| FormatError::new(FormatErrorKind::Io, err)),
        _ => {
            let mut document = String::new();
            input
                .read_to_string(&mut document)
                .context("failed to read document from stdin")
                .map_err(|err| FormatError::new(FormatErrorKind::Io, err))?;
            Ok(document)
        }
    }
}

fn write_failure(err: io::Error) -> FormatError {
    FormatError::new(
        FormatErrorKind::Io,
        Report::new(err).wrap_err("failed to write output"),
    )
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
    if installed.is_err() {
        debug!(target: CLI_TARGET, "tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("native-format").chain(args.iter().copied()))
            .expect("valid arguments")
    }

    #[test]
    fn format_ranges_are_comma_separated() {
        let cli = parse(&["format", "--ranges", "10:20,30:40", "--replacements"]);
        let Command::Format(args) = cli.command else {
            panic!("expected format command");
        };
        assert_eq!(
            args.ranges,
            [CharacterRange::new(10, 20), CharacterRange::new(30, 40)]
        );
        assert!(args.replacements);
        assert!(args.file.is_none());
    }

    #[rstest]
    #[case::reversed(&["format", "--ranges", "9:3"])]
    #[case::malformed(&["format", "--ranges", "nine"])]
    #[case::fix_imports_with_ranges(&["format", "--fix-imports", "--ranges", "1:2"])]
    fn invalid_arguments_are_rejected(#[case] args: &[&str]) {
        let parsed = Cli::try_parse_from(std::iter::once("native-format").chain(args.iter().copied()));
        assert!(parsed.is_err());
    }

    #[test]
    fn install_accepts_explicit_paths() {
        let cli = parse(&["install", "--source", "/dl/fmt.bin", "--dest", "/cache/fmt.bin"]);
        let Command::Install(args) = cli.command else {
            panic!("expected install command");
        };
        assert_eq!(args.source.as_deref(), Some(Utf8Path::new("/dl/fmt.bin")));
        assert_eq!(args.dest.as_deref(), Some(Utf8Path::new("/cache/fmt.bin")));
        assert!(!args.no_chmod);
    }

    #[test]
    fn install_without_source_is_a_config_error() {
        let cli = parse(&["install"]);
        let mut out = Vec::new();
        let err = execute(cli, &FormatSettings::default(), &mut io::empty(), &mut out)
            .expect_err("missing source");
        assert!(matches!(err, crate::NativeFormatError::Config(_)));
        assert!(out.is_empty());
    }

    #[test]
    fn install_prints_the_destination() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = Utf8Path::from_path(temp.path()).expect("utf8 tempdir");
        let source = root.join("formatter.bin");
        fs::write(&source, b"BINARYDATA").expect("write source");
        let settings = FormatSettings {
            cache_dir: Some(root.join("cache")),
            source: Some(source),
            ..FormatSettings::default()
        };

        let mut out = Vec::new();
        execute(parse(&["install"]), &settings, &mut io::empty(), &mut out).expect("install");

        let expected = root.join("cache").join("formatter.bin");
        assert_eq!(String::from_utf8(out).expect("utf8"), format!("{expected}\n"));
        assert_eq!(fs::read(&expected).expect("read"), b"BINARYDATA");
    }

    #[test]
    fn install_events_use_the_cli_target() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = Utf8Path::from_path(temp.path()).expect("utf8 tempdir");
        let source = root.join("formatter.bin");
        fs::write(&source, b"BINARYDATA").expect("write source");
        let settings = FormatSettings {
            cache_dir: Some(root.join("cache")),
            source: Some(source),
            ..FormatSettings::default()
        };

        let (logs, result) = crate::test_support::capture_logs(tracing::Level::DEBUG, || {
            execute(parse(&["install"]), &settings, &mut io::empty(), &mut Vec::<u8>::new())
        });
        result.expect("install");

        let line = logs
            .iter()
            .find(|line| line.contains("install command finished"))
            .unwrap_or_else(|| panic!("missing CLI event in {logs:?}"));
        assert!(line.contains(CLI_TARGET));
    }

    #[test]
    fn read_document_prefers_stdin_for_dash() {
        let mut input = "class A {}".as_bytes();
        let document =
            read_document(Some(Utf8Path::new("-")), &mut input).expect("document");
        assert_eq!(document, "class A {}");
    }
}
