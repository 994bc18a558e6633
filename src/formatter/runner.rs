//! Process execution behind the formatter protocol.
//!
//! [`ProcessRunner`] is the seam between the pure protocol and the operating
//! system. [`SubprocessRunner`] spawns a real child; tests substitute a fake
//! that returns canned bytes.

use camino::Utf8PathBuf;
use color_eyre::eyre::{Report, eyre};
use std::io::{self, ErrorKind, Read, Write};
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};
use wait_timeout::ChildExt;

use super::output::render_failure;
use crate::error::{FormatError, FormatErrorKind, FormatResult};
use crate::observability::FORMATTER_TARGET;

/// Everything needed to run the formatter binary once.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Invocation {
    /// Full argument vector; the first element is the binary itself.
    pub args: Vec<String>,
    /// Working directory for the child.
    pub working_dir: Option<Utf8PathBuf>,
    /// Bytes written to the child's stdin before it is closed.
    pub stdin: Vec<u8>,
    /// Kill the child if it runs longer than this.
    pub timeout: Option<Duration>,
}

impl Invocation {
    /// The binary to execute.
    #[must_use]
    pub fn program(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }
}

/// Output captured from a finished child.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct CapturedOutput {
    /// Exit code, or `None` when the child was terminated by a signal.
    pub exit_code: Option<i32>,
    /// Everything written to stdout.
    pub stdout: Vec<u8>,
    /// Everything written to stderr.
    pub stderr: Vec<u8>,
}

impl CapturedOutput {
    /// Captures a successful run that printed `stdout`.
    #[must_use]
    pub fn success(stdout: impl Into<Vec<u8>>) -> Self {
        Self {
            exit_code: Some(0),
            stdout: stdout.into(),
            stderr: Vec::new(),
        }
    }

    /// Returns true when the child exited with status zero.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        matches!(self.exit_code, Some(0))
    }
}

/// Runs one [`Invocation`] to completion.
#[cfg_attr(test, mockall::automock)]
pub trait ProcessRunner: Send + Sync {
    /// Runs the invocation and captures its output.
    ///
    /// An unsuccessful exit is not an error at this layer; callers inspect
    /// [`CapturedOutput::exit_code`].
    ///
    /// # Errors
    ///
    /// Returns an error when the process cannot be spawned, its pipes fail,
    /// or it overruns the invocation's timeout.
    fn run(&self, invocation: &Invocation) -> FormatResult<CapturedOutput>;
}

/// [`ProcessRunner`] backed by [`std::process::Command`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SubprocessRunner;

impl ProcessRunner for SubprocessRunner {
    fn run(&self, invocation: &Invocation) -> FormatResult<CapturedOutput> {
        let mut child = spawn(invocation)?;
        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let (status, written, stdout_bytes, stderr_bytes) = thread::scope(|scope| {
            let writer = scope.spawn(|| write_stdin(stdin, &invocation.stdin));
            let stdout_reader = scope.spawn(|| drain(stdout));
            let stderr_reader = scope.spawn(|| drain(stderr));
            let status = wait_for_exit(&mut child, invocation.timeout);
            (
                status,
                join(writer),
                join(stdout_reader),
                join(stderr_reader),
            )
        });

        let captured = CapturedOutput {
            exit_code: None,
            stdout: stdout_bytes?,
            stderr: stderr_bytes?,
        };
        let Some(exit) = status? else {
            return Err(render_failure(
                FormatErrorKind::Timeout,
                &format!(
                    "formatter timed out after {:?}",
                    invocation.timeout.unwrap_or_default()
                ),
                &captured,
            ));
        };
        written?;
        debug!(
            target: FORMATTER_TARGET,
            exit_code = ?exit.code(),
            stdout_bytes = captured.stdout.len(),
            stderr_bytes = captured.stderr.len(),
            "formatter exited"
        );
        Ok(CapturedOutput {
            exit_code: exit.code(),
            ..captured
        })
    }
}

fn spawn(invocation: &Invocation) -> FormatResult<Child> {
    let Some((program, args)) = invocation.args.split_first() else {
        return Err(FormatError::new(
            FormatErrorKind::Launch,
            eyre!("formatter invocation has no program"),
        ));
    };
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = &invocation.working_dir {
        command.current_dir(dir);
    }
    if invocation.timeout.is_some() {
        own_process_group(&mut command);
    }
    command.spawn().map_err(|err| {
        FormatError::new(
            FormatErrorKind::Launch,
            Report::new(err).wrap_err(format!("failed to spawn formatter {program}")),
        )
    })
}

fn write_stdin(stdin: Option<ChildStdin>, document: &[u8]) -> FormatResult<()> {
    let Some(mut pipe) = stdin else {
        return Ok(());
    };
    match pipe.write_all(document).and_then(|()| pipe.flush()) {
        Ok(()) => Ok(()),
        // The child stopped reading; its exit status explains why.
        Err(err) if err.kind() == ErrorKind::BrokenPipe => Ok(()),
        Err(err) => Err(io_failure(err, "failed to write document to formatter stdin")),
    }
}

fn drain(stream: Option<impl Read>) -> FormatResult<Vec<u8>> {
    let mut buffer = Vec::new();
    if let Some(mut pipe) = stream {
        pipe.read_to_end(&mut buffer)
            .map_err(|err| io_failure(err, "failed to read formatter output"))?;
    }
    Ok(buffer)
}

/// Waits for the child; `Ok(None)` means it was killed after the timeout.
fn wait_for_exit(child: &mut Child, timeout: Option<Duration>) -> FormatResult<Option<ExitStatus>> {
    let Some(limit) = timeout else {
        return child
            .wait()
            .map(Some)
            .map_err(|err| io_failure(err, "failed to wait for formatter"));
    };
    match child.wait_timeout(limit) {
        Ok(Some(status)) => Ok(Some(status)),
        Ok(None) => {
            warn!(
                target: FORMATTER_TARGET,
                timeout_secs = limit.as_secs(),
                "formatter timed out; terminating"
            );
            terminate(child)?;
            Ok(None)
        }
        Err(err) => {
            if let Err(kill_err) = terminate(child) {
                warn!(target: FORMATTER_TARGET, error = %kill_err, "failed to terminate formatter");
            }
            Err(io_failure(err, "failed to wait for formatter"))
        }
    }
}

/// Kills the child and everything it spawned, then reaps it.
///
/// Descendants inherit the output pipes, so the drainers only see EOF once
/// the whole process group is gone.
fn terminate(child: &mut Child) -> FormatResult<()> {
    kill_process_group(child).map_err(|err| io_failure(err, "failed to terminate formatter"))?;
    child
        .wait()
        .map_err(|err| io_failure(err, "failed to reap formatter"))?;
    Ok(())
}

/// Makes the child lead a new process group so a timeout can kill its
/// descendants too.
#[cfg(unix)]
fn own_process_group(command: &mut Command) {
    use std::os::unix::process::CommandExt;

    command.process_group(0);
}

#[cfg(not(unix))]
const fn own_process_group(_command: &mut Command) {}

#[cfg(unix)]
fn kill_process_group(child: &mut Child) -> io::Result<()> {
    let Ok(group) = libc::pid_t::try_from(child.id()) else {
        return kill_child(child);
    };
    // SAFETY: `killpg` only sends a signal. The group id is the pid of a
    // child that has not been reaped yet, so it cannot have been recycled.
    let result = unsafe { libc::killpg(group, libc::SIGKILL) };
    if result == 0 {
        return Ok(());
    }
    let err = io::Error::last_os_error();
    match err.raw_os_error() {
        // The group is gone or not ours; fall back to the child alone.
        Some(libc::ESRCH | libc::EPERM) => kill_child(child),
        _ => Err(err),
    }
}

#[cfg(not(unix))]
fn kill_process_group(child: &mut Child) -> io::Result<()> {
    kill_child(child)
}

fn kill_child(child: &mut Child) -> io::Result<()> {
    match child.kill() {
        // `InvalidInput` indicates the child has already exited; ignore it.
        Err(err) if err.kind() == ErrorKind::InvalidInput => Ok(()),
        other => other,
    }
}

fn join<T>(handle: thread::ScopedJoinHandle<'_, FormatResult<T>>) -> FormatResult<T> {
    handle.join().unwrap_or_else(|_| {
        Err(FormatError::new(
            FormatErrorKind::Io,
            eyre!("formatter I/O thread panicked"),
        ))
    })
}

fn io_failure(err: io::Error, context: &'static str) -> FormatError {
    FormatError::new(FormatErrorKind::Io, Report::new(err).wrap_err(context))
}
