//! Captures tracing output for assertions in tests.
//!
//! Logs are recorded without timestamps so assertions can match messages and
//! structured fields directly.

use std::io::{Result as IoResult, Write};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::Level;
use tracing::subscriber::with_default;
use tracing_subscriber::fmt;

struct BufferWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl Write for BufferWriter {
    fn write(&mut self, buf: &[u8]) -> IoResult<usize> {
        let mut guard = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> IoResult<()> {
        Ok(())
    }
}

/// Runs `action` with a thread-local subscriber at `level`, returning the
/// captured log lines alongside the closure result.
///
/// # Examples
/// ```
/// use native_format_cache::test_support::capture_logs;
/// use tracing::Level;
///
/// let (logs, value) = capture_logs(Level::INFO, || {
///     tracing::info!(path = "/cache/formatter.bin", "installed");
///     7
/// });
/// assert!(logs.iter().any(|line| line.contains("installed")));
/// assert_eq!(value, 7);
/// ```
///
/// # Panics
///
/// Panics if the captured output is not valid UTF-8.
#[must_use]
pub fn capture_logs<F, R>(level: Level, action: F) -> (Vec<String>, R)
where
    F: FnOnce() -> R,
{
    let buffer = Arc::new(Mutex::new(Vec::new()));
    let writer_buffer = Arc::clone(&buffer);
    let subscriber = fmt()
        .with_max_level(level)
        .without_time()
        .with_ansi(false)
        .with_writer(move || BufferWriter {
            buffer: Arc::clone(&writer_buffer),
        })
        .finish();

    let result = with_default(subscriber, action);

    let bytes = buffer
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();
    let content =
        String::from_utf8(bytes).unwrap_or_else(|err| panic!("logs should be valid UTF-8: {err}"));
    let logs = content.lines().map(str::to_owned).collect();
    (logs, result)
}
