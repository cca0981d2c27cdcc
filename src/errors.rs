use std::fmt;

use thiserror::Error;

use crate::types::Entry;

/// How bad a diagnostic is. Everything below `SyntaxError` is advisory;
/// `InternalError` means an invariant of this crate was violated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Notice,
    Warning,
    SyntaxError,
    InternalError,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Notice => "notice",
                Self::Warning => "warning",
                Self::SyntaxError => "syntax error",
                Self::InternalError => "internal error",
            }
        )
    }
}

/// Receiver for diagnostics. The parser never prints or terminates;
/// everything it has to say goes through a sink.
///
/// A plain closure works as a sink:
///
/// ```rust
/// use bibread::{Severity, WarningSink};
/// let mut sink = |sev: Severity, file: &str, line: usize, msg: &str| {
///     eprintln!("{file}:{line}: {sev}: {msg}");
/// };
/// sink.report(Severity::Warning, "test.bib", 3, "something looked odd");
/// ```
pub trait WarningSink {
    fn report(&mut self, severity: Severity, filename: &str, line: usize, message: &str);
}

impl<F> WarningSink for F
where
    F: FnMut(Severity, &str, usize, &str),
{
    fn report(&mut self, severity: Severity, filename: &str, line: usize, message: &str) {
        self(severity, filename, line, message)
    }
}

/// Sink that forwards diagnostics to the `log` crate, so embedders with
/// a logger installed get parser diagnostics alongside their own output.
#[derive(Debug, Default)]
pub struct LogSink;

impl WarningSink for LogSink {
    fn report(&mut self, severity: Severity, filename: &str, line: usize, message: &str) {
        match severity {
            Severity::Notice => log::info!("{filename}:{line}: {message}"),
            Severity::Warning => log::warn!("{filename}:{line}: {message}"),
            Severity::SyntaxError | Severity::InternalError => {
                log::error!("{filename}:{line}: {severity}: {message}")
            }
        }
    }
}

/// Sink that keeps every report in memory. Mostly useful in tests and
/// for embedders that want to decide afterwards whether a batch failed.
#[derive(Debug, Default)]
pub struct CollectSink {
    pub reports: Vec<(Severity, String, usize, String)>,
}

impl CollectSink {
    pub fn new() -> CollectSink {
        CollectSink::default()
    }

    /// Messages at `Warning` severity or worse.
    pub fn problems(&self) -> impl Iterator<Item = &str> {
        self.reports
            .iter()
            .filter(|(sev, ..)| *sev >= Severity::Warning)
            .map(|(_, _, _, msg)| msg.as_str())
    }
}

impl WarningSink for CollectSink {
    fn report(&mut self, severity: Severity, filename: &str, line: usize, message: &str) {
        self.reports
            .push((severity, filename.to_string(), line, message.to_string()));
    }
}

/// Wraps the session's sink and counts what passes through, so the
/// session can answer "did anything go wrong?" after a batch.
pub(crate) struct CountingSink {
    pub(crate) inner: Box<dyn WarningSink>,
    pub(crate) count: usize,
}

impl WarningSink for CountingSink {
    fn report(&mut self, severity: Severity, filename: &str, line: usize, message: &str) {
        if severity >= Severity::Warning {
            self.count += 1;
        }
        self.inner.report(severity, filename, line, message);
    }
}

/// A syntax error that made the builder give up on one entry.
///
/// Recovery is per entry: the parser discards input up to the next `@`
/// and carries on, so an error never poisons the rest of the file. The
/// partially built entry rides along with its `error` flag set.
#[derive(Debug, Error)]
#[error("syntax error at line {line}: {message}")]
pub struct ParseError {
    pub message: String,
    /// Line the entry started on, for pointing at the offending construct.
    pub line: usize,
    /// Whatever was parsed before the error, never valid.
    pub partial: Option<Entry>,
}
