//! Logger handles passed to every engine component.
//!
//! A [`Logger`] forwards each record to `tracing` and, when present, to a
//! caller-supplied callback. There is no process-wide logging state: each
//! writer owns its handle and hands clones to the components it builds.

use std::fmt;
use std::sync::Arc;

/// Severity of a log record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        f.write_str(s)
    }
}

/// Receiver for log records.
///
/// Any `Fn(Severity, &str) + Send + Sync` closure is a sink; caller user data
/// travels inside the closure.
pub trait LogSink: Send + Sync {
    fn log(&self, severity: Severity, message: &str);
}

impl<F> LogSink for F
where
    F: Fn(Severity, &str) + Send + Sync,
{
    fn log(&self, severity: Severity, message: &str) {
        self(severity, message)
    }
}

/// Cloneable logging handle.
#[derive(Clone, Default)]
pub struct Logger {
    sink: Option<Arc<dyn LogSink>>,
}

impl Logger {
    /// Logger that only emits `tracing` events.
    pub fn tracing_only() -> Self {
        Self { sink: None }
    }

    /// Logger forwarding to `sink` in addition to `tracing`.
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self { sink: Some(sink) }
    }

    /// Logger forwarding to a closure in addition to `tracing`.
    pub fn from_fn(f: impl Fn(Severity, &str) + Send + Sync + 'static) -> Self {
        Self::new(Arc::new(f))
    }

    pub fn log(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Info => tracing::info!(target: "scene_mirror", "{}", message),
            Severity::Warning => tracing::warn!(target: "scene_mirror", "{}", message),
            Severity::Error => tracing::error!(target: "scene_mirror", "{}", message),
        }
        if let Some(sink) = &self.sink {
            sink.log(severity, message);
        }
    }

    #[inline]
    pub fn info(&self, message: impl AsRef<str>) {
        self.log(Severity::Info, message.as_ref());
    }

    #[inline]
    pub fn warn(&self, message: impl AsRef<str>) {
        self.log(Severity::Warning, message.as_ref());
    }

    #[inline]
    pub fn error(&self, message: impl AsRef<str>) {
        self.log(Severity::Error, message.as_ref());
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}

/// Collects records in memory. Handy for asserting on engine diagnostics.
#[derive(Clone, Default)]
pub struct MemorySink {
    records: Arc<parking_lot::Mutex<Vec<(Severity, String)>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Logger writing into this sink.
    pub fn logger(&self) -> Logger {
        Logger::new(Arc::new(self.clone()))
    }

    /// Snapshot of all records so far.
    pub fn records(&self) -> Vec<(Severity, String)> {
        self.records.lock().clone()
    }

    /// Number of records at `severity`.
    pub fn count(&self, severity: Severity) -> usize {
        self.records.lock().iter().filter(|(s, _)| *s == severity).count()
    }

    /// True if any record at `severity` contains `needle`.
    pub fn contains(&self, severity: Severity, needle: &str) -> bool {
        self.records
            .lock()
            .iter()
            .any(|(s, m)| *s == severity && m.contains(needle))
    }
}

impl LogSink for MemorySink {
    fn log(&self, severity: Severity, message: &str) {
        self.records.lock().push((severity, message.to_string()));
    }
}
