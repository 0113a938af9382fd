//! Destinations for rendered reports.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::info;

/// Accepts already-indented report lines and emits them verbatim.
pub trait LogSink: Send + Sync {
    /// Emits one report.
    fn emit(&self, lines: &[String]);
}

impl<T: LogSink + ?Sized> LogSink for &T {
    fn emit(&self, lines: &[String]) {
        (**self).emit(lines)
    }
}

impl<T: LogSink + ?Sized> LogSink for Arc<T> {
    fn emit(&self, lines: &[String]) {
        (**self).emit(lines)
    }
}

/// Emits every line as a `tracing` event at `INFO` level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn emit(&self, lines: &[String]) {
        for line in lines {
            info!(target: "adlens::report", "{}", line);
        }
    }
}

/// Collects reports in memory, one entry per [`LogSink::emit`] call.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    reports: Arc<Mutex<Vec<Vec<String>>>>,
}

impl MemorySink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        MemorySink::default()
    }

    /// The reports received so far, in emission order.
    pub fn reports(&self) -> Vec<Vec<String>> {
        self.reports.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl LogSink for MemorySink {
    fn emit(&self, lines: &[String]) {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(lines.to_vec());
    }
}
