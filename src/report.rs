//! Per-run diagnostics record.
//!
//! Failures scoped to one source file or one PV segment are downgraded to an
//! entry here instead of aborting sibling work; the caller decides how to
//! surface them once the run is done.

use std::fmt;

/// How serious a reported condition is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// A structurally valid input produced nothing useful (e.g. zero rows
    /// matched a filter). The run result is still complete.
    Warning,
    /// An input was dropped entirely and contributes an empty series.
    Error,
}

/// One reported condition, tied to the input that raised it.
#[derive(Debug, Clone)]
pub struct ReportEntry {
    pub severity: Severity,
    /// The input the condition was raised against (filename, "pv segment 3", ...).
    pub source: String,
    pub message: String,
}

impl fmt::Display for ReportEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{tag}: {}: {}", self.source, self.message)
    }
}

/// Accumulates downgraded errors and warnings for one pipeline run.
#[derive(Debug, Default)]
pub struct RunReport {
    entries: Vec<ReportEntry>,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a dropped input.
    pub fn error(&mut self, source: impl Into<String>, message: impl Into<String>) {
        self.entries.push(ReportEntry {
            severity: Severity::Error,
            source: source.into(),
            message: message.into(),
        });
    }

    /// Records a non-fatal condition.
    pub fn warn(&mut self, source: impl Into<String>, message: impl Into<String>) {
        self.entries.push(ReportEntry {
            severity: Severity::Warning,
            source: source.into(),
            message: message.into(),
        });
    }

    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    pub fn has_errors(&self) -> bool {
        self.entries
            .iter()
            .any(|e| e.severity == Severity::Error)
    }

    pub fn is_clean(&self) -> bool {
        self.entries.is_empty()
    }
}
