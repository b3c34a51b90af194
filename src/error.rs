//! Error taxonomy for the reconciliation pipeline.
//!
//! Per-file and per-segment failures are caught at their origin, recorded on
//! the [`RunReport`](crate::report::RunReport), and downgraded to an empty or
//! partial series so sibling inputs keep processing. Only
//! [`PipelineError::NoValidInput`] and [`PipelineError::UserInput`] abort
//! their step.

use std::path::PathBuf;

use chrono::NaiveDateTime;
use thiserror::Error;

/// A source file could not be parsed as a whole.
///
/// Carries the offending filename so the condition can be reported against
/// the right upload slot.
#[derive(Debug, Error)]
pub enum ParseError {
    /// A required column is absent from the header row.
    #[error("{file}: missing required column \"{column}\"")]
    MissingColumn { file: String, column: String },

    /// A required column exists but a retained row's value does not convert.
    #[error("{file}: line {line}: column \"{column}\" does not convert: {detail}")]
    ColumnConversion {
        file: String,
        line: usize,
        column: String,
        detail: String,
    },

    /// A data row does not have the layout the format mandates.
    #[error("{file}: line {line}: {detail}")]
    MalformedRow {
        file: String,
        line: usize,
        detail: String,
    },

    /// Two rows in one source resolved to the same timestamp.
    #[error("{file}: duplicate timestamp {timestamp}")]
    DuplicateTimestamp {
        file: String,
        timestamp: NaiveDateTime,
    },

    /// The underlying CSV reader rejected the input.
    #[error("{file}: {source}")]
    Csv {
        file: String,
        #[source]
        source: csv::Error,
    },

    /// The source file could not be read at all.
    #[error("{file}: {source}")]
    Io {
        file: String,
        #[source]
        source: std::io::Error,
    },
}

impl ParseError {
    /// The filename the error was raised against.
    pub fn file(&self) -> &str {
        match self {
            Self::MissingColumn { file, .. }
            | Self::ColumnConversion { file, .. }
            | Self::MalformedRow { file, .. }
            | Self::DuplicateTimestamp { file, .. }
            | Self::Csv { file, .. }
            | Self::Io { file, .. } => file,
        }
    }
}

/// A PV estimate could not be produced.
#[derive(Debug, Error)]
pub enum PvError {
    /// The HTTP request failed at the transport level (includes timeouts).
    #[error("remote fetch failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status that is not retried
    /// (or retries were exhausted).
    #[error("remote endpoint returned HTTP {status}")]
    Status { status: u16 },

    /// The response body could not be interpreted as the expected dataset.
    #[error("unusable remote response: {0}")]
    Response(String),
}

/// The merge step had nothing to work with.
#[derive(Debug, Error)]
pub enum MergeError {
    /// Every supplied meter series was empty.
    #[error("no meter series with data to merge")]
    NoSeries,
}

/// Writing a workbook failed.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("workbook error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("cannot write workbook: {0}")]
    Io(#[from] std::io::Error),
}

/// Top-level pipeline failure.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// None of the three meter slots yielded a non-empty series; the run
    /// aborts before merge.
    #[error("none of the supplied meter files produced data")]
    NoValidInput,

    /// The selected end date precedes the start date; blocks the export
    /// step only.
    #[error("end date {end} precedes start date {start}")]
    UserInput {
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },

    /// The fixed bundled price file is absent from the deployment.
    #[error("bundled price file not found: {path}")]
    PriceFileNotFound { path: PathBuf },

    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error(transparent)]
    Export(#[from] ExportError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_reports_filename() {
        let e = ParseError::MissingColumn {
            file: "afname.csv".to_string(),
            column: "Volume".to_string(),
        };
        assert_eq!(e.file(), "afname.csv");
        let msg = e.to_string();
        assert!(msg.contains("afname.csv"));
        assert!(msg.contains("Volume"));
    }

    #[test]
    fn user_input_error_names_both_dates() {
        let e = PipelineError::UserInput {
            start: chrono::NaiveDate::from_ymd_opt(2023, 5, 2).unwrap(),
            end: chrono::NaiveDate::from_ymd_opt(2023, 5, 1).unwrap(),
        };
        let msg = e.to_string();
        assert!(msg.contains("2023-05-01"));
        assert!(msg.contains("2023-05-02"));
    }
}
