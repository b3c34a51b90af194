//! Parser for the BELPEX day-ahead price export.
//!
//! The file is Windows-1252 encoded and `;`-separated, with a day-first
//! `Date` column and a `Euro` column whose cells may wrap the price in
//! extraneous text (currency signs, unit suffixes). The first signed
//! decimal-comma substring is extracted, converted from EUR/MWh to EUR/kWh,
//! and keyed by the hour the tick belongs to.

use std::collections::HashSet;
use std::sync::OnceLock;

use chrono::NaiveDateTime;
use encoding_rs::WINDOWS_1252;
use regex::Regex;
use tracing::{debug, warn};

use crate::error::ParseError;
use crate::series::{PRICE_RESOLUTION_MIN, Quantity, Sample, Series, floor_to_hour};

const DATE_COLUMN: &str = "Date";
const EURO_COLUMN: &str = "Euro";

/// EUR/MWh to EUR/kWh.
const PRICE_DIVISOR: f64 = 1000.0;

const DATE_FORMATS: &[&str] = &[
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
    "%d/%m/%Y",
    "%d-%m-%Y",
];

fn price_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"-?[\d,]+").expect("price pattern is valid"))
}

/// Parses a BELPEX price file into an hourly series in EUR/kWh.
///
/// Cells whose `Euro` field holds no extractable number are skipped as
/// missing rather than failing the file; the merge step zero-fills the
/// hours they would have covered.
///
/// # Errors
///
/// Returns a [`ParseError`] when the `Date` or `Euro` column is absent, a
/// date cell does not convert, or two rows resolve to the same hour.
pub fn parse_belpex(input: &[u8], file: &str) -> Result<Series, ParseError> {
    let (text, _, _) = WINDOWS_1252.decode(input);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|source| ParseError::Csv { file: file.to_string(), source })?
        .clone();

    let date_idx = column_index(&headers, DATE_COLUMN, file)?;
    let euro_idx = column_index(&headers, EURO_COLUMN, file)?;

    let mut samples = Vec::new();
    let mut seen = HashSet::new();
    let mut skipped = 0usize;

    for (row, record) in reader.records().enumerate() {
        let line = row + 2;
        let record =
            record.map_err(|source| ParseError::Csv { file: file.to_string(), source })?;

        let date_field = record.get(date_idx).unwrap_or_default();
        let t = parse_day_first(date_field).ok_or_else(|| ParseError::ColumnConversion {
            file: file.to_string(),
            line,
            column: DATE_COLUMN.to_string(),
            detail: format!("\"{date_field}\" is not a day-first timestamp"),
        })?;
        let hour = floor_to_hour(t);

        let euro_field = record.get(euro_idx).unwrap_or_default();
        let Some(price) = extract_price(euro_field) else {
            skipped += 1;
            continue;
        };

        if !seen.insert(hour) {
            return Err(ParseError::DuplicateTimestamp {
                file: file.to_string(),
                timestamp: hour,
            });
        }
        samples.push(Sample { t: hour, value: price });
    }

    if skipped > 0 {
        warn!(file, skipped, "price cells without an extractable number");
    }
    debug!(file, rows = samples.len(), "parsed price file");

    Ok(Series::new(Quantity::Belpex, PRICE_RESOLUTION_MIN, samples))
}

fn column_index(
    headers: &csv::StringRecord,
    name: &str,
    file: &str,
) -> Result<usize, ParseError> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| ParseError::MissingColumn {
            file: file.to_string(),
            column: name.to_string(),
        })
}

fn parse_day_first(field: &str) -> Option<NaiveDateTime> {
    let field = field.trim();
    DATE_FORMATS.iter().find_map(|f| {
        NaiveDateTime::parse_from_str(field, f)
            .ok()
            .or_else(|| chrono::NaiveDate::parse_from_str(field, f).ok().map(|d| d.and_hms_opt(0, 0, 0).unwrap_or_default()))
    })
}

/// Extracts the first signed decimal-comma number and converts to EUR/kWh.
fn extract_price(field: &str) -> Option<f64> {
    let matched = price_pattern().find(field)?.as_str();
    let normalized = matched.replace(',', ".");
    let eur_per_mwh: f64 = normalized.parse().ok()?;
    Some(eur_per_mwh / PRICE_DIVISOR)
}
