//! Parser for the standard register-tagged meter export.
//!
//! The export is a `;`-separated, headered table with one row per
//! 15-minute interval and register. Dates are day-first, volumes use a
//! decimal comma. Only rows whose `Register` column exactly matches the
//! requested label are retained.

use std::collections::HashSet;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use tracing::{debug, warn};

use crate::error::ParseError;
use crate::series::{METER_RESOLUTION_MIN, Register, Sample, Series};

const DATE_COLUMN: &str = "Van (datum)";
const TIME_COLUMN: &str = "Van (tijdstip)";
const REGISTER_COLUMN: &str = "Register";
const VOLUME_COLUMN: &str = "Volume";

/// Ambiguous numeric dates are interpreted day-before-month.
const DATE_FORMATS: &[&str] = &["%d-%m-%Y", "%d/%m/%Y"];
const TIME_FORMATS: &[&str] = &["%H:%M:%S", "%H:%M"];

/// Parses a standard-format meter file, retaining rows for one register.
///
/// Returns an empty series (after a logged warning) when the file is
/// structurally valid but no row carries the requested register label.
///
/// # Errors
///
/// Returns a [`ParseError`] when a required column is absent, a retained
/// row's date/time or volume does not convert, or two retained rows resolve
/// to the same timestamp.
pub fn parse_standard(
    input: &[u8],
    file: &str,
    register: Register,
) -> Result<Series, ParseError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .trim(csv::Trim::All)
        .from_reader(input);

    let headers = reader
        .headers()
        .map_err(|source| ParseError::Csv { file: file.to_string(), source })?
        .clone();

    let date_idx = column_index(&headers, DATE_COLUMN, file)?;
    let time_idx = column_index(&headers, TIME_COLUMN, file)?;
    let register_idx = column_index(&headers, REGISTER_COLUMN, file)?;
    let volume_idx = column_index(&headers, VOLUME_COLUMN, file)?;

    let mut samples = Vec::new();
    let mut seen = HashSet::new();

    for (row, record) in reader.records().enumerate() {
        // Header is line 1; data starts at line 2.
        let line = row + 2;
        let record =
            record.map_err(|source| ParseError::Csv { file: file.to_string(), source })?;

        if record.get(register_idx) != Some(register.label()) {
            continue;
        }

        let date_field = record.get(date_idx).unwrap_or_default();
        let time_field = record.get(time_idx).unwrap_or_default();
        let t = parse_timestamp(date_field, time_field).ok_or_else(|| {
            ParseError::ColumnConversion {
                file: file.to_string(),
                line,
                column: DATE_COLUMN.to_string(),
                detail: format!("\"{date_field} {time_field}\" is not a day-first timestamp"),
            }
        })?;

        let volume_field = record.get(volume_idx).unwrap_or_default();
        let value = parse_decimal_comma(volume_field).ok_or_else(|| {
            ParseError::ColumnConversion {
                file: file.to_string(),
                line,
                column: VOLUME_COLUMN.to_string(),
                detail: format!("\"{volume_field}\" is not a decimal number"),
            }
        })?;

        if !seen.insert(t) {
            return Err(ParseError::DuplicateTimestamp {
                file: file.to_string(),
                timestamp: t,
            });
        }
        samples.push(Sample { t, value });
    }

    if samples.is_empty() {
        warn!(file, register = register.label(), "no rows matched register");
    } else {
        debug!(file, rows = samples.len(), "parsed standard meter file");
    }

    Ok(Series::new(register.quantity(), METER_RESOLUTION_MIN, samples))
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

fn parse_timestamp(date: &str, time: &str) -> Option<NaiveDateTime> {
    let date = DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(date, f).ok())?;
    let time = TIME_FORMATS
        .iter()
        .find_map(|f| NaiveTime::parse_from_str(time, f).ok())?;
    Some(date.and_time(time))
}

/// Parses a number that uses `,` as the decimal separator.
pub(crate) fn parse_decimal_comma(field: &str) -> Option<f64> {
    let normalized = field.trim().replace(',', ".");
    if normalized.is_empty() {
        return None;
    }
    normalized.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::Quantity;

    const HEADER: &str = "Van (datum);Van (tijdstip);Tot (datum);Tot (tijdstip);Register;Volume;Eenheid";

    fn file(rows: &[&str]) -> Vec<u8> {
        let mut body = String::from(HEADER);
        for row in rows {
            body.push('\n');
            body.push_str(row);
        }
        body.into_bytes()
    }

    #[test]
    fn retains_only_the_requested_register() {
        let input = file(&[
            "15-06-2023;10:15:00;15-06-2023;10:30:00;Afname Actief;0,123;kWh",
            "15-06-2023;10:15:00;15-06-2023;10:30:00;Injectie Actief;0,456;kWh",
        ]);
        let series = parse_standard(&input, "afname.csv", Register::Import).unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series.quantity(), Quantity::ImportKwh);
        assert!((series.samples()[0].value - 0.123).abs() < 1e-12);
    }

    #[test]
    fn day_before_month_interpretation() {
        let input = file(&["02-01-2023;00:15:00;02-01-2023;00:30:00;Afname Actief;1,0;kWh"]);
        let series = parse_standard(&input, "afname.csv", Register::Import).unwrap();
        let t = series.samples()[0].t;
        use chrono::Datelike;
        assert_eq!(t.month(), 1);
        assert_eq!(t.day(), 2);
    }

    #[test]
    fn slash_dates_also_accepted() {
        let input = file(&["15/06/2023;10:15:00;15/06/2023;10:30:00;Afname Actief;1,5;kWh"]);
        let series = parse_standard(&input, "afname.csv", Register::Import).unwrap();
        assert_eq!(series.len(), 1);
    }

    #[test]
    fn zero_matching_rows_is_an_empty_series_not_an_error() {
        let input = file(&["15-06-2023;10:15:00;15-06-2023;10:30:00;Injectie Actief;0,5;kWh"]);
        let series = parse_standard(&input, "afname.csv", Register::Import).unwrap();
        assert!(series.is_empty());
    }

    #[test]
    fn missing_volume_column_fails() {
        let input = b"Van (datum);Van (tijdstip);Register\n15-06-2023;10:15:00;Afname Actief";
        let err = parse_standard(input, "afname.csv", Register::Import).unwrap_err();
        assert!(matches!(err, ParseError::MissingColumn { ref column, .. } if column == "Volume"));
    }

    #[test]
    fn non_numeric_volume_on_retained_row_fails() {
        let input = file(&["15-06-2023;10:15:00;15-06-2023;10:30:00;Afname Actief;n/a;kWh"]);
        let err = parse_standard(&input, "afname.csv", Register::Import).unwrap_err();
        assert!(matches!(err, ParseError::ColumnConversion { ref column, .. } if column == "Volume"));
    }

    #[test]
    fn non_numeric_volume_on_filtered_row_is_ignored() {
        let input = file(&[
            "15-06-2023;10:15:00;15-06-2023;10:30:00;Injectie Actief;n/a;kWh",
            "15-06-2023;10:15:00;15-06-2023;10:30:00;Afname Actief;0,5;kWh",
        ]);
        let series = parse_standard(&input, "afname.csv", Register::Import).unwrap();
        assert_eq!(series.len(), 1);
    }

    #[test]
    fn duplicate_timestamps_are_a_parse_error() {
        let input = file(&[
            "15-06-2023;10:15:00;15-06-2023;10:30:00;Afname Actief;0,1;kWh",
            "15-06-2023;10:15:00;15-06-2023;10:30:00;Afname Actief;0,2;kWh",
        ]);
        let err = parse_standard(&input, "afname.csv", Register::Import).unwrap_err();
        assert!(matches!(err, ParseError::DuplicateTimestamp { .. }));
    }

    #[test]
    fn negative_volumes_parse() {
        let input = file(&["15-06-2023;10:15:00;15-06-2023;10:30:00;Afname Actief;-0,25;kWh"]);
        let series = parse_standard(&input, "afname.csv", Register::Import).unwrap();
        assert_eq!(series.samples()[0].value, -0.25);
    }
}
