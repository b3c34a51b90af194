//! Parser for the raw AMR interval-block export.
//!
//! Fixed layout: 4 leading non-data lines, then headerless `;`-separated
//! rows. Field 1 is the day-start timestamp (`ddMMyyyy HH:mm`), field 8 an
//! indicator that must equal `KWT` for the row to be retained, and fields
//! 11–106 hold the day's 96 quarter-hour energy values with decimal commas.
//!
//! Value column `i` (0-based) maps to `day_start + (i + 1) * 15 min`: the
//! columns are interval *endings*, 00:15 through 24:00, so the 96th value
//! lands exactly on the next-day boundary.

use std::collections::HashSet;

use chrono::{NaiveDateTime, TimeDelta};
use tracing::{debug, warn};

use crate::error::ParseError;
use crate::series::{METER_RESOLUTION_MIN, Register, Sample, Series};

/// Leading lines before the first data row.
const PREAMBLE_LINES: usize = 4;

/// Indicator token marking an energy row (field 8).
const ENERGY_INDICATOR: &str = "KWT";

/// 0-based field index of the day-start timestamp.
const DAY_START_FIELD: usize = 0;

/// 0-based field index of the indicator.
const INDICATOR_FIELD: usize = 7;

/// 0-based field index of the first of the 96 interval values.
const FIRST_VALUE_FIELD: usize = 10;

/// Interval values per day row.
const VALUES_PER_ROW: usize = 96;

const DAY_START_FORMAT: &str = "%d%m%Y %H:%M";

/// Parses an AMR export into a 15-minute series for the given slot.
///
/// The AMR layout carries no register labels; which quantity the file
/// represents is decided by the upload slot it arrived in, passed as
/// `register`. Unparseable interval values default to 0 rather than failing
/// the row. A file with zero `KWT` rows yields an empty series after a
/// logged warning.
///
/// # Errors
///
/// Returns a [`ParseError`] when a retained row is shorter than the fixed
/// layout requires, its day-start timestamp does not convert, or two rows
/// cover the same day.
pub fn parse_amr(input: &[u8], file: &str, register: Register) -> Result<Series, ParseError> {
    let text = String::from_utf8_lossy(input);

    let mut samples = Vec::new();
    let mut seen = HashSet::new();
    let mut retained_rows = 0usize;

    for (idx, row) in text.lines().enumerate().skip(PREAMBLE_LINES) {
        let line = idx + 1;
        if row.trim().is_empty() {
            continue;
        }

        let fields: Vec<&str> = row.split(';').collect();
        if fields.get(INDICATOR_FIELD).map(|f| f.trim()) != Some(ENERGY_INDICATOR) {
            continue;
        }

        if fields.len() < FIRST_VALUE_FIELD + VALUES_PER_ROW {
            return Err(ParseError::MalformedRow {
                file: file.to_string(),
                line,
                detail: format!(
                    "expected at least {} fields, found {}",
                    FIRST_VALUE_FIELD + VALUES_PER_ROW,
                    fields.len()
                ),
            });
        }

        let day_field = fields[DAY_START_FIELD].trim();
        let day_start = NaiveDateTime::parse_from_str(day_field, DAY_START_FORMAT)
            .map_err(|e| ParseError::ColumnConversion {
                file: file.to_string(),
                line,
                column: "day start".to_string(),
                detail: format!("\"{day_field}\": {e}"),
            })?;

        for i in 0..VALUES_PER_ROW {
            let raw = fields[FIRST_VALUE_FIELD + i].trim();
            // Interval endings: the first value column is 00:15, the 96th 24:00.
            let t = day_start + TimeDelta::minutes(((i as i64) + 1) * 15);
            let value = super::standard::parse_decimal_comma(raw).unwrap_or(0.0);

            if !seen.insert(t) {
                return Err(ParseError::DuplicateTimestamp {
                    file: file.to_string(),
                    timestamp: t,
                });
            }
            samples.push(Sample { t, value });
        }
        retained_rows += 1;
    }

    if retained_rows == 0 {
        warn!(file, indicator = ENERGY_INDICATOR, "no rows carried the energy indicator");
    } else {
        debug!(file, rows = retained_rows, "parsed AMR meter file");
    }

    Ok(Series::new(register.quantity(), METER_RESOLUTION_MIN, samples))
}
