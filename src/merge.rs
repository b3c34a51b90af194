//! Series alignment and merging.
//!
//! Meter series of 15-minute resolution are outer-joined on exact
//! timestamps; the hourly price series is left-joined onto each row via the
//! hour floor; the PV estimate is left-joined via the year-agnostic
//! calendar key. Whatever remains unmatched is zero-filled, so every
//! unified row always carries a defined number in all five quantity
//! columns.

use std::collections::{BTreeMap, HashMap};

use chrono::{NaiveDate, NaiveDateTime};

use crate::error::{MergeError, PipelineError};
use crate::series::{Quantity, Series, calendar_key, floor_to_hour};

/// One row of the unified table: a timestamp and all five quantities.
///
/// The shape is fixed; quantities with no source data at this timestamp are
/// 0.0, never absent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnifiedRow {
    pub t: NaiveDateTime,
    pub import_kwh: f64,
    pub injection_kwh: f64,
    pub pv_kwh: f64,
    pub belpex: f64,
    pub pvgis_kwh: f64,
}

impl UnifiedRow {
    fn zeroed(t: NaiveDateTime) -> Self {
        Self {
            t,
            import_kwh: 0.0,
            injection_kwh: 0.0,
            pv_kwh: 0.0,
            belpex: 0.0,
            pvgis_kwh: 0.0,
        }
    }
}

/// Merges meter series plus the optional price and PV-estimate series into
/// the unified table, sorted ascending and unique per timestamp.
///
/// # Errors
///
/// Returns [`MergeError::NoSeries`] when every supplied meter series is
/// empty — there is no timeline to align anything onto.
pub fn merge(
    meter_series: &[Series],
    price: Option<&Series>,
    pv_estimate: Option<&Series>,
) -> Result<Vec<UnifiedRow>, MergeError> {
    if meter_series.iter().all(Series::is_empty) {
        return Err(MergeError::NoSeries);
    }

    // Outer join: one row per distinct timestamp seen in any meter series.
    let mut rows: BTreeMap<NaiveDateTime, UnifiedRow> = BTreeMap::new();
    for series in meter_series {
        for sample in series.samples() {
            let row = rows.entry(sample.t).or_insert_with(|| UnifiedRow::zeroed(sample.t));
            match series.quantity() {
                Quantity::ImportKwh => row.import_kwh = sample.value,
                Quantity::InjectionKwh => row.injection_kwh = sample.value,
                Quantity::PvKwh => row.pv_kwh = sample.value,
                // Price and estimate series are joined below, not here.
                Quantity::Belpex | Quantity::PvgisKwh => {}
            }
        }
    }

    // Every 15-minute row within an hour receives that hour's price.
    if let Some(price) = price {
        let by_hour: HashMap<NaiveDateTime, f64> =
            price.samples().iter().map(|s| (s.t, s.value)).collect();
        for row in rows.values_mut() {
            if let Some(value) = by_hour.get(&floor_to_hour(row.t)) {
                row.belpex = *value;
            }
        }
    }

    // The estimate was computed for a reference year; match calendar slots.
    if let Some(pv) = pv_estimate {
        let by_slot: HashMap<(u32, u32, u32, u32), f64> =
            pv.samples().iter().map(|s| (calendar_key(s.t), s.value)).collect();
        for row in rows.values_mut() {
            if let Some(value) = by_slot.get(&calendar_key(row.t)) {
                row.pvgis_kwh = *value;
            }
        }
    }

    Ok(rows.into_values().collect())
}

/// Keeps rows whose date component lies within `[start, end]` inclusive.
///
/// # Errors
///
/// Returns [`PipelineError::UserInput`] when `end` precedes `start`.
pub fn filter_range(
    rows: &[UnifiedRow],
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<UnifiedRow>, PipelineError> {
    if end < start {
        return Err(PipelineError::UserInput { start, end });
    }
    Ok(rows
        .iter()
        .filter(|r| {
            let date = r.t.date();
            date >= start && date <= end
        })
        .copied()
        .collect())
}

/// Smallest and largest date present in the table, if any rows exist.
pub fn date_bounds(rows: &[UnifiedRow]) -> Option<(NaiveDate, NaiveDate)> {
    let first = rows.first()?;
    let last = rows.last()?;
    Some((first.t.date(), last.t.date()))
}
