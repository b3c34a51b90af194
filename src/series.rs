//! Canonical time series: the common currency between parsers, the PV
//! estimator, and the merge step.
//!
//! Every source encoding is reduced to an ordered `(timestamp, value)`
//! sequence for exactly one physical quantity. Series are created by a
//! single parser or estimator invocation and never mutated afterwards.

use chrono::{NaiveDateTime, Timelike};

/// Native resolution of meter and PV-estimate data, in minutes.
pub const METER_RESOLUTION_MIN: u32 = 15;

/// Native resolution of day-ahead price data, in minutes.
pub const PRICE_RESOLUTION_MIN: u32 = 60;

/// One meter reading, price tick, or estimated production value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub t: NaiveDateTime,
    pub value: f64,
}

/// The physical quantity a series carries; one unified-table column each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quantity {
    /// Grid import energy (kWh per interval).
    ImportKwh,
    /// Grid injection energy (kWh per interval).
    InjectionKwh,
    /// Auxiliary / PV production metering (kWh per interval).
    PvKwh,
    /// Day-ahead price (EUR per kWh).
    Belpex,
    /// Estimated PV production (kWh per interval).
    PvgisKwh,
}

impl Quantity {
    /// The unified-table column name for this quantity.
    pub fn column(self) -> &'static str {
        match self {
            Self::ImportKwh => "import_kwh",
            Self::InjectionKwh => "injection_kwh",
            Self::PvKwh => "pv_kwh",
            Self::Belpex => "BELPEX",
            Self::PvgisKwh => "PVGIS_kwh",
        }
    }
}

/// Register label on a standard-format meter row, identifying which physical
/// quantity the row's volume represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    Import,
    Injection,
    Auxiliary,
}

impl Register {
    /// The literal label used in the standard meter export.
    pub fn label(self) -> &'static str {
        match self {
            Self::Import => "Afname Actief",
            Self::Injection => "Injectie Actief",
            Self::Auxiliary => "Hulpverbruik Actief",
        }
    }

    /// The unified-table quantity rows with this register feed.
    pub fn quantity(self) -> Quantity {
        match self {
            Self::Import => Quantity::ImportKwh,
            Self::Injection => Quantity::InjectionKwh,
            Self::Auxiliary => Quantity::PvKwh,
        }
    }
}

/// An ordered series of samples for one quantity.
///
/// Timestamps are unique within a series; parsers reject duplicate source
/// rows rather than silently collapsing them. The series is nominally at a
/// fixed resolution but is not required to be gap-free.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    quantity: Quantity,
    resolution_min: u32,
    samples: Vec<Sample>,
}

impl Series {
    /// Builds a series from parser output, sorting samples ascending.
    ///
    /// Uniqueness of timestamps is the producing parser's responsibility;
    /// it is a parse error there, not a collapse here.
    pub fn new(quantity: Quantity, resolution_min: u32, mut samples: Vec<Sample>) -> Self {
        samples.sort_by_key(|s| s.t);
        Self {
            quantity,
            resolution_min,
            samples,
        }
    }

    /// An empty series for a quantity, used when a source is dropped.
    pub fn empty(quantity: Quantity, resolution_min: u32) -> Self {
        Self {
            quantity,
            resolution_min,
            samples: Vec::new(),
        }
    }

    pub fn quantity(&self) -> Quantity {
        self.quantity
    }

    pub fn resolution_min(&self) -> u32 {
        self.resolution_min
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Year-agnostic match key: month, day, hour, minute.
///
/// PV estimates are computed for one fixed reference year while meter data
/// may span a different year; alignment matches calendar slots, not literal
/// timestamps.
pub fn calendar_key(t: NaiveDateTime) -> (u32, u32, u32, u32) {
    use chrono::Datelike;
    (t.month(), t.day(), t.hour(), t.minute())
}

/// Floors a timestamp to the start of its hour, for joining 15-minute rows
/// onto hourly price ticks.
pub fn floor_to_hour(t: NaiveDateTime) -> NaiveDateTime {
    t.with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, 0)
            .unwrap()
    }

    #[test]
    fn series_sorts_samples_ascending() {
        let series = Series::new(
            Quantity::ImportKwh,
            METER_RESOLUTION_MIN,
            vec![
                Sample { t: ts(2023, 6, 15, 10, 30), value: 2.0 },
                Sample { t: ts(2023, 6, 15, 10, 0), value: 1.0 },
                Sample { t: ts(2023, 6, 15, 10, 15), value: 3.0 },
            ],
        );
        let times: Vec<_> = series.samples().iter().map(|s| s.t).collect();
        assert_eq!(
            times,
            vec![
                ts(2023, 6, 15, 10, 0),
                ts(2023, 6, 15, 10, 15),
                ts(2023, 6, 15, 10, 30),
            ]
        );
    }

    #[test]
    fn register_labels_match_source_vocabulary() {
        assert_eq!(Register::Import.label(), "Afname Actief");
        assert_eq!(Register::Injection.label(), "Injectie Actief");
        assert_eq!(Register::Auxiliary.label(), "Hulpverbruik Actief");
    }

    #[test]
    fn calendar_key_ignores_year() {
        assert_eq!(
            calendar_key(ts(2020, 6, 15, 10, 15)),
            calendar_key(ts(2023, 6, 15, 10, 15))
        );
        assert_ne!(
            calendar_key(ts(2023, 6, 15, 10, 15)),
            calendar_key(ts(2023, 6, 16, 10, 15))
        );
    }

    #[test]
    fn floor_to_hour_zeroes_minutes() {
        assert_eq!(floor_to_hour(ts(2023, 1, 2, 13, 45)), ts(2023, 1, 2, 13, 0));
        assert_eq!(floor_to_hour(ts(2023, 1, 2, 13, 0)), ts(2023, 1, 2, 13, 0));
    }
}
