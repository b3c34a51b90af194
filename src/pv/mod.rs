//! Solar-production estimation.
//!
//! Two estimation strategies exist behind one interface, selectable by
//! configuration:
//!
//! * **per-segment** — one remote production-model call per PV segment;
//!   tolerates partial failure (a dead segment is skipped and reported).
//! * **tmy** (default) — one remote weather fetch regardless of segment
//!   count, followed by a deterministic local conversion model per segment;
//!   a fetch failure after bounded retry fails the whole estimate.
//!
//! Either way the hourly watt totals are converted to kWh and spread evenly
//! across the four quarter hours to reach meter resolution, and the result
//! is cached per request so repeated invocations with unchanged parameters
//! make no further network calls.

mod model;
mod pvgis;
mod tmy;

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{NaiveDateTime, TimeDelta};
use reqwest::blocking::Client;
use tracing::debug;

use crate::error::PvError;
use crate::report::RunReport;
use crate::series::{METER_RESOLUTION_MIN, Quantity, Sample, Series};

/// Upper bound on planar sub-arrays per request.
pub const MAX_SEGMENTS: usize = 5;

/// Remote fetch timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const DEFAULT_BASE_URL: &str = "https://re.jrc.ec.europa.eu/api/v5_2";

/// One planar sub-array: its rating and orientation.
///
/// Azimuth is measured from south, positive towards west.
#[derive(Debug, Clone, PartialEq)]
pub struct PvSegment {
    pub peak_power_kw: f64,
    pub tilt_deg: f64,
    pub azimuth_deg: f64,
}

/// A complete estimate request: one location and loss figure shared by
/// 1 to [`MAX_SEGMENTS`] segments.
#[derive(Debug, Clone, PartialEq)]
pub struct PvRequest {
    pub latitude: f64,
    pub longitude: f64,
    pub system_loss_pct: f64,
    /// Simulation year the per-segment endpoint computes for; matching onto
    /// meter data ignores the year either way.
    pub reference_year: i32,
    pub segments: Vec<PvSegment>,
}

/// Which estimation strategy to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PvVariant {
    /// One remote call per segment.
    PerSegment,
    /// One weather fetch, local conversion model.
    Tmy,
}

impl PvVariant {
    /// Parses the configuration vocabulary (`"per-segment"` / `"tmy"`).
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "per-segment" => Some(Self::PerSegment),
            "tmy" => Some(Self::Tmy),
            _ => None,
        }
    }
}

/// Produces estimated-production series at meter resolution.
///
/// Holds the HTTP client and a whole-value result cache; the cache is
/// replaced wholesale on a request-key change, never mutated in place.
pub struct PvEstimator {
    variant: PvVariant,
    client: Client,
    base_url: String,
    cache: Option<(PvRequest, Series)>,
}

impl PvEstimator {
    /// Builds an estimator against the public endpoints.
    ///
    /// # Errors
    ///
    /// Returns a [`PvError`] if the HTTP client cannot be constructed.
    pub fn new(variant: PvVariant) -> Result<Self, PvError> {
        Self::with_base_url(variant, DEFAULT_BASE_URL)
    }

    /// Builds an estimator against a custom endpoint root (used by tests).
    ///
    /// # Errors
    ///
    /// Returns a [`PvError`] if the HTTP client cannot be constructed.
    pub fn with_base_url(variant: PvVariant, base_url: impl Into<String>) -> Result<Self, PvError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            variant,
            client,
            base_url: base_url.into(),
            cache: None,
        })
    }

    /// The strategy this estimator was built for.
    pub fn variant(&self) -> PvVariant {
        self.variant
    }

    /// Estimates 15-minute production for the request.
    ///
    /// Per-segment failures under the per-segment variant are pushed onto
    /// `report` and excluded from the sum.
    ///
    /// # Errors
    ///
    /// Returns a [`PvError`] when the single weather fetch of the `tmy`
    /// variant fails after its bounded retries; the per-segment variant
    /// only errs when a response is structurally unusable.
    pub fn estimate(
        &mut self,
        request: &PvRequest,
        report: &mut RunReport,
    ) -> Result<Series, PvError> {
        if let Some((cached_request, cached_series)) = &self.cache {
            if cached_request == request {
                debug!("PV estimate served from session cache");
                return Ok(cached_series.clone());
            }
        }

        let hourly_watts = match self.variant {
            PvVariant::PerSegment => {
                pvgis::fetch_hourly_watts(&self.client, &self.base_url, request, report)?
            }
            PvVariant::Tmy => {
                let weather = tmy::fetch_tmy(&self.client, &self.base_url, request)?;
                model::simulate_hourly_watts(&weather, request)
            }
        };

        let series = quarter_hour_series(hourly_watts);
        self.cache = Some((request.clone(), series.clone()));
        Ok(series)
    }
}

/// Converts hourly watts to kWh and spreads each hour evenly across its
/// four quarter hours.
fn quarter_hour_series(hourly_watts: BTreeMap<NaiveDateTime, f64>) -> Series {
    let mut samples = Vec::with_capacity(hourly_watts.len() * 4);
    for (hour, watts) in hourly_watts {
        let quarter_kwh = watts / 1000.0 / 4.0;
        for quarter in 0..4 {
            samples.push(Sample {
                t: hour + TimeDelta::minutes(quarter * 15),
                value: quarter_kwh,
            });
        }
    }
    Series::new(Quantity::PvgisKwh, METER_RESOLUTION_MIN, samples)
}
