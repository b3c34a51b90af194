//! Design A remote half: one hourly production fetch per segment.
//!
//! Each segment is submitted to the production time-series endpoint with
//! its own geometry; the remote model returns that segment's hourly AC
//! power in watts. A failing segment is reported and excluded from the sum
//! rather than failing the estimate; only when every segment fails does the
//! caller end up with an empty series.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use reqwest::blocking::Client;
use tracing::{info, warn};

use crate::error::PvError;
use crate::report::RunReport;
use crate::series::floor_to_hour;
use super::{PvRequest, PvSegment};

const RADIATION_DATABASE: &str = "PVGIS-SARAH2";

const TIME_FORMAT: &str = "%Y%m%d:%H%M";

/// Fetches and sums hourly AC power (watts) across all request segments.
pub(super) fn fetch_hourly_watts(
    client: &Client,
    base_url: &str,
    request: &PvRequest,
    report: &mut RunReport,
) -> Result<BTreeMap<NaiveDateTime, f64>, PvError> {
    let mut total: BTreeMap<NaiveDateTime, f64> = BTreeMap::new();
    let mut fetched = 0usize;

    for (idx, segment) in request.segments.iter().enumerate() {
        let slot = format!("pv segment {}", idx + 1);
        match fetch_segment(client, base_url, request, segment) {
            Ok(hourly) => {
                for (t, watts) in hourly {
                    *total.entry(t).or_insert(0.0) += watts;
                }
                fetched += 1;
            }
            Err(e) => {
                warn!(segment = idx + 1, error = %e, "segment fetch failed, skipping");
                report.error(slot, e.to_string());
            }
        }
    }

    if fetched == 0 && !request.segments.is_empty() {
        warn!("every segment fetch failed; PV estimate is empty");
    }
    Ok(total)
}

fn fetch_segment(
    client: &Client,
    base_url: &str,
    request: &PvRequest,
    segment: &PvSegment,
) -> Result<Vec<(NaiveDateTime, f64)>, PvError> {
    let url = format!("{base_url}/seriescalc");
    info!(url = %url, "fetching segment production series");

    let response = client
        .get(&url)
        .query(&[
            ("lat", request.latitude.to_string()),
            ("lon", request.longitude.to_string()),
            ("startyear", request.reference_year.to_string()),
            ("endyear", request.reference_year.to_string()),
            ("pvcalculation", "1".to_string()),
            ("peakpower", segment.peak_power_kw.to_string()),
            ("loss", request.system_loss_pct.to_string()),
            ("angle", segment.tilt_deg.to_string()),
            ("aspect", segment.azimuth_deg.to_string()),
            ("raddatabase", RADIATION_DATABASE.to_string()),
            ("outputformat", "csv".to_string()),
        ])
        .send()?;

    let status = response.status();
    if !status.is_success() {
        return Err(PvError::Status { status: status.as_u16() });
    }

    parse_power_series(&response.text()?)
}

/// Parses the delimited production body: data rows follow a header line
/// starting `time,`; the first value column is the power in watts. Footer
/// lines after the table are ignored.
fn parse_power_series(body: &str) -> Result<Vec<(NaiveDateTime, f64)>, PvError> {
    let mut in_data = false;
    let mut series = Vec::new();

    for line in body.lines() {
        if !in_data {
            if line.starts_with("time,") {
                in_data = true;
            }
            continue;
        }

        let mut fields = line.split(',');
        let (Some(time), Some(power)) = (fields.next(), fields.next()) else {
            break;
        };
        let Ok(t) = NaiveDateTime::parse_from_str(time.trim(), TIME_FORMAT) else {
            // Footer reached.
            break;
        };

        let watts: f64 = power.trim().parse().unwrap_or(0.0);
        // Remote timestamps sit a few minutes into the hour; key by the hour.
        series.push((floor_to_hour(t), watts));
    }

    if series.is_empty() {
        return Err(PvError::Response(
            "no power rows after the time header".to_string(),
        ));
    }
    Ok(series)
}
