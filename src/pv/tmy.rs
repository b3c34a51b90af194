//! Design B remote half: one typical-meteorological-year fetch.
//!
//! A single GET retrieves the hourly TMY weather dataset for the requested
//! coordinates. Server-side failures (5xx) are retried up to 3 attempts
//! with exponential backoff starting at 500 ms; transport failures and
//! client-side statuses are not retried. After exhausted retries the whole
//! estimate fails — there is no partial result in this design.

use std::thread;
use std::time::Duration;

use chrono::NaiveDateTime;
use reqwest::blocking::Client;
use tracing::{info, warn};

use crate::error::PvError;
use super::PvRequest;

const MAX_ATTEMPTS: u32 = 3;
const INITIAL_BACKOFF: Duration = Duration::from_millis(500);

const TIME_FORMAT: &str = "%Y%m%d:%H%M";

/// One hour of the typical-year weather dataset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) struct WeatherSample {
    pub t: NaiveDateTime,
    /// Ambient temperature at 2 m (°C).
    pub temp_c: f64,
    /// Global horizontal irradiance (W/m²).
    pub ghi: f64,
    /// Direct normal irradiance (W/m²).
    pub dni: f64,
    /// Diffuse horizontal irradiance (W/m²).
    pub dhi: f64,
}

/// Fetches the TMY dataset for the request's coordinates.
pub(super) fn fetch_tmy(
    client: &Client,
    base_url: &str,
    request: &PvRequest,
) -> Result<Vec<WeatherSample>, PvError> {
    let url = format!("{base_url}/tmy");
    let mut backoff = INITIAL_BACKOFF;
    let mut attempt = 1u32;

    loop {
        info!(url = %url, attempt, "fetching TMY weather dataset");
        let response = client
            .get(&url)
            .query(&[
                ("lat", request.latitude.to_string()),
                ("lon", request.longitude.to_string()),
                ("outputformat", "csv".to_string()),
            ])
            .send()?;

        let status = response.status();
        if status.is_success() {
            return parse_tmy(&response.text()?);
        }

        if status.is_server_error() && attempt < MAX_ATTEMPTS {
            warn!(status = status.as_u16(), attempt, "TMY endpoint failed, retrying");
            thread::sleep(backoff);
            backoff *= 2;
            attempt += 1;
            continue;
        }

        return Err(PvError::Status { status: status.as_u16() });
    }
}

/// Parses the delimited TMY body into weather samples.
///
/// The data table begins at a header line starting with `time`; columns are
/// located by name so the endpoint may reorder or append columns. Footer
/// lines after the table are ignored.
fn parse_tmy(body: &str) -> Result<Vec<WeatherSample>, PvError> {
    let mut columns: Option<TmyColumns> = None;
    let mut samples = Vec::new();

    for line in body.lines() {
        let Some(cols) = &columns else {
            if line.starts_with("time") {
                columns = Some(TmyColumns::locate(line)?);
            }
            continue;
        };

        let fields: Vec<&str> = line.split(',').collect();
        let Some(Ok(t)) = fields
            .first()
            .map(|f| NaiveDateTime::parse_from_str(f.trim(), TIME_FORMAT))
        else {
            // Footer reached.
            break;
        };

        samples.push(WeatherSample {
            t,
            temp_c: cols.value(&fields, cols.temp),
            ghi: cols.value(&fields, cols.ghi),
            dni: cols.value(&fields, cols.dni),
            dhi: cols.value(&fields, cols.dhi),
        });
    }

    if samples.is_empty() {
        return Err(PvError::Response(
            "no weather rows after the time header".to_string(),
        ));
    }
    Ok(samples)
}

/// Column positions within the TMY table.
struct TmyColumns {
    temp: usize,
    ghi: usize,
    dni: usize,
    dhi: usize,
}

impl TmyColumns {
    fn locate(header: &str) -> Result<Self, PvError> {
        let names: Vec<&str> = header.split(',').map(str::trim).collect();
        let find = |name: &str| {
            names
                .iter()
                .position(|n| *n == name)
                .ok_or_else(|| PvError::Response(format!("weather dataset lacks column {name}")))
        };
        Ok(Self {
            temp: find("T2m")?,
            ghi: find("G(h)")?,
            dni: find("Gb(n)")?,
            dhi: find("Gd(h)")?,
        })
    }

    fn value(&self, fields: &[&str], idx: usize) -> f64 {
        fields
            .get(idx)
            .and_then(|f| f.trim().parse().ok())
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = "\
Latitude (decimal degrees): 51.050\n\
Longitude (decimal degrees): 3.720\n\
time(UTC),T2m,RH,G(h),Gb(n),Gd(h),IR(h),WS10m,WD10m,SP\n\
20070615:1200,21.4,55.2,820.0,700.0,150.0,380.0,2.1,180,101300\n\
20070615:1300,22.0,54.0,790.0,680.0,140.0,382.0,2.0,175,101280\n\
\n\
T2m: 2-m air temperature (degree Celsius)\n";

    #[test]
    fn parses_rows_between_header_and_footer() {
        let samples = parse_tmy(BODY).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].temp_c, 21.4);
        assert_eq!(samples[0].ghi, 820.0);
        assert_eq!(samples[0].dni, 700.0);
        assert_eq!(samples[0].dhi, 150.0);
    }

    #[test]
    fn columns_are_located_by_name_not_position() {
        let body = "\
time(UTC),G(h),T2m,Gd(h),Gb(n)\n\
20070615:1200,820.0,21.4,150.0,700.0\n";
        let samples = parse_tmy(body).unwrap();
        assert_eq!(samples[0].temp_c, 21.4);
        assert_eq!(samples[0].dni, 700.0);
    }

    #[test]
    fn missing_irradiance_column_is_unusable() {
        let body = "time(UTC),T2m\n20070615:1200,21.4\n";
        let err = parse_tmy(body).unwrap_err();
        assert!(matches!(err, PvError::Response(_)));
    }

    #[test]
    fn body_without_table_is_unusable() {
        let err = parse_tmy("service unavailable\n").unwrap_err();
        assert!(matches!(err, PvError::Response(_)));
    }
}
