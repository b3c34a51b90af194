//! Deterministic irradiance-to-power conversion for Design B.
//!
//! Given one typical-year hourly weather dataset, each PV segment is
//! simulated independently (plane-of-array projection of beam, sky-diffuse
//! and ground-reflected irradiance, cell-temperature derating, system
//! loss) and the segments are summed per hour. No randomness anywhere;
//! identical inputs produce identical output.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDateTime, Timelike};

use super::tmy::WeatherSample;
use super::{PvRequest, PvSegment};

/// Power loss per degree of cell temperature above 25 °C.
const TEMP_COEFF_PER_C: f64 = -0.004;

/// Nominal operating cell temperature (°C) at 800 W/m² and 20 °C ambient.
const NOCT_C: f64 = 45.0;

/// Ground reflectance for the reflected irradiance share.
const ALBEDO: f64 = 0.2;

/// Standard test condition irradiance (W/m²) the peak rating refers to.
const STC_IRRADIANCE: f64 = 1000.0;

/// Simulates total hourly AC power (watts) for all segments of a request.
pub(super) fn simulate_hourly_watts(
    weather: &[WeatherSample],
    request: &PvRequest,
) -> BTreeMap<NaiveDateTime, f64> {
    let mut hourly = BTreeMap::new();
    for sample in weather {
        let (zenith_deg, sun_azimuth_deg) =
            solar_position(sample.t, request.latitude, request.longitude);

        let watts: f64 = request
            .segments
            .iter()
            .map(|segment| {
                let poa = plane_of_array_irradiance(
                    sample.ghi,
                    sample.dni,
                    sample.dhi,
                    zenith_deg,
                    sun_azimuth_deg,
                    segment,
                );
                segment_power_watts(poa, sample.temp_c, segment, request.system_loss_pct)
            })
            .sum();

        hourly.insert(sample.t, watts);
    }
    hourly
}

/// Sun zenith and azimuth (degrees) for a UTC timestamp at a location.
///
/// Azimuth is measured from south, positive towards west — the same
/// convention the segment `azimuth_deg` uses.
fn solar_position(t: NaiveDateTime, latitude_deg: f64, longitude_deg: f64) -> (f64, f64) {
    let day_of_year = f64::from(t.ordinal());
    let declination = declination_deg(day_of_year).to_radians();

    // Weather timestamps are UTC; longitude shifts them to local solar time.
    let solar_hour =
        f64::from(t.hour()) + f64::from(t.minute()) / 60.0 + longitude_deg / 15.0;
    let hour_angle = (15.0 * (solar_hour - 12.0)).to_radians();

    let lat = latitude_deg.to_radians();
    let cos_zenith =
        lat.sin() * declination.sin() + lat.cos() * declination.cos() * hour_angle.cos();
    let zenith = cos_zenith.clamp(-1.0, 1.0).acos();

    let azimuth = hour_angle
        .sin()
        .atan2(hour_angle.cos() * lat.sin() - declination.tan() * lat.cos());

    (zenith.to_degrees(), azimuth.to_degrees())
}

/// Solar declination (degrees) for a day of the year.
fn declination_deg(day_of_year: f64) -> f64 {
    23.45 * ((360.0 / 365.0) * (284.0 + day_of_year)).to_radians().sin()
}

/// Irradiance (W/m²) reaching the tilted, azimuth-rotated segment plane.
fn plane_of_array_irradiance(
    ghi: f64,
    dni: f64,
    dhi: f64,
    zenith_deg: f64,
    sun_azimuth_deg: f64,
    segment: &PvSegment,
) -> f64 {
    let zenith = zenith_deg.to_radians();
    let tilt = segment.tilt_deg.to_radians();
    let azimuth_offset = (sun_azimuth_deg - segment.azimuth_deg).to_radians();

    // Sun below the horizon: no beam, no sky projection worth keeping.
    if zenith.cos() <= 0.0 {
        return 0.0;
    }

    let cos_incidence =
        zenith.cos() * tilt.cos() + zenith.sin() * tilt.sin() * azimuth_offset.cos();

    let beam = dni * cos_incidence.max(0.0);
    let sky_diffuse = dhi * (1.0 + tilt.cos()) / 2.0;
    let ground_reflected = ghi * ALBEDO * (1.0 - tilt.cos()) / 2.0;

    (beam + sky_diffuse + ground_reflected).max(0.0)
}

/// AC power (watts) of one segment at a plane-of-array irradiance.
fn segment_power_watts(
    poa: f64,
    ambient_c: f64,
    segment: &PvSegment,
    system_loss_pct: f64,
) -> f64 {
    if poa <= 0.0 {
        return 0.0;
    }

    let cell_c = ambient_c + poa * (NOCT_C - 20.0) / 800.0;
    let temp_factor = 1.0 + TEMP_COEFF_PER_C * (cell_c - 25.0).max(0.0);

    let dc_watts = segment.peak_power_kw * 1000.0 * (poa / STC_IRRADIANCE) * temp_factor;
    dc_watts * (1.0 - system_loss_pct / 100.0)
}
