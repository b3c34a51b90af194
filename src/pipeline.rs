//! Pipeline orchestration: parse → estimate → merge → export.
//!
//! Results are threaded explicitly between steps as an immutable
//! [`RunOutcome`]; there is no ambient run state. Failures scoped to one
//! source are downgraded onto the outcome's [`RunReport`] so the remaining
//! inputs still contribute — the table degrades to zero-filled columns
//! instead of the run failing. Only two conditions abort: every meter slot
//! empty (before merge) and an inverted date range (before export).

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::config::{BUNDLED_PRICE_FILE, RunConfig};
use crate::error::{ParseError, PipelineError};
use crate::io::export::{Layout, export_workbook, workbook_filename};
use crate::merge::{UnifiedRow, date_bounds, filter_range, merge};
use crate::parsers::{MeterFormat, parse_amr, parse_belpex, parse_standard};
use crate::pv::{PvEstimator, PvRequest, PvSegment, PvVariant};
use crate::report::RunReport;
use crate::series::{METER_RESOLUTION_MIN, Register, Series};

/// The merged table plus everything a caller needs to present or export it.
#[derive(Debug)]
pub struct RunOutcome {
    /// The unified table, ascending, zero-filled.
    pub rows: Vec<UnifiedRow>,
    /// Downgraded errors and warnings collected along the way.
    pub report: RunReport,
    /// Earliest date present in the table.
    pub min_date: NaiveDate,
    /// Latest date present in the table.
    pub max_date: NaiveDate,
}

/// Runs the reconciliation pipeline.
///
/// Owns the PV estimator so its session cache survives across runs with
/// unchanged PV parameters.
pub struct Pipeline {
    estimator: Option<PvEstimator>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self { estimator: None }
    }

    /// Parses all configured sources, runs the PV estimate if enabled, and
    /// merges everything into the unified table.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::NoValidInput`] when none of the meter slots
    /// yielded a non-empty series. Everything else is downgraded onto the
    /// outcome's report.
    pub fn run(&mut self, config: &RunConfig) -> Result<RunOutcome, PipelineError> {
        let mut report = RunReport::new();
        let format = config.meter_format().unwrap_or(MeterFormat::Standard);

        let slots: [(&Option<PathBuf>, Register); 3] = [
            (&config.input.import_file, Register::Import),
            (&config.input.injection_file, Register::Injection),
            (&config.input.auxiliary_file, Register::Auxiliary),
        ];

        let mut meter_series = Vec::new();
        for (path, register) in slots {
            let Some(path) = path else { continue };
            let series = parse_meter_file(path, format, register, &mut report);
            meter_series.push(series);
        }

        if meter_series.iter().all(Series::is_empty) {
            return Err(PipelineError::NoValidInput);
        }

        let price = parse_price_file(config, &mut report);
        let pv_estimate = self.estimate_pv(config, &mut report);

        let rows = merge(&meter_series, price.as_ref(), pv_estimate.as_ref())?;
        // merge() already rejected an all-empty input set, so bounds exist.
        let (min_date, max_date) = date_bounds(&rows).ok_or(PipelineError::NoValidInput)?;

        info!(rows = rows.len(), %min_date, %max_date, "pipeline run complete");
        Ok(RunOutcome { rows, report, min_date, max_date })
    }

    /// Filters the outcome to the configured date range and writes the
    /// workbook, returning its path.
    ///
    /// Range ends default to the outcome's data bounds and are clamped onto
    /// them.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::UserInput`] when the effective end precedes
    /// the effective start, or an export error when writing fails.
    pub fn export(
        &self,
        outcome: &RunOutcome,
        config: &RunConfig,
    ) -> Result<PathBuf, PipelineError> {
        let layout = config.layout().unwrap_or(Layout::Combined);
        let start = config
            .output
            .start_date
            .unwrap_or(outcome.min_date)
            .clamp(outcome.min_date, outcome.max_date);
        let end = config
            .output
            .end_date
            .unwrap_or(outcome.max_date)
            .clamp(outcome.min_date, outcome.max_date);

        let rows = filter_range(&outcome.rows, start, end)?;
        let path = config
            .output
            .directory
            .join(workbook_filename(start, end, layout));
        export_workbook(&rows, layout, &path)?;
        Ok(path)
    }

    fn estimate_pv(&mut self, config: &RunConfig, report: &mut RunReport) -> Option<Series> {
        let pv = config.pv.as_ref()?;
        let variant = PvVariant::from_name(&pv.variant).unwrap_or(PvVariant::Tmy);

        // A variant switch between runs needs a fresh estimator (and cache).
        if self.estimator.as_ref().is_some_and(|e| e.variant() != variant) {
            self.estimator = None;
        }
        if self.estimator.is_none() {
            match PvEstimator::new(variant) {
                Ok(estimator) => self.estimator = Some(estimator),
                Err(e) => {
                    report.error("pv", e.to_string());
                    return None;
                }
            }
        }
        let estimator = self.estimator.as_mut()?;

        let request = PvRequest {
            latitude: pv.latitude,
            longitude: pv.longitude,
            system_loss_pct: pv.system_loss_pct,
            reference_year: pv.reference_year,
            segments: pv
                .segment
                .iter()
                .map(|s| PvSegment {
                    peak_power_kw: s.peak_power_kw,
                    tilt_deg: s.tilt_deg,
                    azimuth_deg: s.azimuth_deg,
                })
                .collect(),
        };

        match estimator.estimate(&request, report) {
            Ok(series) => Some(series),
            Err(e) => {
                warn!(error = %e, "PV estimate failed");
                report.error("pv", e.to_string());
                None
            }
        }
    }
}

/// Parses one meter slot, downgrading failures to report entries.
fn parse_meter_file(
    path: &Path,
    format: MeterFormat,
    register: Register,
    report: &mut RunReport,
) -> Series {
    let file = path.display().to_string();
    let result = fs::read(path)
        .map_err(|source| ParseError::Io { file: file.clone(), source })
        .and_then(|bytes| match format {
            MeterFormat::Standard => parse_standard(&bytes, &file, register),
            MeterFormat::Amr => parse_amr(&bytes, &file, register),
        });

    match result {
        Ok(series) => {
            if series.is_empty() {
                report.warn(&file, "file is structurally valid but yielded no rows");
            }
            series
        }
        Err(e) => {
            report.error(&file, e.to_string());
            Series::empty(register.quantity(), METER_RESOLUTION_MIN)
        }
    }
}

/// Parses the price source, downgrading failures to report entries.
///
/// A caller-supplied path that fails is an error entry; the bundled
/// fallback being absent is only a warning (price columns stay zero).
fn parse_price_file(config: &RunConfig, report: &mut RunReport) -> Option<Series> {
    let (path, bundled) = match &config.input.price_file {
        Some(path) => (path.clone(), false),
        None => (PathBuf::from(BUNDLED_PRICE_FILE), true),
    };
    let file = path.display().to_string();

    let bytes = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) => {
            if bundled {
                report.warn(
                    &file,
                    PipelineError::PriceFileNotFound { path }.to_string(),
                );
            } else {
                report.error(&file, e.to_string());
            }
            return None;
        }
    };

    match parse_belpex(&bytes, &file) {
        Ok(series) => Some(series),
        Err(e) => {
            report.error(&file, e.to_string());
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        path
    }

    const STANDARD_BODY: &str = "\
Van (datum);Van (tijdstip);Register;Volume\n\
15-06-2023;10:00:00;Afname Actief;1,0\n\
15-06-2023;10:15:00;Afname Actief;2,0\n";

    fn config_with(import: &Path) -> RunConfig {
        RunConfig::from_toml_str(&format!(
            "[input]\nimport_file = \"{}\"\n",
            import.display()
        ))
        .unwrap()
    }

    #[test]
    fn run_without_any_usable_meter_file_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.csv");
        let config = config_with(&missing);

        let mut pipeline = Pipeline::new();
        let err = pipeline.run(&config).unwrap_err();
        assert!(matches!(err, PipelineError::NoValidInput));
    }

    #[test]
    fn unreadable_file_is_reported_not_fatal_when_a_sibling_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let import = write_file(dir.path(), "afname.csv", STANDARD_BODY);
        let config = RunConfig::from_toml_str(&format!(
            "[input]\nimport_file = \"{}\"\ninjection_file = \"{}\"\n",
            import.display(),
            dir.path().join("missing.csv").display()
        ))
        .unwrap();

        let mut pipeline = Pipeline::new();
        let outcome = pipeline.run(&config).unwrap();
        assert_eq!(outcome.rows.len(), 2);
        assert!(outcome.report.has_errors());
    }

    #[test]
    fn missing_bundled_price_is_a_warning_with_zero_prices() {
        let dir = tempfile::tempdir().unwrap();
        let import = write_file(dir.path(), "afname.csv", STANDARD_BODY);
        let config = config_with(&import);

        let mut pipeline = Pipeline::new();
        let outcome = pipeline.run(&config).unwrap();
        assert!(outcome.rows.iter().all(|r| r.belpex == 0.0));
        assert!(!outcome.report.is_clean());
        assert!(!outcome.report.has_errors());
    }

    #[test]
    fn export_clamps_range_onto_data_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let import = write_file(dir.path(), "afname.csv", STANDARD_BODY);
        let config = RunConfig::from_toml_str(&format!(
            "[input]\nimport_file = \"{}\"\n\n[output]\ndirectory = \"{}\"\nstart_date = \"2000-01-01\"\nend_date = \"2099-01-01\"\n",
            import.display(),
            dir.path().display()
        ))
        .unwrap();

        let mut pipeline = Pipeline::new();
        let outcome = pipeline.run(&config).unwrap();
        let path = pipeline.export(&outcome, &config).unwrap();
        assert!(path.ends_with("energiemix_2023-06-15_2023-06-15_combined.xlsx"));
        assert!(path.exists());
    }
}
