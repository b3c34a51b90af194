//! TOML-based run configuration.
//!
//! All sections have defaults where a default is meaningful; the PV section
//! is optional as a whole (absent means no estimate is computed). Load from
//! TOML with [`RunConfig::from_toml_file`] and check constraints with
//! [`RunConfig::validate`].

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Deserialize;

use crate::io::export::Layout;
use crate::parsers::MeterFormat;
use crate::pv::{MAX_SEGMENTS, PvVariant};

/// Path tried for the price file when `input.price_file` is not set; some
/// deployments bundle the price export next to the binary.
pub const BUNDLED_PRICE_FILE: &str = "BelpexFilter.csv";

/// Top-level run configuration parsed from TOML.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Input files and their meter encoding.
    #[serde(default)]
    pub input: InputConfig,
    /// PV estimate parameters; omitted section disables the estimate.
    #[serde(default)]
    pub pv: Option<PvConfig>,
    /// Export layout, directory, and date range.
    #[serde(default)]
    pub output: OutputConfig,
}

/// Input files and their meter encoding.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InputConfig {
    /// Meter encoding of the uploaded files: `"standard"` or `"amr"`.
    pub meter_format: String,
    /// Import (grid offtake) meter file.
    pub import_file: Option<PathBuf>,
    /// Injection (grid feed-in) meter file.
    pub injection_file: Option<PathBuf>,
    /// Auxiliary / PV production meter file.
    pub auxiliary_file: Option<PathBuf>,
    /// Day-ahead price file; unset falls back to the bundled file.
    pub price_file: Option<PathBuf>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            meter_format: "standard".to_string(),
            import_file: None,
            injection_file: None,
            auxiliary_file: None,
            price_file: None,
        }
    }
}

/// PV estimate parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PvConfig {
    /// Estimation strategy: `"tmy"` (one weather fetch, local model) or
    /// `"per-segment"` (one remote call per segment).
    #[serde(default = "default_pv_variant")]
    pub variant: String,
    /// Installation latitude (degrees).
    pub latitude: f64,
    /// Installation longitude (degrees).
    pub longitude: f64,
    /// System loss percentage applied to all segments.
    #[serde(default = "default_system_loss")]
    pub system_loss_pct: f64,
    /// Simulation year for the per-segment endpoint.
    #[serde(default = "default_reference_year")]
    pub reference_year: i32,
    /// 1 to 5 planar sub-arrays.
    #[serde(default)]
    pub segment: Vec<SegmentConfig>,
}

fn default_pv_variant() -> String {
    "tmy".to_string()
}

fn default_system_loss() -> f64 {
    14.0
}

fn default_reference_year() -> i32 {
    2020
}

/// One planar sub-array.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SegmentConfig {
    /// Peak power rating (kW).
    pub peak_power_kw: f64,
    /// Tilt from horizontal (degrees).
    pub tilt_deg: f64,
    /// Azimuth from south, positive west (degrees).
    #[serde(default)]
    pub azimuth_deg: f64,
}

/// Export layout, directory, and date range.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Workbook layout: `"combined"` or `"split"`.
    pub layout: String,
    /// Directory the workbook is written into.
    pub directory: PathBuf,
    /// First day to export; unset means the earliest day in the data.
    pub start_date: Option<NaiveDate>,
    /// Last day to export; unset means the latest day in the data.
    pub end_date: Option<NaiveDate>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            layout: "combined".to_string(),
            directory: PathBuf::from("."),
            start_date: None,
            end_date: None,
        }
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug)]
pub struct ConfigError {
    /// Dotted field path (e.g., `"pv.latitude"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config error: {} — {}", self.field, self.message)
    }
}

impl RunConfig {
    /// Parses a run configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is
    /// invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError {
            field: "config".to_string(),
            message: format!("cannot read \"{}\": {e}", path.display()),
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a run configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown
    /// fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError {
            field: "toml".to_string(),
            message: e.to_string(),
        })
    }

    /// The configured meter format, if its name is valid.
    pub fn meter_format(&self) -> Option<MeterFormat> {
        MeterFormat::from_name(&self.input.meter_format)
    }

    /// The configured export layout, if its name is valid.
    pub fn layout(&self) -> Option<Layout> {
        Layout::from_name(&self.output.layout)
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if the configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        let input = &self.input;
        if MeterFormat::from_name(&input.meter_format).is_none() {
            errors.push(ConfigError {
                field: "input.meter_format".into(),
                message: format!(
                    "must be \"standard\" or \"amr\", got \"{}\"",
                    input.meter_format
                ),
            });
        }
        if input.import_file.is_none()
            && input.injection_file.is_none()
            && input.auxiliary_file.is_none()
        {
            errors.push(ConfigError {
                field: "input".into(),
                message: "at least one meter file must be set".into(),
            });
        }

        if let Some(pv) = &self.pv {
            if PvVariant::from_name(&pv.variant).is_none() {
                errors.push(ConfigError {
                    field: "pv.variant".into(),
                    message: format!(
                        "must be \"tmy\" or \"per-segment\", got \"{}\"",
                        pv.variant
                    ),
                });
            }
            if !(-90.0..=90.0).contains(&pv.latitude) {
                errors.push(ConfigError {
                    field: "pv.latitude".into(),
                    message: "must be in [-90, 90]".into(),
                });
            }
            if !(-180.0..=180.0).contains(&pv.longitude) {
                errors.push(ConfigError {
                    field: "pv.longitude".into(),
                    message: "must be in [-180, 180]".into(),
                });
            }
            if !(0.0..=100.0).contains(&pv.system_loss_pct) {
                errors.push(ConfigError {
                    field: "pv.system_loss_pct".into(),
                    message: "must be in [0, 100]".into(),
                });
            }
            if pv.segment.is_empty() || pv.segment.len() > MAX_SEGMENTS {
                errors.push(ConfigError {
                    field: "pv.segment".into(),
                    message: format!("must have 1 to {MAX_SEGMENTS} entries"),
                });
            }
            for (i, segment) in pv.segment.iter().enumerate() {
                if segment.peak_power_kw <= 0.0 {
                    errors.push(ConfigError {
                        field: format!("pv.segment[{i}].peak_power_kw"),
                        message: "must be > 0".into(),
                    });
                }
                if !(0.0..=90.0).contains(&segment.tilt_deg) {
                    errors.push(ConfigError {
                        field: format!("pv.segment[{i}].tilt_deg"),
                        message: "must be in [0, 90]".into(),
                    });
                }
                if !(-180.0..=180.0).contains(&segment.azimuth_deg) {
                    errors.push(ConfigError {
                        field: format!("pv.segment[{i}].azimuth_deg"),
                        message: "must be in [-180, 180]".into(),
                    });
                }
            }
        }

        let output = &self.output;
        if Layout::from_name(&output.layout).is_none() {
            errors.push(ConfigError {
                field: "output.layout".into(),
                message: format!("must be \"combined\" or \"split\", got \"{}\"", output.layout),
            });
        }
        if let (Some(start), Some(end)) = (output.start_date, output.end_date) {
            if end < start {
                errors.push(ConfigError {
                    field: "output.end_date".into(),
                    message: "must not precede output.start_date".into(),
                });
            }
        }

        errors
    }
}
