//! Shared fixtures for integration tests: inline source-file bodies and
//! helpers to lay them out in a scratch directory.

use std::fs;
use std::path::{Path, PathBuf};

/// A standard-format import file covering 2023-06-15 10:00 .. 10:45.
pub const IMPORT_BODY: &str = "\
Van (datum);Van (tijdstip);Tot (datum);Tot (tijdstip);Register;Volume;Eenheid
15-06-2023;10:00:00;15-06-2023;10:15:00;Afname Actief;0,250;kWh
15-06-2023;10:15:00;15-06-2023;10:30:00;Afname Actief;0,300;kWh
15-06-2023;10:30:00;15-06-2023;10:45:00;Afname Actief;0,200;kWh
15-06-2023;10:45:00;15-06-2023;11:00:00;Afname Actief;0,275;kWh
16-06-2023;10:00:00;16-06-2023;10:15:00;Afname Actief;0,400;kWh
";

/// A standard-format injection file overlapping the import timeline.
pub const INJECTION_BODY: &str = "\
Van (datum);Van (tijdstip);Tot (datum);Tot (tijdstip);Register;Volume;Eenheid
15-06-2023;10:00:00;15-06-2023;10:15:00;Injectie Actief;0,100;kWh
15-06-2023;10:15:00;15-06-2023;10:30:00;Injectie Actief;0,000;kWh
";

/// A price file with one tick per hour the meter data touches.
pub const PRICE_BODY: &str = "\
Date;Euro
15/06/2023 10:00;45,67 \u{80}/MWh
16/06/2023 10:00;50,00 \u{80}/MWh
";

/// Writes `body` to `dir/name` and returns the path.
pub fn write_file(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).expect("fixture file should be writable");
    path
}

/// Builds a run-config TOML for the given slot assignments.
pub fn config_toml(
    import: Option<&Path>,
    injection: Option<&Path>,
    price: Option<&Path>,
    out_dir: &Path,
    layout: &str,
) -> String {
    let mut toml = String::from("[input]\n");
    if let Some(path) = import {
        toml.push_str(&format!("import_file = \"{}\"\n", path.display()));
    }
    if let Some(path) = injection {
        toml.push_str(&format!("injection_file = \"{}\"\n", path.display()));
    }
    if let Some(path) = price {
        toml.push_str(&format!("price_file = \"{}\"\n", path.display()));
    }
    toml.push_str(&format!(
        "\n[output]\nlayout = \"{layout}\"\ndirectory = \"{}\"\n",
        out_dir.display()
    ));
    toml
}
