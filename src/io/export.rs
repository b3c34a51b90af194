//! Spreadsheet rendering of the unified table.
//!
//! Two layouts exist. The combined layout is the unified table unchanged on
//! a single sheet. The split layout re-expresses each non-zero quantity in
//! the row shape of the standard meter export (start/end timestamp pairs,
//! register label, decimal-comma volume, `KWH` unit), one sheet per
//! quantity — a quantity summing to exactly zero over the filtered range
//! gets no sheet at all.

use std::path::Path;

use chrono::{NaiveDate, TimeDelta};
use rust_xlsxwriter::{Workbook, Worksheet};
use tracing::info;

use crate::error::ExportError;
use crate::merge::UnifiedRow;

/// Which workbook shape to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// The unified table unchanged, one sheet.
    Combined,
    /// One standard-meter-shaped sheet per non-zero quantity.
    Split,
}

impl Layout {
    /// Parses the configuration vocabulary (`"combined"` / `"split"`).
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "combined" => Some(Self::Combined),
            "split" => Some(Self::Split),
            _ => None,
        }
    }

    fn file_tag(self) -> &'static str {
        match self {
            Self::Combined => "combined",
            Self::Split => "split",
        }
    }
}

/// Column header of the combined sheet.
const COMBINED_HEADER: [&str; 6] = [
    "Date",
    "import_kwh",
    "injection_kwh",
    "pv_kwh",
    "BELPEX",
    "PVGIS_kwh",
];

/// Row header of every split sheet, mirroring the standard meter export.
const SPLIT_HEADER: [&str; 7] = [
    "Van (datum)",
    "Van (tijdstip)",
    "Tot (datum)",
    "Tot (tijdstip)",
    "Register",
    "Volume",
    "Eenheid",
];

const UNIT_LABEL: &str = "KWH";

/// Quantity columns that can become split sheets: accessor, sheet name,
/// register label written into each row.
const SPLIT_SHEETS: [(fn(&UnifiedRow) -> f64, &str, &str); 4] = [
    (|r| r.import_kwh, "Afname", "Afname Actief"),
    (|r| r.injection_kwh, "Injectie", "Injectie Actief"),
    (|r| r.pv_kwh, "Hulpverbruik", "Hulpverbruik Actief"),
    (|r| r.pvgis_kwh, "PVGIS", "PVGIS Simulatie"),
];

/// The output filename for a date range and layout.
pub fn workbook_filename(start: NaiveDate, end: NaiveDate, layout: Layout) -> String {
    format!("energiemix_{start}_{end}_{}.xlsx", layout.file_tag())
}

/// Writes the filtered unified table as a workbook at `path`.
///
/// # Errors
///
/// Returns an [`ExportError`] when a sheet cannot be built or the file
/// cannot be written.
pub fn export_workbook(
    rows: &[UnifiedRow],
    layout: Layout,
    path: &Path,
) -> Result<(), ExportError> {
    let mut workbook = Workbook::new();
    match layout {
        Layout::Combined => write_combined(workbook.add_worksheet(), rows)?,
        Layout::Split => write_split(&mut workbook, rows)?,
    }
    workbook.save(path)?;
    info!(path = %path.display(), rows = rows.len(), "workbook written");
    Ok(())
}

fn write_combined(sheet: &mut Worksheet, rows: &[UnifiedRow]) -> Result<(), ExportError> {
    sheet.set_name("Data")?;
    for (col, title) in COMBINED_HEADER.iter().enumerate() {
        sheet.write_string(0, col as u16, *title)?;
    }
    for (i, row) in rows.iter().enumerate() {
        let r = (i + 1) as u32;
        sheet.write_string(r, 0, row.t.format("%Y-%m-%d %H:%M:%S").to_string())?;
        sheet.write_number(r, 1, row.import_kwh)?;
        sheet.write_number(r, 2, row.injection_kwh)?;
        sheet.write_number(r, 3, row.pv_kwh)?;
        sheet.write_number(r, 4, row.belpex)?;
        sheet.write_number(r, 5, row.pvgis_kwh)?;
    }
    Ok(())
}

fn write_split(workbook: &mut Workbook, rows: &[UnifiedRow]) -> Result<(), ExportError> {
    for (value_of, sheet_name, register_label) in SPLIT_SHEETS {
        // A quantity that contributed nothing gets no sheet, not an empty one.
        if rows.iter().map(value_of).sum::<f64>() == 0.0 {
            continue;
        }

        let sheet = workbook.add_worksheet();
        sheet.set_name(sheet_name)?;
        for (col, title) in SPLIT_HEADER.iter().enumerate() {
            sheet.write_string(0, col as u16, *title)?;
        }

        for (i, row) in rows.iter().enumerate() {
            let r = (i + 1) as u32;
            let end = row.t + TimeDelta::minutes(15);
            sheet.write_string(r, 0, row.t.format("%d/%m/%Y").to_string())?;
            sheet.write_string(r, 1, row.t.format("%H:%M:%S").to_string())?;
            sheet.write_string(r, 2, end.format("%d/%m/%Y").to_string())?;
            sheet.write_string(r, 3, end.format("%H:%M:%S").to_string())?;
            sheet.write_string(r, 4, register_label)?;
            sheet.write_string(r, 5, decimal_comma(value_of(row)))?;
            sheet.write_string(r, 6, UNIT_LABEL)?;
        }
    }
    Ok(())
}

/// Formats a volume with the decimal comma the meter export uses.
fn decimal_comma(value: f64) -> String {
    format!("{value:.3}").replace('.', ",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::{Reader, open_workbook};
    use chrono::NaiveDateTime;

    fn ts(d: u32, h: u32, mi: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 6, d)
            .unwrap()
            .and_hms_opt(h, mi, 0)
            .unwrap()
    }

    fn row(t: NaiveDateTime, import: f64, injection: f64) -> UnifiedRow {
        UnifiedRow {
            t,
            import_kwh: import,
            injection_kwh: injection,
            pv_kwh: 0.0,
            belpex: 0.045,
            pvgis_kwh: 0.0,
        }
    }

    #[test]
    fn filename_encodes_range_and_layout() {
        let start = NaiveDate::from_ymd_opt(2023, 6, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2023, 6, 30).unwrap();
        assert_eq!(
            workbook_filename(start, end, Layout::Combined),
            "energiemix_2023-06-01_2023-06-30_combined.xlsx"
        );
        assert_eq!(
            workbook_filename(start, end, Layout::Split),
            "energiemix_2023-06-01_2023-06-30_split.xlsx"
        );
    }

    #[test]
    fn combined_layout_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("combined.xlsx");
        let rows = vec![row(ts(15, 10, 0), 1.5, 0.2), row(ts(15, 10, 15), 1.25, 0.0)];

        export_workbook(&rows, Layout::Combined, &path).unwrap();

        let mut workbook: calamine::Xlsx<_> = open_workbook(&path).unwrap();
        let range = workbook.worksheet_range("Data").unwrap();
        assert_eq!(range.height(), 3);
        assert_eq!(range.width(), 6);
        assert_eq!(
            range.get_value((0, 1)).map(ToString::to_string).as_deref(),
            Some("import_kwh")
        );
        assert_eq!(
            range.get_value((1, 0)).map(ToString::to_string).as_deref(),
            Some("2023-06-15 10:00:00")
        );
        assert_eq!(
            range.get_value((1, 1)).map(ToString::to_string).as_deref(),
            Some("1.5")
        );
    }

    #[test]
    fn split_layout_omits_zero_sum_quantities() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("split.xlsx");
        // Injection, auxiliary and estimate all sum to zero here.
        let rows = vec![row(ts(15, 10, 0), 1.5, 0.0)];

        export_workbook(&rows, Layout::Split, &path).unwrap();

        let workbook: calamine::Xlsx<_> = open_workbook(&path).unwrap();
        assert_eq!(workbook.sheet_names(), vec!["Afname".to_string()]);
    }

    #[test]
    fn split_rows_mirror_the_standard_meter_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("split.xlsx");
        let rows = vec![row(ts(15, 23, 45), 0.375, 0.0)];

        export_workbook(&rows, Layout::Split, &path).unwrap();

        let mut workbook: calamine::Xlsx<_> = open_workbook(&path).unwrap();
        let range = workbook.worksheet_range("Afname").unwrap();
        let cell = |c: u32| {
            range
                .get_value((1, c))
                .map(ToString::to_string)
                .unwrap_or_default()
        };
        assert_eq!(cell(0), "15/06/2023");
        assert_eq!(cell(1), "23:45:00");
        // The end of the 23:45 interval rolls into the next day.
        assert_eq!(cell(2), "16/06/2023");
        assert_eq!(cell(3), "00:00:00");
        assert_eq!(cell(4), "Afname Actief");
        assert_eq!(cell(5), "0,375");
        assert_eq!(cell(6), "KWH");
    }

    #[test]
    fn split_sheets_appear_for_every_contributing_quantity() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("split.xlsx");
        let mut r = row(ts(15, 10, 0), 1.0, 2.0);
        r.pv_kwh = 0.5;
        r.pvgis_kwh = 0.4;

        export_workbook(&[r], Layout::Split, &path).unwrap();

        let workbook: calamine::Xlsx<_> = open_workbook(&path).unwrap();
        assert_eq!(
            workbook.sheet_names(),
            vec![
                "Afname".to_string(),
                "Injectie".to_string(),
                "Hulpverbruik".to_string(),
                "PVGIS".to_string(),
            ]
        );
    }
}
