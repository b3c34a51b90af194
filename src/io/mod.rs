//! Workbook export for the unified table.

pub mod export;

pub use export::{Layout, export_workbook, workbook_filename};
