//! Excel import/export
//!
//! - Load: .xlsx/.xls/.ods → `Workbook` (values plus merged ranges)
//! - Export: parsed table → .xlsx with `data`, `formulas` and `codes` sheets

mod exporter;
mod loader;

pub use exporter::TableExporter;
pub use loader::{data_to_cell, WorkbookLoader};
