//! Workbook loader - Excel/ODS file → `Workbook`

use crate::error::{ParseError, ParseResult};
use crate::types::{Cell, MergedRange, Sheet, Workbook};
use calamine::{open_workbook, open_workbook_auto, Data, Range, Reader, Xlsx};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Loads every sheet of a spreadsheet file into memory
pub struct WorkbookLoader {
    path: PathBuf,
}

impl WorkbookLoader {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// File name recorded as the workbook name (`original_filename`)
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    pub fn load(&self) -> ParseResult<Workbook> {
        let mut workbook = open_workbook_auto(&self.path).map_err(|e| {
            ParseError::Workbook(format!("Failed to open {}: {}", self.path.display(), e))
        })?;

        let mut merges = self.merged_regions();
        let mut result = Workbook::new(self.file_name());

        for name in workbook.sheet_names().to_vec() {
            let range = workbook.worksheet_range(&name).map_err(|e| {
                ParseError::Workbook(format!("Failed to read sheet '{}': {}", name, e))
            })?;
            let rows = range_to_rows(&range);
            let merged = merges.remove(&name).unwrap_or_default();
            tracing::debug!(
                sheet = %name,
                rows = rows.len(),
                merged = merged.len(),
                "loaded sheet"
            );
            result.add_sheet(Sheet::with_merges(name, rows, merged));
        }

        Ok(result)
    }

    /// Merged ranges per sheet; only `.xlsx`/`.xlsm` files carry them here and
    /// a failure to read them leaves the sheets unmerged.
    fn merged_regions(&self) -> HashMap<String, Vec<MergedRange>> {
        let is_xlsx = self
            .path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("xlsx") || e.eq_ignore_ascii_case("xlsm"));
        if !is_xlsx {
            return HashMap::new();
        }

        let mut xlsx: Xlsx<BufReader<File>> = match open_workbook(&self.path) {
            Ok(xlsx) => xlsx,
            Err(e) => {
                tracing::warn!(error = %e, "cannot reopen workbook for merged cells");
                return HashMap::new();
            }
        };
        if let Err(e) = xlsx.load_merged_regions() {
            tracing::warn!(error = %e, "failed to load merged regions");
            return HashMap::new();
        }

        let mut regions = HashMap::new();
        for name in xlsx.sheet_names().to_vec() {
            let dims = xlsx
                .worksheet_merge_cells(&name)
                .unwrap_or(Ok(Vec::new()))
                .unwrap_or_default();
            let ranges = dims
                .iter()
                .map(|d| {
                    MergedRange::new(
                        d.start.0 as usize,
                        d.start.1 as usize,
                        d.end.0 as usize,
                        d.end.1 as usize,
                    )
                })
                .collect();
            regions.insert(name, ranges);
        }
        regions
    }
}

/// Expand a calamine range into sheet-absolute rows
fn range_to_rows(range: &Range<Data>) -> Vec<Vec<Cell>> {
    let (row0, col0) = range
        .start()
        .map_or((0, 0), |(r, c)| (r as usize, c as usize));
    let mut rows = vec![Vec::new(); row0];
    for source in range.rows() {
        let mut row = vec![Cell::Empty; col0];
        row.extend(source.iter().map(data_to_cell));
        rows.push(row);
    }
    rows
}

/// Convert one calamine value
pub fn data_to_cell(data: &Data) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::String(s) => Cell::from_text(s),
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Bool(b) => Cell::Text(b.to_string().to_uppercase()),
        // Dates keep their serial value
        Data::DateTime(dt) => Cell::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::from_text(s),
    }
}
