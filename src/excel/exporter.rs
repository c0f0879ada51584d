//! Excel exporter for parsed tables

use crate::error::{ParseError, ParseResult};
use crate::types::{ColumnValue, ParseMetadata, ParsedTable};
use rust_xlsxwriter::{Format, Note, Workbook, Worksheet};
use std::path::Path;

/// Writes a parsed table and its metadata to a fresh `.xlsx` file
///
/// Sheets:
/// - `data`: header (plus the L1/L2 columns) and the retained rows
/// - `formulas`: column name → formula text
/// - `codes`: code letter → bound column
pub struct TableExporter<'a> {
    table: &'a ParsedTable,
    metadata: &'a ParseMetadata,
}

impl<'a> TableExporter<'a> {
    pub fn new(table: &'a ParsedTable, metadata: &'a ParseMetadata) -> Self {
        Self { table, metadata }
    }

    /// Export to an Excel .xlsx file
    pub fn export(&self, output_path: &Path) -> ParseResult<()> {
        let mut workbook = Workbook::new();
        let bold = Format::new().set_bold();

        self.export_data(&mut workbook, &bold)?;
        self.export_pairs(
            &mut workbook,
            "formulas",
            ("column", "formula"),
            self.metadata
                .formulas
                .iter()
                .map(|(column, formula)| (column.as_str(), formula.as_str())),
            &bold,
        )?;
        let codes: Vec<(String, String)> = self
            .metadata
            .codes
            .iter()
            .map(|(letter, binding)| (letter.clone(), String::from(binding.clone())))
            .collect();
        self.export_pairs(
            &mut workbook,
            "codes",
            ("code", "column"),
            codes.iter().map(|(l, c)| (l.as_str(), c.as_str())),
            &bold,
        )?;

        workbook
            .save(output_path)
            .map_err(|e| ParseError::Export(format!("Failed to save Excel file: {}", e)))?;

        tracing::debug!(path = %output_path.display(), rows = self.table.row_count(), "exported table");
        Ok(())
    }

    fn export_data(&self, workbook: &mut Workbook, bold: &Format) -> ParseResult<()> {
        let worksheet = workbook.add_worksheet();
        worksheet
            .set_name("data")
            .map_err(|e| ParseError::Export(format!("Failed to set worksheet name: {}", e)))?;

        for (col_idx, name) in self.table.column_names().into_iter().enumerate() {
            let col = col_idx as u16;
            worksheet
                .write_string_with_format(0, col, name, bold)
                .map_err(|e| ParseError::Export(format!("Failed to write header: {}", e)))?;

            // Formula text travels with its column as a cell note
            if let Some(formula) = self.metadata.formulas.get(name) {
                let note = Note::new(formula).set_author("costsheet");
                worksheet
                    .insert_note(0, col, &note)
                    .map_err(|e| ParseError::Export(format!("Failed to add note: {}", e)))?;
            }

            if let Some(values) = self.table.column_values(name) {
                for index in 0..values.len() {
                    write_cell_value(worksheet, index as u32 + 1, col, &values, index)?;
                }
            }
        }
        Ok(())
    }

    fn export_pairs<'p>(
        &self,
        workbook: &mut Workbook,
        sheet_name: &str,
        titles: (&str, &str),
        pairs: impl Iterator<Item = (&'p str, &'p str)>,
        bold: &Format,
    ) -> ParseResult<()> {
        let worksheet = workbook.add_worksheet();
        worksheet
            .set_name(sheet_name)
            .map_err(|e| ParseError::Export(format!("Failed to set worksheet name: {}", e)))?;
        worksheet
            .write_string_with_format(0, 0, titles.0, bold)
            .and_then(|ws| ws.write_string_with_format(0, 1, titles.1, bold))
            .map_err(|e| ParseError::Export(format!("Failed to write header: {}", e)))?;

        for (i, (key, value)) in pairs.enumerate() {
            let row = i as u32 + 1;
            worksheet
                .write_string(row, 0, key)
                .and_then(|ws| ws.write_string(row, 1, value))
                .map_err(|e| ParseError::Export(format!("Failed to write {}: {}", sheet_name, e)))?;
        }
        Ok(())
    }
}

/// Write a single cell value based on column type; empty text is skipped
fn write_cell_value(
    worksheet: &mut Worksheet,
    row: u32,
    col: u16,
    values: &ColumnValue,
    index: usize,
) -> ParseResult<()> {
    match values {
        ColumnValue::Number(nums) => {
            if let Some(&value) = nums.get(index) {
                worksheet
                    .write_number(row, col, value)
                    .map_err(|e| ParseError::Export(format!("Failed to write number: {}", e)))?;
            }
        }
        ColumnValue::Text(texts) => {
            if let Some(value) = texts.get(index).filter(|v| !v.is_empty()) {
                worksheet
                    .write_string(row, col, value)
                    .map_err(|e| ParseError::Export(format!("Failed to write text: {}", e)))?;
            }
        }
    }
    Ok(())
}
