//! Engine entry point
//!
//! Runs sheet selection, header location and merging, formula and code
//! extraction and category fill-down in order, and returns the table with its
//! metadata. Fatal errors carry the workbook's file name.

use super::codes::CodeMapExtractor;
use super::formula::FormulaExtractor;
use super::header_locator::HeaderLocator;
use super::header_merger::{make_unique, HeaderMerger};
use super::hierarchy::{HierarchyFiller, HierarchyLayout, MarkerClassifier};
use super::sheet_selector::SheetSelector;
use crate::config::ParserConfig;
use crate::error::{ParseError, ParseResult, ParseWarning};
use crate::types::{ParseMetadata, ParsedTable, Sheet, Workbook};

/// Result of one successful parse
#[derive(Debug, Clone, PartialEq)]
pub struct ParseOutput {
    pub table: ParsedTable,
    pub metadata: ParseMetadata,
    pub warnings: Vec<ParseWarning>,
}

impl ParseOutput {
    /// Turn an empty result into `ParseError::EmptyDataset`
    pub fn require_rows(self) -> ParseResult<Self> {
        if self.table.is_empty() {
            return Err(ParseError::EmptyDataset {
                sheet: self.metadata.source_sheet.clone(),
            }
            .in_file(self.metadata.original_filename));
        }
        Ok(self)
    }
}

pub struct Assembler {
    config: ParserConfig,
    markers: MarkerClassifier,
}

impl Assembler {
    pub fn new(config: ParserConfig) -> ParseResult<Self> {
        let markers = MarkerClassifier::new(&config.hierarchy)?;
        Ok(Self { config, markers })
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Parse `workbook`, using `sheet_name` when given and the best-scoring
    /// sheet otherwise.
    pub fn parse(&self, workbook: &Workbook, sheet_name: Option<&str>) -> ParseResult<ParseOutput> {
        let sheet = match sheet_name {
            Some(name) => workbook.sheet(name).ok_or_else(|| ParseError::SheetNotFound {
                name: name.to_string(),
            }),
            None => SheetSelector::new(&self.config).select(workbook),
        }
        .map_err(|e| e.in_file(&workbook.name))?;

        self.parse_sheet(sheet, &workbook.name)
            .map_err(|e| e.in_file(&workbook.name))
    }

    /// Parse a single sheet
    pub fn parse_sheet(&self, sheet: &Sheet, original_filename: &str) -> ParseResult<ParseOutput> {
        let header_cfg = &self.config.header;
        let located = HeaderLocator::new(header_cfg).locate(sheet)?;

        let merger = HeaderMerger::new(header_cfg);
        let block = merger.block(sheet, located.index);
        let header = merger.merge(sheet, block);
        let data_start = block.last + 1;

        let formulas = FormulaExtractor::new(sheet, &header).extract(data_start);
        let (codes, mut warnings) =
            CodeMapExtractor::new(&self.config.legend).extract(sheet, &header, block, &formulas);

        let layout = HierarchyLayout::detect(&header, &self.config.hierarchy);
        let below = sheet.grid.rows().get(data_start..).unwrap_or(&[]);
        let hierarchy = HierarchyFiller::new(layout, &self.markers).fill(below);

        let rows = hierarchy
            .retained
            .iter()
            .map(|&i| below[i].clone())
            .collect();
        let source_rows = hierarchy.retained.iter().map(|i| i + data_start).collect();

        // Hierarchy columns must not clash with header names
        let mut all_names: Vec<String> = header.names().to_vec();
        all_names.push(self.config.hierarchy.l1_column.clone());
        all_names.push(self.config.hierarchy.l2_column.clone());
        let mut all_names = make_unique(all_names);
        let l2_column = all_names.pop().unwrap_or_default();
        let l1_column = all_names.pop().unwrap_or_default();

        let table = ParsedTable {
            header,
            rows,
            l1: hierarchy.l1,
            l2: hierarchy.l2,
            l1_column,
            l2_column,
            header_row: block.first,
            header_height: block.height(),
            source_rows,
        };

        if table.is_empty() {
            tracing::warn!(sheet = %sheet.name, "no data rows below header");
            warnings.push(ParseWarning::EmptyDataset {
                sheet: sheet.name.clone(),
            });
        }

        tracing::info!(
            sheet = %sheet.name,
            header_row = table.header_row,
            columns = table.header.len(),
            rows = table.row_count(),
            formulas = formulas.len(),
            codes = codes.len(),
            "parsed sheet"
        );

        let metadata = ParseMetadata {
            formulas,
            codes,
            source_sheet: sheet.name.clone(),
            original_filename: original_filename.to_string(),
        };

        Ok(ParseOutput {
            table,
            metadata,
            warnings,
        })
    }
}

/// Parse a workbook with the default configuration
pub fn parse_workbook(workbook: &Workbook, sheet_name: Option<&str>) -> ParseResult<ParseOutput> {
    Assembler::new(ParserConfig::default())?.parse(workbook, sheet_name)
}
