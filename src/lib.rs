//! costsheet - structure recovery for semi-structured cost spreadsheets
//!
//! Bills of quantities and quotation workbooks are written for people: a
//! title block above the table, stacked and merged header rows, formula text
//! such as `B=c+(d+e+f)*(1+g)` typed next to the header, a code legend, and
//! category rows interleaved with the data. This crate recovers the table
//! behind all that.
//!
//! # Features
//!
//! - Data sheet selection and header row detection by keyword scoring
//! - Two-row header merging, including merged group labels
//! - Formula text and code legend extraction (`FormulaMap`, `CodeMap`)
//! - L1/L2 category fill-down from group-marker rows
//! - Excel import (calamine) and export (rust_xlsxwriter)
//!
//! # Example
//!
//! ```no_run
//! use costsheet::engine::Assembler;
//! use costsheet::excel::WorkbookLoader;
//! use costsheet::ParserConfig;
//!
//! let workbook = WorkbookLoader::new("quote.xlsx").load()?;
//! let output = Assembler::new(ParserConfig::default())?.parse(&workbook, None)?;
//!
//! println!("Sheet: {}", output.metadata.source_sheet);
//! println!("Rows: {}", output.table.row_count());
//! for (column, formula) in &output.metadata.formulas {
//!     println!("{column}: {formula}");
//! }
//! # Ok::<(), costsheet::error::ParseError>(())
//! ```

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod excel;
pub mod types;

// Re-export commonly used types
pub use config::ParserConfig;
pub use engine::{parse_workbook, Assembler, ParseOutput};
pub use error::{ParseError, ParseResult, ParseWarning};
pub use types::{
    Cell, CellGrid, CodeBinding, CodeMap, ColumnValue, FormulaMap, HeaderSpec, ParseMetadata,
    ParsedTable, Sheet, Workbook,
};
