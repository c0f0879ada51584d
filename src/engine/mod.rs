//! Structure recovery engine
//!
//! Data flows one way: sheet selection → header location → header merging →
//! formula and code extraction → category fill-down → assembly.

pub mod assembler;
pub mod codes;
pub mod formula;
pub mod header_locator;
pub mod header_merger;
pub mod hierarchy;
pub mod sheet_selector;

pub use assembler::{parse_workbook, Assembler, ParseOutput};
pub use codes::{parse_legend, CodeMapExtractor, LegendBinding};
pub use formula::{FormulaExtractor, FormulaText};
pub use header_locator::{HeaderLocator, ScoredRow};
pub use header_merger::{make_unique, HeaderBlock, HeaderMerger};
pub use hierarchy::{
    Hierarchy, HierarchyFiller, HierarchyLayout, MarkerClassifier, MarkerLevel, RowKind,
};
pub use sheet_selector::{SheetScore, SheetSelector};
