use crate::engine::formula::FormulaText;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

//==============================================================================
// Cells
//==============================================================================

/// A single raw cell value, tagged by kind
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Cell {
    #[default]
    Empty,
    /// Free text, kept as written (leading indentation is significant)
    Text(String),
    Number(f64),
    /// Text matching the mnemonic formula pattern, e.g. `B=c+(d+e+f)*(1+g)`
    Formula(String),
}

static EMPTY_CELL: Cell = Cell::Empty;

impl Cell {
    /// Classify raw text: whitespace-only becomes `Empty`, formula-shaped text
    /// becomes `Formula`, anything else stays `Text`.
    pub fn from_text(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            Cell::Empty
        } else if FormulaText::parse(trimmed).is_some() {
            Cell::Formula(trimmed.to_string())
        } else {
            Cell::Text(raw.to_string())
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Cell::Text(_))
    }

    pub fn is_formula(&self) -> bool {
        matches!(self, Cell::Formula(_))
    }

    /// Trimmed text of a `Text` or `Formula` cell
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) | Cell::Formula(s) => Some(s.trim()),
            _ => None,
        }
    }

    /// Numeric value, accepting numeric text such as `" 12.5 "` or `"1,200"`
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            Cell::Text(s) => {
                let cleaned: String = s.trim().chars().filter(|c| *c != ',').collect();
                if cleaned.is_empty() {
                    return None;
                }
                cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
            }
            _ => None,
        }
    }

    /// The letter of a cell that holds nothing but one ASCII letter (a code cell)
    pub fn mnemonic(&self) -> Option<char> {
        let text = match self {
            Cell::Text(s) => s.trim(),
            _ => return None,
        };
        let mut chars = text.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii_alphabetic() => Some(c),
            _ => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Text(s) | Cell::Formula(s) => write!(f, "{}", s.trim()),
            Cell::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
        }
    }
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Cell::Empty => serializer.serialize_none(),
            Cell::Number(n) => serializer.serialize_f64(*n),
            Cell::Text(s) | Cell::Formula(s) => serializer.serialize_str(s.trim()),
        }
    }
}

//==============================================================================
// Grid, sheet, workbook
//==============================================================================

/// A rectangular block of merged cells (inclusive bounds, zero-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergedRange {
    pub first_row: usize,
    pub first_col: usize,
    pub last_row: usize,
    pub last_col: usize,
}

impl MergedRange {
    pub fn new(first_row: usize, first_col: usize, last_row: usize, last_col: usize) -> Self {
        Self {
            first_row,
            first_col,
            last_row,
            last_col,
        }
    }

    pub fn contains(&self, row: usize, col: usize) -> bool {
        (self.first_row..=self.last_row).contains(&row)
            && (self.first_col..=self.last_col).contains(&col)
    }
}

/// Normalized view of one sheet's values.
///
/// Every row has the same width. Trailing empty rows, trailing empty columns
/// and leading columns that are empty in every row are dropped; leading rows
/// are kept so row indices match the sheet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CellGrid {
    rows: Vec<Vec<Cell>>,
    width: usize,
    col_offset: usize,
}

impl CellGrid {
    pub fn new(mut rows: Vec<Vec<Cell>>) -> Self {
        while rows
            .last()
            .is_some_and(|row| row.iter().all(Cell::is_empty))
        {
            rows.pop();
        }

        let first_col = rows
            .iter()
            .filter_map(|row| row.iter().position(|c| !c.is_empty()))
            .min()
            .unwrap_or(0);
        let end_col = rows
            .iter()
            .filter_map(|row| row.iter().rposition(|c| !c.is_empty()))
            .max()
            .map_or(0, |c| c + 1);
        let width = end_col.saturating_sub(first_col);

        let rows = rows
            .into_iter()
            .map(|row| {
                let mut row: Vec<Cell> = row.into_iter().skip(first_col).take(width).collect();
                row.resize(width, Cell::Empty);
                row
            })
            .collect();

        Self {
            rows,
            width,
            col_offset: first_col,
        }
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of leading source columns dropped during normalization
    pub fn col_offset(&self) -> usize {
        self.col_offset
    }

    /// Cell at (row, col); out-of-range positions read as `Empty`
    pub fn get(&self, row: usize, col: usize) -> &Cell {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY_CELL)
    }

    pub fn row(&self, row: usize) -> &[Cell] {
        self.rows.get(row).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn non_empty_count(&self) -> usize {
        self.rows
            .iter()
            .flatten()
            .filter(|c| !c.is_empty())
            .count()
    }

    pub fn is_blank_row(&self, row: usize) -> bool {
        self.row(row).iter().all(Cell::is_empty)
    }
}

/// A named sheet: its grid plus the merged ranges of the source
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub grid: CellGrid,
    pub merged: Vec<MergedRange>,
}

impl Sheet {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self::with_merges(name, rows, Vec::new())
    }

    /// Build a sheet whose merged ranges are given in source coordinates
    pub fn with_merges(
        name: impl Into<String>,
        rows: Vec<Vec<Cell>>,
        merged: Vec<MergedRange>,
    ) -> Self {
        let grid = CellGrid::new(rows);
        let offset = grid.col_offset();
        let merged = merged
            .into_iter()
            .filter(|m| m.last_col >= offset)
            .map(|m| MergedRange {
                first_col: m.first_col.saturating_sub(offset),
                last_col: m.last_col - offset,
                ..m
            })
            .collect();
        Self {
            name: name.into(),
            grid,
            merged,
        }
    }

    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        self.grid.get(row, col)
    }

    /// Cell value with merged ranges resolved to their top-left value
    pub fn merged_cell(&self, row: usize, col: usize) -> &Cell {
        let cell = self.grid.get(row, col);
        if !cell.is_empty() {
            return cell;
        }
        self.merged
            .iter()
            .find(|m| m.contains(row, col))
            .map_or(cell, |m| self.grid.get(m.first_row, m.first_col))
    }
}

/// An ordered collection of sheets, named after its source file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workbook {
    pub name: String,
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sheets: Vec::new(),
        }
    }

    pub fn with_sheet(mut self, sheet: Sheet) -> Self {
        self.sheets.push(sheet);
        self
    }

    pub fn add_sheet(&mut self, sheet: Sheet) {
        self.sheets.push(sheet);
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }
}

//==============================================================================
// Header, formulas, codes
//==============================================================================

/// Resolved column names, unique and in sheet order
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct HeaderSpec {
    names: Vec<String>,
}

impl HeaderSpec {
    /// Wrap names that are already unique (see `HeaderMerger`)
    pub(crate) fn from_unique(names: Vec<String>) -> Self {
        Self { names }
    }

    /// Build from raw names; repeats get `_n` suffixes
    pub fn from_names(names: Vec<String>) -> Self {
        Self::from_unique(crate::engine::make_unique(names))
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn name(&self, col: usize) -> Option<&str> {
        self.names.get(col).map(String::as_str)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// First column whose name contains any of `needles`, trying needles in order
    pub fn find_containing(&self, needles: &[String]) -> Option<usize> {
        needles.iter().find_map(|needle| {
            let needle = needle.to_lowercase();
            self.names
                .iter()
                .position(|n| n.to_lowercase().contains(&needle))
        })
    }
}

/// Target column name → formula text
pub type FormulaMap = BTreeMap<String, String>;

/// Mnemonic letter → column binding
pub type CodeMap = BTreeMap<String, CodeBinding>;

/// Serialized value of a code that no legend binds
pub const UNRESOLVED_CODE: &str = "<unresolved>";

/// What a mnemonic letter denotes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CodeBinding {
    Column(String),
    Unresolved,
}

impl CodeBinding {
    pub fn column(&self) -> Option<&str> {
        match self {
            CodeBinding::Column(name) => Some(name),
            CodeBinding::Unresolved => None,
        }
    }

    pub fn is_unresolved(&self) -> bool {
        matches!(self, CodeBinding::Unresolved)
    }
}

impl From<String> for CodeBinding {
    fn from(value: String) -> Self {
        if value == UNRESOLVED_CODE {
            CodeBinding::Unresolved
        } else {
            CodeBinding::Column(value)
        }
    }
}

impl From<CodeBinding> for String {
    fn from(value: CodeBinding) -> Self {
        match value {
            CodeBinding::Column(name) => name,
            CodeBinding::Unresolved => UNRESOLVED_CODE.to_string(),
        }
    }
}

//==============================================================================
// Output
//==============================================================================

/// Column value types (homogeneous arrays)
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Number(Vec<f64>),
    Text(Vec<String>),
}

impl ColumnValue {
    pub fn len(&self) -> usize {
        match self {
            ColumnValue::Number(v) => v.len(),
            ColumnValue::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ColumnValue::Number(_) => "Number",
            ColumnValue::Text(_) => "Text",
        }
    }

    /// Numbers when every non-empty cell is numeric, text otherwise
    fn infer<'a>(cells: impl Iterator<Item = &'a Cell> + Clone) -> Self {
        let numeric = cells
            .clone()
            .filter(|c| !c.is_empty())
            .all(|c| c.as_number().is_some());
        if numeric && cells.clone().any(|c| !c.is_empty()) {
            ColumnValue::Number(cells.map(|c| c.as_number().unwrap_or(0.0)).collect())
        } else {
            ColumnValue::Text(cells.map(|c| c.to_string()).collect())
        }
    }
}

/// The recovered table: data rows under the header plus the L1/L2 categories
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTable {
    pub header: HeaderSpec,
    pub rows: Vec<Vec<Cell>>,
    pub l1: Vec<String>,
    pub l2: Vec<String>,
    pub l1_column: String,
    pub l2_column: String,
    /// First sheet row of the header block
    pub header_row: usize,
    /// Number of sheet rows merged into the header
    pub header_height: usize,
    /// Sheet row index of every retained data row
    pub source_rows: Vec<usize>,
}

impl ParsedTable {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Header columns followed by the two hierarchy columns
    pub fn column_names(&self) -> Vec<&str> {
        self.header
            .names()
            .iter()
            .map(String::as_str)
            .chain([self.l1_column.as_str(), self.l2_column.as_str()])
            .collect()
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&Cell> {
        let col = self.header.position(column)?;
        self.rows.get(row).and_then(|r| r.get(col))
    }

    /// Typed values of one column (header or hierarchy column)
    pub fn column_values(&self, column: &str) -> Option<ColumnValue> {
        if column == self.l1_column {
            return Some(ColumnValue::Text(self.l1.clone()));
        }
        if column == self.l2_column {
            return Some(ColumnValue::Text(self.l2.clone()));
        }
        let col = self.header.position(column)?;
        Some(ColumnValue::infer(
            self.rows.iter().map(move |row| row.get(col).unwrap_or(&EMPTY_CELL)),
        ))
    }

    /// Rows as JSON objects keyed by column name
    pub fn to_records(&self) -> Vec<serde_json::Map<String, serde_json::Value>> {
        self.rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let mut record = serde_json::Map::new();
                for (name, cell) in self.header.names().iter().zip(row) {
                    let value = serde_json::to_value(cell).unwrap_or(serde_json::Value::Null);
                    record.insert(name.clone(), value);
                }
                record.insert(self.l1_column.clone(), self.l1[i].clone().into());
                record.insert(self.l2_column.clone(), self.l2[i].clone().into());
                record
            })
            .collect()
    }
}

/// Structured metadata handed back with every parsed table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseMetadata {
    pub formulas: FormulaMap,
    pub codes: CodeMap,
    pub source_sheet: String,
    pub original_filename: String,
}

impl ParseMetadata {
    /// Letters used in any formula that have no entry (resolved or not) in `codes`
    pub fn missing_codes(&self) -> BTreeSet<char> {
        self.formulas
            .values()
            .filter_map(|text| FormulaText::parse(text))
            .flat_map(|f| f.codes())
            .filter(|letter| !self.codes.contains_key(&letter.to_string()))
            .collect()
    }

    pub fn unresolved_codes(&self) -> Vec<&str> {
        self.codes
            .iter()
            .filter(|(_, binding)| binding.is_unresolved())
            .map(|(letter, _)| letter.as_str())
            .collect()
    }
}
