//! Header normalization
//!
//! Turns one or two header rows into flat, unique column names. The row above
//! the detected header joins as a group label when it looks like a header
//! itself; otherwise the row below may join as a field-name row, but only
//! under columns the header leaves blank or spans with a merged label.

use super::header_locator::HeaderLocator;
use crate::config::HeaderConfig;
use crate::types::{Cell, HeaderSpec, Sheet};
use std::collections::HashSet;

/// Inclusive sheet rows forming the header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderBlock {
    pub first: usize,
    pub last: usize,
}

impl HeaderBlock {
    pub fn height(&self) -> usize {
        self.last - self.first + 1
    }
}

pub struct HeaderMerger<'a> {
    config: &'a HeaderConfig,
}

impl<'a> HeaderMerger<'a> {
    pub fn new(config: &'a HeaderConfig) -> Self {
        Self { config }
    }

    /// Decide which rows around `header_row` belong to the header
    pub fn block(&self, sheet: &Sheet, header_row: usize) -> HeaderBlock {
        if let Some(above) = header_row.checked_sub(1) {
            if self.joins_header(sheet, above, false) {
                return HeaderBlock {
                    first: above,
                    last: header_row,
                };
            }
        }
        let below = header_row + 1;
        if below < sheet.grid.height()
            && sits_under_open_header(sheet, header_row, below)
            && self.joins_header(sheet, below, true)
        {
            return HeaderBlock {
                first: header_row,
                last: below,
            };
        }
        HeaderBlock {
            first: header_row,
            last: header_row,
        }
    }

    /// A neighbouring row joins when it is all text and clears the secondary
    /// threshold. A row below must also hit at least one keyword.
    fn joins_header(&self, sheet: &Sheet, row: usize, below: bool) -> bool {
        let cells = sheet.grid.row(row);
        if cells
            .iter()
            .any(|c| c.is_formula() || c.mnemonic().is_some())
        {
            return false;
        }
        let scored = HeaderLocator::new(self.config).score_row(row, cells, sheet.grid.width());
        scored.numeric_cells == 0
            && scored.score >= self.config.secondary_score
            && (!below || scored.keyword_hits > 0)
    }

    /// Flatten the block into a `HeaderSpec`
    pub fn merge(&self, sheet: &Sheet, block: HeaderBlock) -> HeaderSpec {
        let names = (0..sheet.grid.width())
            .map(|col| {
                let upper = header_label(sheet.merged_cell(block.first, col));
                let lower = header_label(sheet.merged_cell(block.last, col));
                let name = match (upper.is_empty(), lower.is_empty()) {
                    (false, false) if upper != lower => {
                        format!("{}{}{}", upper, self.config.joiner, lower)
                    }
                    (false, _) => upper,
                    (true, false) => lower,
                    (true, true) => String::new(),
                };
                if name.is_empty() {
                    format!("column_{}", col + 1)
                } else {
                    name
                }
            })
            .collect();

        let header = HeaderSpec::from_unique(make_unique(names));
        tracing::debug!(
            sheet = %sheet.name,
            first = block.first,
            last = block.last,
            columns = header.len(),
            "merged header"
        );
        header
    }
}

/// Every filled cell of `below` sits where the header row is blank, or under
/// a label merged across several columns. A group-marker row such as
/// `一 | 拆除项目` fills columns the header already names and never qualifies.
fn sits_under_open_header(sheet: &Sheet, header_row: usize, below: usize) -> bool {
    let spans_columns = |col: usize| {
        sheet
            .merged
            .iter()
            .any(|m| m.contains(header_row, col) && m.first_col < m.last_col)
    };
    let mut filled = (0..sheet.grid.width())
        .filter(|&col| !sheet.cell(below, col).is_empty())
        .peekable();
    filled.peek().is_some()
        && filled.all(|col| sheet.cell(header_row, col).is_empty() || spans_columns(col))
}

/// Header text without line breaks or surrounding whitespace
fn header_label(cell: &Cell) -> String {
    cell.to_string()
        .chars()
        .filter(|c| *c != '\n' && *c != '\r')
        .collect::<String>()
        .trim()
        .to_string()
}

/// Suffix repeated names with `_1`, `_2`, ...; the first occurrence is kept
/// as is and a suffix never collides with another name.
pub fn make_unique(names: Vec<String>) -> Vec<String> {
    let mut taken: HashSet<String> = HashSet::new();
    let mut result = Vec::with_capacity(names.len());
    for name in names {
        if taken.insert(name.clone()) {
            result.push(name);
            continue;
        }
        let mut n = 1;
        let unique = loop {
            let candidate = format!("{}_{}", name, n);
            if !taken.contains(&candidate) {
                break candidate;
            }
            n += 1;
        };
        taken.insert(unique.clone());
        result.push(unique);
    }
    result
}
