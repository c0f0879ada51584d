//! Data sheet selection
//!
//! Sheets are ranked by whether any header keyword appears in their first
//! rows, then by non-empty cell count, then by column count. The first sheet
//! wins a tie.

use super::header_locator::keyword_hits;
use crate::config::ParserConfig;
use crate::error::{ParseError, ParseResult};
use crate::types::{Sheet, Workbook};

/// Coarse ranking signals of one sheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetScore {
    pub name: String,
    pub keyword_hits: usize,
    pub non_empty: usize,
    pub columns: usize,
}

impl SheetScore {
    fn rank(&self) -> (bool, usize, usize) {
        (self.keyword_hits > 0, self.non_empty, self.columns)
    }
}

pub struct SheetSelector<'a> {
    config: &'a ParserConfig,
}

impl<'a> SheetSelector<'a> {
    pub fn new(config: &'a ParserConfig) -> Self {
        Self { config }
    }

    pub fn score(&self, sheet: &Sheet) -> SheetScore {
        let keywords = &self.config.header.keywords;
        let keyword_hits = sheet
            .grid
            .rows()
            .iter()
            .take(self.config.sheet.scan_rows)
            .flatten()
            .filter_map(|cell| cell.as_text())
            .map(|text| keyword_hits(text, keywords))
            .sum();
        SheetScore {
            name: sheet.name.clone(),
            keyword_hits,
            non_empty: sheet.grid.non_empty_count(),
            columns: sheet.grid.width(),
        }
    }

    /// Scores of every sheet, in workbook order
    pub fn score_all(&self, workbook: &Workbook) -> Vec<SheetScore> {
        workbook.sheets.iter().map(|s| self.score(s)).collect()
    }

    pub fn select<'w>(&self, workbook: &'w Workbook) -> ParseResult<&'w Sheet> {
        let mut best: Option<(&Sheet, SheetScore)> = None;
        for sheet in &workbook.sheets {
            let score = self.score(sheet);
            tracing::debug!(
                sheet = %sheet.name,
                keyword_hits = score.keyword_hits,
                non_empty = score.non_empty,
                columns = score.columns,
                "scored sheet"
            );
            if best
                .as_ref()
                .map_or(true, |(_, b)| score.rank() > b.rank())
            {
                best = Some((sheet, score));
            }
        }
        best.map(|(sheet, _)| sheet).ok_or(ParseError::NoSheetFound)
    }
}
