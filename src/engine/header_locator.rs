//! Header row detection
//!
//! Every candidate row gets one scalar score:
//!
//! ```text
//! score = keyword_weight   * keyword hits
//!       + non_empty_weight * non-empty ratio
//!       + text_weight      * text ratio
//!       + unique_weight    * unique ratio
//!       - long_text_penalty * cells longer than long_text_len
//! ```
//!
//! Rows with fewer than `min_cells` non-empty cells (titles, blanks) score 0.
//! The best of the first `max_scan_rows` rows wins; ties go to the earlier row.

use crate::config::HeaderConfig;
use crate::error::{ParseError, ParseResult};
use crate::types::{Cell, Sheet};
use std::collections::HashSet;

/// A candidate row with its score and the signals behind it
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRow {
    pub index: usize,
    pub score: f64,
    pub keyword_hits: usize,
    pub non_empty_ratio: f64,
    pub text_ratio: f64,
    pub unique_ratio: f64,
    pub long_cells: usize,
    pub numeric_cells: usize,
}

/// Number of vocabulary keywords contained in `text` (ASCII case-insensitive)
pub fn keyword_hits(text: &str, keywords: &[String]) -> usize {
    let text = text.to_lowercase();
    keywords
        .iter()
        .filter(|k| text.contains(&k.to_lowercase()))
        .count()
}

pub struct HeaderLocator<'a> {
    config: &'a HeaderConfig,
}

impl<'a> HeaderLocator<'a> {
    pub fn new(config: &'a HeaderConfig) -> Self {
        Self { config }
    }

    /// Score a single row of a grid that is `width` columns wide
    pub fn score_row(&self, index: usize, cells: &[Cell], width: usize) -> ScoredRow {
        let cfg = self.config;
        let filled: Vec<&Cell> = cells.iter().filter(|c| !c.is_empty()).collect();
        let non_empty = filled.len();

        let mut keyword_total = 0;
        let mut text_cells = 0;
        let mut numeric_cells = 0;
        let mut long_cells = 0;
        let mut distinct = HashSet::new();
        for cell in &filled {
            distinct.insert(cell.to_string());
            match cell {
                Cell::Text(text) if cell.as_number().is_none() => {
                    text_cells += 1;
                    keyword_total += keyword_hits(text, &cfg.keywords);
                    if text.trim().chars().count() > cfg.long_text_len {
                        long_cells += 1;
                    }
                }
                Cell::Text(_) | Cell::Number(_) => numeric_cells += 1,
                Cell::Formula(_) | Cell::Empty => {}
            }
        }

        let ratio = |part: usize, whole: usize| {
            if whole == 0 {
                0.0
            } else {
                part as f64 / whole as f64
            }
        };
        let non_empty_ratio = ratio(non_empty, width);
        let text_ratio = ratio(text_cells, non_empty);
        let unique_ratio = ratio(distinct.len(), non_empty);

        let score = if non_empty < cfg.min_cells {
            0.0
        } else {
            cfg.keyword_weight * keyword_total as f64
                + cfg.non_empty_weight * non_empty_ratio
                + cfg.text_weight * text_ratio
                + cfg.unique_weight * unique_ratio
                - cfg.long_text_penalty * long_cells as f64
        };

        ScoredRow {
            index,
            score,
            keyword_hits: keyword_total,
            non_empty_ratio,
            text_ratio,
            unique_ratio,
            long_cells,
            numeric_cells,
        }
    }

    /// Scores of the candidate rows (the first `max_scan_rows`)
    pub fn score_rows(&self, sheet: &Sheet) -> Vec<ScoredRow> {
        let width = sheet.grid.width();
        sheet
            .grid
            .rows()
            .iter()
            .take(self.config.max_scan_rows)
            .enumerate()
            .map(|(index, cells)| self.score_row(index, cells, width))
            .collect()
    }

    /// Pick the header row
    pub fn locate(&self, sheet: &Sheet) -> ParseResult<ScoredRow> {
        let scored = self.score_rows(sheet);

        let mut best: Option<&ScoredRow> = None;
        for row in &scored {
            if best.map_or(true, |b| row.score > b.score) {
                best = Some(row);
            }
        }

        let Some(best) = best.filter(|b| b.score >= self.config.min_score) else {
            let best_score = best.map_or(0.0, |b| b.score);
            tracing::debug!(sheet = %sheet.name, best_score, "no header row above threshold");
            return Err(ParseError::HeaderNotFound {
                sheet: sheet.name.clone(),
                best_score,
            });
        };

        if self.config.strict_ties {
            let tied: Vec<usize> = scored
                .iter()
                .filter(|r| r.score == best.score)
                .map(|r| r.index)
                .collect();
            if tied.len() > 1 {
                return Err(ParseError::AmbiguousHeader {
                    sheet: sheet.name.clone(),
                    rows: tied,
                });
            }
        }

        tracing::debug!(
            sheet = %sheet.name,
            row = best.index,
            score = best.score,
            keyword_hits = best.keyword_hits,
            "located header row"
        );
        Ok(best.clone())
    }
}
