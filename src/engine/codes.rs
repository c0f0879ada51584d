//! Code map extraction
//!
//! Resolves every letter used in the sheet's formulas to a column name.
//! Bindings come from the legend region around the header, in two shapes:
//!
//! - explicit legend text, `c:主材单价` or `c=主材单价`, possibly several per
//!   cell separated by `;`, `,` or line breaks;
//! - code rows below the header (nothing but lone letters and formula text),
//!   where each letter names the column it sits in.
//!
//! A formula's target letter falls back to the column the formula was found in.

use super::formula::FormulaText;
use super::header_merger::HeaderBlock;
use crate::config::LegendConfig;
use crate::error::ParseWarning;
use crate::types::{Cell, CodeBinding, CodeMap, FormulaMap, HeaderSpec, Sheet};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::iter::Peekable;
use std::str::Chars;

/// One `letter → column name` binding read from legend text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegendBinding {
    pub letter: char,
    pub name: String,
}

const ENTRY_SEPARATORS: &[char] = &[';', '；', ',', '，', '\n', '\r'];

/// Parse every binding in a legend cell. Segments that do not match
/// `<letter> <: or => <text>` are skipped.
pub fn parse_legend(text: &str) -> Vec<LegendBinding> {
    text.split(ENTRY_SEPARATORS)
        .filter_map(parse_legend_entry)
        .collect()
}

fn parse_legend_entry(segment: &str) -> Option<LegendBinding> {
    // `B=c+d` is a formula, not a binding
    if FormulaText::parse(segment).is_some() {
        return None;
    }

    let mut chars: Peekable<Chars> = segment.chars().peekable();
    skip_whitespace(&mut chars);

    let letter = chars.next().filter(char::is_ascii_alphabetic)?;
    skip_whitespace(&mut chars);
    if !matches!(chars.next(), Some(':') | Some('：') | Some('=') | Some('＝')) {
        return None;
    }

    let name: String = chars.collect::<String>().trim().to_string();
    if name.is_empty() {
        return None;
    }
    Some(LegendBinding { letter, name })
}

fn skip_whitespace(chars: &mut Peekable<Chars>) {
    while chars.peek().is_some_and(|c| c.is_whitespace()) {
        chars.next();
    }
}

/// Builds the `CodeMap` for a sheet's formulas
pub struct CodeMapExtractor<'a> {
    config: &'a LegendConfig,
}

impl<'a> CodeMapExtractor<'a> {
    pub fn new(config: &'a LegendConfig) -> Self {
        Self { config }
    }

    /// Resolve all formula letters; unbound letters map to `CodeBinding::Unresolved`
    /// and produce one warning each.
    pub fn extract(
        &self,
        sheet: &Sheet,
        header: &HeaderSpec,
        block: HeaderBlock,
        formulas: &FormulaMap,
    ) -> (CodeMap, Vec<ParseWarning>) {
        // letter → formula targets using it
        let mut wanted: BTreeMap<char, BTreeSet<String>> = BTreeMap::new();
        let mut targets: HashMap<char, String> = HashMap::new();
        for (column, text) in formulas {
            let Some(formula) = FormulaText::parse(text) else {
                continue;
            };
            targets.entry(formula.target).or_insert_with(|| column.clone());
            for letter in formula.codes() {
                wanted.entry(letter).or_default().insert(column.clone());
            }
        }

        let mut codes = CodeMap::new();
        let mut warnings = Vec::new();
        if wanted.is_empty() {
            return (codes, warnings);
        }

        let (explicit, positional) = self.scan_legend(sheet, header, block);

        for (letter, used_in) in wanted {
            let binding = lookup(&explicit, letter)
                .or_else(|| lookup(&positional, letter))
                .or_else(|| targets.get(&letter).cloned());
            match binding {
                Some(name) => {
                    codes.insert(letter.to_string(), CodeBinding::Column(name));
                }
                None => {
                    tracing::warn!(sheet = %sheet.name, %letter, "unresolved formula code");
                    codes.insert(letter.to_string(), CodeBinding::Unresolved);
                    warnings.push(ParseWarning::UnresolvedCode {
                        letter: letter.to_string(),
                        formulas: used_in.into_iter().collect(),
                    });
                }
            }
        }

        tracing::debug!(
            sheet = %sheet.name,
            resolved = codes.len() - warnings.len(),
            unresolved = warnings.len(),
            "resolved formula codes"
        );
        (codes, warnings)
    }

    /// Collect explicit and positional bindings; the first binding of a letter wins
    fn scan_legend(
        &self,
        sheet: &Sheet,
        header: &HeaderSpec,
        block: HeaderBlock,
    ) -> (HashMap<char, String>, HashMap<char, String>) {
        let start = block.first.saturating_sub(self.config.rows_above);
        let end = (block.last + 1 + self.config.rows_below).min(sheet.grid.height());

        let mut explicit = HashMap::new();
        let mut positional = HashMap::new();
        for row in start..end {
            let cells = sheet.grid.row(row);
            let below = row > block.last;
            if below && is_code_row(cells) {
                for (col, cell) in cells.iter().enumerate() {
                    if let (Some(letter), Some(name)) = (cell.mnemonic(), header.name(col)) {
                        positional.entry(letter).or_insert_with(|| name.to_string());
                    }
                }
                continue;
            }
            // Values such as `H=2.4m` in a data row are not legend text
            if below && cells.iter().any(|c| c.as_number().is_some()) {
                continue;
            }
            for cell in cells {
                if let Cell::Text(text) = cell {
                    for binding in parse_legend(text) {
                        explicit.entry(binding.letter).or_insert(binding.name);
                    }
                }
            }
        }
        (explicit, positional)
    }
}

/// A row of lone code letters, possibly beside formula text
fn is_code_row(cells: &[Cell]) -> bool {
    cells.iter().any(|c| c.mnemonic().is_some())
        && cells
            .iter()
            .filter(|c| !c.is_empty())
            .all(|c| c.is_formula() || c.mnemonic().is_some())
}

/// Exact letter first, then the other case
fn lookup(bindings: &HashMap<char, String>, letter: char) -> Option<String> {
    bindings.get(&letter).cloned().or_else(|| {
        let other = if letter.is_ascii_lowercase() {
            letter.to_ascii_uppercase()
        } else {
            letter.to_ascii_lowercase()
        };
        bindings.get(&other).cloned()
    })
}
