//! Category fill-down
//!
//! Walks the rows under the header once, top to bottom. Group-marker rows
//! (a label in the grouping column, every fact column empty) update the
//! current L1/L2 categories and are dropped; data rows are kept and tagged
//! with the categories in force. Nothing propagates upward: rows before the
//! first marker get empty categories.
//!
//! When the header has an L2 source column (`功能区` by default), each data
//! row's non-blank value in that column becomes the current L2.

use crate::config::HierarchyConfig;
use crate::error::{ParseError, ParseResult};
use crate::types::{Cell, HeaderSpec};
use regex::Regex;

/// Level of a group-marker row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerLevel {
    Top,
    Sub,
}

/// How a row under the header is treated
#[derive(Debug, Clone, PartialEq)]
pub enum RowKind {
    Blank,
    /// Formula text or code letters, possibly beside a note
    Annotation,
    Marker(MarkerLevel, String),
    Data,
    /// Neither data nor a usable marker
    Other,
}

/// Decides the level of a group marker from its serial cell and label
#[derive(Debug, Clone)]
pub struct MarkerClassifier {
    l1: Regex,
    l2: Regex,
    indent_as_l2: bool,
}

impl MarkerClassifier {
    pub fn new(config: &HierarchyConfig) -> ParseResult<Self> {
        let compile = |field: &str, pattern: &str| {
            Regex::new(pattern).map_err(|e| {
                ParseError::Config(format!("invalid hierarchy.{}: {}", field, e))
            })
        };
        Ok(Self {
            l1: compile("l1_pattern", &config.l1_pattern)?,
            l2: compile("l2_pattern", &config.l2_pattern)?,
            indent_as_l2: config.indent_as_l2,
        })
    }

    /// `label` is the raw (untrimmed) marker text, `serial` the serial cell text
    pub fn level(&self, serial: Option<&str>, label: &str) -> MarkerLevel {
        let trimmed = label.trim();
        let candidates = || serial.into_iter().chain(std::iter::once(trimmed));
        if candidates().any(|text| self.l1.is_match(text)) {
            MarkerLevel::Top
        } else if candidates().any(|text| self.l2.is_match(text)) {
            MarkerLevel::Sub
        } else if self.indent_as_l2 && label.starts_with(|c: char| c.is_whitespace()) {
            MarkerLevel::Sub
        } else {
            MarkerLevel::Top
        }
    }
}

/// Grouping, fact and serial columns, found by header name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchyLayout {
    pub group: Option<usize>,
    pub facts: Vec<usize>,
    pub serial: Option<usize>,
    /// Column whose values give L2 directly (e.g. `功能区`)
    pub l2_source: Option<usize>,
}

impl HierarchyLayout {
    pub fn detect(header: &HeaderSpec, config: &HierarchyConfig) -> Self {
        let serial = header.find_containing(&config.serial_column_keywords);
        let l2_source = header
            .find_containing(&config.l2_source_column_keywords)
            .filter(|c| Some(*c) != serial);
        let mut group = header
            .find_containing(&config.group_column_keywords)
            .filter(|g| Some(*g) != serial && Some(*g) != l2_source);

        let facts: Vec<usize> = header
            .names()
            .iter()
            .enumerate()
            .filter(|(col, _)| ![serial, group, l2_source].contains(&Some(*col)))
            .filter(|(_, name)| {
                let name = name.to_lowercase();
                config
                    .fact_column_keywords
                    .iter()
                    .any(|k| name.contains(&k.to_lowercase()))
            })
            .map(|(col, _)| col)
            .collect();

        if group.is_none() {
            group = (0..header.len()).find(|col| {
                ![serial, l2_source].contains(&Some(*col)) && !facts.contains(col)
            });
        }

        Self {
            group,
            facts,
            serial,
            l2_source,
        }
    }
}

/// L1/L2 values aligned with the retained data rows
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Hierarchy {
    /// Indices (into the input rows) of the rows kept as data
    pub retained: Vec<usize>,
    pub l1: Vec<String>,
    pub l2: Vec<String>,
}

pub struct HierarchyFiller<'a> {
    layout: HierarchyLayout,
    markers: &'a MarkerClassifier,
}

impl<'a> HierarchyFiller<'a> {
    pub fn new(layout: HierarchyLayout, markers: &'a MarkerClassifier) -> Self {
        Self { layout, markers }
    }

    pub fn layout(&self) -> &HierarchyLayout {
        &self.layout
    }

    pub fn classify(&self, row: &[Cell]) -> RowKind {
        let filled = row.iter().filter(|c| !c.is_empty()).count();
        if filled == 0 {
            return RowKind::Blank;
        }
        if row
            .iter()
            .filter(|c| !c.is_empty())
            .all(|c| c.is_formula() || c.mnemonic().is_some())
        {
            return RowKind::Annotation;
        }

        let serial = self.layout.serial.and_then(|s| row.get(s));
        if !self.layout.facts.is_empty() {
            let has_fact = self
                .layout
                .facts
                .iter()
                .filter_map(|&c| row.get(c))
                .any(|v| !v.is_empty() && !v.is_formula());
            if has_fact {
                return RowKind::Data;
            }
        } else if self.layout.serial.is_some() {
            if serial.and_then(Cell::as_number).is_some() {
                return RowKind::Data;
            }
        } else {
            return RowKind::Data;
        }

        // A label beside formula text is a note on the formula
        if row.iter().any(Cell::is_formula) {
            return RowKind::Annotation;
        }

        match self.marker_label(row, filled) {
            Some(label) => {
                let serial_text = serial.filter(|c| !c.is_empty()).map(Cell::to_string);
                let level = self.markers.level(serial_text.as_deref(), &label);
                RowKind::Marker(level, label.trim().to_string())
            }
            None => RowKind::Other,
        }
    }

    /// Raw label of a marker row: the grouping cell, or else the row's only
    /// non-empty cell when it is text outside the serial column
    fn marker_label(&self, row: &[Cell], filled: usize) -> Option<String> {
        if let Some(Cell::Text(text)) = self.layout.group.and_then(|g| row.get(g)) {
            return Some(text.clone());
        }
        if filled != 1 {
            return None;
        }
        row.iter()
            .enumerate()
            .filter(|(col, _)| Some(*col) != self.layout.serial)
            .find_map(|(_, cell)| match cell {
                Cell::Text(text) => Some(text.clone()),
                _ => None,
            })
    }

    /// Non-blank value of the L2 source column; blank cells continue the
    /// value above, as a vertically merged cell would
    fn l2_source_value<'r>(&self, row: &'r [Cell]) -> Option<&'r str> {
        self.layout
            .l2_source
            .and_then(|col| row.get(col))
            .and_then(Cell::as_text)
            .filter(|text| !text.is_empty())
    }

    /// Classify every row and fill L1/L2 downward
    pub fn fill(&self, rows: &[Vec<Cell>]) -> Hierarchy {
        let mut current_l1 = String::new();
        let mut current_l2 = String::new();
        let mut out = Hierarchy::default();

        for (index, row) in rows.iter().enumerate() {
            match self.classify(row) {
                RowKind::Marker(MarkerLevel::Top, label) => {
                    tracing::debug!(row = index, %label, "L1 marker");
                    current_l1 = label;
                    current_l2.clear();
                }
                RowKind::Marker(MarkerLevel::Sub, label) => {
                    tracing::debug!(row = index, %label, "L2 marker");
                    current_l2 = label;
                }
                RowKind::Data => {
                    if let Some(value) = self.l2_source_value(row) {
                        current_l2 = value.to_string();
                    }
                    out.retained.push(index);
                    out.l1.push(current_l1.clone());
                    out.l2.push(current_l2.clone());
                }
                RowKind::Blank | RowKind::Annotation | RowKind::Other => {}
            }
        }
        out
    }
}
