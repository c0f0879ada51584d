//! Parser configuration
//!
//! One `ParserConfig` value carries the keyword vocabulary, scoring weights
//! and hierarchy rules for the whole engine. Every field has a default, so a
//! YAML file only needs to name what it overrides:
//!
//! ```yaml
//! header:
//!   min_score: 12.0
//!   keywords: [项目, 名称, 单价, 数量]
//! hierarchy:
//!   indent_as_l2: false
//! ```

use crate::error::{ParseError, ParseResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    pub sheet: SheetConfig,
    pub header: HeaderConfig,
    pub legend: LegendConfig,
    pub hierarchy: HierarchyConfig,
}

impl ParserConfig {
    pub fn from_yaml_str(yaml: &str) -> ParseResult<Self> {
        let config: ParserConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: &Path) -> ParseResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn to_yaml(&self) -> ParseResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    fn validate(&self) -> ParseResult<()> {
        if self.header.max_scan_rows == 0 {
            return Err(ParseError::Config(
                "header.max_scan_rows must be at least 1".to_string(),
            ));
        }
        if self.header.keywords.iter().any(|k| k.trim().is_empty()) {
            return Err(ParseError::Config(
                "header.keywords must not contain blank entries".to_string(),
            ));
        }
        if self.hierarchy.l1_column == self.hierarchy.l2_column {
            return Err(ParseError::Config(format!(
                "hierarchy.l1_column and hierarchy.l2_column are both '{}'",
                self.hierarchy.l1_column
            )));
        }
        Ok(())
    }
}

/// Sheet selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetConfig {
    /// Rows searched for header keywords when ranking sheets
    pub scan_rows: usize,
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self { scan_rows: 20 }
    }
}

/// Header scoring and merging
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderConfig {
    pub keywords: Vec<String>,
    pub keyword_weight: f64,
    pub non_empty_weight: f64,
    pub text_weight: f64,
    pub unique_weight: f64,
    /// Only the first K rows are header candidates
    pub max_scan_rows: usize,
    /// Minimum score (inclusive) for the best row to count as a header
    pub min_score: f64,
    /// Minimum score for a neighbouring row to join a stacked header
    pub secondary_score: f64,
    /// Rows with fewer non-empty cells score zero
    pub min_cells: usize,
    pub long_text_len: usize,
    pub long_text_penalty: f64,
    /// Fail with `AmbiguousHeader` on a tie instead of taking the first row
    pub strict_ties: bool,
    /// Separator between a group label and its field name
    pub joiner: String,
}

impl Default for HeaderConfig {
    fn default() -> Self {
        Self {
            keywords: strings(&[
                "项目", "名称", "单价", "合价", "工程量", "数量", "单位", "序号", "品牌", "规格",
                "型号", "备注", "功能区", "内容", "类别", "合计", "金额", "project", "name",
                "unit price", "price", "quantity", "qty", "total", "amount", "unit", "brand",
                "spec", "model", "remark", "note", "serial", "category", "item",
                "description",
            ]),
            keyword_weight: 10.0,
            non_empty_weight: 1.0,
            text_weight: 1.0,
            unique_weight: 1.0,
            max_scan_rows: 20,
            min_score: 10.0,
            secondary_score: 1.5,
            min_cells: 2,
            long_text_len: 50,
            long_text_penalty: 2.0,
            strict_ties: false,
            joiner: "_".to_string(),
        }
    }
}

/// Bounds of the legend region, relative to the header block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LegendConfig {
    pub rows_above: usize,
    pub rows_below: usize,
}

impl Default for LegendConfig {
    fn default() -> Self {
        Self {
            rows_above: 10,
            rows_below: 10,
        }
    }
}

/// Category fill-down
///
/// A group-marker row is top level (L1) when its serial cell or label matches
/// `l1_pattern`, second level (L2) when it matches `l2_pattern` or, with
/// `indent_as_l2`, when the label starts with whitespace. Anything else is L1.
/// A header column matching `l2_source_column_keywords` also sets L2 from
/// each data row's value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HierarchyConfig {
    pub group_column_keywords: Vec<String>,
    pub fact_column_keywords: Vec<String>,
    pub serial_column_keywords: Vec<String>,
    /// A column matching one of these supplies L2 values directly
    pub l2_source_column_keywords: Vec<String>,
    pub l1_pattern: String,
    pub l2_pattern: String,
    pub indent_as_l2: bool,
    pub l1_column: String,
    pub l2_column: String,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            group_column_keywords: strings(&[
                "项目名称", "名称", "项目", "name", "item", "description",
            ]),
            fact_column_keywords: strings(&[
                "单价", "合价", "数量", "工程量", "金额", "合计", "总价", "费", "price", "qty",
                "quantity", "amount", "total", "cost",
            ]),
            serial_column_keywords: strings(&["序号", "serial", "no."]),
            l2_source_column_keywords: strings(&["功能区"]),
            l1_pattern: r"^[一二三四五六七八九十]+(\s*[、.．]|$)".to_string(),
            l2_pattern: r"^([（(][一二三四五六七八九十\d]+[)）]|\d+\s*[、．]|\d+\.\d+)".to_string(),
            indent_as_l2: true,
            l1_column: "L1".to_string(),
            l2_column: "L2".to_string(),
        }
    }
}
