//! End-to-end engine tests on in-memory workbooks

use costsheet::config::{HeaderConfig, ParserConfig};
use costsheet::engine::{
    make_unique, Assembler, FormulaExtractor, HeaderBlock, HeaderLocator, HeaderMerger,
};
use costsheet::error::{ParseError, ParseWarning};
use costsheet::types::{Cell, CodeBinding, HeaderSpec, MergedRange, Sheet, Workbook};
use costsheet::parse_workbook;
use pretty_assertions::assert_eq;
use std::collections::HashSet;

fn row(cells: &[&str]) -> Vec<Cell> {
    cells
        .iter()
        .map(|s| match s.parse::<f64>() {
            Ok(n) => Cell::Number(n),
            Err(_) => Cell::from_text(s),
        })
        .collect()
}

fn sheet(name: &str, rows: &[&[&str]]) -> Sheet {
    Sheet::new(name, rows.iter().map(|r| row(r)).collect())
}

fn assembler() -> Assembler {
    Assembler::new(ParserConfig::default()).unwrap()
}

/// Small deterministic generator for shuffles and fuzzing
struct Lcg(u64);

impl Lcg {
    fn next(&mut self, bound: usize) -> usize {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        ((self.0 >> 33) % bound as u64) as usize
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// SCENARIOS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_header_below_title_and_blank_row() {
    let s = sheet(
        "报价",
        &[
            &["XX小区装修工程报价单"],
            &[],
            &["序号", "项目名称", "不含税单价", "数量"],
            &["1", "地砖", "120", "3"],
        ],
    );
    let config = HeaderConfig::default();
    assert_eq!(HeaderLocator::new(&config).locate(&s).unwrap().index, 2);

    let output = assembler().parse_sheet(&s, "报价.xlsx").unwrap();
    assert_eq!(output.table.header_row, 2);
    assert_eq!(
        output.table.header.names(),
        &["序号", "项目名称", "不含税单价", "数量"]
    );
    assert_eq!(output.table.row_count(), 1);
}

#[test]
fn test_stacked_header_rows_are_merged() {
    let s = sheet(
        "清单",
        &[
            &["成本", "成本", ""],
            &["单价", "合价", "备注"],
            &["12", "24", "进口"],
        ],
    );
    let output = assembler().parse_sheet(&s, "清单.xlsx").unwrap();
    assert_eq!(
        output.table.header.names(),
        &["成本_单价", "成本_合价", "备注"]
    );
    assert_eq!(output.table.header_row, 0);
    assert_eq!(output.table.header_height, 2);
    assert_eq!(output.table.row_count(), 1);
}

#[test]
fn test_formula_and_legend_give_full_code_map() {
    let s = sheet(
        "综合单价",
        &[
            &["c:主材单价；d:人工费；e:辅材费；f:机械费；g:税率"],
            &["项目名称", "主材单价", "人工费", "辅材费", "机械费", "税率", "B"],
            &["", "", "", "", "", "", "B=c+(d+e+f)*(1+g)"],
            &["地面"],
            &["地砖", "50", "20", "5", "3", "0.09", "83.7"],
        ],
    );
    let output = assembler().parse_sheet(&s, "q.xlsx").unwrap();
    let metadata = &output.metadata;

    assert_eq!(metadata.formulas.len(), 1);
    assert_eq!(metadata.formulas["B"], "B=c+(d+e+f)*(1+g)");

    let expected = [
        ("B", "B"),
        ("c", "主材单价"),
        ("d", "人工费"),
        ("e", "辅材费"),
        ("f", "机械费"),
        ("g", "税率"),
    ];
    assert_eq!(metadata.codes.len(), expected.len());
    for (letter, column) in expected {
        assert_eq!(
            metadata.codes[letter],
            CodeBinding::Column(column.to_string()),
            "code {}",
            letter
        );
    }
    assert!(output.warnings.is_empty());
    assert!(metadata.missing_codes().is_empty());

    // The formula row is not data
    assert_eq!(output.table.row_count(), 1);
    assert_eq!(output.table.l1, vec!["地面"]);
}

#[test]
fn test_group_markers_fill_down() {
    let s = sheet(
        "清单",
        &[
            &["名称", "数量", "单价"],
            &["地面", "", ""],
            &["地砖", "10", "80"],
            &["找平", "10", "20"],
            &["墙面", "", ""],
            &["乳胶漆", "30", "25"],
        ],
    );
    let output = assembler().parse_sheet(&s, "w.xlsx").unwrap();
    assert_eq!(output.table.row_count(), 3);
    assert_eq!(output.table.l1, vec!["地面", "地面", "墙面"]);
    assert_eq!(output.table.source_rows, vec![2, 3, 5]);
    assert_eq!(
        output.table.cell(2, "名称"),
        Some(&Cell::Text("乳胶漆".to_string()))
    );
}

#[test]
fn test_group_marker_below_header_stays_a_category() {
    let s = sheet(
        "拆改",
        &[
            &["序号", "项目名称", "单位", "数量", "单价"],
            &["一", "拆除项目", "", "", ""],
            &["1", "拆除地砖", "m2", "10", "5"],
        ],
    );
    let output = assembler().parse_sheet(&s, "拆改.xlsx").unwrap();
    assert_eq!(
        output.table.header.names(),
        &["序号", "项目名称", "单位", "数量", "单价"]
    );
    assert_eq!(output.table.header_height, 1);
    assert_eq!(output.table.l1, vec!["拆除项目"]);
    assert_eq!(output.table.source_rows, vec![2]);
}

#[test]
fn test_dimension_text_is_not_a_formula() {
    let s = sheet(
        "门窗",
        &[
            &["名称", "规格", "数量", "单价"],
            &["门", "H=2.4m", "2", "800"],
        ],
    );
    let output = assembler().parse_sheet(&s, "门窗.xlsx").unwrap();
    assert!(output.metadata.formulas.is_empty());
    assert!(output.metadata.codes.is_empty());
    assert!(output.warnings.is_empty());
    assert_eq!(output.table.row_count(), 1);
    assert_eq!(
        output.table.cell(0, "规格"),
        Some(&Cell::Text("H=2.4m".to_string()))
    );
}

#[test]
fn test_letter_in_data_row_does_not_bind_code() {
    let s = sheet(
        "板材",
        &[
            &["c:数量；d:单价"],
            &["名称", "规格", "数量", "单价", "合价"],
            &["", "", "", "", "E=c*d*g"],
            &["板材", "G", "2", "80", "160"],
        ],
    );
    let output = assembler().parse_sheet(&s, "板材.xlsx").unwrap();
    let codes = &output.metadata.codes;
    assert_eq!(codes["c"], CodeBinding::Column("数量".to_string()));
    assert_eq!(codes["d"], CodeBinding::Column("单价".to_string()));
    assert_eq!(codes["E"], CodeBinding::Column("合价".to_string()));
    assert_eq!(codes["g"], CodeBinding::Unresolved);
    assert_eq!(
        output.warnings,
        vec![ParseWarning::UnresolvedCode {
            letter: "g".to_string(),
            formulas: vec!["合价".to_string()],
        }]
    );
    assert_eq!(output.table.row_count(), 1);
}

#[test]
fn test_function_area_column_gives_l2() {
    let s = sheet(
        "明细",
        &[
            &["序号", "功能区", "项目名称", "数量", "单价"],
            &["一", "", "地面工程", "", ""],
            &["1", "客厅", "地砖", "20", "80"],
            &["2", "", "踢脚线", "12", "30"],
            &["3", "主卧", "木地板", "15", "200"],
        ],
    );
    let output = assembler().parse_sheet(&s, "明细.xlsx").unwrap();
    assert_eq!(output.table.l1, vec!["地面工程", "地面工程", "地面工程"]);
    assert_eq!(output.table.l2, vec!["客厅", "客厅", "主卧"]);
}

#[test]
fn test_empty_inputs_fail_cleanly() {
    let empty = Workbook::new("empty.xlsx");
    let err = parse_workbook(&empty, None).unwrap_err();
    assert!(matches!(err.root(), ParseError::NoSheetFound));

    let blank = Workbook::new("blank.xlsx").with_sheet(Sheet::new("Sheet1", vec![]));
    let err = parse_workbook(&blank, None).unwrap_err();
    match err.root() {
        ParseError::HeaderNotFound { sheet, best_score } => {
            assert_eq!(sheet, "Sheet1");
            assert_eq!(*best_score, 0.0);
        }
        other => panic!("expected HeaderNotFound, got {:?}", other),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// PROPERTIES
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_header_choice_survives_row_shuffles() {
    let title: Vec<Cell> = row(&["二〇二四年度维修工程"]);
    let header = row(&["序号", "项目名称", "单位", "数量", "单价", "合价"]);
    let body: Vec<Vec<Cell>> = vec![
        row(&["1", "地砖", "m2", "20", "80", "1600"]),
        row(&["2", "踢脚线", "m", "30", "15", "450"]),
        row(&["", "", "", "", "", ""]),
        row(&["3", "吊顶", "m2", "12", "95", "1140"]),
        row(&["注：以上价格含税"]),
        row(&["4", "乳胶漆", "m2", "60", "25", "1500"]),
    ];
    let config = HeaderConfig::default();
    let locator = HeaderLocator::new(&config);

    let mut rng = Lcg(7);
    for _ in 0..50 {
        let mut shuffled = body.clone();
        for i in (1..shuffled.len()).rev() {
            shuffled.swap(i, rng.next(i + 1));
        }
        let mut rows = vec![title.clone(), header.clone()];
        rows.extend(shuffled);
        let s = Sheet::new("s", rows);
        assert_eq!(locator.locate(&s).unwrap().index, 1);
    }
}

#[test]
fn test_merged_names_are_unique_under_duplicates() {
    let pool = ["名称", "单价", "单价_1", "", "数量", "数量", "x"];
    let config = HeaderConfig::default();
    let merger = HeaderMerger::new(&config);

    let mut rng = Lcg(42);
    for _ in 0..200 {
        let width = 1 + rng.next(8);
        let labels: Vec<&str> = (0..width).map(|_| pool[rng.next(pool.len())]).collect();
        // A non-empty edge keeps the grid at full width
        let mut cells = vec!["名称"];
        cells.extend(labels);
        cells.push("备注");
        let s = sheet("s", &[cells.as_slice()]);

        let header = merger.merge(&s, HeaderBlock { first: 0, last: 0 });
        let distinct: HashSet<&String> = header.names().iter().collect();
        assert_eq!(distinct.len(), header.len(), "{:?}", header.names());
        assert_eq!(header.len(), s.grid.width());
    }
}

#[test]
fn test_two_row_merged_names_are_unique() {
    let pool = ["成本", "单价", "单价_1", "", "成本_单价", "数量", "x"];
    let config = HeaderConfig::default();
    let merger = HeaderMerger::new(&config);

    let mut rng = Lcg(7);
    for _ in 0..200 {
        let width = 1 + rng.next(8);
        let mut upper = vec!["名称"];
        upper.extend((0..width).map(|_| pool[rng.next(pool.len())]));
        upper.push("备注");
        let lower: Vec<&str> = (0..upper.len()).map(|_| pool[rng.next(pool.len())]).collect();

        // One group label merged across part of the interior columns
        let first = 1 + rng.next(width);
        let last = first + rng.next(width + 1 - first);
        let s = Sheet::with_merges(
            "s",
            vec![row(&upper), row(&lower)],
            vec![MergedRange::new(0, first, 0, last)],
        );

        let header = merger.merge(&s, HeaderBlock { first: 0, last: 1 });
        let distinct: HashSet<&String> = header.names().iter().collect();
        assert_eq!(distinct.len(), header.len(), "{:?}", header.names());
        assert_eq!(header.len(), width + 2);
        assert!(header.names().iter().all(|n| !n.is_empty()));
    }
}

#[test]
fn test_make_unique_never_collides() {
    let names = vec!["x", "x", "x_1", "x", "x_2"]
        .into_iter()
        .map(String::from)
        .collect();
    let unique = make_unique(names);
    let distinct: HashSet<&String> = unique.iter().collect();
    assert_eq!(distinct.len(), unique.len());
    assert_eq!(unique[0], "x");
    assert_eq!(unique[1], "x_1");
}

#[test]
fn test_formula_extraction_is_idempotent() {
    let s = sheet(
        "s",
        &[
            &["名称", "单价", "合价"],
            &["", "A=b+c", "C=a*q"],
            &["地砖", "80", "B=x*y"],
        ],
    );
    let header = HeaderSpec::from_names(vec![
        "名称".to_string(),
        "单价".to_string(),
        "合价".to_string(),
    ]);
    let extractor = FormulaExtractor::new(&s, &header);
    let first = extractor.extract(1);
    let second = extractor.extract(1);
    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
    // First formula in a column wins
    assert_eq!(first["合价"], "C=a*q");
}

#[test]
fn test_categories_change_only_at_markers() {
    let s = sheet(
        "s",
        &[
            &["名称", "数量"],
            &["零星", "1"],
            &["地面", ""],
            &["地砖", "2"],
            &["", ""],
            &["找平", "3"],
            &["墙面", ""],
            &["乳胶漆", "4"],
        ],
    );
    let output = assembler().parse_sheet(&s, "w.xlsx").unwrap();
    let table = &output.table;
    assert_eq!(table.l1, vec!["", "地面", "地面", "墙面"]);
    assert_eq!(table.l2, vec!["", "", "", ""]);

    // Between consecutive data rows the category changes only if a marker
    // row sits between them
    let markers = [2usize, 6];
    for i in 1..table.row_count() {
        let (prev, cur) = (table.source_rows[i - 1], table.source_rows[i]);
        let crossed = markers.iter().any(|m| prev < *m && *m < cur);
        assert_eq!(table.l1[i] != table.l1[i - 1], crossed);
    }
}

#[test]
fn test_formula_letters_are_all_in_code_map() {
    let s = sheet(
        "s",
        &[
            &["名称", "数量", "单价", "合价"],
            &["", "q", "p", "T=q*p+z"],
            &["地砖", "2", "80", "160"],
        ],
    );
    let output = assembler().parse_sheet(&s, "w.xlsx").unwrap();
    let metadata = &output.metadata;

    assert!(metadata.missing_codes().is_empty());
    assert_eq!(metadata.codes["q"], CodeBinding::Column("数量".to_string()));
    assert_eq!(metadata.codes["p"], CodeBinding::Column("单价".to_string()));
    assert_eq!(metadata.codes["T"], CodeBinding::Column("合价".to_string()));
    assert_eq!(metadata.codes["z"], CodeBinding::Unresolved);
    assert_eq!(metadata.unresolved_codes(), vec!["z"]);
    assert_eq!(
        output.warnings,
        vec![ParseWarning::UnresolvedCode {
            letter: "z".to_string(),
            formulas: vec!["合价".to_string()],
        }]
    );
}

// ═══════════════════════════════════════════════════════════════════════════
// SELECTION AND OUTPUT
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_workbook_picks_data_sheet_and_records_source() {
    let workbook = Workbook::new("报价单.xlsx")
        .with_sheet(sheet("封面", &[&["某某公司"], &["2024年"]]))
        .with_sheet(sheet(
            "明细",
            &[&["名称", "数量", "单价"], &["地砖", "10", "80"]],
        ));
    let output = parse_workbook(&workbook, None).unwrap();
    assert_eq!(output.metadata.source_sheet, "明细");
    assert_eq!(output.metadata.original_filename, "报价单.xlsx");

    let forced = parse_workbook(&workbook, Some("封面")).unwrap_err();
    assert!(matches!(forced.root(), ParseError::HeaderNotFound { .. }));
}

#[test]
fn test_records_and_typed_columns() {
    let s = sheet(
        "s",
        &[
            &["名称", "数量", "单价"],
            &["地面", "", ""],
            &["地砖", "10", "80"],
            &["找平", "1,200", ""],
        ],
    );
    let output = assembler().parse_sheet(&s, "w.xlsx").unwrap();
    let table = &output.table;

    let records = table.to_records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["名称"], "地砖");
    assert_eq!(records[0]["L1"], "地面");
    assert_eq!(records[1]["单价"], serde_json::Value::Null);

    match table.column_values("数量") {
        Some(costsheet::ColumnValue::Number(values)) => assert_eq!(values, vec![10.0, 1200.0]),
        other => panic!("expected numbers, got {:?}", other),
    }
    assert_eq!(table.column_values("名称").unwrap().type_name(), "Text");
    assert!(table.column_values("missing").is_none());
}

#[test]
fn test_strict_mode_and_config_overrides() {
    let s = sheet("s", &[&["名称", "数量"]]);
    let output = assembler().parse_sheet(&s, "w.xlsx").unwrap();
    assert!(output.require_rows().is_err());

    let config = ParserConfig::from_yaml_str(
        "hierarchy:\n  l1_column: 分部\n  l2_column: 分项\nheader:\n  joiner: \"-\"\n",
    )
    .unwrap();
    let s = sheet(
        "s",
        &[
            &["成本", "成本"],
            &["单价", "合价"],
            &["地面", ""],
            &["3", "6"],
        ],
    );
    let output = Assembler::new(config).unwrap().parse_sheet(&s, "w.xlsx").unwrap();
    assert_eq!(output.table.header.names(), &["成本-单价", "成本-合价"]);
    assert_eq!(
        output.table.column_names(),
        vec!["成本-单价", "成本-合价", "分部", "分项"]
    );
}
