use crate::config::ParserConfig;
use crate::engine::{Assembler, ParseOutput, SheetSelector};
use crate::excel::{TableExporter, WorkbookLoader};
use crate::types::ParseMetadata;
use anyhow::Context;
use colored::Colorize;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// JSON document written by `parse --json`
#[derive(Serialize)]
struct JsonReport<'a> {
    metadata: &'a ParseMetadata,
    columns: Vec<&'a str>,
    rows: Vec<serde_json::Map<String, serde_json::Value>>,
    warnings: Vec<String>,
}

/// Defaults, or the YAML file at `path` layered over them
fn load_config(path: Option<&Path>) -> anyhow::Result<ParserConfig> {
    match path {
        Some(path) => ParserConfig::from_yaml_file(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(ParserConfig::default()),
    }
}

/// Execute the sheets command: list every sheet with its selection signals
pub fn sheets(file: PathBuf, config: Option<PathBuf>) -> anyhow::Result<()> {
    let config = load_config(config.as_deref())?;
    let workbook = WorkbookLoader::new(&file)
        .load()
        .with_context(|| format!("Failed to read {}", file.display()))?;

    println!("{}", "📋 Sheets".bold().green());
    println!("   File: {}\n", file.display());

    let selector = SheetSelector::new(&config);
    let selected = selector.select(&workbook).ok().map(|s| s.name.clone());
    for score in selector.score_all(&workbook) {
        let marker = if selected.as_deref() == Some(score.name.as_str()) {
            "→".bright_green().bold().to_string()
        } else {
            " ".to_string()
        };
        println!(
            " {} {}  keywords: {}  cells: {}  columns: {}",
            marker,
            score.name.bright_blue().bold(),
            score.keyword_hits,
            score.non_empty,
            score.columns
        );
    }
    if workbook.sheets.is_empty() {
        println!("{}", "⚠️  Workbook has no sheets".yellow());
    }
    println!();
    Ok(())
}

/// Execute the parse command
pub fn parse(
    file: PathBuf,
    sheet: Option<String>,
    config: Option<PathBuf>,
    json: Option<PathBuf>,
    xlsx: Option<PathBuf>,
    strict: bool,
) -> anyhow::Result<()> {
    let config = load_config(config.as_deref())?;
    let assembler = Assembler::new(config).context("Invalid configuration")?;
    let workbook = WorkbookLoader::new(&file)
        .load()
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let mut output = assembler.parse(&workbook, sheet.as_deref())?;
    if strict {
        output = output.require_rows()?;
    }

    // `--json -` keeps stdout machine-readable
    let to_stdout = json.as_deref() == Some(Path::new("-"));
    if !to_stdout {
        print_summary(&file, &output);
    }

    if let Some(path) = json {
        let text = json_report(&output)?;
        if to_stdout {
            println!("{}", text);
        } else {
            fs::write(&path, text)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("   JSON: {}", path.display());
        }
    }

    if let Some(path) = xlsx {
        TableExporter::new(&output.table, &output.metadata)
            .export(&path)
            .with_context(|| format!("Failed to export {}", path.display()))?;
        if !to_stdout {
            println!("   Excel: {}", path.display());
        }
    }

    Ok(())
}

/// Execute the config command: print (or write) the default configuration
pub fn config(output: Option<PathBuf>) -> anyhow::Result<()> {
    let yaml = ParserConfig::default().to_yaml()?;
    match output {
        Some(path) => {
            fs::write(&path, yaml)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("{} {}", "✅ Default config written to".green(), path.display());
        }
        None => print!("{}", yaml),
    }
    Ok(())
}

fn json_report(output: &ParseOutput) -> anyhow::Result<String> {
    let report = JsonReport {
        metadata: &output.metadata,
        columns: output.table.column_names(),
        rows: output.table.to_records(),
        warnings: output.warnings.iter().map(ToString::to_string).collect(),
    };
    Ok(serde_json::to_string_pretty(&report)?)
}

fn print_summary(file: &Path, output: &ParseOutput) {
    let table = &output.table;
    let metadata = &output.metadata;

    println!("{}", "✅ Parsed".bold().green());
    println!("   File:   {}", file.display());
    println!("   Sheet:  {}", metadata.source_sheet.bright_blue().bold());
    println!(
        "   Header: row {} ({} row{})",
        table.header_row + 1,
        table.header_height,
        if table.header_height == 1 { "" } else { "s" }
    );
    println!("   Rows:   {}", table.row_count());
    println!("   Columns: {}", table.column_names().join(", ").cyan());

    if !metadata.formulas.is_empty() {
        println!("\n   {}", "Formulas:".bold().cyan());
        for (column, formula) in &metadata.formulas {
            println!("      {} {}", column.bright_blue(), formula.bright_yellow());
        }
    }
    if !metadata.codes.is_empty() {
        println!("\n   {}", "Codes:".bold().cyan());
        for (letter, binding) in &metadata.codes {
            let target = match binding.column() {
                Some(column) => column.normal(),
                None => "<unresolved>".red(),
            };
            println!("      {} → {}", letter.bright_blue(), target);
        }
    }
    for warning in &output.warnings {
        println!("   {} {}", "⚠️".yellow(), warning.to_string().yellow());
    }
    println!();
}
