use clap::{Parser, Subcommand};
use costsheet::cli;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "costsheet")]
#[command(about = "Recover tables, formulas and category hierarchy from cost spreadsheets")]
#[command(long_about = "costsheet - Structure recovery for semi-structured cost spreadsheets

Finds the data sheet and header row of a bill of quantities / quotation
workbook, merges stacked header rows, collects the formula text and code
legend written around the header, and tags every data row with its L1/L2
category from the group-marker rows above it.

COMMANDS:
  sheets  - Show every sheet with its selection signals
  parse   - Recover the table and its metadata
  config  - Print the default parser configuration (YAML)

EXAMPLES:
  costsheet sheets quote.xlsx
  costsheet parse quote.xlsx --json quote.json
  costsheet parse quote.xlsx --sheet 清单 --config parser.yaml --xlsx clean.xlsx
  costsheet config > parser.yaml

Logging: RUST_LOG=costsheet=debug (or --verbose), written to stderr.")]
#[command(version)]
struct Cli {
    /// Log engine decisions (debug level) to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show every sheet with its selection signals
    Sheets {
        /// Path to workbook (.xlsx, .xls, .ods)
        file: PathBuf,

        /// Parser configuration (YAML)
        #[arg(short, long, env = "COSTSHEET_CONFIG")]
        config: Option<PathBuf>,
    },

    #[command(long_about = "Recover the table and its metadata from a workbook.

The best-scoring sheet is used unless --sheet names one. The summary is
printed to stdout; --json writes the table and metadata as

  { \"metadata\": {...}, \"columns\": [...], \"rows\": [{...}, ...] }

(use --json - to print only the JSON). --xlsx writes a clean workbook with
'data', 'formulas' and 'codes' sheets.

A header with no data rows below it is reported as a warning; --strict
turns it into an error.")]
    /// Recover the table and its metadata
    Parse {
        /// Path to workbook (.xlsx, .xls, .ods)
        file: PathBuf,

        /// Sheet to parse instead of the auto-selected one
        #[arg(short, long)]
        sheet: Option<String>,

        /// Parser configuration (YAML)
        #[arg(short, long, env = "COSTSHEET_CONFIG")]
        config: Option<PathBuf>,

        /// Write table and metadata as JSON ('-' for stdout)
        #[arg(long)]
        json: Option<PathBuf>,

        /// Write table and metadata to a new .xlsx file
        #[arg(long)]
        xlsx: Option<PathBuf>,

        /// Fail when no data rows are found
        #[arg(long)]
        strict: bool,
    },

    /// Print the default parser configuration (YAML)
    Config {
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "costsheet=debug"
    } else {
        "costsheet=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Sheets { file, config } => cli::sheets(file, config),

        Commands::Parse {
            file,
            sheet,
            config,
            json,
            xlsx,
            strict,
        } => cli::parse(file, sheet, config, json, xlsx, strict),

        Commands::Config { output } => cli::config(output),
    }
}
