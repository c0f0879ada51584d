use thiserror::Error;

pub type ParseResult<T> = Result<T, ParseError>;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Workbook has no sheets")]
    NoSheetFound,

    #[error("Sheet '{name}' not found in workbook")]
    SheetNotFound { name: String },

    #[error("No header row found in sheet '{sheet}' (best score {best_score:.2})")]
    HeaderNotFound { sheet: String, best_score: f64 },

    #[error("Ambiguous header in sheet '{sheet}': rows {rows:?} share the top score")]
    AmbiguousHeader { sheet: String, rows: Vec<usize> },

    #[error("Sheet '{sheet}' has a header but no data rows")]
    EmptyDataset { sheet: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Workbook error: {0}")]
    Workbook(String),

    #[error("Export error: {0}")]
    Export(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{file}: {source}")]
    InFile {
        file: String,
        #[source]
        source: Box<ParseError>,
    },
}

impl ParseError {
    /// Attach the originating file name to an engine error.
    pub fn in_file(self, file: impl Into<String>) -> Self {
        ParseError::InFile {
            file: file.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, with any file context stripped.
    pub fn root(&self) -> &ParseError {
        match self {
            ParseError::InFile { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Non-fatal findings reported next to a successful parse
#[derive(Debug, Clone, PartialEq)]
pub enum ParseWarning {
    /// A formula references a letter with no legend binding
    UnresolvedCode { letter: String, formulas: Vec<String> },
    /// A header was found but every row below it was filtered out
    EmptyDataset { sheet: String },
}

impl std::fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseWarning::UnresolvedCode { letter, formulas } => write!(
                f,
                "code '{}' used in {} has no legend binding",
                letter,
                formulas.join(", ")
            ),
            ParseWarning::EmptyDataset { sheet } => {
                write!(f, "sheet '{}' has no data rows below its header", sheet)
            }
        }
    }
}
