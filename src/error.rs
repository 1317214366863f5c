use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::datatype::CellId;

/// Where an error happened: owning model, package, dataset and data path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    pub model: Option<String>,
    pub package: String,
    pub dataset: String,
    pub path: String,
}
impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.model {
            Some(model) => write!(f, "{}/{}/{}", model, self.package, self.dataset)?,
            None => write!(f, "{}/{}", self.package, self.dataset)?,
        }
        write!(f, " (data path: {})", self.path)
    }
}

#[derive(Error, Debug)]
pub enum ListError {
    #[error("{context}: data line {row} only has {found} entries, minimum number of entries is {minimum}")]
    SchemaViolation {
        context: ErrorContext,
        row: usize,
        found: usize,
        minimum: usize,
    },
    #[error("{context}: cellid {cellid} on data line {row} is outside of the model grid {}", shape_text(.shape))]
    GridBoundsViolation {
        context: ErrorContext,
        row: usize,
        cellid: CellId,
        shape: Vec<usize>,
    },
    #[error("{context}: cellid {cellid} on data line {row} is outside of the active model grid")]
    InactiveCellViolation {
        context: ErrorContext,
        row: usize,
        cellid: CellId,
    },
    #[error("{context}: not enough data provided, data for required data item \"{field}\" not found on data line {row}")]
    MissingRequiredField {
        context: ErrorContext,
        field: String,
        row: usize,
    },
    #[error("{context}: could not convert data item \"{field}\" on data line {row} to a string: {message}")]
    EncodingFailure {
        context: ErrorContext,
        field: String,
        row: usize,
        message: String,
    },
    #[error("{context}: {message}")]
    Storage {
        context: ErrorContext,
        message: String,
    },
    #[error("Parse error: {message}")]
    Parse {
        message: String,
        line: Option<usize>,
        col: Option<usize>,
    },
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Schema error: {0}")]
    Schema(String),
    #[error("Config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ListError>;

fn shape_text(shape: &[usize]) -> String {
    let parts: Vec<String> = shape.iter().map(|n| n.to_string()).collect();
    format!("({})", parts.join(", "))
}

impl ListError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
    /// The data line the error refers to, when there is one.
    pub fn row(&self) -> Option<usize> {
        match self {
            Self::SchemaViolation { row, .. }
            | Self::GridBoundsViolation { row, .. }
            | Self::InactiveCellViolation { row, .. }
            | Self::MissingRequiredField { row, .. }
            | Self::EncodingFailure { row, .. } => Some(*row),
            Self::Parse { line, .. } => *line,
            _ => None,
        }
    }
}

// Helper conversions
impl From<config::ConfigError> for ListError {
    fn from(e: config::ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}
impl From<serde_json::Error> for ListError {
    fn from(e: serde_json::Error) -> Self {
        Self::Schema(e.to_string())
    }
}
