//! Error types.
//!
//! Library code returns typed errors (`ConfigError`, `DataError`) so callers can
//! react to specific failures. The binary converts them into an `AppError`
//! carrying the process exit code:
//!
//! - `2`: configuration or argument error
//! - `3`: dataset error (missing columns, bad values, nothing loaded)
//! - `4`: IO error while writing outputs

use std::fmt;
use std::path::PathBuf;

use crate::domain::DataType;

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Debug for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::new(2, err.to_string())
    }
}

impl From<DataError> for AppError {
    fn from(err: DataError) -> Self {
        AppError::new(3, err.to_string())
    }
}

/// A single problem found while validating a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    /// Dotted key path, e.g. `params.cdr.weekend`.
    pub path: String,
    pub message: String,
}

impl ConfigIssue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file not found: '{}'", .path.display())]
    NotFound { path: PathBuf },

    #[error("Failed to read config '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config YAML '{}': {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Config has {} problem(s):\n{}", .0.len(), format_issues(.0))]
    Invalid(Vec<ConfigIssue>),
}

impl ConfigError {
    /// Validation issues, if this error came from validation.
    pub fn issues(&self) -> &[ConfigIssue] {
        match self {
            ConfigError::Invalid(issues) => issues,
            _ => &[],
        }
    }
}

fn format_issues(issues: &[ConfigIssue]) -> String {
    issues
        .iter()
        .map(|issue| format!("  - {issue}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("{dataset}: missing required column(s): {}", .columns.join(", "))]
    MissingColumns {
        dataset: DataType,
        columns: Vec<String>,
    },

    #[error("{dataset}: invalid value in column `{column}` (row {row}): {message}")]
    InvalidValue {
        dataset: DataType,
        column: String,
        row: usize,
        message: String,
    },

    #[error("{0}: no file configured under path.input_data.file_paths")]
    NotConfigured(DataType),

    #[error("{0} must be loaded first")]
    NotLoaded(DataType),

    #[error("Invalid date range: start {start} is after end {end}")]
    InvalidRange {
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },

    #[error("Failed to open '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read CSV '{}': {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("'{}': row {row} has {found} field(s) but the header has {expected}", .path.display())]
    RaggedRow {
        path: PathBuf,
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("Invalid GeoJSON '{}': {message}", .path.display())]
    GeoJson { path: PathBuf, message: String },

    #[error("Failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),
}
