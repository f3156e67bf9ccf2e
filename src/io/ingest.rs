//! CSV ingest and column normalization.
//!
//! This module turns a delimited file into a raw `Table` and provides the
//! small parsing helpers every dataset loader shares.
//!
//! Design goals:
//! - **Strict schema** for required columns (all missing columns reported at once)
//! - **Config-driven renaming** from physical to logical column names
//! - **Deterministic parsing** (fixed set of accepted timestamp formats)
//! - **Separation of concerns**: no dataset semantics here

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use tracing::debug;

use crate::config::ColumnMapping;
use crate::domain::{DataType, Table};
use crate::error::DataError;

/// Read a CSV file with a header row into a `Table`.
///
/// Short rows are padded with empty cells; rows with more fields than the
/// header are rejected.
pub fn read_table(path: &Path) -> Result<Table, DataError> {
    let file = File::open(path).map_err(|source| DataError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers = reader
        .headers()
        .map_err(|source| DataError::Csv {
            path: path.to_path_buf(),
            source,
        })?
        .clone();

    let mut table = Table::new(headers.iter().map(normalize_header_name));
    for (i, result) in reader.records().enumerate() {
        let record = result.map_err(|source| DataError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        if record.len() > headers.len() {
            return Err(DataError::RaggedRow {
                path: path.to_path_buf(),
                row: i + 1,
                expected: headers.len(),
                found: record.len(),
            });
        }
        table.push_row(record.iter());
    }

    debug!(path = %path.display(), rows = table.len(), columns = table.columns.len(), "read csv");
    Ok(table)
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports sometimes prefix the first header with a UTF-8 BOM,
    // which would otherwise show up as a missing column.
    name.trim().trim_start_matches('\u{feff}').to_string()
}

/// Rename physical columns to their logical names.
///
/// `mapping` is logical -> physical, as written in `col_names`. Columns not
/// mentioned in the mapping keep their names.
pub fn apply_column_mapping(table: &mut Table, mapping: Option<&ColumnMapping>) {
    let Some(mapping) = mapping else { return };
    let physical_to_logical: HashMap<&str, &str> = mapping
        .iter()
        .map(|(logical, physical)| (physical.as_str(), logical.as_str()))
        .collect();

    for column in table.columns.iter_mut() {
        if let Some(logical) = physical_to_logical.get(column.as_str()) {
            *column = (*logical).to_string();
        }
    }
}

/// Fail with every missing column listed, not just the first.
pub fn require_columns(dataset: DataType, table: &Table, required: &[&str]) -> Result<(), DataError> {
    let missing: Vec<String> = required
        .iter()
        .filter(|c| !table.has_column(c))
        .map(|c| c.to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(DataError::MissingColumns {
            dataset,
            columns: missing,
        })
    }
}

/// Row-level accessor bound to a dataset, producing consistent errors.
pub struct RowReader<'a> {
    pub dataset: DataType,
    pub table: &'a Table,
    pub row: usize,
}

impl<'a> RowReader<'a> {
    pub fn new(dataset: DataType, table: &'a Table, row: usize) -> Self {
        Self { dataset, table, row }
    }

    pub fn invalid(&self, column: &str, message: impl Into<String>) -> DataError {
        DataError::InvalidValue {
            dataset: self.dataset,
            column: column.to_string(),
            // 1-based data row, matching what a spreadsheet shows below the header.
            row: self.row + 1,
            message: message.into(),
        }
    }

    pub fn optional(&self, column: &str) -> Option<&'a str> {
        self.table.cell(self.row, column)
    }

    pub fn required(&self, column: &str) -> Result<&'a str, DataError> {
        self.optional(column)
            .ok_or_else(|| self.invalid(column, "value is required"))
    }

    pub fn required_f64(&self, column: &str) -> Result<f64, DataError> {
        let raw = self.required(column)?;
        parse_f64(raw).ok_or_else(|| self.invalid(column, format!("'{raw}' is not a number")))
    }

    pub fn optional_f64(&self, column: &str) -> Result<Option<f64>, DataError> {
        match self.optional(column) {
            None => Ok(None),
            Some(raw) => parse_f64(raw)
                .map(Some)
                .ok_or_else(|| self.invalid(column, format!("'{raw}' is not a number"))),
        }
    }

    pub fn timestamp(&self, column: &str) -> Result<NaiveDateTime, DataError> {
        let raw = self.required(column)?;
        parse_timestamp(raw).map_err(|message| self.invalid(column, message))
    }
}

/// Parse a timestamp; date-only values are taken at midnight.
pub fn parse_timestamp(s: &str) -> Result<NaiveDateTime, String> {
    const FMTS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
    ];
    for fmt in FMTS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(ts);
        }
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(d.and_time(chrono::NaiveTime::MIN));
    }
    Err(format!(
        "Invalid timestamp '{s}'. Expected YYYY-MM-DD, YYYY-MM-DD HH:MM:SS or YYYY-MM-DDTHH:MM:SS."
    ))
}

/// Finite float, or `None`.
pub fn parse_f64(s: &str) -> Option<f64> {
    let v = s.trim().parse::<f64>().ok()?;
    if v.is_finite() { Some(v) } else { None }
}

/// Accepts the spellings spreadsheets and pandas exports tend to use.
pub fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" | "1.0" => Some(true),
        "false" | "f" | "no" | "n" | "0" | "0.0" => Some(false),
        _ => None,
    }
}
