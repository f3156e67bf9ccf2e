//! Weighted tables: targeting, fairness and survey data.
//!
//! These datasets have free-form columns, so they stay as `Table`s. What
//! they share is a `weight` column (defaulting to 1) that downstream
//! evaluation uses either as-is or by replicating rows.

use serde::{Deserialize, Serialize};

use crate::config::SurveyColumnTypes;
use crate::domain::{DataType, Table};
use crate::error::DataError;
use crate::io::ingest::{RowReader, parse_f64};

pub const WEIGHT_COLUMN: &str = "weight";
pub const RANDOM_COLUMN: &str = "random";

/// Make sure `table` has a valid `weight` column, adding one of ones when absent.
///
/// Weights must be finite and strictly positive.
pub fn ensure_weights(dataset: DataType, table: &mut Table) -> Result<(), DataError> {
    if !table.has_column(WEIGHT_COLUMN) {
        table.add_column(WEIGHT_COLUMN, |_| "1".to_string());
        return Ok(());
    }

    for row in 0..table.len() {
        let reader = RowReader::new(dataset, table, row);
        let weight = match reader.optional(WEIGHT_COLUMN) {
            None => 1.0,
            Some(_) => reader.required_f64(WEIGHT_COLUMN)?,
        };
        if weight <= 0.0 {
            return Err(reader.invalid(WEIGHT_COLUMN, format!("weight {weight} must be > 0")));
        }
    }
    // Blank weights read as 1.
    let filled: Vec<String> = (0..table.len())
        .map(|row| table.cell(row, WEIGHT_COLUMN).unwrap_or("1").to_string())
        .collect();
    table.set_column(WEIGHT_COLUMN, |row| filled[row].clone());
    Ok(())
}

fn weights_of(table: &Table) -> Vec<f64> {
    (0..table.len())
        .map(|row| table.cell(row, WEIGHT_COLUMN).and_then(parse_f64).unwrap_or(1.0))
        .collect()
}

/// Targeting or fairness evaluation data.
///
/// Carries a `weight` column and a `random` column of uniform draws in `[0, 1)`
/// used as a random-targeting baseline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightedTable {
    pub table: Table,
}

impl WeightedTable {
    pub fn weights(&self) -> Vec<f64> {
        weights_of(&self.table)
    }

    /// Each row repeated `round(weight)` times (at least once).
    pub fn weighted(&self) -> Table {
        let mut out = Table::new(self.table.columns.iter().cloned());
        for (row, weight) in self.table.rows.iter().zip(self.weights()) {
            let copies = (weight.round() as usize).max(1);
            for _ in 0..copies {
                out.rows.push(row.clone());
            }
        }
        out
    }

    /// Same rows with every weight reset to 1.
    pub fn unweighted(&self) -> Table {
        let mut out = self.table.clone();
        out.set_column(WEIGHT_COLUMN, |_| "1".to_string());
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SurveyColumnKind {
    Continuous,
    Categorical,
    Binary,
}

/// Household survey responses with column types from `col_types.survey`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SurveyData {
    pub table: Table,
    /// Column types restricted to columns present in `table`.
    pub types: SurveyColumnTypes,
}

impl SurveyData {
    pub fn weights(&self) -> Vec<f64> {
        weights_of(&self.table)
    }

    pub fn column_kind(&self, column: &str) -> Option<SurveyColumnKind> {
        let has = |cols: &[String]| cols.iter().any(|c| c == column);
        if has(&self.types.continuous) {
            Some(SurveyColumnKind::Continuous)
        } else if has(&self.types.categorical) {
            Some(SurveyColumnKind::Categorical)
        } else if has(&self.types.binary) {
            Some(SurveyColumnKind::Binary)
        } else {
            None
        }
    }

    /// Columns of the given kind, in table order.
    pub fn columns_of(&self, kind: SurveyColumnKind) -> Vec<&str> {
        self.table
            .columns
            .iter()
            .filter(|c| self.column_kind(c) == Some(kind))
            .map(String::as_str)
            .collect()
    }
}
