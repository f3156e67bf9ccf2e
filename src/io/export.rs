//! Export merged training data and expanded grids.
//!
//! The CSV export is meant to be easy to consume in spreadsheets or downstream scripts.

use std::fs::File;
use std::path::Path;

use serde::Serialize;

use crate::domain::MergedData;
use crate::error::AppError;

/// Write the merged feature matrix as `name,<features...>,label,weight`.
///
/// Cells are quoted as needed, so names may contain commas or quotes.
pub fn write_merged_csv(path: &Path, merged: &MergedData) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::new(4, format!("Failed to create export CSV '{}': {e}", path.display())))?;

    let mut header = vec!["name".to_string()];
    header.extend(merged.feature_columns.iter().cloned());
    header.push("label".to_string());
    header.push("weight".to_string());
    writer
        .write_record(&header)
        .map_err(|e| AppError::new(4, format!("Failed to write export CSV header: {e}")))?;

    for (i, name) in merged.names.iter().enumerate() {
        let mut cells = vec![name.clone()];
        cells.extend(
            merged.x[i]
                .iter()
                .map(|v| v.map(|v| v.to_string()).unwrap_or_default()),
        );
        cells.push(merged.y[i].to_string());
        cells.push(merged.weights[i].to_string());
        writer
            .write_record(&cells)
            .map_err(|e| AppError::new(4, format!("Failed to write export CSV row: {e}")))?;
    }

    writer
        .flush()
        .map_err(|e| AppError::new(4, format!("Failed to flush export CSV '{}': {e}", path.display())))?;
    Ok(())
}

/// Write any serializable value as pretty JSON.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(4, format!("Failed to create JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, value)
        .map_err(|e| AppError::new(4, format!("Failed to write JSON: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn merged_csv_layout() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("merged.csv");
        let merged = MergedData {
            names: vec!["A".to_string(), "B".to_string()],
            feature_columns: vec!["f0".to_string(), "f1".to_string()],
            x: vec![vec![Some(1.5), None], vec![Some(2.0), Some(3.0)]],
            y: vec![10.0, 20.0],
            weights: vec![1.0, 2.0],
        };

        write_merged_csv(&path, &merged).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "name,f0,f1,label,weight");
        assert_eq!(lines[1], "A,1.5,,10,1");
        assert_eq!(lines[2], "B,2,3,20,2");
    }

    #[test]
    fn names_with_commas_are_quoted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("merged.csv");
        let merged = MergedData {
            names: vec!["Doe, Jane".to_string()],
            feature_columns: vec!["f0".to_string()],
            x: vec![vec![Some(0.5)]],
            y: vec![3.0],
            weights: vec![1.0],
        };

        write_merged_csv(&path, &merged).unwrap();
        let mut reader = csv::Reader::from_path(&path).unwrap();
        let records: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].len(), 4);
        assert_eq!(&records[0][0], "Doe, Jane");
        assert_eq!(&records[0][1], "0.5");
    }
}
