//! CSV file data adapter.
//!
//! A dataset is a directory holding one wide table per field, `<field>.csv`:
//! a `date` column followed by one column per security. Empty cells mark a
//! security with no value on that date.

use crate::domain::error::RebalanceError;
use crate::domain::value_table::ValueTable;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

const DATE_COLUMN: &str = "date";

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    /// Dataset directory; relative paths resolve against the base path.
    pub fn dataset_dir(&self, dataset_path: &str) -> PathBuf {
        let path = Path::new(dataset_path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_path.join(path)
        }
    }

    fn csv_path(&self, dataset_path: &str, field: &str) -> PathBuf {
        self.dataset_dir(dataset_path).join(format!("{}.csv", field))
    }
}

impl DataPort for CsvAdapter {
    fn load_field(&self, dataset_path: &str, field: &str) -> Result<ValueTable, RebalanceError> {
        let path = self.csv_path(dataset_path, field);
        if !path.is_file() {
            return Err(RebalanceError::DataNotFound {
                field: field.to_string(),
                path: path.display().to_string(),
            });
        }
        read_table(&path, field)
    }

    fn list_fields(&self, dataset_path: &str) -> Result<Vec<String>, RebalanceError> {
        let dir = self.dataset_dir(dataset_path);
        let mut fields = Vec::new();

        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("csv") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    fields.push(stem.to_string());
                }
            }
        }

        fields.sort();
        Ok(fields)
    }
}

pub fn read_table(path: &Path, field: &str) -> Result<ValueTable, RebalanceError> {
    let mut rdr = csv::Reader::from_path(path).map_err(|e| RebalanceError::DataFormat {
        reason: format!("failed to read {}: {}", path.display(), e),
    })?;

    let headers = rdr.headers().map_err(|e| RebalanceError::DataFormat {
        reason: format!("CSV header error: {}", e),
    })?;
    match headers.get(0) {
        Some(h) if h.trim().eq_ignore_ascii_case(DATE_COLUMN) => {}
        _ => {
            return Err(RebalanceError::DataFormat {
                reason: format!("{}: first column must be '{}'", path.display(), DATE_COLUMN),
            });
        }
    }

    let securities: Vec<String> = headers.iter().skip(1).map(|h| h.trim().to_string()).collect();
    let mut seen = HashSet::new();
    for sec in &securities {
        if sec.is_empty() {
            return Err(RebalanceError::DataFormat {
                reason: "empty security identifier in header".into(),
            });
        }
        if !seen.insert(sec.as_str()) {
            return Err(RebalanceError::DataFormat {
                reason: format!("duplicate security column: {}", sec),
            });
        }
    }

    let mut table = ValueTable::new(field, securities.clone());

    for result in rdr.records() {
        let record = result.map_err(|e| RebalanceError::DataFormat {
            reason: format!("CSV parse error: {}", e),
        })?;

        let date_str = record.get(0).ok_or_else(|| RebalanceError::DataFormat {
            reason: "missing date column".into(),
        })?;
        let date = NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d").map_err(|e| {
            RebalanceError::DataFormat {
                reason: format!("invalid date '{}': {}", date_str, e),
            }
        })?;

        let values = record
            .iter()
            .skip(1)
            .zip(&securities)
            .map(|(cell, sec)| parse_cell(cell, sec, date))
            .collect::<Result<Vec<_>, _>>()?;

        table.insert_row(date, values)?;
    }

    Ok(table)
}

fn parse_cell(cell: &str, security: &str, date: NaiveDate) -> Result<Option<f64>, RebalanceError> {
    let cell = cell.trim();
    if cell.is_empty() {
        return Ok(None);
    }
    cell.parse::<f64>()
        .map(Some)
        .map_err(|e| RebalanceError::DataFormat {
            reason: format!("invalid value '{}' for {} on {}: {}", cell, security, date, e),
        })
}

/// Write `table` to `<dir>/<field>.csv`, creating `dir` if needed.
pub fn write_table(dir: &Path, table: &ValueTable) -> Result<PathBuf, RebalanceError> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("{}.csv", table.field()));

    let mut wtr = csv::Writer::from_path(&path).map_err(|e| RebalanceError::DataFormat {
        reason: format!("failed to create {}: {}", path.display(), e),
    })?;
    let csv_err = |e: csv::Error| RebalanceError::DataFormat {
        reason: format!("CSV write error: {}", e),
    };

    let mut header = vec![DATE_COLUMN.to_string()];
    header.extend(table.securities().iter().cloned());
    wtr.write_record(&header).map_err(csv_err)?;

    for date in table.dates() {
        let mut record = vec![date.format("%Y-%m-%d").to_string()];
        if let Some(values) = table.raw_row(date) {
            record.extend(values.iter().map(|v| v.map(|x| x.to_string()).unwrap_or_default()));
        }
        wtr.write_record(&record).map_err(csv_err)?;
    }

    wtr.flush()?;
    Ok(path)
}
