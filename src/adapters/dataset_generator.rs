//! Synthetic dataset generation.
//!
//! Writes one CSV table per field with uniformly distributed values for every
//! security on every calendar day in the range.

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::adapters::csv_adapter::write_table;
use crate::domain::error::RebalanceError;
use crate::domain::value_table::ValueTable;

pub const DEFAULT_FIELDS: [&str; 4] = ["market_capitalization", "prices", "volume", "adtv_3_month"];

#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSpec {
    pub fields: Vec<String>,
    /// Securities are named `0`, `1`, ... `securities - 1`.
    pub securities: usize,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub low: f64,
    pub high: f64,
    /// Fixed seed for reproducible datasets.
    pub seed: Option<u64>,
}

impl Default for DatasetSpec {
    fn default() -> Self {
        Self {
            fields: DEFAULT_FIELDS.iter().map(|f| f.to_string()).collect(),
            securities: 1000,
            start: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or(NaiveDate::MIN),
            end: NaiveDate::from_ymd_opt(2025, 1, 22).unwrap_or(NaiveDate::MIN),
            low: 1.0,
            high: 100.0,
            seed: None,
        }
    }
}

impl DatasetSpec {
    pub fn validate(&self) -> Result<(), RebalanceError> {
        if self.fields.is_empty() || self.fields.iter().any(|f| f.trim().is_empty()) {
            return Err(RebalanceError::invalid(
                "generate",
                "fields",
                "at least one non-empty field name is required",
            ));
        }
        if self.securities == 0 {
            return Err(RebalanceError::invalid(
                "generate",
                "securities",
                "must be positive",
            ));
        }
        if self.start > self.end {
            return Err(RebalanceError::invalid(
                "generate",
                "start",
                "start must not be after end",
            ));
        }
        if !(self.low.is_finite() && self.high.is_finite() && self.low < self.high) {
            return Err(RebalanceError::invalid(
                "generate",
                "low",
                "value range must be finite with low < high",
            ));
        }
        Ok(())
    }
}

/// Generate every field of `spec` into `dir`. Returns the written paths.
pub fn generate_dataset(dir: &Path, spec: &DatasetSpec) -> Result<Vec<PathBuf>, RebalanceError> {
    spec.validate()?;

    let mut rng = match spec.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut written = Vec::with_capacity(spec.fields.len());
    for field in &spec.fields {
        let table = synthetic_table(field, spec, &mut rng)?;
        let path = write_table(dir, &table)?;
        info!(
            field = %field,
            dates = table.date_count(),
            securities = spec.securities,
            path = %path.display(),
            "generated field"
        );
        written.push(path);
    }
    Ok(written)
}

pub fn synthetic_table<R: Rng>(
    field: &str,
    spec: &DatasetSpec,
    rng: &mut R,
) -> Result<ValueTable, RebalanceError> {
    let securities = (0..spec.securities).map(|i| i.to_string()).collect();
    let mut table = ValueTable::new(field, securities);

    for date in spec.start.iter_days().take_while(|d| *d <= spec.end) {
        let values = (0..spec.securities)
            .map(|_| Some(rng.gen_range(spec.low..spec.high)))
            .collect();
        table.insert_row(date, values)?;
    }
    Ok(table)
}
