//! Date-indexed table of per-security values for one data field.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::domain::error::RebalanceError;

/// Values for a fixed security universe, one row per date.
///
/// Every row has exactly one slot per security; `None` marks a security with
/// no value on that date. Stored values are always finite.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueTable {
    field: String,
    securities: Vec<String>,
    rows: BTreeMap<NaiveDate, Vec<Option<f64>>>,
}

impl ValueTable {
    pub fn new(field: impl Into<String>, securities: Vec<String>) -> Self {
        Self {
            field: field.into(),
            securities,
            rows: BTreeMap::new(),
        }
    }

    /// Add the row for `date`. Non-finite values are stored as absent.
    pub fn insert_row(
        &mut self,
        date: NaiveDate,
        values: Vec<Option<f64>>,
    ) -> Result<(), RebalanceError> {
        if values.len() != self.securities.len() {
            return Err(RebalanceError::DataFormat {
                reason: format!(
                    "row {} has {} values, expected {}",
                    date,
                    values.len(),
                    self.securities.len()
                ),
            });
        }
        if self.rows.contains_key(&date) {
            return Err(RebalanceError::DataFormat {
                reason: format!("duplicate date {}", date),
            });
        }
        let values = values
            .into_iter()
            .map(|v| v.filter(|x| x.is_finite()))
            .collect();
        self.rows.insert(date, values);
        Ok(())
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn securities(&self) -> &[String] {
        &self.securities
    }

    pub fn date_count(&self) -> usize {
        self.rows.len()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.rows.keys().next().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.rows.keys().next_back().copied()
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.rows.keys().copied()
    }

    /// Present (security, value) pairs for `date`, in column order.
    pub fn row(&self, date: NaiveDate) -> Option<Vec<(&str, f64)>> {
        self.rows.get(&date).map(|values| {
            self.securities
                .iter()
                .zip(values)
                .filter_map(|(sec, v)| v.map(|x| (sec.as_str(), x)))
                .collect()
        })
    }

    /// Raw slots for `date`, including absent securities.
    pub fn raw_row(&self, date: NaiveDate) -> Option<&[Option<f64>]> {
        self.rows.get(&date).map(Vec::as_slice)
    }
}
