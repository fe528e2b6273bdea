#![allow(dead_code)]

use chrono::NaiveDate;
use rebalancer::domain::calendar::CalendarRule;
use rebalancer::domain::error::RebalanceError;
use rebalancer::domain::filter::FilterRule;
use rebalancer::domain::request::RebalanceRequest;
pub use rebalancer::domain::value_table::ValueTable;
use rebalancer::domain::weighting::WeightingRule;
use rebalancer::ports::data_port::DataPort;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

pub struct MockDataPort {
    pub tables: HashMap<String, ValueTable>,
    pub errors: HashMap<String, String>,
    pub loads: AtomicUsize,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            tables: HashMap::new(),
            errors: HashMap::new(),
            loads: AtomicUsize::new(0),
        }
    }

    pub fn with_table(mut self, table: ValueTable) -> Self {
        self.tables.insert(table.field().to_string(), table);
        self
    }

    pub fn with_error(mut self, field: &str, reason: &str) -> Self {
        self.errors.insert(field.to_string(), reason.to_string());
        self
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl DataPort for MockDataPort {
    fn load_field(&self, dataset_path: &str, field: &str) -> Result<ValueTable, RebalanceError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = self.errors.get(field) {
            return Err(RebalanceError::DataFormat {
                reason: reason.clone(),
            });
        }
        self.tables
            .get(field)
            .cloned()
            .ok_or_else(|| RebalanceError::DataNotFound {
                field: field.to_string(),
                path: format!("{}/{}.csv", dataset_path, field),
            })
    }

    fn list_fields(&self, _dataset_path: &str) -> Result<Vec<String>, RebalanceError> {
        let mut fields: Vec<String> = self.tables.keys().cloned().collect();
        fields.sort();
        Ok(fields)
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Table with securities `s0..s{k}` and the given rows.
pub fn make_table(field: &str, rows: &[(NaiveDate, Vec<Option<f64>>)]) -> ValueTable {
    let width = rows.first().map(|(_, v)| v.len()).unwrap_or(0);
    let securities = (0..width).map(|i| format!("s{}", i)).collect();
    let mut table = ValueTable::new(field, securities);
    for (d, values) in rows {
        table.insert_row(*d, values.clone()).unwrap();
    }
    table
}

/// Dense table: every day from `start` for `days` days, `width` securities,
/// value of security `i` on day `t` is `1 + ((i * 37 + t * 11) % 97)`.
pub fn dense_table(field: &str, start: NaiveDate, days: usize, width: usize) -> ValueTable {
    let securities = (0..width).map(|i| i.to_string()).collect();
    let mut table = ValueTable::new(field, securities);
    for (t, d) in start.iter_days().take(days).enumerate() {
        let values = (0..width)
            .map(|i| Some(1.0 + ((i * 37 + t * 11) % 97) as f64))
            .collect();
        table.insert_row(d, values).unwrap();
    }
    table
}

pub fn request(
    calendar: CalendarRule,
    filter: FilterRule,
    weighting: WeightingRule,
) -> RebalanceRequest {
    RebalanceRequest {
        dataset_path: "generated_data".to_string(),
        calendar,
        filter,
        weighting,
        run_end: None,
    }
}

pub fn top_n(field: &str, n: usize) -> FilterRule {
    FilterRule::TopN {
        field: field.to_string(),
        n,
    }
}

pub fn threshold(field: &str, p: f64) -> FilterRule {
    FilterRule::ValueThreshold {
        field: field.to_string(),
        threshold: p,
    }
}

pub fn custom(dates: &[NaiveDate]) -> CalendarRule {
    CalendarRule::Custom {
        dates: dates.to_vec(),
    }
}
