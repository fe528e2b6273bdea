//! Rebalancing engine: drives the per-date filter → weight loop.
//!
//! A run loads the value table once, expands the calendar, and then handles
//! every revision date on its own. A date either records a weight map or is
//! skipped with a reason; nothing that happens on one date can fail the run.
//! Only configuration and data-loading errors surface to the caller.
//!
//! A per-date fault is an `Err` from the allocator (a malformed weight map),
//! recorded as `SkipReason::Error`. Per-date steps are plain `Result` code;
//! panics are not caught.

use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::domain::calendar::{self, CalendarRule, RunBoundary};
use crate::domain::error::RebalanceError;
use crate::domain::filter::{self, FilterRule};
use crate::domain::request::RebalanceRequest;
use crate::domain::value_table::ValueTable;
use crate::domain::weighting::{self, WeightMap, WeightingRule, round_to};
use crate::ports::data_port::DataPort;

pub const DATE_KEY_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    /// Wall-clock seconds from before the data load to after the last date,
    /// rounded to 4 decimal places.
    pub execution_time: f64,
    pub weights: BTreeMap<String, WeightMap>,
    pub skipped: Vec<SkippedDate>,
}

impl BacktestResult {
    pub fn recorded_count(&self) -> usize {
        self.weights.len()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedDate {
    pub date: NaiveDate,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    MissingDate,
    EmptyFilter,
    EmptyWeights,
    Error(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingDate => write!(f, "date not found in data"),
            SkipReason::EmptyFilter => write!(f, "no securities passed the filter"),
            SkipReason::EmptyWeights => write!(f, "no feasible weights"),
            SkipReason::Error(reason) => write!(f, "error: {}", reason),
        }
    }
}

/// Terminal state of a single revision date.
#[derive(Debug, Clone, PartialEq)]
pub enum DateOutcome {
    Recorded(WeightMap),
    Skipped(SkipReason),
}

/// Run a full backtest for an already validated request.
///
/// `default_boundary` applies when the request carries no run boundary of its
/// own. Fails only when the data field cannot be loaded.
pub fn run_backtest(
    data_port: &dyn DataPort,
    request: &RebalanceRequest,
    default_boundary: RunBoundary,
) -> Result<BacktestResult, RebalanceError> {
    let start = Instant::now();

    info!(
        field = request.field(),
        dataset = %request.dataset_path,
        "loading data field"
    );
    let table = data_port.load_field(&request.dataset_path, request.field())?;

    let boundary = request.run_end.unwrap_or(default_boundary);
    let dates = revision_dates(&request.calendar, boundary, &table);
    info!(count = dates.len(), boundary = %boundary, "revision dates generated");

    let mut weights = BTreeMap::new();
    let mut skipped = Vec::new();

    for date in dates {
        match process_date(&table, date, &request.filter, &request.weighting) {
            DateOutcome::Recorded(w) => {
                weights.insert(date.format(DATE_KEY_FORMAT).to_string(), w);
            }
            DateOutcome::Skipped(reason) => {
                match &reason {
                    SkipReason::Error(_) => error!(date = %date, reason = %reason, "skipping date"),
                    _ => warn!(date = %date, reason = %reason, "skipping date"),
                }
                skipped.push(SkippedDate { date, reason });
            }
        }
    }

    let execution_time = round_to(start.elapsed().as_secs_f64(), 4);
    info!(
        recorded = weights.len(),
        skipped = skipped.len(),
        execution_time,
        "backtest completed"
    );

    Ok(BacktestResult {
        execution_time,
        weights,
        skipped,
    })
}

/// Revision dates for `rule`, resolving `boundary` against the loaded table.
/// A quarterly calendar over an empty table with an end-of-data boundary has
/// no dates.
pub fn revision_dates(
    rule: &CalendarRule,
    boundary: RunBoundary,
    table: &ValueTable,
) -> Vec<NaiveDate> {
    match (rule, boundary.resolve(table.last_date())) {
        (CalendarRule::Custom { .. }, _) => calendar::generate(rule, NaiveDate::MAX),
        (CalendarRule::Quarterly { .. }, Some(end)) => calendar::generate(rule, end),
        (CalendarRule::Quarterly { .. }, None) => Vec::new(),
    }
}

/// Filter and weight one date.
pub fn process_date(
    table: &ValueTable,
    date: NaiveDate,
    filter_rule: &FilterRule,
    weighting_rule: &WeightingRule,
) -> DateOutcome {
    let Some(row) = table.row(date) else {
        return DateOutcome::Skipped(SkipReason::MissingDate);
    };

    let selection = filter::apply(&row, filter_rule);
    if selection.is_empty() {
        return DateOutcome::Skipped(SkipReason::EmptyFilter);
    }

    match weighting::allocate(&selection, weighting_rule) {
        Ok(w) if w.is_empty() => DateOutcome::Skipped(SkipReason::EmptyWeights),
        Ok(w) => DateOutcome::Recorded(w),
        Err(e) => DateOutcome::Skipped(SkipReason::Error(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn table() -> ValueTable {
        let secs = ["s1", "s2", "s3", "s4"].iter().map(|s| s.to_string()).collect();
        let mut t = ValueTable::new("prices", secs);
        t.insert_row(d(2024, 3, 31), vec![Some(10.0), Some(40.0), Some(30.0), Some(20.0)])
            .unwrap();
        t.insert_row(d(2024, 6, 30), vec![Some(5.0), None, Some(1.0), Some(2.0)])
            .unwrap();
        t
    }

    fn top(n: usize) -> FilterRule {
        FilterRule::TopN {
            field: "prices".into(),
            n,
        }
    }

    #[test]
    fn records_weights_for_present_date() {
        let outcome = process_date(&table(), d(2024, 3, 31), &top(2), &WeightingRule::Equal);
        let DateOutcome::Recorded(w) = outcome else {
            panic!("expected weights");
        };
        assert_eq!(w.keys().collect::<Vec<_>>(), vec!["s2", "s3"]);
        assert!(w.values().all(|&x| x == 0.5));
    }

    #[test]
    fn missing_date_is_skipped() {
        let outcome = process_date(&table(), d(2024, 4, 1), &top(2), &WeightingRule::Equal);
        assert_eq!(outcome, DateOutcome::Skipped(SkipReason::MissingDate));
    }

    #[test]
    fn empty_filter_is_skipped() {
        let rule = FilterRule::ValueThreshold {
            field: "prices".into(),
            threshold: 100.0,
        };
        let outcome = process_date(&table(), d(2024, 3, 31), &rule, &WeightingRule::Equal);
        assert_eq!(outcome, DateOutcome::Skipped(SkipReason::EmptyFilter));
    }

    #[test]
    fn infeasible_weights_are_skipped() {
        let rule = WeightingRule::Optimized {
            lower_bound: 0.0,
            upper_bound: 0.2,
        };
        // two securities can reach at most 0.4
        let outcome = process_date(&table(), d(2024, 3, 31), &top(2), &rule);
        assert_eq!(outcome, DateOutcome::Skipped(SkipReason::EmptyWeights));
    }

    #[test]
    fn malformed_allocation_is_skipped_as_error() {
        let rule = WeightingRule::Optimized {
            lower_bound: f64::NEG_INFINITY,
            upper_bound: 1.0,
        };
        match process_date(&table(), d(2024, 3, 31), &top(2), &rule) {
            DateOutcome::Skipped(SkipReason::Error(reason)) => {
                assert!(reason.contains("non-finite"))
            }
            _ => panic!("expected an error skip"),
        }
    }

    #[test]
    fn absent_values_are_not_selected() {
        let outcome = process_date(&table(), d(2024, 6, 30), &top(10), &WeightingRule::Equal);
        let DateOutcome::Recorded(w) = outcome else {
            panic!("expected weights");
        };
        assert_eq!(w.len(), 3);
        assert!(!w.contains_key("s2"));
    }

    #[test]
    fn quarterly_dates_stop_at_end_of_data() {
        let rule = CalendarRule::Quarterly { start: d(2024, 1, 1) };
        assert_eq!(
            revision_dates(&rule, RunBoundary::EndOfData, &table()),
            vec![d(2024, 3, 31), d(2024, 6, 30)]
        );
        assert_eq!(
            revision_dates(&rule, RunBoundary::Date(d(2024, 5, 1)), &table()),
            vec![d(2024, 3, 31)]
        );
        let empty = ValueTable::new("prices", vec![]);
        assert!(revision_dates(&rule, RunBoundary::EndOfData, &empty).is_empty());
    }

    #[test]
    fn custom_dates_ignore_boundary() {
        let rule = CalendarRule::Custom {
            dates: vec![d(2030, 1, 1), d(2024, 3, 31)],
        };
        assert_eq!(
            revision_dates(&rule, RunBoundary::Date(d(2024, 1, 1)), &table()),
            vec![d(2030, 1, 1), d(2024, 3, 31)]
        );
    }

    #[test]
    fn skip_reason_display() {
        assert_eq!(SkipReason::MissingDate.to_string(), "date not found in data");
        assert_eq!(
            SkipReason::Error("boom".into()).to_string(),
            "error: boom"
        );
    }
}
