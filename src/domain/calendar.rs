//! Rebalancing calendars: expands a calendar rule into concrete revision dates.

use chrono::{Datelike, Local, NaiveDate};
use std::fmt;
use std::str::FromStr;

/// How revision dates are chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalendarRule {
    /// Caller-supplied dates, used verbatim.
    Custom { dates: Vec<NaiveDate> },
    /// Last calendar day of every quarter from `start` up to the run boundary.
    Quarterly { start: NaiveDate },
}

/// Last date a generated calendar may reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunBoundary {
    Date(NaiveDate),
    #[default]
    EndOfData,
    Today,
}

impl RunBoundary {
    /// Concrete end date, given the last date present in the loaded data.
    /// `EndOfData` on an empty table has no end.
    pub fn resolve(&self, last_data_date: Option<NaiveDate>) -> Option<NaiveDate> {
        match self {
            RunBoundary::Date(d) => Some(*d),
            RunBoundary::EndOfData => last_data_date,
            RunBoundary::Today => Some(Local::now().date_naive()),
        }
    }
}

impl FromStr for RunBoundary {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "end_of_data" => Ok(RunBoundary::EndOfData),
            "today" => Ok(RunBoundary::Today),
            other => NaiveDate::parse_from_str(other, "%Y-%m-%d")
                .map(RunBoundary::Date)
                .map_err(|_| {
                    format!("expected end_of_data, today or YYYY-MM-DD, got '{}'", s.trim())
                }),
        }
    }
}

impl fmt::Display for RunBoundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunBoundary::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            RunBoundary::EndOfData => write!(f, "end_of_data"),
            RunBoundary::Today => write!(f, "today"),
        }
    }
}

/// Revision dates for `rule`. Custom dates are returned as given, unsorted and
/// with duplicates kept; quarterly dates are ascending and never pass `run_end`.
pub fn generate(rule: &CalendarRule, run_end: NaiveDate) -> Vec<NaiveDate> {
    match rule {
        CalendarRule::Custom { dates } => dates.clone(),
        CalendarRule::Quarterly { start } => quarter_ends(*start, run_end),
    }
}

/// Quarter-end dates on or after `start`, up to and including `end`.
pub fn quarter_ends(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    let mut current = quarter_end(start);
    while let Some(q) = current {
        if q > end {
            break;
        }
        dates.push(q);
        current = q.succ_opt().and_then(quarter_end);
    }
    dates
}

/// Last calendar day of the quarter containing `date`.
pub fn quarter_end(date: NaiveDate) -> Option<NaiveDate> {
    let end_month = date.month0() / 3 * 3 + 3;
    if end_month == 12 {
        NaiveDate::from_ymd_opt(date.year(), 12, 31)
    } else {
        NaiveDate::from_ymd_opt(date.year(), end_month + 1, 1)?.pred_opt()
    }
}
