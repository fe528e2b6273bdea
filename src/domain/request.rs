//! Backtest request and response schema.
//!
//! The wire types mirror the JSON accepted by the service and the `run` CLI
//! command. Rule tags are closed enums, so an unknown `rule_type`,
//! `filter_type` or `method` never deserializes. Variant-specific fields are
//! optional on the wire and are checked when converting into the domain rules.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Component, Path};

use crate::domain::calendar::{CalendarRule, RunBoundary};
use crate::domain::error::RebalanceError;
use crate::domain::filter::FilterRule;
use crate::domain::rebalance::BacktestResult;
use crate::domain::weighting::{WeightMap, WeightingRule};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestRequest {
    pub dataset_path: String,
    pub calendar: CalendarSpec,
    pub filter: FilterSpec,
    pub weighting: WeightingSpec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalendarKind {
    Custom,
    Quarterly,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarSpec {
    pub rule_type: CalendarKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_dates: Option<Vec<NaiveDate>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    TopN,
    ValueThreshold,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub filter_type: FilterKind,
    pub data_field: String,
    #[serde(rename = "N", default, skip_serializing_if = "Option::is_none")]
    pub n: Option<i64>,
    #[serde(rename = "P", default, skip_serializing_if = "Option::is_none")]
    pub p: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightingMethod {
    Equal,
    Optimized,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightingSpec {
    pub method: WeightingMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lb: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ub: Option<f64>,
}

/// A validated request, ready for the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct RebalanceRequest {
    pub dataset_path: String,
    pub calendar: CalendarRule,
    pub filter: FilterRule,
    pub weighting: WeightingRule,
    /// Per-request run boundary; `None` defers to the configured default.
    pub run_end: Option<RunBoundary>,
}

impl RebalanceRequest {
    pub fn field(&self) -> &str {
        self.filter.field()
    }
}

impl BacktestRequest {
    pub fn from_json(json: &str) -> Result<Self, RebalanceError> {
        serde_json::from_str(json).map_err(|e| RebalanceError::ConfigParse {
            file: "request".to_string(),
            reason: e.to_string(),
        })
    }

    pub fn validate(&self) -> Result<RebalanceRequest, RebalanceError> {
        RebalanceRequest::try_from(self.clone())
    }
}

impl TryFrom<BacktestRequest> for RebalanceRequest {
    type Error = RebalanceError;

    fn try_from(req: BacktestRequest) -> Result<Self, Self::Error> {
        if req.dataset_path.trim().is_empty() {
            return Err(RebalanceError::invalid(
                "request",
                "dataset_path",
                "must not be empty",
            ));
        }
        if !is_relative_within(&req.dataset_path) {
            return Err(RebalanceError::invalid(
                "request",
                "dataset_path",
                format!(
                    "'{}' must be relative to the data root without '..'",
                    req.dataset_path
                ),
            ));
        }
        let run_end = req.calendar.end_date.map(RunBoundary::Date);
        let calendar = CalendarRule::try_from(req.calendar)?;
        let filter = FilterRule::try_from(req.filter)?;

        if let Some(field) = &req.weighting.data_field {
            if field != filter.field() {
                return Err(RebalanceError::invalid(
                    "weighting",
                    "data_field",
                    format!(
                        "'{}' differs from filter data_field '{}'",
                        field,
                        filter.field()
                    ),
                ));
            }
        }
        let weighting = WeightingRule::try_from(req.weighting)?;

        Ok(RebalanceRequest {
            dataset_path: req.dataset_path,
            calendar,
            filter,
            weighting,
            run_end,
        })
    }
}

impl TryFrom<CalendarSpec> for CalendarRule {
    type Error = RebalanceError;

    fn try_from(spec: CalendarSpec) -> Result<Self, Self::Error> {
        match spec.rule_type {
            CalendarKind::Custom => {
                let dates = spec
                    .custom_dates
                    .ok_or_else(|| RebalanceError::missing("calendar", "custom_dates"))?;
                Ok(CalendarRule::Custom { dates })
            }
            CalendarKind::Quarterly => {
                let start = spec
                    .start_date
                    .ok_or_else(|| RebalanceError::missing("calendar", "start_date"))?;
                if let Some(end) = spec.end_date {
                    if end < start {
                        return Err(RebalanceError::invalid(
                            "calendar",
                            "end_date",
                            "end_date must not precede start_date",
                        ));
                    }
                }
                Ok(CalendarRule::Quarterly { start })
            }
        }
    }
}

impl TryFrom<FilterSpec> for FilterRule {
    type Error = RebalanceError;

    fn try_from(spec: FilterSpec) -> Result<Self, Self::Error> {
        let field = spec.data_field.trim().to_string();
        if field.is_empty() {
            return Err(RebalanceError::invalid(
                "filter",
                "data_field",
                "must not be empty",
            ));
        }
        if !is_plain_name(&field) {
            return Err(RebalanceError::invalid(
                "filter",
                "data_field",
                format!("'{}' must be a plain field name", field),
            ));
        }
        match spec.filter_type {
            FilterKind::TopN => {
                let n = spec.n.ok_or_else(|| RebalanceError::missing("filter", "N"))?;
                if n <= 0 {
                    return Err(RebalanceError::invalid(
                        "filter",
                        "N",
                        "must be a positive integer",
                    ));
                }
                Ok(FilterRule::TopN {
                    field,
                    n: n as usize,
                })
            }
            FilterKind::ValueThreshold => {
                let threshold = spec.p.ok_or_else(|| RebalanceError::missing("filter", "P"))?;
                if !threshold.is_finite() {
                    return Err(RebalanceError::invalid("filter", "P", "must be finite"));
                }
                Ok(FilterRule::ValueThreshold { field, threshold })
            }
        }
    }
}

impl TryFrom<WeightingSpec> for WeightingRule {
    type Error = RebalanceError;

    fn try_from(spec: WeightingSpec) -> Result<Self, Self::Error> {
        match spec.method {
            WeightingMethod::Equal => Ok(WeightingRule::Equal),
            WeightingMethod::Optimized => {
                let lower_bound = spec
                    .lb
                    .ok_or_else(|| RebalanceError::missing("weighting", "lb"))?;
                let upper_bound = spec
                    .ub
                    .ok_or_else(|| RebalanceError::missing("weighting", "ub"))?;
                for (key, value) in [("lb", lower_bound), ("ub", upper_bound)] {
                    if !(0.0..=1.0).contains(&value) {
                        return Err(RebalanceError::invalid(
                            "weighting",
                            key,
                            "must be between 0 and 1",
                        ));
                    }
                }
                if lower_bound > upper_bound {
                    return Err(RebalanceError::invalid(
                        "weighting",
                        "lb",
                        "lb must not exceed ub",
                    ));
                }
                Ok(WeightingRule::Optimized {
                    lower_bound,
                    upper_bound,
                })
            }
        }
    }
}

/// Relative path made only of normal and `.` components.
fn is_relative_within(path: &str) -> bool {
    Path::new(path)
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// A single file-name component: no separators, not `.` or `..`.
fn is_plain_name(name: &str) -> bool {
    !name.contains(['/', '\\'])
        && matches!(
            Path::new(name).components().collect::<Vec<_>>().as_slice(),
            [Component::Normal(_)]
        )
}

/// Service response: elapsed seconds and weights keyed by `YYYY-MM-DD`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResponse {
    pub execution_time: f64,
    pub weights: BTreeMap<String, WeightMap>,
}

impl From<&BacktestResult> for BacktestResponse {
    fn from(result: &BacktestResult) -> Self {
        Self {
            execution_time: result.execution_time,
            weights: result.weights.clone(),
        }
    }
}

impl From<BacktestResult> for BacktestResponse {
    fn from(result: BacktestResult) -> Self {
        Self {
            execution_time: result.execution_time,
            weights: result.weights,
        }
    }
}
