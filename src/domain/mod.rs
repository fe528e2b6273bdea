//! Core domain types and logic.

pub mod value_table;
pub mod calendar;
pub mod filter;
pub mod weighting;
pub mod rebalance;
pub mod request;
pub mod config_validation;
pub mod error;
