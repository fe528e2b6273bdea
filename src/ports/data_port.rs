//! Data access port trait.

use crate::domain::error::RebalanceError;
use crate::domain::value_table::ValueTable;

pub trait DataPort {
    /// Load the full table for `field` from the dataset at `dataset_path`.
    /// Fails with `DataNotFound` when the dataset has no such field.
    fn load_field(&self, dataset_path: &str, field: &str) -> Result<ValueTable, RebalanceError>;

    /// Field names available in the dataset, sorted.
    fn list_fields(&self, dataset_path: &str) -> Result<Vec<String>, RebalanceError>;
}
