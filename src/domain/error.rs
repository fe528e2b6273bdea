//! Domain error types.

/// Top-level error type for the rebalancer.
///
/// Configuration and data-availability variants are fatal to a run. The
/// `Allocation` variant only ever describes a single rebalancing date and is
/// absorbed by the orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum RebalanceError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("no data for field {field} at {path}")]
    DataNotFound { field: String, path: String },

    #[error("malformed data: {reason}")]
    DataFormat { reason: String },

    #[error("allocation failed: {reason}")]
    Allocation { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RebalanceError {
    pub fn missing(section: &str, key: &str) -> Self {
        Self::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }
    }

    pub fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::ConfigParse { .. } | Self::ConfigMissing { .. } | Self::ConfigInvalid { .. }
        )
    }
}

impl From<&RebalanceError> for std::process::ExitCode {
    fn from(err: &RebalanceError) -> Self {
        let code: u8 = match err {
            RebalanceError::Io(_) => 1,
            RebalanceError::ConfigParse { .. }
            | RebalanceError::ConfigMissing { .. }
            | RebalanceError::ConfigInvalid { .. } => 2,
            RebalanceError::DataFormat { .. } => 3,
            RebalanceError::DataNotFound { .. } => 5,
            RebalanceError::Allocation { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
