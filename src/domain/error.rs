//! Domain error types.

use chrono::NaiveDate;

/// Top-level error type for allocsim.
#[derive(Debug, thiserror::Error)]
pub enum AllocsimError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

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

    #[error("no price data returned for {}", tickers.join(", "))]
    NoData { tickers: Vec<String> },

    #[error("no evaluation dates between {start} and {end}")]
    NoEvaluationDates { start: NaiveDate, end: NaiveDate },

    #[error("report error: {reason}")]
    Report { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl AllocsimError {
    pub(crate) fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        AllocsimError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn missing(section: &str, key: &str) -> Self {
        AllocsimError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }
    }

    /// Process exit status for this error family.
    pub fn exit_status(&self) -> u8 {
        match self {
            AllocsimError::Io(_) | AllocsimError::Json(_) | AllocsimError::Report { .. } => 1,
            AllocsimError::ConfigParse { .. }
            | AllocsimError::ConfigMissing { .. }
            | AllocsimError::ConfigInvalid { .. } => 2,
            AllocsimError::Database { .. } | AllocsimError::DatabaseQuery { .. } => 3,
            AllocsimError::NoData { .. } | AllocsimError::NoEvaluationDates { .. } => 5,
        }
    }
}

impl From<&AllocsimError> for std::process::ExitCode {
    fn from(err: &AllocsimError) -> Self {
        std::process::ExitCode::from(err.exit_status())
    }
}
