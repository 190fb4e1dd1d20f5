//! Domain-level error taxonomy for Hashwire.

use std::fmt;

/// Coarse classification of a failure, used in attempt logs and counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ProviderUnavailable,
    MalformedResponse,
    OutOfRange,
    ExtractionFailed,
    StageFailed,
    RunAlreadyActive,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::ProviderUnavailable => "provider_unavailable",
            ErrorKind::MalformedResponse => "malformed_response",
            ErrorKind::OutOfRange => "out_of_range",
            ErrorKind::ExtractionFailed => "extraction_failed",
            ErrorKind::StageFailed => "stage_failed",
            ErrorKind::RunAlreadyActive => "run_already_active",
        };
        write!(f, "{s}")
    }
}

/// Hashwire domain errors.
#[derive(Debug, thiserror::Error)]
pub enum HashwireError {
    #[error("provider {provider} unavailable: {reason}")]
    ProviderUnavailable { provider: String, reason: String },

    #[error("malformed response from {provider}: {reason}")]
    MalformedResponse { provider: String, reason: String },

    #[error("{metric} value {value} outside sanity bounds [{min}, {max}]")]
    OutOfRange {
        metric: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("no value could be extracted for {kpi}")]
    ExtractionFailed { kpi: String },

    #[error("stage {stage} failed for topic {topic}: {reason}")]
    StageFailed {
        stage: String,
        topic: String,
        reason: String,
    },

    #[error("run {0} is already active")]
    RunAlreadyActive(uuid::Uuid),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl HashwireError {
    /// Taxonomy bucket for this error, if it belongs to one.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            HashwireError::ProviderUnavailable { .. } => Some(ErrorKind::ProviderUnavailable),
            HashwireError::MalformedResponse { .. } => Some(ErrorKind::MalformedResponse),
            HashwireError::OutOfRange { .. } => Some(ErrorKind::OutOfRange),
            HashwireError::ExtractionFailed { .. } => Some(ErrorKind::ExtractionFailed),
            HashwireError::StageFailed { .. } => Some(ErrorKind::StageFailed),
            HashwireError::RunAlreadyActive(_) => Some(ErrorKind::RunAlreadyActive),
            HashwireError::Config(_)
            | HashwireError::Serialization(_)
            | HashwireError::Io(_) => None,
        }
    }
}

/// Result type for Hashwire domain operations.
pub type Result<T> = std::result::Result<T, HashwireError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_range_display_includes_bounds() {
        let err = HashwireError::OutOfRange {
            metric: "pue".to_string(),
            value: 7.5,
            min: 1.05,
            max: 3.0,
        };
        let msg = err.to_string();
        assert!(msg.contains("pue"));
        assert!(msg.contains("7.5"));
        assert!(msg.contains("1.05"));
    }

    #[test]
    fn test_kind_mapping() {
        let err = HashwireError::ProviderUnavailable {
            provider: "mempool.space".to_string(),
            reason: "timeout".to_string(),
        };
        assert_eq!(err.kind(), Some(ErrorKind::ProviderUnavailable));

        let err = HashwireError::Config("missing key".to_string());
        assert_eq!(err.kind(), None);
    }

    #[test]
    fn test_error_kind_display_is_snake_case() {
        assert_eq!(ErrorKind::MalformedResponse.to_string(), "malformed_response");
        assert_eq!(ErrorKind::RunAlreadyActive.to_string(), "run_already_active");
    }
}
