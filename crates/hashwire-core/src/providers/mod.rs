//! Metric providers: one external endpoint, one metric, one typed result.
//!
//! # Module layout
//!
//! - [`http`]: `HttpMetricProvider`, a JSON-pointer / plain-text HTTP reader
//! - [`derived`]: `DerivedHashrateProvider`, hashrate computed from difficulty
//! - [`catalog`]: `ProviderCatalog`, the default Bitcoin fallback chains

pub mod catalog;
pub mod derived;
pub mod http;

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{ErrorKind, HashwireError, MetricKind};

/// Failure of a single provider call.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

impl ProviderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProviderError::Unavailable(_) | ProviderError::Timeout(_) => {
                ErrorKind::ProviderUnavailable
            }
            ProviderError::Malformed(_) => ErrorKind::MalformedResponse,
        }
    }

    /// Lift into the domain taxonomy, tagging the provider name.
    pub fn into_domain(self, provider: &str) -> HashwireError {
        match self {
            ProviderError::Malformed(reason) => HashwireError::MalformedResponse {
                provider: provider.to_string(),
                reason,
            },
            other => HashwireError::ProviderUnavailable {
                provider: provider.to_string(),
                reason: other.to_string(),
            },
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ProviderError::Malformed(err.to_string())
        } else {
            ProviderError::Unavailable(err.to_string())
        }
    }
}

/// Capability to fetch one metric from one external source.
///
/// Implementations return the raw reading in the provider's declared unit;
/// normalization and sanity checks happen in the
/// [`FallbackResolver`](crate::fallback::FallbackResolver).
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Stable identifier used as the metric's `source`.
    fn name(&self) -> &str;

    /// The metric this provider supplies.
    fn metric(&self) -> MetricKind;

    async fn fetch(&self) -> Result<f64, ProviderError>;

    /// Deadline for one `fetch`, given the resolver's per-call default.
    ///
    /// Providers that consult several sources per call widen this to cover them.
    fn call_budget(&self, default: Duration) -> Duration {
        default
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_maps_to_provider_unavailable() {
        let err = ProviderError::Timeout(Duration::from_secs(8));
        assert_eq!(err.kind(), ErrorKind::ProviderUnavailable);
        let domain = err.into_domain("blockchair");
        assert!(matches!(domain, HashwireError::ProviderUnavailable { .. }));
        assert!(domain.to_string().contains("blockchair"));
    }

    #[test]
    fn test_malformed_maps_to_malformed_response() {
        let err = ProviderError::Malformed("missing field".to_string());
        assert_eq!(err.kind(), ErrorKind::MalformedResponse);
        assert!(matches!(
            err.into_domain("coingecko"),
            HashwireError::MalformedResponse { .. }
        ));
    }
}
