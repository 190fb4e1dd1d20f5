//! Generic HTTP metric provider.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::{ProviderClient, ProviderError};
use crate::domain::MetricKind;

/// How to pull the number out of a response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseFormat {
    /// RFC 6901 pointer into a JSON document; the target may be a number or a numeric string.
    JsonPointer(String),
    /// The whole body is a single number.
    PlainText,
}

/// Reads one metric from one HTTP GET endpoint.
#[derive(Debug, Clone)]
pub struct HttpMetricProvider {
    name: String,
    metric: MetricKind,
    url: String,
    format: ResponseFormat,
    /// Multiplier converting the provider's native unit into the metric's unit.
    scale: f64,
    client: reqwest::Client,
}

impl HttpMetricProvider {
    pub fn json(
        name: impl Into<String>,
        metric: MetricKind,
        url: impl Into<String>,
        pointer: impl Into<String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            name: name.into(),
            metric,
            url: url.into(),
            format: ResponseFormat::JsonPointer(pointer.into()),
            scale: 1.0,
            client,
        }
    }

    pub fn plain_text(
        name: impl Into<String>,
        metric: MetricKind,
        url: impl Into<String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            name: name.into(),
            metric,
            url: url.into(),
            format: ResponseFormat::PlainText,
            scale: 1.0,
            client,
        }
    }

    /// Declare a fixed unit conversion (e.g. `1e9` for GH/s → H/s).
    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ProviderClient for HttpMetricProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn metric(&self) -> MetricKind {
        self.metric
    }

    async fn fetch(&self) -> Result<f64, ProviderError> {
        debug!(provider = %self.name, url = %self.url, "fetching metric");
        let response = self.client.get(&self.url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Unavailable(format!("HTTP {status}")));
        }

        let body = response.text().await?;
        let raw = match &self.format {
            ResponseFormat::JsonPointer(pointer) => parse_json_number(&body, pointer)?,
            ResponseFormat::PlainText => parse_plain_number(&body)?,
        };
        Ok(raw * self.scale)
    }
}

/// Read a number (or numeric string) at `pointer` in a JSON body.
pub fn parse_json_number(body: &str, pointer: &str) -> Result<f64, ProviderError> {
    let doc: Value = serde_json::from_str(body)
        .map_err(|e| ProviderError::Malformed(format!("invalid JSON: {e}")))?;
    let field = doc
        .pointer(pointer)
        .ok_or_else(|| ProviderError::Malformed(format!("missing field {pointer}")))?;
    match field {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| ProviderError::Malformed(format!("{pointer} is not representable as f64"))),
        Value::String(s) => parse_plain_number(s),
        other => Err(ProviderError::Malformed(format!(
            "{pointer} has unexpected type: {other}"
        ))),
    }
}

/// Parse a body consisting of a single number, tolerating whitespace and thousands separators.
pub fn parse_plain_number(body: &str) -> Result<f64, ProviderError> {
    let cleaned: String = body.trim().chars().filter(|c| *c != ',').collect();
    cleaned
        .parse::<f64>()
        .map_err(|_| ProviderError::Malformed(format!("not a number: {:.40}", body.trim())))
}
