//! Text-generation capability used by evidence extraction and pipeline stages.
//!
//! Generators may answer with plain text or with a structured JSON value;
//! [`TextResult`] makes the two explicit so callers never sniff types.

pub mod openai;

pub use openai::{OpenAiCompatClient, OpenAiCompatConfig};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Output of one generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum TextResult {
    Plain(String),
    Structured(Value),
}

impl TextResult {
    /// Text view of the result.
    ///
    /// Structured results yield their `text` or `content` string field when
    /// present, otherwise the compact JSON encoding.
    pub fn into_text(self) -> String {
        match self {
            TextResult::Plain(text) => text,
            TextResult::Structured(Value::String(text)) => text,
            TextResult::Structured(value) => {
                for field in ["text", "content"] {
                    if let Some(Value::String(text)) = value.get(field) {
                        return text.clone();
                    }
                }
                value.to_string()
            }
        }
    }

    /// JSON view of the result.
    ///
    /// Plain text is parsed as a whole, then from a fenced ```json block, then
    /// from the outermost `{ ... }` span.
    pub fn to_json(&self) -> Option<Value> {
        match self {
            TextResult::Structured(value) => Some(value.clone()),
            TextResult::Plain(text) => parse_embedded_json(text),
        }
    }
}

fn parse_embedded_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }

    if let Some(start) = trimmed.find("```") {
        let after_fence = &trimmed[start + 3..];
        let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
        let body = &after_fence[body_start..];
        if let Some(end) = body.find("```") {
            if let Ok(value) = serde_json::from_str::<Value>(body[..end].trim()) {
                return Some(value);
            }
        }
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<Value>(&trimmed[start..=end]).ok()
}

/// Per-call generation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub temperature: f32,
    /// Ask the model for a JSON object response.
    pub json_mode: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: 1024,
            temperature: 0.7,
            json_mode: false,
            system: None,
        }
    }
}

impl GenerationParams {
    pub fn json() -> Self {
        Self {
            json_mode: true,
            temperature: 0.0,
            ..Self::default()
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TextGenError {
    #[error("text generator not configured")]
    NotConfigured,

    #[error("text generator unavailable: {0}")]
    Unavailable(String),

    #[error("malformed generator response: {0}")]
    Malformed(String),

    #[error("generation timed out")]
    Timeout,
}

impl From<reqwest::Error> for TextGenError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TextGenError::Timeout
        } else if err.is_decode() {
            TextGenError::Malformed(err.to_string())
        } else {
            TextGenError::Unavailable(err.to_string())
        }
    }
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<TextResult, TextGenError>;
}

/// Generator used when no model endpoint is configured; every call fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledGenerator;

#[async_trait]
impl TextGenerator for DisabledGenerator {
    async fn generate(
        &self,
        _prompt: &str,
        _params: &GenerationParams,
    ) -> Result<TextResult, TextGenError> {
        Err(TextGenError::NotConfigured)
    }
}
