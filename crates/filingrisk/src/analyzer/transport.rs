//! Model transport: one call in, raw reply text out.

use std::time::Duration;

use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, error};

/// Errors from the model transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Model request failed: {0}")]
    Request(String),

    #[error("Model response missing reply text: {0}")]
    EmptyReply(String),
}

impl TransportError {
    /// True when the error text carries rate-limit or quota markers.
    pub fn is_rate_limited(&self) -> bool {
        let text = self.to_string().to_lowercase();
        text.contains("rate") || text.contains("quota") || text.contains("429")
    }
}

/// A generative-model transport: takes a fully built prompt, returns the
/// raw reply text or fails.
pub trait ModelTransport: Send + Sync {
    fn generate(&self, prompt: &str) -> Result<String, TransportError>;
}

/// Model used for all analysis requests.
const GEMINI_MODEL: &str = "gemini-1.5-flash";

/// HTTP transport for the Gemini generateContent API.
pub struct GeminiClient {
    http: reqwest::blocking::Client,
    api_key: String,
}

impl GeminiClient {
    pub fn new(api_key: &str) -> Self {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_default();
        Self {
            http,
            api_key: api_key.to_string(),
        }
    }
}

impl ModelTransport for GeminiClient {
    fn generate(&self, prompt: &str) -> Result<String, TransportError> {
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            GEMINI_MODEL, self.api_key
        );
        let body = json!({
            "contents": [{"parts": [{"text": prompt}]}]
        });

        debug!(prompt_len = prompt.len(), "Sending analysis request");

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                let err = TransportError::Request(e.to_string());
                if err.is_rate_limited() {
                    error!(error = %err, "Model rate limit exceeded");
                } else {
                    error!(error = %err, "Model API error");
                }
                err
            })?;

        let payload: Value = response
            .json()
            .map_err(|e| TransportError::Request(e.to_string()))?;

        payload
            .pointer("/candidates/0/content/parts/0/text")
            .and_then(Value::as_str)
            .map(|s| s.to_string())
            .ok_or_else(|| TransportError::EmptyReply(payload.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_detection() {
        assert!(TransportError::Request("HTTP 429 Too Many Requests".into()).is_rate_limited());
        assert!(TransportError::Request("Rate limit hit".into()).is_rate_limited());
        assert!(TransportError::Request("quota exceeded for project".into()).is_rate_limited());
        assert!(!TransportError::Request("connection refused".into()).is_rate_limited());
    }
}
