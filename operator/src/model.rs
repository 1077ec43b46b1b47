//! Model inference collaborator: prompt + screenshot in, free text out.
//!
//! Upstream failures are classified exactly once, here at the boundary,
//! into the crate's error taxonomy. The rest of the loop switches on the
//! error kind and never inspects raw failure text. The one scoped
//! exception: the retry-after duration only exists inside the upstream
//! message, so its extraction is isolated in [`parse_retry_after`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::errors::AgentError;
use crate::pool::{CredentialPool, Role};

const DEFAULT_MODEL: &str = "gemini-flash-latest";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// A decimal number immediately preceding a seconds unit, e.g. the `7.5`
/// in "Please retry in 7.5s".
static RETRY_AFTER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*s(?:ec(?:ond)?s?)?\b").unwrap());

/// Extract a suggested wait duration from an upstream failure payload.
pub(crate) fn parse_retry_after(text: &str) -> Option<f64> {
    RETRY_AFTER_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// The single decision backend the loop queries each step.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Complete a prompt against a PNG screenshot, returning the raw
    /// reply text.
    async fn complete(&self, prompt: &str, image_png: &[u8]) -> Result<String, AgentError>;
}

// Gemini generateContent wire format.

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Serialize)]
struct InlineData {
    mime_type: &'static str,
    data: String,
}

/// Gemini-backed [`ModelClient`]. Pulls a credential from the pool for
/// each call and reports throttles back so the pool can quarantine the
/// key.
pub struct GeminiClient {
    http: reqwest::Client,
    pool: Arc<CredentialPool>,
    role: Role,
    model: String,
}

impl GeminiClient {
    pub fn new(pool: Arc<CredentialPool>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            pool,
            role: Role::Completion,
            model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    /// One-time classification of an upstream failure into the taxonomy.
    fn classify_failure(&self, status: reqwest::StatusCode, body: &str, key: &str) -> AgentError {
        if status.as_u16() == 429 || body.contains("RESOURCE_EXHAUSTED") {
            let retry_after = parse_retry_after(body);
            self.pool
                .report_throttled(key, retry_after.map(Duration::from_secs_f64));
            return AgentError::UpstreamThrottled { retry_after };
        }
        AgentError::Upstream(format!("model call failed ({status}): {body}"))
    }
}

#[async_trait]
impl ModelClient for GeminiClient {
    async fn complete(&self, prompt: &str, image_png: &[u8]) -> Result<String, AgentError> {
        let key = self.pool.acquire(self.role)?;
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.model, key
        );

        let request = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![
                    Part::Text {
                        text: prompt.to_string(),
                    },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: "image/png",
                            data: base64::engine::general_purpose::STANDARD.encode(image_png),
                        },
                    },
                ],
            }],
        };

        let response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| AgentError::Upstream(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.classify_failure(status, &body, &key));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AgentError::Upstream(format!("malformed response: {e}")))?;

        let text = body
            .get("candidates")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("content"))
            .and_then(|c| c.get("parts"))
            .and_then(|p| p.get(0))
            .and_then(|p| p.get("text"))
            .and_then(|t| t.as_str())
            .ok_or_else(|| AgentError::Upstream("no text in model response".to_string()))?;

        debug!("model replied with {} chars", text.len());
        Ok(text.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_after_extracts_decimal_seconds() {
        assert_eq!(parse_retry_after("Please retry in 7.5s"), Some(7.5));
        assert_eq!(parse_retry_after("retry in 30s."), Some(30.0));
        assert_eq!(parse_retry_after("wait 2 seconds then retry"), Some(2.0));
    }

    #[test]
    fn retry_after_absent_when_no_duration() {
        assert_eq!(parse_retry_after("RESOURCE_EXHAUSTED"), None);
        assert_eq!(parse_retry_after(""), None);
    }

    #[test]
    fn request_serializes_to_gemini_wire_format() {
        let request = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![
                    Part::Text {
                        text: "describe".into(),
                    },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: "image/png",
                            data: "abc123".into(),
                        },
                    },
                ],
            }],
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"text\":\"describe\""));
        assert!(json.contains("\"inline_data\""));
        assert!(json.contains("\"mime_type\":\"image/png\""));
        assert!(json.contains("\"data\":\"abc123\""));
    }
}
