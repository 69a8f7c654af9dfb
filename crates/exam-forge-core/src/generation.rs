//! Text-generation abstraction and response handling.
//!
//! The [`Generator`] trait is the seam to the remote model. Concrete
//! clients (Gemini) live in the app crate; tests plug in scripted mocks.
//!
//! Generation errors are plain `anyhow::Error`s. [`classify_error`] inspects
//! the rendered error chain (the HTTP status when there is one, otherwise
//! rate-limit and timeout markers) so the batch executor can back off
//! instead of counting the item as failed.

use std::sync::LazyLock;

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;

use crate::models::TokenUsage;

/// One prompt sent to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub system: String,
    pub prompt: String,
}

/// Model output plus usage counters when the backend reports them.
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub text: String,
    pub usage: Option<TokenUsage>,
}

#[async_trait]
pub trait Generator: Send + Sync {
    fn model_name(&self) -> &str;
    async fn generate(&self, request: &GenerationRequest) -> Result<Generation>;
}

/// Parse a model response into a JSON object.
///
/// Tries the whole text first, then the span from the first `{` to the last
/// `}` (models sometimes wrap JSON in prose or code fences). Anything that
/// is not an object is rejected.
///
/// ```rust
/// use exam_forge_core::generation::extract_json_object;
///
/// let v = extract_json_object("Sure! ```json\n{\"id\": 1}\n```").unwrap();
/// assert_eq!(v["id"], 1);
/// assert!(extract_json_object("[1, 2]").is_none());
/// ```
pub fn extract_json_object(text: &str) -> Option<Value> {
    if let Ok(v @ Value::Object(_)) = serde_json::from_str::<Value>(text.trim()) {
        return Some(v);
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&text[start..=end]) {
        Ok(v @ Value::Object(_)) => Some(v),
        _ => None,
    }
}

/// How a failed generation or retrieval call should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The service asked us to slow down (HTTP 429, quota exhausted).
    RateLimited,
    /// The call did not complete in time.
    TimedOut,
    /// Anything else. Not retried within a run.
    Permanent,
}

impl FailureKind {
    /// Transient failures are backed off and left for a resumed run.
    pub fn is_transient(&self) -> bool {
        !matches!(self, FailureKind::Permanent)
    }
}

const RATE_LIMIT_MARKERS: &[&str] = &["quota", "rate limit", "rate_limit", "resource_exhausted"];
const TIMEOUT_MARKERS: &[&str] = &["timed out", "timeout", "deadline"];

/// HTTP status as rendered by the clients: `... API error 429 Too Many Requests: <body>`.
static HTTP_STATUS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:error|status)\s*:?\s*(\d{3})\b").unwrap());

/// Classify an error by the markers in its rendered chain.
pub fn classify_error(err: &anyhow::Error) -> FailureKind {
    classify_message(&format!("{:#}", err))
}

/// A message carrying an HTTP status is classified by that status alone, so
/// words in the response body cannot turn a 400 into a retry.
pub fn classify_message(message: &str) -> FailureKind {
    if let Some(status) = HTTP_STATUS
        .captures(message)
        .and_then(|c| c[1].parse::<u16>().ok())
    {
        return match status {
            429 => FailureKind::RateLimited,
            408 | 504 => FailureKind::TimedOut,
            _ => FailureKind::Permanent,
        };
    }
    let lower = message.to_lowercase();
    if RATE_LIMIT_MARKERS.iter().any(|m| lower.contains(m)) {
        FailureKind::RateLimited
    } else if TIMEOUT_MARKERS.iter().any(|m| lower.contains(m)) {
        FailureKind::TimedOut
    } else {
        FailureKind::Permanent
    }
}
