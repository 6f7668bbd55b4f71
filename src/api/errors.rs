//! Server error decoding and user-facing message sanitizing.

use crate::error::{is_quota_message, CasePilotError};
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;

/// Shown on a failed queue item when the AI generator hit its rate limit.
pub const QUEUE_QUOTA_MESSAGE: &str = "⚠️ AI Quota Exceeded. Please try later.";

/// Shown when a case submission hit the rate limit.
pub const REVIEW_QUOTA_MESSAGE: &str =
    "AI service is overloaded (quota limit). Case status was saved, but the AI report failed.";

static EMBEDDED_MESSAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""message":\s*"([^"]+)""#).expect("valid regex"));

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
}

/// Message carried by a non-2xx response: the JSON `error` field when present,
/// otherwise `Server Error: {status}`.
pub fn server_error_message(status: u16, body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|parsed| parsed.error)
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| format!("Server Error: {}", status))
}

pub fn error_from_response(status: u16, body: &str) -> CasePilotError {
    CasePilotError::from_server_message(Some(status), server_error_message(status, body))
}

/// Rewrite raw error text for display.
///
/// Quota failures become a fixed notice; text embedding a JSON blob is reduced
/// to its inner `"message"` value when one exists.
pub fn sanitize_error_message(message: &str) -> String {
    if is_quota_message(message) {
        return QUEUE_QUOTA_MESSAGE.to_string();
    }

    if message.contains('{') {
        if let Some(inner) = EMBEDDED_MESSAGE
            .captures(message)
            .and_then(|captures| captures.get(1))
        {
            return inner.as_str().to_string();
        }
    }

    message.to_string()
}
