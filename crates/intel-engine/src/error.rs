//! Error types for backend calls.

use std::time::Duration;

use serde_json::{json, Value};

/// Longest slice of a backend error body forwarded to the language model.
const MAX_TOOL_BODY_CHARS: usize = 2000;

/// Errors from the engine bridge.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("bridge configuration error: {0}")]
    Config(String),
    #[error("invalid engine request: {0}")]
    InvalidRequest(String),
    #[error("backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("backend did not answer within {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("backend unreachable: {0}")]
    Transport(String),
    #[error("backend response was not valid JSON: {0}")]
    Decode(String),
}

impl EngineError {
    /// HTTP status code, when the backend answered at all.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            EngineError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Render the error as the JSON value handed back to the model as a
    /// tool result.
    pub fn to_tool_value(&self) -> Value {
        let message = match self {
            EngineError::Status { status, body } => format!(
                "backend returned HTTP {}: {}",
                status,
                truncate_chars(body, MAX_TOOL_BODY_CHARS)
            ),
            other => other.to_string(),
        };
        match self.status_code() {
            Some(status) => json!({ "error": message, "status": status }),
            None => json!({ "error": message }),
        }
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
