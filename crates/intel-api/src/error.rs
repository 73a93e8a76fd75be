//! API error types and JSON error response formatting.
//!
//! Every failure is answered with `{error, message}`, where `message` is
//! the human-readable text (including hints for completion-service faults).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use intel_chat::{ChatError, LlmError};

/// JSON error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g., "bad_request", "quota_exhausted").
    pub error: String,
    /// Human-readable error message.
    pub message: String,
    /// Set when a failed turn still stored fresh evidence before failing.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub evidence_updated: bool,
}

#[derive(Debug)]
pub enum ApiError {
    /// 400 - the chat message failed validation.
    BadRequest(String),
    /// 429 - the completion service quota is exhausted.
    QuotaExhausted(String),
    /// 500 - unexpected server error.
    Internal(String),
    /// 502 - an upstream service failed during the turn.
    BadGateway(String),
    /// 503 - upstream configuration (model, key) is unusable.
    ServiceUnavailable(String),
    /// Any of the above, raised by a turn whose tool call had already
    /// replaced the evidence slot.
    EvidenceUpdated(Box<ApiError>),
}

impl ApiError {
    /// Mark the error as coming from a turn that updated the evidence.
    pub fn with_evidence_updated(self, updated: bool) -> Self {
        match self {
            ApiError::EvidenceUpdated(inner) if !updated => *inner,
            ApiError::EvidenceUpdated(_) => self,
            other if updated => ApiError::EvidenceUpdated(Box::new(other)),
            other => other,
        }
    }

    fn into_body(self) -> (StatusCode, ErrorBody) {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::QuotaExhausted(msg) => {
                (StatusCode::TOO_MANY_REQUESTS, "quota_exhausted", msg)
            }
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, "upstream_error", msg),
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "misconfigured", msg)
            }
            ApiError::EvidenceUpdated(inner) => {
                let (status, mut body) = inner.into_body();
                body.evidence_updated = true;
                return (status, body);
            }
        };

        let body = ErrorBody {
            error: error_code.to_string(),
            message,
            evidence_updated: false,
        };
        (status, body)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = self.into_body();
        (status, Json(body)).into_response()
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        let message = err.user_message();
        match &err {
            ChatError::EmptyMessage | ChatError::MessageTooLong(_) => ApiError::BadRequest(message),
            ChatError::Llm(LlmError::QuotaExhausted(_)) => ApiError::QuotaExhausted(message),
            ChatError::Llm(e) if e.is_configuration() => ApiError::ServiceUnavailable(message),
            ChatError::Llm(_) | ChatError::ToolRoundsExceeded(_) => ApiError::BadGateway(message),
            ChatError::InvalidTransition(..) => ApiError::Internal(message),
        }
    }
}
