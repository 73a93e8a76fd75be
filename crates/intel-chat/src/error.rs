//! Error types for the conversational core.

use crate::turn::TurnState;

/// Faults reported by the completion service.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("quota exhausted: {0}")]
    QuotaExhausted(String),
    #[error("model '{0}' is not available")]
    InvalidModel(String),
    #[error("API key rejected: {0}")]
    InvalidApiKey(String),
    #[error("response blocked: {0}")]
    Blocked(String),
    #[error("model returned an empty response")]
    EmptyResponse,
    #[error("malformed completion response: {0}")]
    Malformed(String),
    #[error("completion service returned HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("completion service unreachable: {0}")]
    Transport(String),
}

impl LlmError {
    /// Guidance shown to the user next to the error.
    pub fn hint(&self) -> &'static str {
        match self {
            LlmError::QuotaExhausted(_) => {
                "The language-model quota is exhausted. Wait a minute and try again, or check the billing plan of the API key."
            }
            LlmError::InvalidModel(_) => {
                "Check llm.model in the config file; this model identifier is not available for the API key."
            }
            LlmError::InvalidApiKey(_) => {
                "Check GEMINI_API_KEY; the completion service rejected it."
            }
            LlmError::Blocked(_) => "The model declined this prompt. Rephrase the request.",
            LlmError::EmptyResponse | LlmError::Malformed(_) => {
                "The model returned an unusable reply. Send the request again."
            }
            LlmError::Status { .. } => {
                "The completion service reported an error. Try again shortly."
            }
            LlmError::Transport(_) => {
                "Could not reach the completion service. Check the network connection."
            }
        }
    }

    /// Quota or rate-limit exhaustion on the completion service.
    pub fn is_quota(&self) -> bool {
        matches!(self, LlmError::QuotaExhausted(_))
    }

    /// Errors only a configuration change can fix.
    pub fn is_configuration(&self) -> bool {
        matches!(self, LlmError::InvalidModel(_) | LlmError::InvalidApiKey(_))
    }
}

/// Errors from a chat turn.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),
    #[error("model kept requesting tools after {0} rounds without answering")]
    ToolRoundsExceeded(usize),
    #[error("invalid turn transition: {0} -> {1}")]
    InvalidTransition(TurnState, TurnState),
}

impl ChatError {
    /// Error text with a human-readable hint, suitable for a banner.
    pub fn user_message(&self) -> String {
        match self {
            ChatError::Llm(e) => format!("{} {}", self, e.hint()),
            ChatError::ToolRoundsExceeded(_) => {
                format!("{}. Try a more specific request.", self)
            }
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_error_display() {
        assert_eq!(ChatError::EmptyMessage.to_string(), "message cannot be empty");
        assert_eq!(
            ChatError::MessageTooLong(4000).to_string(),
            "message exceeds maximum length of 4000 characters"
        );
        assert_eq!(
            ChatError::ToolRoundsExceeded(4).to_string(),
            "model kept requesting tools after 4 rounds without answering"
        );
        assert_eq!(
            ChatError::InvalidTransition(TurnState::AwaitingInput, TurnState::ToolReturned)
                .to_string(),
            "invalid turn transition: AWAITING_INPUT -> TOOL_RETURNED"
        );
    }

    #[test]
    fn test_llm_error_display() {
        let err = LlmError::Status {
            status: 503,
            message: "overloaded".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "completion service returned HTTP 503: overloaded"
        );
        assert_eq!(
            LlmError::InvalidModel("gemini-9".to_string()).to_string(),
            "model 'gemini-9' is not available"
        );
    }

    #[test]
    fn test_from_llm_error() {
        let err: ChatError = LlmError::EmptyResponse.into();
        assert!(matches!(err, ChatError::Llm(LlmError::EmptyResponse)));
    }

    #[test]
    fn test_quota_and_configuration_hints_differ() {
        let quota = LlmError::QuotaExhausted("429".to_string());
        let model = LlmError::InvalidModel("x".to_string());
        let key = LlmError::InvalidApiKey("bad".to_string());

        assert!(quota.is_quota());
        assert!(!quota.is_configuration());
        assert!(model.is_configuration());
        assert!(key.is_configuration());
        assert_ne!(quota.hint(), model.hint());
        assert!(quota.hint().contains("quota"));
        assert!(model.hint().contains("llm.model"));
        assert!(key.hint().contains("GEMINI_API_KEY"));
    }

    #[test]
    fn test_user_message_includes_hint() {
        let err = ChatError::Llm(LlmError::QuotaExhausted("Resource has been exhausted".to_string()));
        let msg = err.user_message();
        assert!(msg.starts_with("LLM error: quota exhausted"));
        assert!(msg.contains("Wait a minute"));

        assert_eq!(ChatError::EmptyMessage.user_message(), "message cannot be empty");
        assert!(ChatError::ToolRoundsExceeded(2)
            .user_message()
            .ends_with("Try a more specific request."));
    }
}
