//! Provider-neutral completion interface.
//!
//! The orchestrator speaks in [`CompletionRequest`] and [`CompletionReply`];
//! each provider module maps these onto its own wire format.

pub mod gemini;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use intel_core::types::{ChatMessage, Role};

use crate::error::LlmError;

/// A function the model may call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDeclaration {
    pub name: String,
    pub description: String,
    /// Parameter schema (OpenAPI subset, as accepted by function-calling APIs).
    pub parameters: Value,
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub args: Value,
}

/// One entry of the conversation context sent to the model.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversationItem {
    User(String),
    Assistant(String),
    ToolCall(ToolCall),
    ToolResult {
        call_id: String,
        name: String,
        value: Value,
    },
}

impl From<&ChatMessage> for ConversationItem {
    fn from(message: &ChatMessage) -> Self {
        match message.role {
            Role::User => ConversationItem::User(message.content.clone()),
            Role::Assistant => ConversationItem::Assistant(message.content.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub items: Vec<ConversationItem>,
    pub tools: Vec<ToolDeclaration>,
}

/// What the model answered with.
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionReply {
    Text(String),
    /// Never empty.
    ToolCalls(Vec<ToolCall>),
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Model identifier, for logs.
    fn model(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionReply, LlmError>;
}
