//! Gemini `generateContent` client.
//!
//! Maps the neutral conversation onto Gemini contents: user text and tool
//! results travel with role `user`, assistant text and tool calls with role
//! `model`. Tool results are sent as `functionResponse` parts.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use intel_core::config::{LlmConfig, Secret};

use super::{CompletionClient, CompletionReply, CompletionRequest, ConversationItem, ToolCall};
use crate::error::LlmError;

/// Header carrying the Gemini API key.
pub const API_KEY_HEADER: &str = "x-goog-api-key";

const MAX_ERROR_CHARS: usize = 500;

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    system_instruction: Content,
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ToolSet>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolSet {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct FunctionDeclaration {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionResponse {
    name: String,
    response: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

// =============================================================================
// Client
// =============================================================================

pub struct GeminiClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Secret,
}

impl GeminiClient {
    pub fn new(
        endpoint: &str,
        model: &str,
        api_key: Secret,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Transport(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
        })
    }

    pub fn from_config(config: &LlmConfig, api_key: Secret) -> Result<Self, LlmError> {
        Self::new(&config.endpoint, &config.model, api_key, config.timeout())
    }

    pub fn generate_url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }
}

#[async_trait]
impl CompletionClient for GeminiClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionReply, LlmError> {
        let body = request_body(request)?;
        let resp = self
            .http
            .post(self.generate_url())
            .header(API_KEY_HEADER, self.api_key.expose())
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        let status = resp.status().as_u16();
        let text = resp
            .text()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        if status != 200 {
            tracing::warn!(status, model = %self.model, "Completion request failed");
            return Err(classify_status(status, &text, &self.model));
        }

        let parsed: Value =
            serde_json::from_str(&text).map_err(|e| LlmError::Malformed(e.to_string()))?;
        parse_reply(parsed)
    }
}

// =============================================================================
// Mapping
// =============================================================================

fn request_body(request: &CompletionRequest) -> Result<Value, LlmError> {
    let mut contents: Vec<Content> = Vec::new();

    for item in &request.items {
        let (role, part) = match item {
            ConversationItem::User(text) => ("user", text_part(text)),
            ConversationItem::Assistant(text) => ("model", text_part(text)),
            ConversationItem::ToolCall(call) => (
                "model",
                Part {
                    function_call: Some(FunctionCall {
                        name: call.name.clone(),
                        args: call.args.clone(),
                    }),
                    ..Part::default()
                },
            ),
            ConversationItem::ToolResult { name, value, .. } => (
                "user",
                Part {
                    function_response: Some(FunctionResponse {
                        name: name.clone(),
                        response: response_object(value),
                    }),
                    ..Part::default()
                },
            ),
        };

        // Consecutive items from the same side share one content entry.
        match contents.last_mut() {
            Some(last) if last.role.as_deref() == Some(role) => last.parts.push(part),
            _ => contents.push(Content {
                role: Some(role.to_string()),
                parts: vec![part],
            }),
        }
    }

    let tools = if request.tools.is_empty() {
        Vec::new()
    } else {
        vec![ToolSet {
            function_declarations: request
                .tools
                .iter()
                .map(|t| FunctionDeclaration {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                })
                .collect(),
        }]
    };

    let body = GenerateContentRequest {
        system_instruction: Content {
            role: None,
            parts: vec![text_part(&request.system)],
        },
        contents,
        tools,
    };
    to_wire(&body)
}

fn to_wire<T: Serialize>(body: &T) -> Result<Value, LlmError> {
    serde_json::to_value(body)
        .map_err(|e| LlmError::Malformed(format!("request body could not be encoded: {}", e)))
}

fn text_part(text: &str) -> Part {
    Part {
        text: Some(text.to_string()),
        ..Part::default()
    }
}

/// `functionResponse.response` must be an object.
fn response_object(value: &Value) -> Value {
    if value.is_object() {
        value.clone()
    } else {
        json!({ "result": value })
    }
}

fn parse_reply(body: Value) -> Result<CompletionReply, LlmError> {
    let resp: GenerateContentResponse =
        serde_json::from_value(body).map_err(|e| LlmError::Malformed(e.to_string()))?;

    let Some(candidate) = resp.candidates.into_iter().next() else {
        return match resp.prompt_feedback.and_then(|f| f.block_reason) {
            Some(reason) => Err(LlmError::Blocked(reason)),
            None => Err(LlmError::Malformed("response has no candidates".to_string())),
        };
    };

    let parts = candidate.content.map(|c| c.parts).unwrap_or_default();
    let mut calls = Vec::new();
    let mut text = String::new();
    for part in parts {
        if let Some(call) = part.function_call {
            calls.push(ToolCall {
                id: Uuid::new_v4().to_string(),
                name: call.name,
                args: call.args,
            });
        } else if let Some(t) = part.text {
            text.push_str(&t);
        }
    }

    if !calls.is_empty() {
        return Ok(CompletionReply::ToolCalls(calls));
    }
    if !text.trim().is_empty() {
        return Ok(CompletionReply::Text(text));
    }
    match candidate.finish_reason {
        Some(reason) if reason != "STOP" && reason != "MAX_TOKENS" => {
            Err(LlmError::Blocked(reason))
        }
        _ => Err(LlmError::EmptyResponse),
    }
}

fn classify_status(status: u16, body: &str, model: &str) -> LlmError {
    let message = error_message(body);
    let lowered = message.to_lowercase();
    match status {
        429 => LlmError::QuotaExhausted(message),
        404 => LlmError::InvalidModel(model.to_string()),
        401 | 403 => LlmError::InvalidApiKey(message),
        400 if lowered.contains("api key") || lowered.contains("api_key") => {
            LlmError::InvalidApiKey(message)
        }
        _ => LlmError::Status { status, message },
    }
}

/// Prefer `error.message` from a Google error envelope, else the raw body.
fn error_message(body: &str) -> String {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string());
    match message.char_indices().nth(MAX_ERROR_CHARS) {
        Some((idx, _)) => format!("{}...", &message[..idx]),
        None => message,
    }
}
