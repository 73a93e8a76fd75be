use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;
use uuid::Uuid;

use crate::error::{IntelError, Result};

/// Key under which the backend returns the detected technology stack.
pub const TECH_STACK_KEY: &str = "TECH_STACK";

/// Key under which the backend returns the quote rows.
pub const QUOTES_TABLE_KEY: &str = "QUOTES_TABLE";

/// Execution mode used when the caller does not pick one.
pub const DEFAULT_EXECUTION_MODE: &str = "FORENSIC_PLUS_INTERPRETATION";

// =============================================================================
// Transcript
// =============================================================================

/// Author of a transcript entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single entry in the session transcript.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

// =============================================================================
// Engine request
// =============================================================================

/// Backend execution mode, an upper-snake-case token such as
/// `FORENSIC_PLUS_INTERPRETATION`.
///
/// Unknown tokens are passed through; the backend owns the list of modes.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ExecutionMode(String);

impl ExecutionMode {
    /// Normalise and validate a mode token.
    ///
    /// Case is folded to upper, dashes and spaces become underscores.
    pub fn parse(raw: &str) -> Result<Self> {
        let normalised: String = raw
            .trim()
            .chars()
            .map(|c| match c {
                '-' | ' ' => '_',
                other => other.to_ascii_uppercase(),
            })
            .collect();

        if normalised.is_empty() {
            return Err(IntelError::Validation(
                "execution mode must not be empty".to_string(),
            ));
        }
        if !normalised
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
        {
            return Err(IntelError::Validation(format!(
                "execution mode '{}' may only contain letters, digits and underscores",
                raw.trim()
            )));
        }
        Ok(Self(normalised))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ExecutionMode {
    fn default() -> Self {
        Self(DEFAULT_EXECUTION_MODE.to_string())
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ExecutionMode {
    type Error = IntelError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<ExecutionMode> for String {
    fn from(mode: ExecutionMode) -> Self {
        mode.0
    }
}

/// Request body sent to the backend `POST /run` endpoint.
///
/// Field names on the wire are fixed by the backend contract.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EngineRequest {
    #[serde(rename = "TARGET_COMPANY_NAME")]
    pub target_company: String,
    #[serde(rename = "PARTNER_PORTAL_URL")]
    pub portal_url: Url,
    #[serde(rename = "EXECUTION_MODE", default)]
    pub execution_mode: ExecutionMode,
    #[serde(
        rename = "MAX_QUOTES",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub max_quotes: Option<u32>,
}

impl EngineRequest {
    /// Build a request from untrusted text, validating both fields.
    pub fn new(target_company: &str, portal_url: &str) -> Result<Self> {
        let target_company = target_company.trim();
        if target_company.is_empty() {
            return Err(IntelError::Validation(
                "target_company must not be empty".to_string(),
            ));
        }

        Ok(Self {
            target_company: target_company.to_string(),
            portal_url: parse_portal_url(portal_url)?,
            execution_mode: ExecutionMode::default(),
            max_quotes: None,
        })
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.execution_mode = mode;
        self
    }

    /// Cap the number of quotes the backend returns. Zero is rejected.
    pub fn with_max_quotes(mut self, max_quotes: Option<u32>) -> Result<Self> {
        if max_quotes == Some(0) {
            return Err(IntelError::Validation(
                "max_quotes must be at least 1".to_string(),
            ));
        }
        self.max_quotes = max_quotes;
        Ok(self)
    }
}

fn parse_portal_url(raw: &str) -> Result<Url> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(IntelError::Validation(
            "portal_url must not be empty".to_string(),
        ));
    }
    let url = Url::parse(raw)
        .map_err(|e| IntelError::Validation(format!("portal_url '{}' is not a valid URL: {}", raw, e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(IntelError::Validation(format!(
            "portal_url must use http or https, got '{}'",
            url.scheme()
        )));
    }
    if url.host_str().is_none() {
        return Err(IntelError::Validation(format!(
            "portal_url '{}' has no host",
            raw
        )));
    }
    Ok(url)
}

// =============================================================================
// Evidence
// =============================================================================

/// One row of the backend's quotes table.
///
/// The backend's row shape is not guaranteed, so every field is optional.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QuoteRow {
    pub observation: Option<String>,
    pub quote: Option<String>,
    pub source_url: Option<String>,
    pub score: Option<f64>,
}

impl QuoteRow {
    /// Read a row from an arbitrary JSON value. Non-objects yield `None`.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        Some(Self {
            observation: text_field(obj, "observation"),
            quote: text_field(obj, "quote"),
            source_url: text_field(obj, "source_url"),
            score: obj.get("score").and_then(score_value),
        })
    }
}

fn text_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::Null => None,
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

fn score_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Structured evidence captured from a successful backend response.
///
/// Built wholesale from the response payload; `raw` keeps the payload
/// exactly as the backend sent it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvidenceRecord {
    pub tech_stack: Option<Map<String, Value>>,
    pub quotes: Vec<QuoteRow>,
    pub raw: Value,
    pub captured_at: DateTime<Utc>,
}

impl EvidenceRecord {
    /// Parse a backend payload, tolerating missing or mistyped keys.
    pub fn from_payload(payload: Value) -> Self {
        let tech_stack = payload
            .get(TECH_STACK_KEY)
            .and_then(Value::as_object)
            .cloned();
        let quotes = payload
            .get(QUOTES_TABLE_KEY)
            .and_then(Value::as_array)
            .map(|rows| rows.iter().filter_map(QuoteRow::from_value).collect())
            .unwrap_or_default();

        Self {
            tech_stack,
            quotes,
            raw: payload,
            captured_at: Utc::now(),
        }
    }

    /// The quotes array exactly as the backend returned it.
    pub fn raw_quotes(&self) -> Option<&Vec<Value>> {
        self.raw.get(QUOTES_TABLE_KEY).and_then(Value::as_array)
    }

    pub fn has_quotes(&self) -> bool {
        !self.quotes.is_empty()
    }
}
