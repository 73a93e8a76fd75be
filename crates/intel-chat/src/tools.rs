//! Tool dispatch for the engine tool.
//!
//! Every outcome, including failures, becomes a JSON value for the model;
//! dispatch itself never errors.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use intel_core::types::{EngineRequest, EvidenceRecord, ExecutionMode};
use intel_engine::{EvidenceSource, RateLimiter};

use crate::llm::{ToolCall, ToolDeclaration};
use crate::session::Session;

pub const ENGINE_TOOL_NAME: &str = "run_partner_engine";

/// Record of one tool call within a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub name: String,
    pub args: Value,
    pub ok: bool,
    /// HTTP status of a failed backend call, when it answered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    pub waited_ms: u64,
    pub elapsed_ms: u64,
    pub evidence_stored: bool,
}

/// Value handed back to the model plus the bookkeeping record.
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub value: Value,
    pub invocation: ToolInvocation,
}

#[derive(Debug, Deserialize)]
struct EngineToolArgs {
    target_company: Option<String>,
    portal_url: Option<String>,
    mode: Option<String>,
}

/// The `run_partner_engine` tool: rate-limited calls to an [`EvidenceSource`].
pub struct EngineTool {
    source: Arc<dyn EvidenceSource>,
    limiter: RateLimiter,
    default_mode: ExecutionMode,
    max_quotes: Option<u32>,
}

impl EngineTool {
    pub fn new(source: Arc<dyn EvidenceSource>, limiter: RateLimiter) -> Self {
        Self {
            source,
            limiter,
            default_mode: ExecutionMode::default(),
            max_quotes: None,
        }
    }

    /// Mode used when the model omits one, and the optional quote cap.
    pub fn with_defaults(mut self, mode: ExecutionMode, max_quotes: Option<u32>) -> Self {
        self.default_mode = mode;
        self.max_quotes = max_quotes;
        self
    }

    pub fn declaration(&self) -> ToolDeclaration {
        ToolDeclaration {
            name: ENGINE_TOOL_NAME.to_string(),
            description: "Run the partner intelligence engine against a company's partner \
portal. Returns TECH_STACK and QUOTES_TABLE (rows with observation, quote, source_url, score)."
                .to_string(),
            parameters: json!({
                "type": "OBJECT",
                "properties": {
                    "target_company": {
                        "type": "STRING",
                        "description": "Name of the company to investigate"
                    },
                    "portal_url": {
                        "type": "STRING",
                        "description": "URL of the company's partner portal or login page"
                    },
                    "mode": {
                        "type": "STRING",
                        "description": format!(
                            "Optional execution mode token, default {}",
                            self.default_mode
                        )
                    }
                },
                "required": ["target_company", "portal_url"]
            }),
        }
    }

    pub async fn dispatch(&self, session: &mut Session, call: &ToolCall) -> ToolOutcome {
        if call.name != ENGINE_TOOL_NAME {
            tracing::warn!(tool = %call.name, "Model requested an unknown tool");
            return rejected(call, format!("unknown tool '{}'", call.name));
        }

        let request = match self.parse_request(&call.args) {
            Ok(request) => request,
            Err(message) => {
                tracing::warn!(tool = %call.name, error = %message, "Rejected tool arguments");
                return rejected(call, message);
            }
        };

        let waited = self.limiter.acquire(session.rate_window_mut()).await;
        let started = Instant::now();
        let result = self.source.run(&request).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        let waited_ms = waited.as_millis() as u64;

        match result {
            Ok(payload) => {
                session.store_evidence(EvidenceRecord::from_payload(payload.clone()));
                tracing::info!(
                    tool = %call.name,
                    waited_ms,
                    elapsed_ms,
                    "Evidence stored"
                );
                ToolOutcome {
                    value: payload,
                    invocation: ToolInvocation {
                        name: call.name.clone(),
                        args: call.args.clone(),
                        ok: true,
                        status: None,
                        waited_ms,
                        elapsed_ms,
                        evidence_stored: true,
                    },
                }
            }
            Err(err) => {
                tracing::warn!(
                    tool = %call.name,
                    status = ?err.status_code(),
                    error = %err,
                    "Engine call failed"
                );
                ToolOutcome {
                    value: err.to_tool_value(),
                    invocation: ToolInvocation {
                        name: call.name.clone(),
                        args: call.args.clone(),
                        ok: false,
                        status: err.status_code(),
                        waited_ms,
                        elapsed_ms,
                        evidence_stored: false,
                    },
                }
            }
        }
    }

    fn parse_request(&self, args: &Value) -> Result<EngineRequest, String> {
        let args: EngineToolArgs = serde_json::from_value(args.clone())
            .map_err(|e| format!("invalid arguments: {}", e))?;

        let company = args
            .target_company
            .ok_or_else(|| "missing required argument 'target_company'".to_string())?;
        let portal = args
            .portal_url
            .ok_or_else(|| "missing required argument 'portal_url'".to_string())?;

        let mode = match args.mode.as_deref().map(str::trim) {
            None | Some("") => self.default_mode.clone(),
            Some(raw) => ExecutionMode::parse(raw).map_err(|e| e.to_string())?,
        };

        EngineRequest::new(&company, &portal)
            .and_then(|r| r.with_max_quotes(self.max_quotes))
            .map(|r| r.with_mode(mode))
            .map_err(|e| e.to_string())
    }
}

fn rejected(call: &ToolCall, message: String) -> ToolOutcome {
    ToolOutcome {
        value: json!({ "error": message }),
        invocation: ToolInvocation {
            name: call.name.clone(),
            args: call.args.clone(),
            ok: false,
            status: None,
            waited_ms: 0,
            elapsed_ms: 0,
            evidence_stored: false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use intel_engine::EngineError;

    struct StubSource {
        reply: fn() -> Result<Value, EngineError>,
        seen: Mutex<Vec<EngineRequest>>,
    }

    impl StubSource {
        fn new(reply: fn() -> Result<Value, EngineError>) -> Arc<Self> {
            Arc::new(Self {
                reply,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl EvidenceSource for StubSource {
        async fn run(&self, request: &EngineRequest) -> Result<Value, EngineError> {
            self.seen.lock().unwrap().push(request.clone());
            (self.reply)()
        }
    }

    fn one_quote() -> Result<Value, EngineError> {
        Ok(json!({
            "TECH_STACK": {"sso": "Okta"},
            "QUOTES_TABLE": [{
                "observation": "Slow SSO",
                "quote": "login takes 40s",
                "source_url": "https://partners.acme.com/login",
                "score": 8
            }]
        }))
    }

    fn db_down() -> Result<Value, EngineError> {
        Err(EngineError::Status {
            status: 500,
            body: "db down".to_string(),
        })
    }

    fn timed_out() -> Result<Value, EngineError> {
        Err(EngineError::Timeout(Duration::from_secs(120)))
    }

    fn call(args: Value) -> ToolCall {
        ToolCall {
            id: "c1".to_string(),
            name: ENGINE_TOOL_NAME.to_string(),
            args,
        }
    }

    fn acme_args() -> Value {
        json!({"target_company": "Acme", "portal_url": "https://partners.acme.com/login"})
    }

    // ---- Declaration ----

    #[test]
    fn test_declaration_schema() {
        let tool = EngineTool::new(StubSource::new(one_quote), RateLimiter::disabled());
        let decl = tool.declaration();
        assert_eq!(decl.name, "run_partner_engine");
        assert_eq!(
            decl.parameters["required"],
            json!(["target_company", "portal_url"])
        );
        assert!(decl.parameters["properties"].get("mode").is_some());
    }

    // ---- Dispatch ----

    #[tokio::test(start_paused = true)]
    async fn test_success_stores_evidence_and_returns_payload() {
        let source = StubSource::new(one_quote);
        let tool = EngineTool::new(source.clone(), RateLimiter::new(Duration::from_secs(15)));
        let mut session = Session::new();

        let outcome = tool.dispatch(&mut session, &call(acme_args())).await;

        assert_eq!(outcome.value, one_quote().unwrap());
        assert!(outcome.invocation.ok);
        assert!(outcome.invocation.evidence_stored);
        let evidence = session.evidence().unwrap();
        assert_eq!(evidence.quotes.len(), 1);
        assert_eq!(
            evidence.raw_quotes().unwrap(),
            one_quote().unwrap()["QUOTES_TABLE"].as_array().unwrap()
        );

        let seen = source.seen.lock().unwrap();
        assert_eq!(seen[0].target_company, "Acme");
        assert_eq!(seen[0].execution_mode.as_str(), "FORENSIC_PLUS_INTERPRETATION");
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_error_becomes_tool_value_and_keeps_evidence() {
        let tool = EngineTool::new(StubSource::new(db_down), RateLimiter::disabled());
        let mut session = Session::new();

        let outcome = tool.dispatch(&mut session, &call(acme_args())).await;

        assert_eq!(outcome.value["status"], 500);
        assert!(outcome.value["error"].as_str().unwrap().contains("db down"));
        assert_eq!(outcome.invocation.status, Some(500));
        assert!(!outcome.invocation.ok);
        assert!(session.evidence().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_call_still_consumes_rate_window() {
        let tool = EngineTool::new(
            StubSource::new(timed_out),
            RateLimiter::new(Duration::from_secs(15)),
        );
        let mut session = Session::new();

        let outcome = tool.dispatch(&mut session, &call(acme_args())).await;

        assert!(outcome.value.get("error").is_some());
        assert!(session.rate_window().last_request().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_call_waits_for_interval() {
        let tool = EngineTool::new(
            StubSource::new(one_quote),
            RateLimiter::new(Duration::from_secs(15)),
        );
        let mut session = Session::new();

        let first = tool.dispatch(&mut session, &call(acme_args())).await;
        assert_eq!(first.invocation.waited_ms, 0);

        tokio::time::advance(Duration::from_secs(6)).await;
        let second = tool.dispatch(&mut session, &call(acme_args())).await;
        assert_eq!(second.invocation.waited_ms, 9_000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_arguments_skip_backend_and_window() {
        let source = StubSource::new(one_quote);
        let tool = EngineTool::new(source.clone(), RateLimiter::new(Duration::from_secs(15)));
        let mut session = Session::new();

        let missing = tool
            .dispatch(&mut session, &call(json!({"target_company": "Acme"})))
            .await;
        assert!(missing.value["error"]
            .as_str()
            .unwrap()
            .contains("portal_url"));

        let bad_url = tool
            .dispatch(
                &mut session,
                &call(json!({"target_company": "Acme", "portal_url": "not a url"})),
            )
            .await;
        assert!(bad_url.value.get("error").is_some());

        let bad_mode = tool
            .dispatch(
                &mut session,
                &call(json!({
                    "target_company": "Acme",
                    "portal_url": "https://partners.acme.com",
                    "mode": "fast!"
                })),
            )
            .await;
        assert!(bad_mode.value.get("error").is_some());

        assert!(source.seen.lock().unwrap().is_empty());
        assert!(session.rate_window().last_request().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_tool() {
        let source = StubSource::new(one_quote);
        let tool = EngineTool::new(source.clone(), RateLimiter::disabled());
        let mut session = Session::new();

        let outcome = tool
            .dispatch(
                &mut session,
                &ToolCall {
                    id: "x".to_string(),
                    name: "delete_everything".to_string(),
                    args: json!({}),
                },
            )
            .await;
        assert_eq!(outcome.value["error"], "unknown tool 'delete_everything'");
        assert!(source.seen.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_mode_and_max_quotes_defaults() {
        let source = StubSource::new(one_quote);
        let tool = EngineTool::new(source.clone(), RateLimiter::disabled()).with_defaults(
            ExecutionMode::parse("FORENSIC_ONLY").unwrap(),
            Some(10),
        );
        let mut session = Session::new();

        tool.dispatch(&mut session, &call(acme_args())).await;
        let mut args = acme_args();
        args["mode"] = json!("quick-scan");
        tool.dispatch(&mut session, &call(args)).await;

        let seen = source.seen.lock().unwrap();
        assert_eq!(seen[0].execution_mode.as_str(), "FORENSIC_ONLY");
        assert_eq!(seen[0].max_quotes, Some(10));
        assert_eq!(seen[1].execution_mode.as_str(), "QUICK_SCAN");
    }
}
