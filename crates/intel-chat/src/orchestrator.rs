//! Conversation orchestrator: runs one user turn through the tool loop.
//!
//! The model is asked for a completion; while it answers with tool calls
//! those are executed one after another, their results appended to the
//! context, and the request resubmitted. The loop ends on plain text, on a
//! completion error, or after `max_tool_rounds` rounds.

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use intel_core::config::IntelConfig;
use intel_core::types::ChatMessage;
use intel_engine::{EvidenceSource, RateLimiter};

use crate::error::ChatError;
use crate::llm::{CompletionClient, CompletionReply, CompletionRequest, ConversationItem};
use crate::prompt::system_instruction;
use crate::session::Session;
use crate::tools::{EngineTool, ToolInvocation};
use crate::turn::{TurnState, TurnTracker};

/// Maximum message length in characters.
pub const MAX_MESSAGE_LENGTH: usize = 4000;

const DEFAULT_MAX_TOOL_ROUNDS: usize = 4;

/// Result of a successful turn.
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub turn_id: Uuid,
    pub reply: ChatMessage,
    pub tool_invocations: Vec<ToolInvocation>,
    pub evidence_updated: bool,
    pub rounds: usize,
    pub states: Vec<TurnState>,
}

pub struct ConversationOrchestrator {
    client: Arc<dyn CompletionClient>,
    engine_tool: EngineTool,
    system_instruction: String,
    max_tool_rounds: usize,
}

impl ConversationOrchestrator {
    pub fn new(client: Arc<dyn CompletionClient>, engine_tool: EngineTool) -> Self {
        Self {
            client,
            engine_tool,
            system_instruction: system_instruction(),
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }

    /// Wire an orchestrator from configuration and the two collaborators.
    pub fn from_config(
        config: &IntelConfig,
        client: Arc<dyn CompletionClient>,
        source: Arc<dyn EvidenceSource>,
    ) -> Result<Self, intel_core::IntelError> {
        let limiter = RateLimiter::new(config.rate_limit.min_interval());
        let tool = EngineTool::new(source, limiter)
            .with_defaults(config.backend.execution_mode()?, config.backend.max_quotes);
        Ok(Self::new(client, tool).with_max_tool_rounds(config.llm.max_tool_rounds))
    }

    pub fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds;
        self
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = instruction.into();
        self
    }

    pub fn max_tool_rounds(&self) -> usize {
        self.max_tool_rounds
    }

    /// Run one turn. On success the utterance and the reply are appended to
    /// the transcript together; on failure the transcript is left untouched.
    pub async fn handle_turn(
        &self,
        session: &mut Session,
        utterance: &str,
    ) -> Result<TurnOutcome, ChatError> {
        let utterance = utterance.trim();
        if utterance.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if utterance.chars().count() > MAX_MESSAGE_LENGTH {
            return Err(ChatError::MessageTooLong(MAX_MESSAGE_LENGTH));
        }

        let turn_id = Uuid::new_v4();
        let mut tracker = TurnTracker::new();
        let mut invocations: Vec<ToolInvocation> = Vec::new();
        let mut rounds = 0usize;

        let mut items: Vec<ConversationItem> =
            session.transcript().iter().map(ConversationItem::from).collect();
        items.push(ConversationItem::User(utterance.to_string()));
        let mut request = CompletionRequest {
            system: self.system_instruction.clone(),
            items,
            tools: vec![self.engine_tool.declaration()],
        };

        tracing::info!(
            turn = %turn_id,
            session = %session.id(),
            model = self.client.model(),
            "Turn started"
        );
        tracker.advance(TurnState::Dispatched)?;

        let result: Result<String, ChatError> = loop {
            let reply = match self.client.complete(&request).await {
                Ok(reply) => reply,
                Err(e) => break Err(e.into()),
            };

            let calls = match reply {
                CompletionReply::Text(text) => break Ok(text),
                CompletionReply::ToolCalls(calls) => calls,
            };

            if rounds >= self.max_tool_rounds {
                break Err(ChatError::ToolRoundsExceeded(self.max_tool_rounds));
            }
            rounds += 1;

            for call in calls {
                tracker.advance(TurnState::ToolInvoked)?;
                tracing::info!(turn = %turn_id, round = rounds, tool = %call.name, "Tool invoked");
                let outcome = self.engine_tool.dispatch(session, &call).await;
                let (call_id, name) = (call.id.clone(), call.name.clone());
                request.items.push(ConversationItem::ToolCall(call));
                request.items.push(ConversationItem::ToolResult {
                    call_id,
                    name,
                    value: outcome.value,
                });
                invocations.push(outcome.invocation);
                tracker.advance(TurnState::ToolReturned)?;
            }
        };

        let evidence_updated = invocations.iter().any(|i| i.evidence_stored);

        match result {
            Ok(text) => {
                tracker.advance(TurnState::FinalTextReady)?;
                let reply = ChatMessage::assistant(text);
                session.commit_exchange(ChatMessage::user(utterance), reply.clone());
                tracker.advance(TurnState::AwaitingInput)?;
                tracing::info!(
                    turn = %turn_id,
                    rounds,
                    tools = invocations.len(),
                    evidence_updated,
                    "Turn completed"
                );
                Ok(TurnOutcome {
                    turn_id,
                    reply,
                    tool_invocations: invocations,
                    evidence_updated,
                    rounds,
                    states: tracker.into_trail(),
                })
            }
            Err(err) => {
                tracker.advance(TurnState::Failed)?;
                tracker.advance(TurnState::AwaitingInput)?;
                tracing::warn!(
                    turn = %turn_id,
                    rounds,
                    evidence_updated,
                    error = %err,
                    "Turn failed"
                );
                Err(err)
            }
        }
    }
}
