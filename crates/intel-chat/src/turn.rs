//! Per-turn state machine.
//!
//! ```text
//! AWAITING_INPUT -> DISPATCHED -> (TOOL_INVOKED -> TOOL_RETURNED)* -> FINAL_TEXT_READY -> AWAITING_INPUT
//!                       |                               |
//!                       +------------> FAILED <---------+
//!                                        |
//!                                        +-> AWAITING_INPUT
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ChatError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TurnState {
    AwaitingInput,
    Dispatched,
    ToolInvoked,
    ToolReturned,
    FinalTextReady,
    Failed,
}

impl TurnState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnState::AwaitingInput => "AWAITING_INPUT",
            TurnState::Dispatched => "DISPATCHED",
            TurnState::ToolInvoked => "TOOL_INVOKED",
            TurnState::ToolReturned => "TOOL_RETURNED",
            TurnState::FinalTextReady => "FINAL_TEXT_READY",
            TurnState::Failed => "FAILED",
        }
    }
}

impl fmt::Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validate that a state transition is allowed.
pub fn validate_transition(from: TurnState, to: TurnState) -> Result<(), ChatError> {
    use TurnState::*;

    let valid = matches!(
        (from, to),
        (AwaitingInput, Dispatched)
            | (Dispatched, ToolInvoked)
            | (Dispatched, FinalTextReady)
            | (Dispatched, Failed)
            | (ToolInvoked, ToolReturned)
            | (ToolReturned, ToolInvoked)
            | (ToolReturned, FinalTextReady)
            | (ToolReturned, Failed)
            | (FinalTextReady, AwaitingInput)
            | (Failed, AwaitingInput)
    );

    if valid {
        Ok(())
    } else {
        Err(ChatError::InvalidTransition(from, to))
    }
}

/// Current state of one turn plus every state it has passed through.
#[derive(Debug, Clone)]
pub struct TurnTracker {
    trail: Vec<TurnState>,
}

impl TurnTracker {
    pub fn new() -> Self {
        Self {
            trail: vec![TurnState::AwaitingInput],
        }
    }

    pub fn state(&self) -> TurnState {
        // The trail always holds at least the initial state.
        self.trail
            .last()
            .copied()
            .unwrap_or(TurnState::AwaitingInput)
    }

    pub fn advance(&mut self, to: TurnState) -> Result<(), ChatError> {
        validate_transition(self.state(), to)?;
        tracing::trace!(from = %self.state(), to = %to, "Turn transition");
        self.trail.push(to);
        Ok(())
    }

    pub fn trail(&self) -> &[TurnState] {
        &self.trail
    }

    pub fn into_trail(self) -> Vec<TurnState> {
        self.trail
    }
}

impl Default for TurnTracker {
    fn default() -> Self {
        Self::new()
    }
}
