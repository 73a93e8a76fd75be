//! Conversational core of partner-intel.
//!
//! Holds the per-session state, the completion-client seam with its Gemini
//! implementation, the engine tool, and the orchestrator that runs the
//! explicit tool-calling loop for each user turn.

pub mod error;
pub mod llm;
pub mod orchestrator;
pub mod prompt;
pub mod session;
pub mod tools;
pub mod turn;

pub use error::{ChatError, LlmError};
pub use llm::gemini::GeminiClient;
pub use llm::{
    CompletionClient, CompletionReply, CompletionRequest, ConversationItem, ToolCall,
    ToolDeclaration,
};
pub use orchestrator::{ConversationOrchestrator, TurnOutcome, MAX_MESSAGE_LENGTH};
pub use session::{Session, SessionSummary};
pub use tools::{EngineTool, ToolInvocation, ToolOutcome, ENGINE_TOOL_NAME};
pub use turn::{TurnState, TurnTracker};
