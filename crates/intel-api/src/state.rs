//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{watch, Mutex};

use intel_chat::{ConversationOrchestrator, Session, SessionSummary};
use intel_core::config::IntelConfig;
use intel_core::types::ChatMessage;

/// Copy of the committed session state, readable while a turn holds the lock.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub summary: SessionSummary,
    pub transcript: Vec<ChatMessage>,
}

impl SessionSnapshot {
    pub fn of(session: &Session) -> Self {
        Self {
            summary: session.summary(),
            transcript: session.transcript().to_vec(),
        }
    }
}

/// Shared application state.
///
/// Cloned per request; the session mutex serialises turns so at most one
/// is in flight. Read-only endpoints use the snapshot instead of the lock.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<IntelConfig>,
    pub session: Arc<Mutex<Session>>,
    pub snapshot: Arc<watch::Sender<SessionSnapshot>>,
    pub orchestrator: Arc<ConversationOrchestrator>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: IntelConfig, orchestrator: ConversationOrchestrator) -> Self {
        let session = Session::new();
        let (snapshot, _) = watch::channel(SessionSnapshot::of(&session));
        Self {
            config: Arc::new(config),
            session: Arc::new(Mutex::new(session)),
            snapshot: Arc::new(snapshot),
            orchestrator: Arc::new(orchestrator),
            start_time: Instant::now(),
        }
    }

    /// Refresh the snapshot; call while still holding the session lock.
    pub fn publish(&self, session: &Session) {
        self.snapshot.send_replace(SessionSnapshot::of(session));
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }
}
