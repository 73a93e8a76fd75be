//! State of one interactive session.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use intel_core::types::{ChatMessage, EvidenceRecord};
use intel_engine::RateWindow;

/// Transcript, latest evidence and rate window of one session.
///
/// The orchestrator takes it by `&mut` for the duration of a turn; nothing
/// else holds it.
#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    started_at: DateTime<Utc>,
    transcript: Vec<ChatMessage>,
    evidence: Option<EvidenceRecord>,
    /// Bumped on every store, so callers can tell a fresh record from the
    /// one they saw before a turn.
    evidence_revision: u64,
    rate_window: RateWindow,
}

/// Lightweight view for status endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub message_count: usize,
    pub has_evidence: bool,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            transcript: Vec::new(),
            evidence: None,
            evidence_revision: 0,
            rate_window: RateWindow::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    pub fn evidence(&self) -> Option<&EvidenceRecord> {
        self.evidence.as_ref()
    }

    pub fn evidence_revision(&self) -> u64 {
        self.evidence_revision
    }

    pub fn rate_window(&self) -> &RateWindow {
        &self.rate_window
    }

    pub(crate) fn rate_window_mut(&mut self) -> &mut RateWindow {
        &mut self.rate_window
    }

    /// Replace the evidence slot wholesale.
    pub(crate) fn store_evidence(&mut self, record: EvidenceRecord) {
        self.evidence = Some(record);
        self.evidence_revision += 1;
    }

    /// Append a completed exchange. Both messages land together or not at all.
    pub(crate) fn commit_exchange(&mut self, user: ChatMessage, assistant: ChatMessage) {
        self.transcript.push(user);
        self.transcript.push(assistant);
    }

    /// Start over: new id, empty transcript, no evidence, fresh rate window.
    pub fn reset(&mut self) {
        let previous = self.id;
        *self = Self::new();
        tracing::info!(previous = %previous, session = %self.id, "Session reset");
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id,
            started_at: self.started_at,
            message_count: self.transcript.len(),
            has_evidence: self.evidence.is_some(),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
