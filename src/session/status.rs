use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::SessionState;
use crate::finalizer::FinalizationOutcome;

/// Snapshot of the session as seen by presentation code
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStatus {
    /// Current state machine value
    pub state: SessionState,

    /// Active (or most recent) session identifier
    pub session_id: Option<String>,

    /// Coaching language of that session
    pub language: Option<String>,

    /// Whether microphone transmission is paused
    pub muted: bool,

    /// Whether agent audio is rendered
    pub speaker_enabled: bool,

    /// Number of transcript turns recorded so far
    pub turns: usize,

    /// Human-readable status line
    pub message: String,

    /// Most recent connect or session error
    pub last_error: Option<String>,

    /// Result of the last finalization, routed to the UI as-is
    pub last_summary: Option<FinalizationOutcome>,

    /// When this snapshot was produced
    pub updated_at: DateTime<Utc>,
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self {
            state: SessionState::Idle,
            session_id: None,
            language: None,
            muted: false,
            speaker_enabled: true,
            turns: 0,
            message: SessionState::Idle.describe().to_string(),
            last_error: None,
            last_summary: None,
            updated_at: Utc::now(),
        }
    }
}
