use super::state::{SessionState, Trigger};
use super::transcript::{Speaker, Transcript};
use crate::audio::MediaCaptureGuard;
use crate::transport::Transport;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One realtime voice exchange
///
/// Language and user are fixed when the session is created; the transcript
/// only grows while the session is in a `connected/*` state.
pub struct Session {
    /// Unique session identifier
    id: String,

    /// Coaching language code
    language: String,

    /// Authenticated user, if any
    user_id: Option<String>,

    /// When the user asked to connect
    started_at: DateTime<Utc>,

    state: SessionState,

    transcript: Transcript,
}

impl Session {
    pub fn new(language: impl Into<String>, user_id: Option<String>) -> Self {
        Self {
            id: format!("session-{}", uuid::Uuid::new_v4()),
            language: language.into(),
            user_id,
            started_at: Utc::now(),
            state: SessionState::Idle,
            transcript: Transcript::new(),
        }
    }

    /// Apply a trigger; returns whether the state changed
    pub fn transition(&mut self, trigger: Trigger) -> bool {
        let Some(next) = self.state.next(trigger) else {
            debug!("Session {}: {:?} ignored in {}", self.id, trigger, self.state);
            return false;
        };

        info!("Session {}: {} -> {}", self.id, self.state, next);

        if self.state.is_connected() && !next.is_connected() {
            self.transcript.seal();
        }
        self.state = next;
        true
    }

    /// Append a final utterance while connected
    pub fn record_turn(&mut self, speaker: Speaker, text: &str) -> bool {
        if !self.state.is_connected() {
            warn!(
                "Session {}: {:?} turn outside a connected state ({})",
                self.id, speaker, self.state
            );
            return false;
        }

        let appended = self.transcript.push(speaker, text);
        if appended {
            info!(
                "Session {}: turn #{} from {:?}",
                self.id,
                self.transcript.len(),
                speaker
            );
        }
        appended
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }
}

/// The physical handles of one connected session
///
/// At most one set exists per session. Only teardown releases it, and
/// release is idempotent so overlapping disconnect triggers are harmless.
pub struct ConnectionResources {
    capture: MediaCaptureGuard,
    transport: Option<Arc<dyn Transport>>,
}

impl ConnectionResources {
    pub fn new(capture: MediaCaptureGuard, transport: Arc<dyn Transport>) -> Self {
        Self {
            capture,
            transport: Some(transport),
        }
    }

    pub fn transport(&self) -> Option<&Arc<dyn Transport>> {
        self.transport.as_ref()
    }

    pub fn set_muted(&self, muted: bool) {
        self.capture.set_enabled(!muted);
    }

    pub fn is_muted(&self) -> bool {
        !self.capture.is_enabled()
    }

    /// Close the transport and stop the microphone
    pub async fn release(&mut self) {
        if let Some(transport) = self.transport.take() {
            transport.close().await;
        }
        self.capture.release();
    }

    pub fn is_released(&self) -> bool {
        self.transport.is_none() && !self.capture.is_acquired()
    }
}
