use crate::audio::{BroadcastSink, PushDevice};
use crate::controller::SessionHandle;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Control surface of the session controller
    pub session: SessionHandle,

    /// Microphone fed by audio bridge clients
    pub microphone: PushDevice,

    /// Agent audio fanned out to audio bridge clients
    pub playback: BroadcastSink,

    /// Language used when a connect request names none
    pub default_language: String,

    /// Duration of each binary frame a bridge client sends
    pub frame_duration_ms: u32,
}

impl AppState {
    pub fn new(
        session: SessionHandle,
        microphone: PushDevice,
        playback: BroadcastSink,
        default_language: impl Into<String>,
    ) -> Self {
        Self {
            session,
            microphone,
            playback,
            default_language: default_language.into(),
            frame_duration_ms: 20,
        }
    }

    pub fn with_frame_duration(mut self, frame_duration_ms: u32) -> Self {
        self.frame_duration_ms = frame_duration_ms.max(1);
        self
    }
}
