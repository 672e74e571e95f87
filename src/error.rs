//! Error types for the voice coaching session core

use std::time::Duration;

use thiserror::Error;

/// Result type alias for session operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while running a realtime voice session
#[derive(Debug, Error)]
pub enum Error {
    /// Microphone permission denied or no input device
    #[error("microphone unavailable: {0}")]
    DeviceUnavailable(String),

    /// Credential endpoint unreachable or returned non-success
    #[error("credential error: {0}")]
    Credential(String),

    /// Relay rejected the offer or returned a malformed answer
    #[error("negotiation error: {0}")]
    Negotiation(String),

    /// A single inbound event could not be understood
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Transport failed or closed underneath the session
    #[error("transport error: {0}")]
    Transport(String),

    /// Summarization or persistence failed
    #[error("finalization error: {0}")]
    Finalization(String),

    /// Connect phase did not finish in time
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Control command not valid in the current state
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Session controller has shut down
    #[error("session controller stopped")]
    ControllerStopped,

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// WebRTC stack error
    #[error("webrtc error: {0}")]
    WebRtc(#[from] webrtc::Error),
}

impl Error {
    /// Whether this error belongs to the connect phase and aborts the attempt
    #[must_use]
    pub const fn is_connect_phase(&self) -> bool {
        matches!(
            self,
            Self::DeviceUnavailable(_)
                | Self::Credential(_)
                | Self::Negotiation(_)
                | Self::Timeout(_)
                | Self::WebRtc(_)
        )
    }
}
