use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::audio::CaptureConstraints;

/// Server-side voice activity detection tuning
///
/// These are tunable parameters, not behavioral contracts; deployments
/// differ in how eagerly they want the agent to take its turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TurnDetection {
    /// Activation threshold (0.0 to 1.0); higher needs louder speech
    pub threshold: f32,

    /// Audio kept before detected speech, in milliseconds
    pub prefix_padding_ms: u32,

    /// Silence that ends a user turn, in milliseconds
    pub silence_duration_ms: u32,
}

impl Default for TurnDetection {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            prefix_padding_ms: 300,
            silence_duration_ms: 500,
        }
    }
}

/// Per-session tuning shared by every session a controller starts
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Upper bound on microphone + credential + negotiation
    pub connect_timeout: Duration,

    /// Upper bound on summarization + persistence after a session ends
    pub finalize_timeout: Duration,

    /// Extra wait between the relay's session acknowledgment and the greeting
    pub greeting_delay: Duration,

    /// Agent voice name
    pub voice: String,

    /// Model used by the relay to transcribe user audio
    pub transcription_model: String,

    pub turn_detection: TurnDetection,

    pub capture: CaptureConstraints,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(15),
            finalize_timeout: Duration::from_secs(60),
            greeting_delay: Duration::ZERO,
            voice: "alloy".to_string(),
            transcription_model: "whisper-1".to_string(),
            turn_detection: TurnDetection::default(),
            capture: CaptureConstraints::default(),
        }
    }
}
