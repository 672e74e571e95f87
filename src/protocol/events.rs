use serde::Deserialize;

use crate::{Error, Result};

/// Inbound protocol events, already reduced to what the session cares about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// Relay created the realtime session
    SessionCreated,
    /// Relay acknowledged our session configuration
    SessionUpdated,
    UserSpeechStarted,
    UserSpeechStopped,
    /// Final transcript of a user utterance
    UserUtteranceTranscribed(String),
    AgentAudioStarted,
    AgentAudioDone,
    AgentTurnDone,
    /// Final transcript of an agent utterance
    AgentUtteranceTranscribed(String),
    /// Error reported by the relay; `fatal` ends the session
    ProtocolError { message: String, fatal: bool },
    /// Recognized envelope of a kind we do not act on (deltas, bookkeeping)
    Ignored(String),
}

/// Error codes after which the relay will not accept more traffic
const FATAL_ERROR_CODES: &[&str] = &["session_expired", "session_closed"];

#[derive(Debug, Deserialize)]
struct WireEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    transcript: Option<String>,
    #[serde(default)]
    error: Option<WireError>,
}

#[derive(Debug, Deserialize)]
struct WireError {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

/// Parse one raw event-channel message
///
/// Fails with `Error::Protocol` for anything that is not a typed JSON event
/// or for a transcript event without its text.
pub fn parse_event(raw: &str) -> Result<InboundEvent> {
    let wire: WireEvent = serde_json::from_str(raw)
        .map_err(|e| Error::Protocol(format!("undecodable event: {}", e)))?;

    let event = match wire.kind.as_str() {
        "session.created" => InboundEvent::SessionCreated,
        "session.updated" => InboundEvent::SessionUpdated,

        "input_audio_buffer.speech_started" => InboundEvent::UserSpeechStarted,
        "input_audio_buffer.speech_stopped" => InboundEvent::UserSpeechStopped,
        "conversation.item.input_audio_transcription.completed" => {
            InboundEvent::UserUtteranceTranscribed(require_transcript(&wire)?)
        }

        "output_audio_buffer.started" => InboundEvent::AgentAudioStarted,
        "output_audio_buffer.stopped" | "response.audio.done" | "response.output_audio.done" => {
            InboundEvent::AgentAudioDone
        }
        "response.audio_transcript.done" | "response.output_audio_transcript.done" => {
            InboundEvent::AgentUtteranceTranscribed(require_transcript(&wire)?)
        }
        "response.done" => InboundEvent::AgentTurnDone,

        "error" => {
            let (message, code) = match wire.error {
                Some(err) => (
                    err.message.unwrap_or_else(|| "unspecified relay error".to_string()),
                    err.code,
                ),
                None => ("unspecified relay error".to_string(), None),
            };
            let fatal = code
                .as_deref()
                .is_some_and(|code| FATAL_ERROR_CODES.contains(&code));
            InboundEvent::ProtocolError { message, fatal }
        }

        _ => InboundEvent::Ignored(wire.kind),
    };

    Ok(event)
}

fn require_transcript(wire: &WireEvent) -> Result<String> {
    wire.transcript
        .clone()
        .ok_or_else(|| Error::Protocol(format!("{} without transcript", wire.kind)))
}
