use serde::Serialize;

use crate::session::{SessionOptions, TurnDetection};

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum OutboundMessage<'a> {
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionConfig<'a> },
    #[serde(rename = "response.create")]
    ResponseCreate { response: ResponseConfig },
}

#[derive(Debug, Serialize)]
struct SessionConfig<'a> {
    instructions: &'a str,
    voice: &'a str,
    modalities: [&'static str; 2],
    input_audio_transcription: TranscriptionConfig<'a>,
    turn_detection: VadConfig<'a>,
}

#[derive(Debug, Serialize)]
struct TranscriptionConfig<'a> {
    model: &'a str,
}

#[derive(Debug, Serialize)]
struct VadConfig<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(flatten)]
    tuning: &'a TurnDetection,
}

#[derive(Debug, Serialize)]
struct ResponseConfig {
    modalities: [&'static str; 2],
}

/// `session.update` carrying the coaching instructions and turn-taking tuning
pub fn session_update(instructions: &str, options: &SessionOptions) -> String {
    let message = OutboundMessage::SessionUpdate {
        session: SessionConfig {
            instructions,
            voice: &options.voice,
            modalities: ["audio", "text"],
            input_audio_transcription: TranscriptionConfig {
                model: &options.transcription_model,
            },
            turn_detection: VadConfig {
                kind: "server_vad",
                tuning: &options.turn_detection,
            },
        },
    };
    to_json(&message)
}

/// `response.create` asking the agent to open the conversation
pub fn greeting() -> String {
    to_json(&OutboundMessage::ResponseCreate {
        response: ResponseConfig {
            modalities: ["audio", "text"],
        },
    })
}

fn to_json(message: &OutboundMessage<'_>) -> String {
    // Plain structs of strings and numbers always serialize
    serde_json::to_string(message).unwrap_or_default()
}
