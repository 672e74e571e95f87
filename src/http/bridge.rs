//! Websocket audio bridge
//!
//! A presentation client holding the real microphone and speakers streams
//! encoded Opus frames in as binary messages and receives agent audio back
//! the same way. Attaching a client is what makes the microphone available.

use super::state::AppState;
use crate::audio::MediaFrame;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

/// GET /session/audio
pub async fn audio_socket(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| run_bridge(socket, state))
}

async fn run_bridge(socket: WebSocket, state: AppState) {
    // Subscribe before attaching so an attached producer always hears playback
    let mut playback = state.playback.subscribe();
    let feeder = state.microphone.attach();
    let (mut outgoing, mut incoming) = socket.split();

    let frame_ms = state.frame_duration_ms;
    let mut timestamp_ms: u64 = 0;
    let mut dropped: u64 = 0;

    info!("Audio bridge client connected");

    loop {
        tokio::select! {
            message = incoming.next() => match message {
                Some(Ok(Message::Binary(payload))) => {
                    let frame = MediaFrame {
                        payload,
                        duration_ms: frame_ms,
                        timestamp_ms,
                    };
                    timestamp_ms += u64::from(frame_ms);
                    if !feeder.push(frame) {
                        dropped += 1;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("Audio bridge receive error: {}", e);
                    break;
                }
            },
            packet = playback.recv() => match packet {
                Ok(payload) => {
                    if let Err(e) = outgoing.send(Message::Binary(payload)).await {
                        debug!("Audio bridge send failed: {}", e);
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!("Audio bridge lagged, skipped {} packets", skipped);
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    info!(
        "Audio bridge client disconnected ({} frames received, {} dropped)",
        timestamp_ms / u64::from(frame_ms.max(1)),
        dropped
    );
}
