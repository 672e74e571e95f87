//! HTTP API server for the presentation layer
//!
//! This module exposes the session controller over REST:
//! - POST /session/connect - Start a session
//! - POST /session/disconnect - End (or cancel) the session
//! - POST /session/mute - Toggle microphone transmission
//! - POST /session/speaker - Toggle agent audio
//! - GET /session/status - Current status snapshot
//! - GET /session/events - Status snapshots as server-sent events
//! - GET /session/transcript - Transcript of the current or last session
//! - GET /session/audio - Websocket audio bridge (Opus frames both ways)
//! - GET /health - Health check

mod bridge;
mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
