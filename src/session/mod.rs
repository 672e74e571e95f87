//! Realtime voice session model
//!
//! This module provides the pieces a session is made of:
//! - The session state machine (`idle` → `connecting` → `connected/*` → `summarizing` → `ended`)
//! - The append-only transcript of attributed turns
//! - Connection resources and their idempotent release
//! - The status snapshot published to presentation code

mod config;
mod session;
mod state;
mod status;
mod transcript;

pub use config::{SessionOptions, TurnDetection};
pub use session::{ConnectionResources, Session};
pub use state::{ConnectedPhase, SessionState, Trigger, MIN_TURNS_TO_SUMMARIZE};
pub use status::SessionStatus;
pub use transcript::{Speaker, Transcript, Turn};
