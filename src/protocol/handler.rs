use tracing::{debug, error, warn};

use super::events::{parse_event, InboundEvent};
use crate::session::{Session, Speaker, Trigger};

/// What the controller must do after an event was applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    None,
    /// Send the greeting trigger (once per session)
    Greet,
    /// The relay reported a connection-level error; tear the session down
    Teardown(String),
}

/// Interprets inbound events for one session
///
/// Drives the state machine and appends transcript turns. Runs on the
/// controller's single consumer loop, so events are applied strictly in
/// arrival order.
#[derive(Debug, Default)]
pub struct EventHandler {
    greeted: bool,
}

impl EventHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and apply one raw message; undecodable messages are logged and dropped
    pub fn handle_message(&mut self, raw: &str, session: &mut Session) -> Effect {
        match parse_event(raw) {
            Ok(event) => self.apply(event, session),
            Err(e) => {
                warn!("Session {}: ignoring event: {}", session.id(), e);
                Effect::None
            }
        }
    }

    pub fn apply(&mut self, event: InboundEvent, session: &mut Session) -> Effect {
        debug!("Session {}: inbound {:?}", session.id(), event);

        match event {
            InboundEvent::SessionCreated => Effect::None,
            InboundEvent::SessionUpdated => {
                if self.greeted {
                    Effect::None
                } else {
                    self.greeted = true;
                    Effect::Greet
                }
            }

            InboundEvent::UserSpeechStarted => transition(session, Trigger::UserSpeechStarted),
            InboundEvent::UserSpeechStopped => transition(session, Trigger::UserSpeechStopped),
            InboundEvent::AgentAudioStarted => transition(session, Trigger::AgentAudioStarted),
            InboundEvent::AgentAudioDone => transition(session, Trigger::AgentAudioDone),
            InboundEvent::AgentTurnDone => transition(session, Trigger::AgentTurnDone),

            InboundEvent::UserUtteranceTranscribed(text) => {
                session.record_turn(Speaker::User, &text);
                Effect::None
            }
            InboundEvent::AgentUtteranceTranscribed(text) => {
                session.record_turn(Speaker::Agent, &text);
                Effect::None
            }

            InboundEvent::ProtocolError { message, fatal } => {
                if fatal {
                    error!("Session {}: fatal relay error: {}", session.id(), message);
                    Effect::Teardown(message)
                } else {
                    warn!("Session {}: relay error: {}", session.id(), message);
                    Effect::None
                }
            }

            InboundEvent::Ignored(_) => Effect::None,
        }
    }
}

fn transition(session: &mut Session, trigger: Trigger) -> Effect {
    session.transition(trigger);
    Effect::None
}
