use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Sub-state while the transport is up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectedPhase {
    Listening,
    UserSpeaking,
    AgentSpeaking,
    Processing,
}

/// Externally observable session status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Connecting,
    Connected(ConnectedPhase),
    Summarizing,
    Ended,
}

/// Everything that can move the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    ConnectRequested,
    NegotiationSucceeded,
    /// Negotiation failed, timed out or was cancelled
    ConnectAborted,
    UserSpeechStarted,
    UserSpeechStopped,
    AgentAudioStarted,
    AgentAudioDone,
    AgentTurnDone,
    /// User disconnect or transport loss, with the transcript length at that moment
    Disconnect { turns: usize },
    FinalizerCompleted,
}

/// Minimum transcript length worth summarizing
pub const MIN_TURNS_TO_SUMMARIZE: usize = 2;

impl SessionState {
    /// Next state for `trigger`, or `None` when the trigger does not apply
    ///
    /// Inside `connected/*` the speaking signals are independent tracks: the
    /// phase follows the most recent one, so a barge-in moves straight to
    /// `UserSpeaking` and agent audio is never suppressed.
    pub fn next(self, trigger: Trigger) -> Option<SessionState> {
        use ConnectedPhase::*;
        use SessionState::*;

        match (self, trigger) {
            (Idle | Ended, Trigger::ConnectRequested) => Some(Connecting),
            (Connecting, Trigger::NegotiationSucceeded) => Some(Connected(Listening)),
            (Connecting, Trigger::ConnectAborted) => Some(Idle),

            (Connected(phase), Trigger::UserSpeechStarted) if phase != UserSpeaking => {
                Some(Connected(UserSpeaking))
            }
            (Connected(phase), Trigger::UserSpeechStopped) if phase != Processing => {
                Some(Connected(Processing))
            }
            (Connected(phase), Trigger::AgentAudioStarted) if phase != AgentSpeaking => {
                Some(Connected(AgentSpeaking))
            }
            (Connected(phase), Trigger::AgentTurnDone) if phase != Listening => {
                Some(Connected(Listening))
            }
            (Connected(_), Trigger::Disconnect { turns }) => {
                if turns >= MIN_TURNS_TO_SUMMARIZE {
                    Some(Summarizing)
                } else {
                    Some(Ended)
                }
            }

            (Summarizing, Trigger::FinalizerCompleted) => Some(Ended),
            _ => None,
        }
    }

    pub fn is_connected(self) -> bool {
        matches!(self, SessionState::Connected(_))
    }

    /// Human-readable status line for the presentation layer
    pub fn describe(self) -> &'static str {
        match self {
            SessionState::Idle => "Ready",
            SessionState::Connecting => "Connecting...",
            SessionState::Connected(ConnectedPhase::Listening) => "Listening",
            SessionState::Connected(ConnectedPhase::UserSpeaking) => "Listening to you...",
            SessionState::Connected(ConnectedPhase::Processing) => "Thinking...",
            SessionState::Connected(ConnectedPhase::AgentSpeaking) => "Coach is speaking",
            SessionState::Summarizing => "Summarizing session...",
            SessionState::Ended => "Session ended",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Connecting => "connecting",
            SessionState::Connected(ConnectedPhase::Listening) => "connected/listening",
            SessionState::Connected(ConnectedPhase::UserSpeaking) => "connected/userSpeaking",
            SessionState::Connected(ConnectedPhase::AgentSpeaking) => "connected/agentSpeaking",
            SessionState::Connected(ConnectedPhase::Processing) => "connected/processing",
            SessionState::Summarizing => "summarizing",
            SessionState::Ended => "ended",
        };
        f.write_str(name)
    }
}

impl FromStr for SessionState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(SessionState::Idle),
            "connecting" => Ok(SessionState::Connecting),
            "connected/listening" => Ok(SessionState::Connected(ConnectedPhase::Listening)),
            "connected/userSpeaking" => Ok(SessionState::Connected(ConnectedPhase::UserSpeaking)),
            "connected/agentSpeaking" => Ok(SessionState::Connected(ConnectedPhase::AgentSpeaking)),
            "connected/processing" => Ok(SessionState::Connected(ConnectedPhase::Processing)),
            "summarizing" => Ok(SessionState::Summarizing),
            "ended" => Ok(SessionState::Ended),
            other => Err(format!("unknown session state: {}", other)),
        }
    }
}

impl Serialize for SessionState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SessionState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
