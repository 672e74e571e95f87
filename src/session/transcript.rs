use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Who produced an utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Agent,
}

/// One finalized, attributed utterance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    speaker: Speaker,
    text: String,
}

impl Turn {
    pub fn new(speaker: Speaker, text: impl Into<String>) -> Self {
        Self {
            speaker,
            text: text.into(),
        }
    }

    pub fn speaker(&self) -> Speaker {
        self.speaker
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Append-only, chronologically ordered turns of one session
///
/// Once sealed (the session left `connected/*`) further appends are refused.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    turns: Vec<Turn>,
    sealed: bool,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a final utterance; blank text and sealed transcripts are skipped
    pub fn push(&mut self, speaker: Speaker, text: &str) -> bool {
        if self.sealed {
            warn!("Dropping {:?} turn received after transcript was sealed", speaker);
            return false;
        }

        let text = text.trim();
        if text.is_empty() {
            debug!("Ignoring empty {:?} transcript", speaker);
            return false;
        }

        self.turns.push(Turn::new(speaker, text));
        true
    }

    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
