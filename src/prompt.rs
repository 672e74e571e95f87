//! Coaching instructions handed to the remote agent
//!
//! The instruction text is owned by whoever deploys the coach; the session
//! core only forwards it. The one thing added here is the language directive.

use std::path::Path;

use tracing::info;

use crate::{Error, Result};

const DEFAULT_INSTRUCTIONS: &str = "You are a warm, compassionate life coach. \
Listen closely, reflect back what you hear, and ask one open question at a time. \
Help the user notice unhelpful patterns and commit to small, concrete next steps.";

/// Source of the coaching prompt
#[derive(Debug, Clone)]
pub struct CoachingPrompt {
    base: String,
}

impl Default for CoachingPrompt {
    fn default() -> Self {
        Self::new(DEFAULT_INSTRUCTIONS)
    }
}

impl CoachingPrompt {
    pub fn new(base: impl Into<String>) -> Self {
        Self { base: base.into() }
    }

    /// Load from a text file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let base = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read instructions {}: {}", path.display(), e))
        })?;

        info!("Loaded coaching instructions from {}", path.display());
        Ok(Self::new(base.trim().to_string()))
    }

    /// Instructions for a session held in `language`
    pub fn instructions(&self, language: &str) -> String {
        format!(
            "{}\n\nAlways respond in the language with code '{}'.",
            self.base, language
        )
    }
}
