use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::store::{ActionRecord, SessionRecord, SessionStore};
use super::summary::{SessionSummary, Summarizer};
use crate::session::{Turn, MIN_TURNS_TO_SUMMARIZE};
use crate::Result;

/// Session type written with every session record
const SESSION_KIND: &str = "voice";

/// What finalization produced, handed to the UI as-is
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalizationOutcome {
    /// Summary, when the summarizer answered
    pub summary: Option<SessionSummary>,
    /// Whether every persistence write succeeded
    pub persisted: bool,
    /// First failure, if any
    pub error: Option<String>,
}

impl FinalizationOutcome {
    /// Nothing summarized or persisted
    pub fn failed(error: impl ToString) -> Self {
        Self {
            summary: None,
            persisted: false,
            error: Some(error.to_string()),
        }
    }
}

/// Converts a completed transcript into a persisted summary and actions
///
/// Failures are logged and reported in the outcome; they never stop the
/// session from reaching `ended`. Nothing is retried.
pub struct SessionFinalizer {
    summarizer: Arc<dyn Summarizer>,
    store: Option<Arc<dyn SessionStore>>,
}

impl SessionFinalizer {
    pub fn new(summarizer: Arc<dyn Summarizer>, store: Option<Arc<dyn SessionStore>>) -> Self {
        Self { summarizer, store }
    }

    /// Summarize and persist; `None` when the transcript is too short to bother
    pub async fn finalize(
        &self,
        transcript: &[Turn],
        user_id: Option<&str>,
    ) -> Option<FinalizationOutcome> {
        if transcript.len() < MIN_TURNS_TO_SUMMARIZE {
            info!(
                "Skipping summarization ({} turns recorded)",
                transcript.len()
            );
            return None;
        }

        let summary = match self.summarizer.summarize(transcript, user_id).await {
            Ok(summary) => summary,
            Err(e) => {
                error!("Summarization failed: {}", e);
                return Some(FinalizationOutcome::failed(e));
            }
        };

        info!("Session summarized: {}", summary.session_topic);

        let (persisted, error) = match (user_id, &self.store) {
            (Some(user_id), Some(store)) => {
                match self
                    .persist(store.as_ref(), user_id, &summary, transcript.len())
                    .await
                {
                    Ok(()) => (true, None),
                    Err(e) => {
                        error!("Failed to persist session artifacts: {}", e);
                        (false, Some(e.to_string()))
                    }
                }
            }
            _ => {
                info!("Not persisting summary (anonymous user or no store configured)");
                (false, None)
            }
        };

        Some(FinalizationOutcome {
            summary: Some(summary),
            persisted,
            error,
        })
    }

    /// Write every action, then the session row; report the first failure
    async fn persist(
        &self,
        store: &dyn SessionStore,
        user_id: &str,
        summary: &SessionSummary,
        turns: usize,
    ) -> Result<()> {
        let mut first_error = None;

        for action in &summary.actions {
            let record = ActionRecord {
                user_id: user_id.to_string(),
                action: action.action.clone(),
                timeline: action.timeline.clone(),
                accountability: action.accountability.clone(),
                session_topic: summary.session_topic.clone(),
                completed: false,
            };
            if let Err(e) = store.insert_action(&record).await {
                error!("Failed to save action '{}': {}", record.action, e);
                first_error.get_or_insert(e);
            }
        }

        let record = SessionRecord {
            user_id: user_id.to_string(),
            kind: SESSION_KIND.to_string(),
            topic: summary.session_topic.clone(),
            summary: summary.summary.clone(),
            key_insights: summary.key_insights.clone(),
            drama_patterns: summary.drama_patterns.clone(),
            compassion_shift: summary.compassion_shift.clone(),
            duration_minutes: approximate_minutes(turns),
        };
        if let Err(e) = store.insert_session(&record).await {
            error!("Failed to save session record: {}", e);
            first_error.get_or_insert(e);
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                info!(
                    "Saved session record and {} actions",
                    summary.actions.len()
                );
                Ok(())
            }
        }
    }
}

/// Rough duration: one minute per exchange (user + agent turn), at least one
pub fn approximate_minutes(turns: usize) -> u32 {
    u32::try_from(turns.div_ceil(2)).unwrap_or(u32::MAX).max(1)
}
