//! Session finalization: summarize the transcript, persist the artifacts

mod finalizer;
mod store;
mod summary;

pub use finalizer::{approximate_minutes, FinalizationOutcome, SessionFinalizer};
pub use store::{ActionRecord, RestStore, SessionRecord, SessionStore};
pub use summary::{CommittedAction, HttpSummarizer, SessionSummary, Summarizer};
