// Summarization and persistence tests

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::{FakeBackend, SummaryReply};
use voice_coach::finalizer::{
    ActionRecord, HttpSummarizer, RestStore, SessionRecord, SessionStore, SessionSummary,
    Summarizer,
};
use voice_coach::{Error, Result, SessionFinalizer, Speaker, Turn};

fn transcript(turns: usize) -> Vec<Turn> {
    (0..turns)
        .map(|i| {
            let speaker = if i % 2 == 0 { Speaker::User } else { Speaker::Agent };
            Turn::new(speaker, format!("utterance {}", i))
        })
        .collect()
}

/// Store whose action inserts fail; counts every call
#[derive(Default)]
struct FlakyStore {
    action_calls: AtomicUsize,
    session_calls: AtomicUsize,
}

#[async_trait::async_trait]
impl SessionStore for FlakyStore {
    async fn insert_action(&self, _record: &ActionRecord) -> Result<()> {
        self.action_calls.fetch_add(1, Ordering::SeqCst);
        Err(Error::Finalization("actions table unavailable".to_string()))
    }

    async fn insert_session(&self, _record: &SessionRecord) -> Result<()> {
        self.session_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Summarizer that always answers with the same summary
struct FixedSummarizer(SessionSummary);

#[async_trait::async_trait]
impl Summarizer for FixedSummarizer {
    async fn summarize(&self, _transcript: &[Turn], _user_id: Option<&str>) -> Result<SessionSummary> {
        Ok(self.0.clone())
    }
}

#[tokio::test]
async fn test_http_summarizer_decodes_response() {
    let backend = FakeBackend::start().await;
    let summarizer = HttpSummarizer::new(backend.url("/summarize"));

    let summary = summarizer.summarize(&transcript(4), Some("user-9")).await.unwrap();
    assert_eq!(summary.session_topic, "Work motivation");
    assert_eq!(summary.actions.len(), 2);
    assert_eq!(summary.key_insights.len(), 1);

    let request = backend.state.last_summarize_request.lock().unwrap().clone().unwrap();
    assert_eq!(request["transcript"].as_array().unwrap().len(), 4);
    assert_eq!(request["transcript"][1]["speaker"], "agent");
    assert_eq!(request["transcript"][1]["text"], "utterance 1");
}

#[tokio::test]
async fn test_http_summarizer_error_status() {
    let backend = FakeBackend::start().await;
    backend.set_summary_reply(SummaryReply::Status(502));
    let summarizer = HttpSummarizer::new(backend.url("/summarize"));

    let result = summarizer.summarize(&transcript(2), None).await;
    assert!(matches!(result, Err(Error::Finalization(_))));
}

#[tokio::test]
async fn test_http_summarizer_accepts_summary_text_alias() {
    let backend = FakeBackend::start().await;
    backend.set_summary_reply(SummaryReply::Body(
        r#"{"summaryText":"Short chat","sessionTopic":"Check-in"}"#.to_string(),
    ));
    let summarizer = HttpSummarizer::new(backend.url("/summarize"));

    let summary = summarizer.summarize(&transcript(2), None).await.unwrap();
    assert_eq!(summary.summary, "Short chat");
    assert_eq!(summary.session_topic, "Check-in");
    assert!(summary.actions.is_empty());
}

#[tokio::test]
async fn test_rest_store_inserts_rows() {
    let backend = FakeBackend::start().await;
    let store = RestStore::new(format!("{}/", backend.url("/store")), Some("anon-key".to_string()));

    store
        .insert_session(&SessionRecord {
            user_id: "user-1".to_string(),
            kind: "voice".to_string(),
            topic: "Sleep".to_string(),
            summary: "Talked about evenings".to_string(),
            key_insights: vec!["Screens late at night".to_string()],
            drama_patterns: Vec::new(),
            compassion_shift: String::new(),
            duration_minutes: 3,
        })
        .await
        .unwrap();

    let rows = backend.session_rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["type"], "voice");
    assert_eq!(rows[0]["duration_minutes"], 3);
    assert_eq!(rows[0]["key_insights"][0], "Screens late at night");
}

#[tokio::test]
async fn test_rest_store_unreachable() {
    let store = RestStore::new("http://127.0.0.1:1/rest", None);
    let result = store
        .insert_action(&ActionRecord {
            user_id: "u".to_string(),
            action: "a".to_string(),
            timeline: String::new(),
            accountability: String::new(),
            session_topic: "t".to_string(),
            completed: false,
        })
        .await;
    assert!(matches!(result, Err(Error::Finalization(_))));
}

#[tokio::test]
async fn test_finalize_skips_short_transcripts() {
    let backend = FakeBackend::start().await;
    let finalizer = SessionFinalizer::new(Arc::new(HttpSummarizer::new(backend.url("/summarize"))), None);

    assert!(finalizer.finalize(&transcript(0), Some("u")).await.is_none());
    assert!(finalizer.finalize(&transcript(1), Some("u")).await.is_none());
    assert_eq!(backend.summarize_calls(), 0);
}

#[tokio::test]
async fn test_finalize_persists_every_action_then_session() {
    let backend = FakeBackend::start().await;
    let store = Arc::new(RestStore::new(backend.url("/store"), None));
    let finalizer = SessionFinalizer::new(
        Arc::new(HttpSummarizer::new(backend.url("/summarize"))),
        Some(store as Arc<dyn SessionStore>),
    );

    let outcome = finalizer.finalize(&transcript(5), Some("user-2")).await.unwrap();
    assert!(outcome.persisted);
    assert!(outcome.error.is_none());

    let actions = backend.action_rows();
    assert_eq!(actions.len(), 2);
    assert_eq!(actions[1]["action"], "Ask for feedback");
    assert_eq!(actions[1]["timeline"], "This week");

    let sessions = backend.session_rows();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0]["user_id"], "user-2");
    assert_eq!(sessions[0]["duration_minutes"], 3);
}

#[tokio::test]
async fn test_failed_action_insert_does_not_block_session_row() {
    // Setup: summary with two actions, action table down
    let summary = SessionSummary {
        actions: serde_json::from_str(
            r#"[{"action":"Walk daily"},{"action":"Journal","timeline":"Evenings"}]"#,
        )
        .unwrap(),
        ..SessionSummary::default()
    };
    let store = Arc::new(FlakyStore::default());
    let finalizer = SessionFinalizer::new(
        Arc::new(FixedSummarizer(summary)),
        Some(store.clone() as Arc<dyn SessionStore>),
    );

    let outcome = finalizer.finalize(&transcript(2), Some("user-3")).await.unwrap();
    assert!(!outcome.persisted);
    assert!(outcome.error.unwrap().contains("actions table unavailable"));
    assert!(outcome.summary.is_some());

    assert_eq!(store.action_calls.load(Ordering::SeqCst), 2);
    assert_eq!(store.session_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_anonymous_user_never_touches_store() {
    let store = Arc::new(FlakyStore::default());
    let finalizer = SessionFinalizer::new(
        Arc::new(FixedSummarizer(SessionSummary::default())),
        Some(store.clone() as Arc<dyn SessionStore>),
    );

    let outcome = finalizer.finalize(&transcript(3), None).await.unwrap();
    assert!(!outcome.persisted);
    assert!(outcome.error.is_none());
    assert_eq!(store.action_calls.load(Ordering::SeqCst), 0);
    assert_eq!(store.session_calls.load(Ordering::SeqCst), 0);
}
