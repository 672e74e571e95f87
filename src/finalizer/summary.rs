use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::session::Turn;
use crate::{Error, Result};

/// One action the user committed to during the session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommittedAction {
    pub action: String,
    #[serde(default)]
    pub timeline: String,
    #[serde(default)]
    pub accountability: String,
}

/// Output of the summarization collaborator, routed on without reinterpretation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionSummary {
    #[serde(alias = "summaryText")]
    pub summary: String,
    pub key_insights: Vec<String>,
    pub drama_patterns: Vec<String>,
    pub compassion_shift: String,
    pub actions: Vec<CommittedAction>,
    pub session_topic: String,
}

impl Default for SessionSummary {
    /// The safe default used when the summarizer answers with garbage
    fn default() -> Self {
        Self {
            summary: "Session completed".to_string(),
            key_insights: Vec::new(),
            drama_patterns: Vec::new(),
            compassion_shift: String::new(),
            actions: Vec::new(),
            session_topic: "Coaching Session".to_string(),
        }
    }
}

impl SessionSummary {
    /// Decode a summarizer response body, degrading to the safe default
    pub fn from_response_body(body: &str) -> Self {
        match serde_json::from_str(body) {
            Ok(summary) => summary,
            Err(e) => {
                warn!("Summarizer returned malformed JSON, using default summary: {}", e);
                Self::default()
            }
        }
    }
}

/// Turns a finished transcript into a [`SessionSummary`]
#[async_trait::async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, transcript: &[Turn], user_id: Option<&str>) -> Result<SessionSummary>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SummarizeRequest<'a> {
    transcript: &'a [Turn],
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<&'a str>,
}

/// Default per-request bound; summaries come from a language model
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Summarization endpoint reached over HTTP
pub struct HttpSummarizer {
    http: reqwest::Client,
    url: String,
}

impl HttpSummarizer {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http: client(REQUEST_TIMEOUT),
            url: url.into(),
        }
    }

    /// Replace the per-request timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.http = client(timeout);
        self
    }
}

fn client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

#[async_trait::async_trait]
impl Summarizer for HttpSummarizer {
    async fn summarize(&self, transcript: &[Turn], user_id: Option<&str>) -> Result<SessionSummary> {
        info!("Summarizing {} turns via {}", transcript.len(), self.url);

        let response = self
            .http
            .post(&self.url)
            .json(&SummarizeRequest {
                transcript,
                user_id,
            })
            .send()
            .await
            .map_err(|e| Error::Finalization(format!("summarizer unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Finalization(format!("summarizer returned {}", status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::Finalization(format!("unreadable summary: {}", e)))?;

        Ok(SessionSummary::from_response_body(&body))
    }
}
