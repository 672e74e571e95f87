use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Error, Result};

/// Pending action row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub user_id: String,
    pub action: String,
    pub timeline: String,
    pub accountability: String,
    pub session_topic: String,
    pub completed: bool,
}

/// Coaching session row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub topic: String,
    pub summary: String,
    pub key_insights: Vec<String>,
    pub drama_patterns: Vec<String>,
    pub compassion_shift: String,
    pub duration_minutes: u32,
}

/// External persistent storage for coaching artifacts
///
/// Created once at startup and injected into the finalizer. Writes are
/// fire-and-forget from the session's point of view.
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert_action(&self, record: &ActionRecord) -> Result<()>;

    async fn insert_session(&self, record: &SessionRecord) -> Result<()>;
}

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// REST table API (PostgREST style: `POST {base}/{table}`)
pub struct RestStore {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl RestStore {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http: client(REQUEST_TIMEOUT),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// Replace the per-request timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.http = client(timeout);
        self
    }

    async fn insert<T: Serialize + Sync>(&self, table: &str, row: &T) -> Result<()> {
        let url = format!("{}/{}", self.base_url, table);
        debug!("Inserting into {}", url);

        let mut request = self
            .http
            .post(&url)
            .header("Prefer", "return=minimal")
            .json(row);
        if let Some(key) = &self.api_key {
            request = request.header("apikey", key).bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Finalization(format!("store unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Finalization(format!(
                "insert into {} returned {}",
                table, status
            )));
        }

        Ok(())
    }
}

#[async_trait::async_trait]
impl SessionStore for RestStore {
    async fn insert_action(&self, record: &ActionRecord) -> Result<()> {
        self.insert("actions", record).await
    }

    async fn insert_session(&self, record: &SessionRecord) -> Result<()> {
        self.insert("sessions", record).await
    }
}

fn client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}
