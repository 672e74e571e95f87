use std::sync::Arc;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use tracing::{info, warn};

use super::credential::{Credential, CredentialRequest, CredentialResponse};
use crate::audio::{CaptureHandle, SpeakerOutput};
use crate::transport::{EventSender, Transport, TransportConnector};
use crate::{Error, Result};

/// Where and how to negotiate
#[derive(Debug, Clone)]
pub struct SignalingConfig {
    /// Token-issuing endpoint
    pub credential_url: String,

    /// Relay used when the credential response does not name one
    pub default_relay: Option<String>,

    /// Realtime model requested from the relay
    pub model: String,

    /// Agent voice
    pub voice: String,
}

/// Per-request bound for the credential and relay calls
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Performs the credential + offer/answer exchange with the relay
pub struct SignalingClient {
    http: reqwest::Client,
    config: SignalingConfig,
    connector: Arc<dyn TransportConnector>,
}

impl SignalingClient {
    pub fn new(config: SignalingConfig, connector: Arc<dyn TransportConnector>) -> Self {
        Self {
            http: client(REQUEST_TIMEOUT),
            config,
            connector,
        }
    }

    /// Replace the per-request timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.http = client(timeout);
        self
    }

    /// Establish a transport session for `language`
    ///
    /// On failure every transport resource created here is closed before the
    /// error is returned; the capture handle is dropped with it.
    pub async fn negotiate(
        &self,
        language: &str,
        instructions: &str,
        capture: CaptureHandle,
        speaker: SpeakerOutput,
        events: EventSender,
    ) -> Result<Arc<dyn Transport>> {
        let credential = self.fetch_credential(language, instructions).await?;

        let transport = self.connector.open(capture, speaker, events).await?;

        match self.offer_answer(transport.as_ref(), &credential).await {
            Ok(()) => {
                info!("Negotiated transport with {}", credential.relay_endpoint);
                Ok(transport)
            }
            Err(e) => {
                warn!("Negotiation failed, closing transport: {}", e);
                transport.close().await;
                Err(e)
            }
        }
    }

    /// Request a short-lived credential for `language`
    pub async fn fetch_credential(&self, language: &str, instructions: &str) -> Result<Credential> {
        info!("Requesting realtime credential ({})", language);

        let request = CredentialRequest {
            language: language.to_string(),
            instructions: instructions.to_string(),
            model: self.config.model.clone(),
            voice: self.config.voice.clone(),
        };

        let response = self
            .http
            .post(&self.config.credential_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Credential(format!("endpoint unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Credential(format!("endpoint returned {}", status)));
        }

        let body: CredentialResponse = response
            .json()
            .await
            .map_err(|e| Error::Credential(format!("unreadable response: {}", e)))?;

        body.into_credential(self.config.default_relay.as_deref())
    }

    async fn offer_answer(&self, transport: &dyn Transport, credential: &Credential) -> Result<()> {
        let offer = transport.create_offer().await?;
        let answer = self.exchange(credential, offer).await?;
        transport.apply_answer(answer).await
    }

    /// Post the local offer to the relay and return its answer
    async fn exchange(&self, credential: &Credential, offer: String) -> Result<String> {
        let response = self
            .http
            .post(&credential.relay_endpoint)
            .query(&[("model", self.config.model.as_str())])
            .bearer_auth(&credential.token)
            .header(CONTENT_TYPE, "application/sdp")
            .body(offer)
            .send()
            .await
            .map_err(|e| Error::Negotiation(format!("relay unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Negotiation(format!("relay rejected offer ({})", status)));
        }

        let answer = response
            .text()
            .await
            .map_err(|e| Error::Negotiation(format!("unreadable answer: {}", e)))?;

        if !answer.trim_start().starts_with("v=") {
            return Err(Error::Negotiation("relay returned a malformed answer".to_string()));
        }

        Ok(answer)
    }
}

fn client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}
