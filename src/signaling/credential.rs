use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Body sent to the token-issuing endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialRequest {
    pub language: String,

    /// Opaque coaching prompt; this crate never inspects it
    pub instructions: String,

    pub model: String,

    pub voice: String,
}

/// Short-lived credential and the relay it is valid for
#[derive(Debug, Clone)]
pub struct Credential {
    pub token: String,
    pub relay_endpoint: String,
}

#[derive(Debug, Deserialize)]
struct ClientSecret {
    value: String,
}

/// Token endpoint response; both the flat and the `client_secret` forms are accepted
#[derive(Debug, Deserialize)]
pub struct CredentialResponse {
    #[serde(default)]
    credential: Option<String>,

    #[serde(default)]
    client_secret: Option<ClientSecret>,

    #[serde(default, rename = "relayEndpoint", alias = "relay_endpoint")]
    relay_endpoint: Option<String>,
}

impl CredentialResponse {
    /// Resolve into a usable credential, falling back to `default_relay`
    pub fn into_credential(self, default_relay: Option<&str>) -> Result<Credential> {
        let token = self
            .credential
            .or(self.client_secret.map(|secret| secret.value))
            .filter(|token| !token.is_empty())
            .ok_or_else(|| Error::Credential("response carried no credential".to_string()))?;

        let relay_endpoint = self
            .relay_endpoint
            .or_else(|| default_relay.map(str::to_string))
            .ok_or_else(|| Error::Credential("response named no relay endpoint".to_string()))?;

        Ok(Credential {
            token,
            relay_endpoint,
        })
    }
}
