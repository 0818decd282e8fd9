//! Google id-token verification against the tokeninfo endpoint.

use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

const TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

#[derive(Debug, Error)]
pub enum GoogleError {
    #[error("Token verification request failed: {0}")]
    Request(String),

    #[error("Token rejected by Google")]
    Rejected,

    #[error("Token audience does not match the configured client id")]
    AudienceMismatch,

    #[error("Token email is not verified")]
    EmailUnverified,
}

impl From<reqwest::Error> for GoogleError {
    fn from(err: reqwest::Error) -> Self {
        Self::Request(err.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct TokenInfo {
    aud: String,
    sub: String,
    email: String,
    #[serde(default)]
    email_verified: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GoogleIdentity {
    /// Google's stable account id (`sub` claim).
    pub subject: String,
    pub email: String,
    pub name: Option<String>,
}

pub struct GoogleClient {
    client: Client,
    client_id: String,
    tokeninfo_url: String,
}

impl GoogleClient {
    #[must_use]
    pub fn with_shared_client(client: Client, client_id: &str) -> Self {
        Self {
            client,
            client_id: client_id.to_string(),
            tokeninfo_url: TOKENINFO_URL.to_string(),
        }
    }

    pub async fn verify_id_token(&self, id_token: &str) -> Result<GoogleIdentity, GoogleError> {
        let response = self
            .client
            .get(&self.tokeninfo_url)
            .query(&[("id_token", id_token)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GoogleError::Rejected);
        }

        let info: TokenInfo = response.json().await?;

        // A token minted for another application is not proof of anything
        // for this one.
        if info.aud != self.client_id {
            return Err(GoogleError::AudienceMismatch);
        }
        if info.email_verified.as_deref() != Some("true") {
            return Err(GoogleError::EmailUnverified);
        }

        Ok(GoogleIdentity {
            subject: info.sub,
            email: info.email.to_lowercase(),
            name: info.name,
        })
    }
}
