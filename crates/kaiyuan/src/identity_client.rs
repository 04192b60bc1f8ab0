use kaiyuan_core::{
    models::RemoteProfile,
    provider::{self, ProviderParseError},
};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::Serialize;
use thiserror::Error;

/// Identity provider settings. Loaded once at startup, never mutated.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub client_id: String,
    pub client_secret: String,
    pub token_url: String,
    pub profile_url: String,
}

#[derive(Error, Debug)]
pub enum IdentityClientError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("provider rejected the request (status {status}): {message}")]
    Rejected { status: i64, message: String },

    #[error("malformed provider response: {0}")]
    Malformed(String),
}

impl From<ProviderParseError> for IdentityClientError {
    fn from(err: ProviderParseError) -> Self {
        match err {
            ProviderParseError::Rejected { status, message } => Self::Rejected { status, message },
            other => Self::Malformed(other.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct TokenExchangeRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    code: &'a str,
}

/// Performs the two outbound calls of the OAuth login: code -> token and
/// token -> profile. One attempt each; authorization codes are single-use.
#[derive(Debug, Clone)]
pub struct IdentityClient {
    http: reqwest::Client,
    config: ProviderConfig,
}

impl IdentityClient {
    /// `http` carries the request timeout; this client adds none of its own.
    pub fn new(http: reqwest::Client, config: ProviderConfig) -> Self {
        Self { http, config }
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub async fn exchange_code(&self, code: &str) -> Result<String, IdentityClientError> {
        let body = TokenExchangeRequest {
            client_id: &self.config.client_id,
            client_secret: &self.config.client_secret,
            code,
        };

        let resp = self
            .http
            .post(&self.config.token_url)
            .header(ACCEPT, "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;

        provider::parse_token_exchange_body(&text).map_err(|e| {
            log::error!(
                "Token exchange failed (http {status}): {e}; response: {}",
                provider::redact_provider_body_for_log(&text)
            );
            e.into()
        })
    }

    pub async fn fetch_profile(
        &self,
        access_token: &str,
    ) -> Result<RemoteProfile, IdentityClientError> {
        let resp = self
            .http
            .get(&self.config.profile_url)
            .header(ACCEPT, "application/json")
            .header(AUTHORIZATION, format!("Bearer {access_token}"))
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;

        provider::parse_profile_body(&text).map_err(|e| {
            log::error!(
                "Profile fetch failed (http {status}): {e}; response: {}",
                provider::truncate_for_log(&text, 1024)
            );
            e.into()
        })
    }
}

#[cfg(test)]
pub(crate) fn client_for(base_url: &str) -> IdentityClient {
    IdentityClient::new(
        reqwest::Client::new(),
        ProviderConfig {
            client_id: "client-id".to_string(),
            client_secret: "client-secret".to_string(),
            token_url: format!("{base_url}/oauth/token"),
            profile_url: format!("{base_url}/oauth/user"),
        },
    )
}
