use sea_orm::DatabaseConnection;

use crate::{credentials::CredentialIssuer, identity_client::IdentityClient};

/// Shared application state
pub struct AppState {
    /// Sea-ORM database connection pool
    pub db: DatabaseConnection,

    /// Outbound client for the identity provider
    pub identity: IdentityClient,

    /// Signs and verifies session credentials (HS256)
    pub issuer: CredentialIssuer,

    /// Whether every OAuth setting was supplied at startup
    pub oauth_enabled: bool,
}

/// State over a fresh in-memory database with the provider at `provider_base`.
#[cfg(test)]
pub(crate) async fn test_state(provider_base: &str) -> AppState {
    AppState {
        db: crate::testing::memory_db().await,
        identity: crate::identity_client::client_for(provider_base),
        issuer: CredentialIssuer::new("test-secret", 3600),
        oauth_enabled: true,
    }
}
