use actix_web::http::StatusCode;
use thiserror::Error;

use crate::identity_client::IdentityClientError;

/// Generic text for upstream failures the provider did not explain itself.
pub const UPSTREAM_MESSAGE: &str = "Network error, please try again later.";
pub const INTERNAL_MESSAGE: &str = "Internal server error";
pub const UNAUTHORIZED_MESSAGE: &str = "Invalid email or password";
pub const CONFLICT_MESSAGE: &str = "Email already registered";

/// Failure of a login or registration request.
///
/// Each variant is terminal: nothing after the failing step runs and no
/// credential is handed out.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("invalid request: {0}")]
    InvalidRequest(&'static str),

    /// `public_message` is set only when the provider explicitly rejected the
    /// profile call; it is forwarded to the client verbatim.
    #[error("identity provider failure: {source}")]
    Upstream {
        public_message: Option<String>,
        #[source]
        source: IdentityClientError,
    },

    #[error("account store failure: {0}")]
    Persistence(#[from] sea_orm::DbErr),

    #[error("credential signing failed: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),

    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error("invalid credentials")]
    Unauthorized,

    #[error("email already registered")]
    Conflict,
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Upstream { .. } => StatusCode::BAD_GATEWAY,
            Self::Persistence(_) | Self::Signing(_) | Self::Hashing(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Conflict => StatusCode::CONFLICT,
        }
    }

    /// Message safe to show to the caller. Server-side detail stays in the log.
    pub fn public_message(&self) -> String {
        match self {
            Self::InvalidRequest(msg) => (*msg).to_string(),
            Self::Upstream {
                public_message: Some(msg),
                ..
            } if !msg.is_empty() => msg.clone(),
            Self::Upstream { .. } => UPSTREAM_MESSAGE.to_string(),
            Self::Persistence(_) | Self::Signing(_) | Self::Hashing(_) => {
                INTERNAL_MESSAGE.to_string()
            }
            Self::Unauthorized => UNAUTHORIZED_MESSAGE.to_string(),
            Self::Conflict => CONFLICT_MESSAGE.to_string(),
        }
    }

    /// Stable machine-readable code for logs.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::Upstream { .. } => "UPSTREAM_ERROR",
            Self::Persistence(_) => "PERSISTENCE_ERROR",
            Self::Signing(_) => "SIGNING_ERROR",
            Self::Hashing(_) => "HASHING_ERROR",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Conflict => "CONFLICT",
        }
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
