use serde::{Deserialize, Serialize};

/// Request payload for POST /api/v1/login (OAuth authorization code)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub code: String,
}

/// Request payload for POST /api/v1/register
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Request payload for POST /api/v1/v2/login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordLoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Identity profile returned by the OAuth provider.
///
/// Lives only for the duration of one login call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RemoteProfile {
    pub uid: String,
    pub username: String,
    pub avatar: String,
    pub email: String,
    pub github: String,
}

/// Account snapshot returned to clients. Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountView {
    #[serde(rename = "ID")]
    pub id: i64,
    pub uid: Option<String>,
    pub username: String,
    pub email: String,
    pub avatar: String,
    pub github: String,
}

/// Response payload for both login paths.
///
/// The account fields are flattened next to `permissions` and `token`, which is
/// the shape existing web clients read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub account: AccountView,
    pub permissions: Vec<String>,
    pub token: String,
}

/// Uniform response envelope: `{ code, message, data }`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: u16,
    pub message: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            code: 200,
            message: message.into(),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    pub fn error(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

/// Legacy (V1) session credential claims.
///
/// Issued by the OAuth login path. The field set is frozen: older clients
/// read `avatar` and `github` straight out of the token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CredentialClaimsV1 {
    pub user_id: i64,
    pub email: String,
    pub avatar: String,
    pub username: String,
    pub github: String,
    pub permissions: Vec<String>,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

/// Current (V2) session credential claims: identity and permissions only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CredentialClaimsV2 {
    pub user_id: i64,
    pub email: String,
    pub username: String,
    pub permissions: Vec<String>,
    pub iat: i64,
    pub exp: i64,
}

/// Either credential format, as recovered from a verified token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "version", rename_all = "lowercase")]
pub enum SessionClaims {
    V1(CredentialClaimsV1),
    V2(CredentialClaimsV2),
}

impl SessionClaims {
    pub fn user_id(&self) -> i64 {
        match self {
            SessionClaims::V1(c) => c.user_id,
            SessionClaims::V2(c) => c.user_id,
        }
    }

    pub fn permissions(&self) -> &[String] {
        match self {
            SessionClaims::V1(c) => &c.permissions,
            SessionClaims::V2(c) => &c.permissions,
        }
    }
}

/// Response for GET /api/v1/config
#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigResponse {
    /// Password login is always available
    pub password_login: bool,
    /// Whether the OAuth provider is configured
    pub oauth_login: bool,
}
