use serde_json::{json, Value};

use crate::models::RemoteProfile;

/// The provider wraps every payload as `{ status, message, data }` and reports
/// failures through `status`, often alongside HTTP 200.
pub const PROVIDER_SUCCESS_STATUS: i64 = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderParseError {
    /// The payload carried a non-success `status`.
    Rejected { status: i64, message: String },

    /// The payload was JSON but a required field was absent or empty.
    MissingField(&'static str),

    /// The body could not be parsed as a JSON object.
    InvalidFormat,
}

impl std::fmt::Display for ProviderParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderParseError::Rejected { status, message } => {
                write!(f, "identity provider returned status {status}")?;
                if !message.is_empty() {
                    write!(f, ": {message}")?;
                }
                Ok(())
            }
            ProviderParseError::MissingField(field) => {
                write!(f, "identity provider response missing '{field}'")
            }
            ProviderParseError::InvalidFormat => {
                write!(f, "identity provider response was not a JSON object")
            }
        }
    }
}

impl std::error::Error for ProviderParseError {}

/// Parse the token-exchange response body and extract `data.token`.
pub fn parse_token_exchange_body(body: &str) -> Result<String, ProviderParseError> {
    let v = parse_envelope(body)?;

    v.get("data")
        .and_then(|d| d.get("token"))
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .ok_or(ProviderParseError::MissingField("data.token"))
}

/// Parse the profile response body into a [`RemoteProfile`].
///
/// `uid` may arrive as a JSON string or number; it is normalized to a string.
/// The remaining fields are optional and default to empty.
pub fn parse_profile_body(body: &str) -> Result<RemoteProfile, ProviderParseError> {
    let v = parse_envelope(body)?;
    let data = v.get("data").ok_or(ProviderParseError::MissingField("data"))?;

    let uid = match data.get("uid") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => return Err(ProviderParseError::MissingField("data.uid")),
    };

    let text = |key: &str| {
        data.get(key)
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
            .unwrap_or_default()
    };

    Ok(RemoteProfile {
        uid,
        username: text("username"),
        avatar: text("avatar"),
        email: text("email"),
        github: text("github"),
    })
}

fn parse_envelope(body: &str) -> Result<Value, ProviderParseError> {
    let v: Value = serde_json::from_str(body).map_err(|_| ProviderParseError::InvalidFormat)?;
    if !v.is_object() {
        return Err(ProviderParseError::InvalidFormat);
    }

    let status = v
        .get("status")
        .and_then(Value::as_i64)
        .ok_or(ProviderParseError::MissingField("status"))?;

    if status != PROVIDER_SUCCESS_STATUS {
        let message = v
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        return Err(ProviderParseError::Rejected { status, message });
    }

    Ok(v)
}

pub fn truncate_for_log(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }

    let mut end = max_len;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }

    let mut out = s[..end].to_string();
    out.push_str("…(truncated)");
    out
}

/// Render a provider body for the log with any bearer token masked.
pub fn redact_provider_body_for_log(body: &str) -> String {
    if let Ok(mut v) = serde_json::from_str::<Value>(body) {
        if let Some(data) = v.get_mut("data").and_then(Value::as_object_mut) {
            if data.contains_key("token") {
                data.insert("token".to_string(), json!("[REDACTED]"));
            }
        }
        return truncate_for_log(&v.to_string(), 2048);
    }

    if body.contains("token") {
        return "<redacted provider response>".to_string();
    }

    truncate_for_log(body, 2048)
}
