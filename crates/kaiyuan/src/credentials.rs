use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use kaiyuan_core::models::{CredentialClaimsV1, CredentialClaimsV2, SessionClaims};
use serde::Serialize;

/// Signs session credentials with the process-wide HS256 secret.
///
/// V1 and V2 are separate claim types that share only [`CredentialIssuer::sign`];
/// each payload shape is frozen for the clients that read it.
#[derive(Clone)]
pub struct CredentialIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_secs: i64,
}

impl CredentialIssuer {
    pub fn new(secret: &str, ttl_secs: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl_secs,
        }
    }

    /// Legacy credential for the OAuth login path.
    pub fn issue_v1(
        &self,
        account_id: i64,
        email: &str,
        avatar: &str,
        username: &str,
        github: &str,
        permissions: &[String],
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let (iat, exp) = self.window();
        self.sign(&CredentialClaimsV1 {
            user_id: account_id,
            email: email.to_string(),
            avatar: avatar.to_string(),
            username: username.to_string(),
            github: github.to_string(),
            permissions: permissions.to_vec(),
            iat,
            exp,
        })
    }

    /// Current credential for the password login path.
    pub fn issue_v2(
        &self,
        account_id: i64,
        email: &str,
        username: &str,
        permissions: &[String],
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let (iat, exp) = self.window();
        self.sign(&CredentialClaimsV2 {
            user_id: account_id,
            email: email.to_string(),
            username: username.to_string(),
            permissions: permissions.to_vec(),
            iat,
            exp,
        })
    }

    /// Check signature and expiry, then classify the payload.
    ///
    /// Both claim types reject unknown fields, so a V1 payload never decodes
    /// as V2.
    pub fn verify(&self, token: &str) -> Result<SessionClaims, jsonwebtoken::errors::Error> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp"]);

        match decode::<CredentialClaimsV2>(token, &self.decoding_key, &validation) {
            Ok(data) => Ok(SessionClaims::V2(data.claims)),
            Err(e) if matches!(e.kind(), jsonwebtoken::errors::ErrorKind::Json(_)) => {
                decode::<CredentialClaimsV1>(token, &self.decoding_key, &validation)
                    .map(|data| SessionClaims::V1(data.claims))
            }
            Err(e) => Err(e),
        }
    }

    fn window(&self) -> (i64, i64) {
        let now = Utc::now().timestamp();
        (now, now + self.ttl_secs)
    }

    fn sign<T: Serialize>(&self, claims: &T) -> Result<String, jsonwebtoken::errors::Error> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
    }
}
