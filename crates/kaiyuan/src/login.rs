use kaiyuan_core::{
    models::{AccountView, LoginRequest, LoginResponse, PasswordLoginRequest, RegisterRequest},
    password, validate,
};
use sea_orm::DatabaseConnection;

use crate::{
    accounts::{self, AccountReconciler},
    app_state::AppState,
    credentials::CredentialIssuer,
    error::{AuthError, Result},
    identity_client::{IdentityClient, IdentityClientError},
    permissions::PermissionResolver,
};

/// Progress of one OAuth login. Each request walks it once, start to finish;
/// nothing survives the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStage {
    Started,
    CodeExchanged,
    ProfileFetched,
    AccountReconciled,
    PermissionsResolved,
    TokenIssued,
}

impl std::fmt::Display for LoginStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LoginStage::Started => "started",
            LoginStage::CodeExchanged => "code_exchanged",
            LoginStage::ProfileFetched => "profile_fetched",
            LoginStage::AccountReconciled => "account_reconciled",
            LoginStage::PermissionsResolved => "permissions_resolved",
            LoginStage::TokenIssued => "token_issued",
        };
        f.write_str(name)
    }
}

fn failed(stage: LoginStage, err: AuthError) -> AuthError {
    match &err {
        AuthError::InvalidRequest(_) | AuthError::Upstream { .. } => {
            log::warn!("OAuth login failed after {stage}: {err}")
        }
        _ => log::error!("OAuth login failed after {stage}: {err}"),
    }
    err
}

/// OAuth path: code -> token -> profile -> account -> permissions -> V1 credential.
pub struct OAuthLogin<'a> {
    identity: &'a IdentityClient,
    accounts: AccountReconciler<'a>,
    permissions: PermissionResolver<'a>,
    issuer: &'a CredentialIssuer,
}

impl<'a> OAuthLogin<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self {
            identity: &state.identity,
            accounts: AccountReconciler::new(&state.db),
            permissions: PermissionResolver::new(&state.db),
            issuer: &state.issuer,
        }
    }

    pub async fn login(&self, req: &LoginRequest) -> Result<LoginResponse> {
        let mut stage = LoginStage::Started;

        validate::validate_login(req)
            .map_err(|msg| failed(stage, AuthError::InvalidRequest(msg)))?;

        let access_token = self
            .identity
            .exchange_code(req.code.trim())
            .await
            .map_err(|source| {
                failed(
                    stage,
                    AuthError::Upstream {
                        public_message: None,
                        source,
                    },
                )
            })?;
        stage = LoginStage::CodeExchanged;

        let profile = self
            .identity
            .fetch_profile(&access_token)
            .await
            .map_err(|source| {
                let public_message = match &source {
                    IdentityClientError::Rejected { message, .. } => Some(message.clone()),
                    _ => None,
                };
                failed(
                    stage,
                    AuthError::Upstream {
                        public_message,
                        source,
                    },
                )
            })?;
        stage = LoginStage::ProfileFetched;

        let account = self
            .accounts
            .reconcile(&profile)
            .await
            .map_err(|e| failed(stage, e.into()))?;
        stage = LoginStage::AccountReconciled;

        let permissions = self
            .permissions
            .resolve_for(account.id)
            .await
            .map_err(|e| failed(stage, e.into()))?;
        stage = LoginStage::PermissionsResolved;

        let token = self
            .issuer
            .issue_v1(
                account.id,
                account.email.as_deref().unwrap_or_default(),
                &account.avatar,
                &account.username,
                &account.github,
                &permissions,
            )
            .map_err(|e| failed(stage, e.into()))?;
        stage = LoginStage::TokenIssued;

        log::info!(
            "OAuth login {stage} for account {} (uid={})",
            account.id,
            profile.uid
        );

        Ok(LoginResponse {
            account: accounts::to_view(&account),
            permissions,
            token,
        })
    }
}

/// Direct password path: credentials -> permissions -> V2 credential.
pub struct PasswordLogin<'a> {
    db: &'a DatabaseConnection,
    permissions: PermissionResolver<'a>,
    issuer: &'a CredentialIssuer,
}

impl<'a> PasswordLogin<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self {
            db: &state.db,
            permissions: PermissionResolver::new(&state.db),
            issuer: &state.issuer,
        }
    }

    /// Unknown email, OAuth-only account and wrong password all return the
    /// same [`AuthError::Unauthorized`].
    pub async fn login(&self, req: &PasswordLoginRequest) -> Result<LoginResponse> {
        validate::validate_password_login(req).map_err(AuthError::InvalidRequest)?;

        let Some(account) = accounts::find_by_email(self.db, &req.email).await? else {
            log::warn!("Password login for unknown email: {}", req.email.trim());
            password::verify_against_dummy(&req.password);
            return Err(AuthError::Unauthorized);
        };

        let Some(password_hash) = account.password_hash.as_deref() else {
            log::warn!("Password login for OAuth-only account {}", account.id);
            password::verify_against_dummy(&req.password);
            return Err(AuthError::Unauthorized);
        };

        match password::verify_password(&req.password, password_hash) {
            Ok(true) => {}
            Ok(false) => {
                log::warn!("Wrong password for account {}", account.id);
                return Err(AuthError::Unauthorized);
            }
            Err(e) => {
                log::error!("Stored password hash for account {} unusable: {e}", account.id);
                return Err(AuthError::Unauthorized);
            }
        }

        let permissions = self.permissions.resolve_for(account.id).await?;

        let token = self.issuer.issue_v2(
            account.id,
            account.email.as_deref().unwrap_or_default(),
            &account.username,
            &permissions,
        )?;

        log::info!("Password login successful for account {}", account.id);

        Ok(LoginResponse {
            account: accounts::to_view(&account),
            permissions,
            token,
        })
    }
}

/// Creates password-bearing accounts. Issues no credential.
pub struct Registration<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> Registration<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn register(&self, req: &RegisterRequest) -> Result<AccountView> {
        validate::validate_register(req).map_err(AuthError::InvalidRequest)?;

        if accounts::find_by_email(self.db, &req.email).await?.is_some() {
            log::warn!("Registration rejected, email taken: {}", req.email.trim());
            return Err(AuthError::Conflict);
        }

        let password_hash =
            password::hash_password(&req.password).map_err(|e| AuthError::Hashing(e.to_string()))?;

        let created =
            match accounts::create_password_account(self.db, &req.username, &req.email, password_hash)
                .await
            {
                Ok(created) => created,
                // Lost a race with a concurrent registration for the same email.
                Err(e) if accounts::is_unique_violation(&e) => {
                    log::warn!("Registration raced, email taken: {}", req.email.trim());
                    return Err(AuthError::Conflict);
                }
                Err(e) => return Err(e.into()),
            };

        log::info!(
            "Account registered: {} (ID: {})",
            created.username,
            created.id
        );

        Ok(accounts::to_view(&created))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{app_state::test_state, permissions};
    use entity::account;
    use kaiyuan_core::models::SessionClaims;
    use sea_orm::EntityTrait;
    use serde_json::json;
    use wiremock::{
        matchers::{header, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    async fn mount_token(server: &MockServer, code: &str, token: &str) {
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(wiremock::matchers::body_partial_json(json!({ "code": code })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": 200,
                "data": { "token": token }
            })))
            .mount(server)
            .await;
    }

    fn register_req(email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            username: "ada".to_string(),
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_oauth_login_end_to_end() {
        let server = MockServer::start().await;
        mount_token(&server, "abc", "T").await;
        Mock::given(method("GET"))
            .and(path("/oauth/user"))
            .and(header("authorization", "Bearer T"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": 200,
                "message": "ok",
                "data": { "uid": 42, "username": "ada", "email": "a@x.com" }
            })))
            .mount(&server)
            .await;

        let state = test_state(&server.uri()).await;

        let response = OAuthLogin::new(&state)
            .login(&LoginRequest { code: "abc".to_string() })
            .await
            .unwrap();
        permissions::grant(&state.db, response.account.id, "read").await.unwrap();

        // Second login now sees the grant.
        let response = OAuthLogin::new(&state)
            .login(&LoginRequest { code: "abc".to_string() })
            .await
            .unwrap();

        assert_eq!(response.account.uid.as_deref(), Some("42"));
        assert_eq!(response.account.email, "a@x.com");
        assert_eq!(response.permissions, vec!["read".to_string()]);

        match state.issuer.verify(&response.token).unwrap() {
            SessionClaims::V1(claims) => {
                assert_eq!(claims.user_id, response.account.id);
                assert_eq!(claims.email, "a@x.com");
                assert_eq!(claims.username, "ada");
                assert_eq!(claims.permissions, vec!["read".to_string()]);
            }
            other => panic!("expected V1 credential, got {other:?}"),
        }

        let all = account::Entity::find().all(&state.db).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn test_oauth_login_profile_rejected_forwards_message() {
        let server = MockServer::start().await;
        mount_token(&server, "abc", "T").await;
        Mock::given(method("GET"))
            .and(path("/oauth/user"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": 403,
                "message": "revoked"
            })))
            .mount(&server)
            .await;

        let state = test_state(&server.uri()).await;
        let err = OAuthLogin::new(&state)
            .login(&LoginRequest { code: "abc".to_string() })
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::Upstream { .. }));
        assert_eq!(err.public_message(), "revoked");

        let all = account::Entity::find().all(&state.db).await.unwrap();
        assert!(all.is_empty());
    }

    #[tokio::test]
    async fn test_oauth_login_token_rejection_is_generic() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": 401,
                "message": "bad client secret"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/oauth/user"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let state = test_state(&server.uri()).await;
        let err = OAuthLogin::new(&state)
            .login(&LoginRequest { code: "abc".to_string() })
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::Upstream { .. }));
        assert_eq!(err.public_message(), crate::error::UPSTREAM_MESSAGE);
    }

    #[tokio::test]
    async fn test_oauth_login_rejects_blank_code_without_calling_provider() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let state = test_state(&server.uri()).await;
        let err = OAuthLogin::new(&state)
            .login(&LoginRequest { code: "   ".to_string() })
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_register_then_password_login_issues_v2() {
        let state = test_state("http://127.0.0.1:1").await;

        let created = Registration::new(&state.db)
            .register(&register_req("Ada@X.com", "secret1"))
            .await
            .unwrap();
        assert_eq!(created.email, "ada@x.com");
        permissions::grant(&state.db, created.id, "event:write").await.unwrap();

        let response = PasswordLogin::new(&state)
            .login(&PasswordLoginRequest {
                email: "ada@x.com".to_string(),
                password: "secret1".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(response.account.id, created.id);
        assert_eq!(response.permissions, vec!["event:write".to_string()]);
        match state.issuer.verify(&response.token).unwrap() {
            SessionClaims::V2(claims) => {
                assert_eq!(claims.user_id, created.id);
                assert_eq!(claims.email, "ada@x.com");
                assert_eq!(claims.username, "ada");
            }
            other => panic!("expected V2 credential, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_password_login_failures_are_indistinguishable() {
        let state = test_state("http://127.0.0.1:1").await;
        Registration::new(&state.db)
            .register(&register_req("a@x.com", "secret1"))
            .await
            .unwrap();

        let login = PasswordLogin::new(&state);
        let wrong_password = login
            .login(&PasswordLoginRequest {
                email: "a@x.com".to_string(),
                password: "not-it".to_string(),
            })
            .await
            .unwrap_err();
        let unknown_email = login
            .login(&PasswordLoginRequest {
                email: "nobody@x.com".to_string(),
                password: "secret1".to_string(),
            })
            .await
            .unwrap_err();

        assert!(matches!(wrong_password, AuthError::Unauthorized));
        assert!(matches!(unknown_email, AuthError::Unauthorized));
        assert_eq!(wrong_password.status_code(), unknown_email.status_code());
        assert_eq!(wrong_password.public_message(), unknown_email.public_message());
    }

    #[tokio::test]
    async fn test_password_login_on_oauth_only_account_is_unauthorized() {
        let state = test_state("http://127.0.0.1:1").await;
        AccountReconciler::new(&state.db)
            .reconcile(&kaiyuan_core::models::RemoteProfile {
                uid: "42".to_string(),
                username: "ada".to_string(),
                email: "a@x.com".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        let err = PasswordLogin::new(&state)
            .login(&PasswordLoginRequest {
                email: "a@x.com".to_string(),
                password: "anything".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized));
    }

    #[tokio::test]
    async fn test_duplicate_registration_conflicts() {
        let state = test_state("http://127.0.0.1:1").await;
        let registration = Registration::new(&state.db);

        registration
            .register(&register_req("a@x.com", "secret1"))
            .await
            .unwrap();
        let err = registration
            .register(&register_req("A@x.com", "secret2"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Conflict));
    }

    #[tokio::test]
    async fn test_concurrent_registrations_at_most_one_wins() {
        let state = test_state("http://127.0.0.1:1").await;
        let first = Registration::new(&state.db);
        let second = Registration::new(&state.db);
        let req = register_req("race@x.com", "secret1");

        let (a, b) = tokio::join!(first.register(&req), second.register(&req));

        let ok = [a.is_ok(), b.is_ok()].iter().filter(|v| **v).count();
        assert_eq!(ok, 1);
        let conflict = [&a, &b]
            .iter()
            .filter(|r| matches!(r, Err(AuthError::Conflict)))
            .count();
        assert_eq!(conflict, 1);
    }

    #[tokio::test]
    async fn test_register_validation_is_precise() {
        let state = test_state("http://127.0.0.1:1").await;
        let err = Registration::new(&state.db)
            .register(&register_req("a@x.com", "123"))
            .await
            .unwrap_err();
        assert_eq!(err.public_message(), "Password must be at least 6 characters");
    }
}
