pub mod session;

pub use session::get_session;

use actix_web::{
    error::{InternalError, JsonPayloadError},
    http::StatusCode,
    web, HttpRequest, HttpResponse, Responder,
};
use kaiyuan_core::models::{
    ApiResponse, ConfigResponse, LoginRequest, PasswordLoginRequest, RegisterRequest,
};
use serde::Serialize;

use crate::{
    app_state::AppState,
    error::AuthError,
    login::{OAuthLogin, PasswordLogin, Registration},
};

fn ok<T: Serialize>(message: &str, data: T) -> HttpResponse {
    HttpResponse::Ok().json(ApiResponse::success(message, data))
}

/// Envelope for a failed request. Detail stays in the server log.
pub(crate) fn error_response(err: &AuthError) -> HttpResponse {
    let status = err.status_code();
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        log::error!("[{}] {err}", err.error_code());
    }
    HttpResponse::build(status).json(ApiResponse::error(status.as_u16(), err.public_message()))
}

/// Turns a body the JSON extractor refused (bad syntax, wrong field types,
/// wrong content type) into the standard 400 envelope.
pub fn json_error_handler(err: JsonPayloadError, req: &HttpRequest) -> actix_web::Error {
    log::warn!("Rejected request body for {}: {err}", req.path());
    let response = error_response(&AuthError::InvalidRequest("Invalid request body"));
    InternalError::from_response(err, response).into()
}

/// GET /api/v1/config
/// Returns which login methods are available
pub async fn get_config(app_state: web::Data<AppState>) -> impl Responder {
    ok(
        "ok",
        ConfigResponse {
            password_login: true,
            oauth_login: app_state.oauth_enabled,
        },
    )
}

/// POST /api/v1/login
/// OAuth login: exchanges the authorization code and returns a V1 credential
pub async fn login(
    app_state: web::Data<AppState>,
    payload: web::Json<LoginRequest>,
) -> impl Responder {
    if !app_state.oauth_enabled {
        log::warn!("OAuth login attempted but the provider is not configured");
        return error_response(&AuthError::InvalidRequest("OAuth login is not enabled"));
    }

    match OAuthLogin::new(&app_state).login(&payload).await {
        Ok(response) => ok("Login successful", response),
        Err(e) => error_response(&e),
    }
}

/// POST /api/v1/v2/login
/// Password login, returns a V2 credential
pub async fn login_v2(
    app_state: web::Data<AppState>,
    payload: web::Json<PasswordLoginRequest>,
) -> impl Responder {
    log::info!("Password login attempt for: {}", payload.email.trim());

    match PasswordLogin::new(&app_state).login(&payload).await {
        Ok(response) => ok("Login successful", response),
        Err(e) => error_response(&e),
    }
}

/// POST /api/v1/register
/// Creates a password account. No credential is issued.
pub async fn register(
    app_state: web::Data<AppState>,
    payload: web::Json<RegisterRequest>,
) -> impl Responder {
    log::info!("Registration attempt for: {}", payload.email.trim());

    match Registration::new(&app_state.db).register(&payload).await {
        Ok(account) => ok("Registration successful", account),
        Err(e) => error_response(&e),
    }
}
