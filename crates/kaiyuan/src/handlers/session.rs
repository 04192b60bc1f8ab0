use actix_web::{http::header::AUTHORIZATION, web, HttpRequest, HttpResponse, Responder};
use kaiyuan_core::models::ApiResponse;

use crate::app_state::AppState;

fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn unauthorized(message: &str) -> HttpResponse {
    HttpResponse::Unauthorized().json(ApiResponse::error(401, message))
}

/// GET /api/v1/session
/// Verifies the bearer credential and returns its claims, tagged with the
/// credential version
pub async fn get_session(app_state: web::Data<AppState>, req: HttpRequest) -> impl Responder {
    let Some(token) = bearer_token(&req) else {
        return unauthorized("Missing bearer token");
    };

    match app_state.issuer.verify(token) {
        Ok(claims) => {
            log::debug!("Session verified for account {}", claims.user_id());
            HttpResponse::Ok().json(ApiResponse::success("ok", claims))
        }
        Err(e) => {
            log::warn!("Session credential rejected: {e}");
            unauthorized("Invalid or expired token")
        }
    }
}
