use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::error::AppError;
use crate::services::session::session_from_cookie_header;
use crate::services::SessionSigner;
use crate::utils::constant_time_eq;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// `POST /admin/login`
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(credentials) =
        payload.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;

    // evaluate both so timing does not reveal which one was wrong
    let user_ok = constant_time_eq(
        credentials.username.as_bytes(),
        state.config.admin_username.as_bytes(),
    );
    let password_ok = constant_time_eq(
        credentials.password.as_bytes(),
        state.config.admin_password.as_bytes(),
    );
    if !(user_ok && password_ok) {
        tracing::warn!(username = %credentials.username, "admin login failed");
        return Err(AppError::Unauthorized("帳號或密碼錯誤".to_string()));
    }

    let token = state.sessions.issue();
    let cookie = state.sessions.set_cookie(&token, state.config.secure_cookies);
    tracing::info!(username = %credentials.username, "admin logged in");

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(json!({ "success": true, "message": "登入成功" })),
    )
        .into_response())
}

/// `POST /admin/logout`
pub async fn logout(State(state): State<AppState>) -> Response {
    (
        [(
            header::SET_COOKIE,
            SessionSigner::clear_cookie(state.config.secure_cookies),
        )],
        Json(json!({ "success": true, "message": "已登出" })),
    )
        .into_response()
}

/// `GET /admin/check-auth`
pub async fn check_auth(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, AppError> {
    let token = headers
        .get(header::COOKIE)
        .and_then(|value| value.to_str().ok())
        .and_then(session_from_cookie_header)
        .ok_or_else(|| AppError::Unauthorized("missing admin session".to_string()))?;

    state
        .sessions
        .verify(token)
        .map_err(|err| AppError::Unauthorized(format!("invalid admin session: {:?}", err)))?;

    Ok(Json(json!({ "success": true })).into_response())
}
