use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::AppError;
use crate::services::session::session_from_cookie_header;
use crate::AppState;

/// Admits requests carrying a valid signed `admin_session` cookie.
pub async fn admin_session_auth(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let token = req
        .headers()
        .get(header::COOKIE)
        .and_then(|value| value.to_str().ok())
        .and_then(session_from_cookie_header);

    let Some(token) = token else {
        return AppError::Unauthorized("missing admin session".to_string()).into_response();
    };

    match state.sessions.verify(token) {
        Ok(()) => next.run(req).await,
        Err(err) => {
            tracing::warn!(reason = ?err, uri = %req.uri(), "admin session rejected");
            AppError::Unauthorized(format!("invalid admin session: {:?}", err)).into_response()
        }
    }
}
