use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::time::Instant;
use uuid::Uuid;

use crate::utils::sanitize::{sanitize_form, sanitize_json};
use crate::AppState;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

const MAX_BODY_READ_SIZE: usize = 64 * 1024;
const MAX_BODY_LOG_CHARS: usize = 1024;

pub async fn request_logger_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let request_id_value = HeaderValue::from_str(&request_id).ok();
    let method = req.method().clone();
    let uri = req.uri().clone();
    let start = Instant::now();

    if let Some(value) = &request_id_value {
        req.headers_mut().insert(REQUEST_ID_HEADER, value.clone());
    }

    if state.config.log_request_body {
        let (parts, body) = req.into_parts();
        let bytes = match axum::body::to_bytes(body, MAX_BODY_READ_SIZE).await {
            Ok(bytes) => bytes,
            Err(_) => {
                tracing::warn!(
                    request_id = %request_id,
                    method = %method,
                    uri = %uri,
                    "request body too large or unreadable"
                );
                return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
            }
        };

        let is_form = parts
            .headers
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.starts_with("application/x-www-form-urlencoded"))
            .unwrap_or(false);

        tracing::info!(
            request_id = %request_id,
            method = %method,
            uri = %uri,
            body_size = bytes.len(),
            body = %loggable_body(&bytes, is_form),
            "incoming request"
        );

        req = Request::from_parts(parts, Body::from(bytes));
    } else {
        tracing::info!(
            request_id = %request_id,
            method = %method,
            uri = %uri,
            "incoming request"
        );
    }

    let mut response = next.run(req).await;

    tracing::info!(
        request_id = %request_id,
        method = %method,
        uri = %uri,
        status = response.status().as_u16(),
        latency_ms = start.elapsed().as_millis() as u64,
        "outgoing response"
    );

    if let Some(value) = request_id_value {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

fn loggable_body(bytes: &[u8], is_form: bool) -> String {
    let Ok(text) = std::str::from_utf8(bytes) else {
        return format!("[binary, {} bytes]", bytes.len());
    };

    let sanitized = if is_form {
        sanitize_form(text)
    } else if let Ok(json) = serde_json::from_str::<serde_json::Value>(text) {
        sanitize_json(&json).to_string()
    } else {
        format!("[unparsed, {} bytes]", bytes.len())
    };

    sanitized.chars().take(MAX_BODY_LOG_CHARS).collect()
}
