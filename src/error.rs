use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::config::ConfigError;
use crate::order_service::OrderServiceError;
use crate::trade::CodecError;
use crate::validation::ValidationError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Order service unavailable: {0}")]
    Transport(String),

    #[error("Order service error: {0}")]
    Backend(String),

    #[error("Trade payload error: {0}")]
    Codec(#[from] CodecError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<OrderServiceError> for AppError {
    fn from(err: OrderServiceError) -> Self {
        if err.is_transport() {
            AppError::Transport(err.to_string())
        } else {
            AppError::Backend(err.to_string())
        }
    }
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Transport(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Backend(_) => StatusCode::BAD_GATEWAY,
            AppError::Codec(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Config(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn summary(&self) -> &'static str {
        match self {
            AppError::Validation(_) | AppError::BadRequest(_) => "資料格式錯誤",
            AppError::Transport(_) => "後端服務暫時不可用",
            AppError::Backend(_) => "建立訂單失敗",
            AppError::Codec(_) => "交易資料無法解析",
            AppError::Unauthorized(_) => "未授權",
            AppError::Config(_) | AppError::Internal(_) => "服務器錯誤",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::warn!(error = %self, "request rejected");
        }

        let body = Json(json!({
            "success": false,
            "error": self.summary(),
            "details": self.to_string(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_validation_error_status_code() {
        let error = AppError::Validation(ValidationError::new("amount", "must be greater than zero"));
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_transport_error_status_code() {
        let error = AppError::from(OrderServiceError::Timeout(Duration::from_secs(30)));
        assert!(matches!(error, AppError::Transport(_)));
        assert_eq!(error.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_backend_error_status_code() {
        let error = AppError::from(OrderServiceError::Backend {
            status: 500,
            body: "boom".to_string(),
        });
        assert!(matches!(error, AppError::Backend(_)));
        assert_eq!(error.status_code(), StatusCode::BAD_GATEWAY);
        assert!(error.to_string().contains("boom"));
    }

    #[test]
    fn test_invalid_response_is_backend_error() {
        let error = AppError::from(OrderServiceError::InvalidResponse("not json".to_string()));
        assert_eq!(error.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_unauthorized_error_status_code() {
        let error = AppError::Unauthorized("no session".to_string());
        assert_eq!(error.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_error_response_body() {
        let error = AppError::Validation(ValidationError::new("phone", "bad"));
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
        assert!(body["details"].as_str().unwrap().contains("phone"));
    }
}
