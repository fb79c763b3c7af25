mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::*;
use giftbox_gateway::{create_app, AppState};
use tower::ServiceExt;

#[tokio::test]
async fn health_reports_version() {
    let app = create_app(AppState::from_config(test_config(&refused_url())).unwrap());

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn cors_preflight_allows_language_header() {
    let app = create_app(AppState::from_config(test_config(&refused_url())).unwrap());

    let response = app
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/orders/create")
                .header("origin", "https://shop.example.com")
                .header("access-control-request-method", "POST")
                .header("access-control-request-headers", "content-type,language")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("access-control-allow-origin").unwrap(),
        "*"
    );
}
