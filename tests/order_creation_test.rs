mod common;

use std::time::Duration;

use common::*;
use mockito::Matcher;
use reqwest::StatusCode;
use serde_json::{json, Value};

const CREATE_ORDER_PATH: &str = "/api/ecommerce/create-order";

fn order_intent(amount: i64) -> Value {
    json!({
        "name": "王小明",
        "email": "ming@example.com",
        "phone": "0912345678",
        "address": "台北市信義區市府路1號",
        "amount": amount,
        "note": "  請於週末配送  ",
        "product_name": "生態米禮盒"
    })
}

#[tokio::test]
async fn creates_order_and_returns_payment_link() {
    let mut backend = mockito::Server::new_async().await;
    let create = backend
        .mock("POST", CREATE_ORDER_PATH)
        .match_header("language", "cht")
        .match_body(Matcher::PartialJson(json!({
            "name": "王小明",
            "amount": 1680,
            "note": "請於週末配送",
            "product_name": "生態米禮盒"
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "code": 200,
                "data": {
                    "payment_url": "https://ccore.newebpay.com/MPG/mpg_gateway?order=ORD789",
                    "order_no": "ORD789"
                }
            })
            .to_string(),
        )
        .create_async()
        .await;

    let base = spawn_app(test_config(&backend.url())).await;
    let response = http_client()
        .post(format!("{}/orders/create", base))
        .json(&order_intent(1680))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["code"], 200);
    assert_eq!(
        body["data"]["payment_url"],
        "https://ccore.newebpay.com/MPG/mpg_gateway?order=ORD789"
    );
    assert_eq!(body["data"]["order_no"], "ORD789");
    create.assert_async().await;
}

#[tokio::test]
async fn zero_amount_is_rejected_without_calling_backend() {
    let mut backend = mockito::Server::new_async().await;
    let create = backend
        .mock("POST", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let base = spawn_app(test_config(&backend.url())).await;
    let response = http_client()
        .post(format!("{}/orders/create", base))
        .json(&order_intent(0))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert!(body["details"].as_str().unwrap().contains("amount"));
    create.assert_async().await;
}

#[tokio::test]
async fn invalid_phone_is_rejected() {
    let mut intent = order_intent(1680);
    intent["phone"] = json!("02-2345-6789");

    let base = spawn_app(test_config(&refused_url())).await;
    let response = http_client()
        .post(format!("{}/orders/create", base))
        .json(&intent)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_json_is_bad_request() {
    let base = spawn_app(test_config(&refused_url())).await;
    let response = http_client()
        .post(format!("{}/orders/create", base))
        .header("content-type", "application/json")
        .body("{\"name\": ")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn backend_error_is_bad_gateway() {
    let mut backend = mockito::Server::new_async().await;
    let _create = backend
        .mock("POST", CREATE_ORDER_PATH)
        .with_status(500)
        .with_body("internal error")
        .create_async()
        .await;

    let base = spawn_app(test_config(&backend.url())).await;
    let response = http_client()
        .post(format!("{}/orders/create", base))
        .json(&order_intent(1680))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn backend_timeout_is_service_unavailable() {
    let mut config = test_config(&stalled_url().await);
    config.order_service_timeout = Duration::from_millis(300);
    let base = spawn_app(config).await;

    let response = http_client()
        .post(format!("{}/orders/create", base))
        .json(&order_intent(1680))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
}
