#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use giftbox_gateway::config::{AllowedIps, Config};
use giftbox_gateway::trade::{TextEncoding, TradeCodec};
use giftbox_gateway::{create_app, AppState};
use tokio::net::TcpListener;

pub const MERCHANT_ID: &str = "MS12345678";
pub const HASH_KEY: &str = "12345678901234567890123456789012";
pub const HASH_IV: &str = "1234567890123456";
pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_PASSWORD: &str = "correct horse battery staple";

pub fn test_config(order_service_url: &str) -> Config {
    Config {
        server_port: 0,
        merchant_id: MERCHANT_ID.to_string(),
        hash_key: HASH_KEY.to_string(),
        hash_iv: HASH_IV.to_string(),
        trade_version: "2.0".to_string(),
        trade_encoding: TextEncoding::Base64,
        order_service_url: order_service_url.to_string(),
        order_service_timeout: Duration::from_secs(5),
        order_service_language: "cht".to_string(),
        payment_result_path: "/payment/result".to_string(),
        admin_username: ADMIN_USERNAME.to_string(),
        admin_password: ADMIN_PASSWORD.to_string(),
        admin_session_secret: "test-session-secret-0123456789abcdef".to_string(),
        secure_cookies: false,
        cors_allowed_origins: None,
        notify_allowed_ips: AllowedIps::Any,
        trusted_proxy_depth: 0,
        log_request_body: true,
    }
}

pub fn gateway_codec() -> TradeCodec {
    TradeCodec::new(MERCHANT_ID, "2.0", HASH_KEY, HASH_IV, TextEncoding::Base64)
        .expect("valid test keys")
}

/// Serves the app on an ephemeral port and returns its base URL.
pub async fn spawn_app(config: Config) -> String {
    config.validate().expect("valid test config");
    let app = create_app(AppState::from_config(config).expect("app state"));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    format!("http://{}", addr)
}

/// A client that reports redirects instead of following them.
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

/// Address nothing listens on.
pub fn refused_url() -> String {
    let listener = std::net::TcpListener::bind(("127.0.0.1", 0)).unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

/// Accepts connections and never answers.
pub async fn stalled_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    format!("http://{}", addr)
}

pub fn form(pairs: &[(&str, &str)]) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish()
}

/// Decoded query of a redirect `Location`, plus its path.
pub fn redirect_target(response: &reqwest::Response) -> (String, Vec<(String, String)>) {
    let location = response
        .headers()
        .get(reqwest::header::LOCATION)
        .expect("location header")
        .to_str()
        .unwrap();
    let (path, query) = location.split_once('?').expect("query string");
    (
        path.to_string(),
        url::form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect(),
    )
}

pub fn query_value<'a>(query: &'a [(String, String)], key: &str) -> Option<&'a str> {
    query
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}
