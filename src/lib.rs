pub mod cli;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod order_service;
pub mod secrets;
pub mod services;
pub mod startup;
pub mod trade;
pub mod utils;
pub mod validation;

use std::sync::Arc;

use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::config::Config;
use crate::error::AppError;
use crate::middleware::{admin_session_auth, request_logger_middleware, NotifyAllowlistLayer};
use crate::order_service::OrderServiceClient;
use crate::services::{
    CallbackReconciler, OrderCreationBridge, OrderListingService, SessionSigner,
};
use crate::trade::TradeCodec;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub reconciler: CallbackReconciler,
    pub orders: OrderCreationBridge,
    pub listing: OrderListingService,
    pub sessions: SessionSigner,
}

impl AppState {
    /// Wires the services from a validated config.
    pub fn from_config(config: Config) -> Result<Self, AppError> {
        let codec = TradeCodec::from_config(&config)?;
        let client = OrderServiceClient::from_config(&config);
        let sessions = SessionSigner::new(&config.admin_session_secret, &config.admin_username)?;

        Ok(Self {
            reconciler: CallbackReconciler::new(client.clone(), codec),
            orders: OrderCreationBridge::new(client.clone()),
            listing: OrderListingService::new(client),
            sessions,
            config: Arc::new(config),
        })
    }
}

pub fn create_app(state: AppState) -> Router {
    let admin = Router::new()
        .route("/admin/orders", get(handlers::admin::list_orders))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            admin_session_auth,
        ));

    let notify = Router::new()
        .route("/payments/notify", post(handlers::payments::payment_notify))
        .route_layer(NotifyAllowlistLayer::new(
            state.config.notify_allowed_ips.clone(),
            state.config.trusted_proxy_depth,
        ));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/orders/create", post(handlers::orders::create_order))
        .route(
            "/payments/callback",
            post(handlers::payments::payment_return).get(handlers::payments::callback_probe),
        )
        .route("/admin/login", post(handlers::auth::login))
        .route("/admin/logout", post(handlers::auth::logout))
        .route("/admin/check-auth", get(handlers::auth::check_auth))
        .merge(admin)
        .merge(notify)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            request_logger_middleware,
        ))
        .layer(cors_layer(&state.config))
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static("language")]);

    match &config.cors_allowed_origins {
        Some(origins) => {
            let origins: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|origin| HeaderValue::from_str(origin).ok())
                .collect();
            layer
                .allow_origin(AllowOrigin::list(origins))
                .allow_credentials(true)
        }
        None => layer.allow_origin(AllowOrigin::any()),
    }
}
