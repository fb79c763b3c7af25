use axum::{
    body::Bytes,
    extract::{OriginalUri, State},
    response::Response,
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};

use crate::services::{AcknowledgeResponder, CallbackChannel, RedirectResponder};
use crate::AppState;

/// `POST /payments/callback`: the customer's browser coming back from the
/// gateway. Always answers with a redirect to the result page.
pub async fn payment_return(State(state): State<AppState>, body: Bytes) -> Response {
    let responder = RedirectResponder::new(state.config.payment_result_path.clone());
    state
        .reconciler
        .handle(CallbackChannel::Return, &body, &responder)
        .await
}

/// `GET /payments/callback`: reachability probe for gateway setup.
pub async fn callback_probe(OriginalUri(uri): OriginalUri) -> Json<Value> {
    Json(json!({
        "message": "payment callback endpoint is reachable",
        "url": uri.to_string(),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// `POST /payments/notify`: server-to-server notification.
pub async fn payment_notify(State(state): State<AppState>, body: Bytes) -> Response {
    state
        .reconciler
        .handle(CallbackChannel::Notify, &body, &AcknowledgeResponder)
        .await
}
