use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::Serialize;

use crate::error::AppError;
use crate::order_service::PaymentLink;
use crate::validation::OrderIntent;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct CreateOrderResponse {
    pub success: bool,
    pub code: u16,
    pub data: PaymentLink,
}

/// `POST /orders/create`
pub async fn create_order(
    State(state): State<AppState>,
    payload: Result<Json<OrderIntent>, JsonRejection>,
) -> Result<Json<CreateOrderResponse>, AppError> {
    let Json(intent) = payload.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
    let link = state.orders.create_order(intent).await?;

    Ok(Json(CreateOrderResponse {
        success: true,
        code: 200,
        data: link,
    }))
}
