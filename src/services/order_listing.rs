use serde::Serialize;

use crate::order_service::{Order, OrderListing, OrderServiceClient, OrderStats};

pub const MESSAGE_UNAVAILABLE: &str = "暫無資料或後端服務不可用";

/// Admin listing result. A backend failure degrades to an empty listing
/// instead of an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingOutcome {
    Live(OrderListing),
    Degraded { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingResponse {
    pub orders: Vec<Order>,
    pub stats: OrderStats,
    pub degraded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ListingOutcome {
    pub fn is_degraded(&self) -> bool {
        matches!(self, ListingOutcome::Degraded { .. })
    }

    pub fn into_response_body(self) -> ListingResponse {
        match self {
            ListingOutcome::Live(listing) => {
                let stats = listing
                    .stats
                    .unwrap_or_else(|| OrderStats::from_orders(&listing.orders));
                ListingResponse {
                    orders: listing.orders,
                    stats,
                    degraded: false,
                    message: None,
                }
            }
            ListingOutcome::Degraded { .. } => ListingResponse {
                orders: Vec::new(),
                stats: OrderStats::default(),
                degraded: true,
                message: Some(MESSAGE_UNAVAILABLE.to_string()),
            },
        }
    }
}

#[derive(Clone)]
pub struct OrderListingService {
    client: OrderServiceClient,
}

impl OrderListingService {
    pub fn new(client: OrderServiceClient) -> Self {
        Self { client }
    }

    pub async fn list(&self) -> ListingOutcome {
        match self.client.list_orders().await {
            Ok(listing) => {
                tracing::info!(count = listing.orders.len(), "loaded order listing");
                ListingOutcome::Live(listing)
            }
            Err(err) => {
                tracing::error!(error = %err, "order listing unavailable, serving degraded result");
                ListingOutcome::Degraded {
                    reason: err.to_string(),
                }
            }
        }
    }
}
