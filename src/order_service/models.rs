use serde::{Deserialize, Deserializer, Serialize};

pub const PAYMENT_STATUS_PENDING: i32 = 0;
pub const PAYMENT_STATUS_PAID: i32 = 1;
pub const PAYMENT_STATUS_FAILED: i32 = 2;

/// Validated order intent forwarded to the order service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub amount: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub product_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentLink {
    pub payment_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_no: Option<String>,
}

/// One backend order row. Every column is optional so a single incomplete
/// row does not take the whole listing down.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Order {
    pub id: Option<i64>,
    pub order_no: Option<String>,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub product_name: Option<String>,
    pub total_amount: Option<i64>,
    pub payment_status: Option<i32>,
    pub order_status: Option<i32>,
    pub payment_time: Option<String>,
    pub create_time: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStats {
    pub total: u64,
    pub paid: u64,
    pub pending: u64,
    pub failed: u64,
}

impl OrderStats {
    /// Counts by payment status. Refunds only count towards `total`.
    pub fn from_orders(orders: &[Order]) -> Self {
        orders.iter().fold(
            OrderStats {
                total: orders.len() as u64,
                ..OrderStats::default()
            },
            |mut stats, order| {
                match order.payment_status {
                    Some(PAYMENT_STATUS_PAID) => stats.paid += 1,
                    Some(PAYMENT_STATUS_PENDING) => stats.pending += 1,
                    Some(PAYMENT_STATUS_FAILED) => stats.failed += 1,
                    _ => {}
                }
                stats
            },
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderListing {
    #[serde(default, deserialize_with = "lenient_orders")]
    pub orders: Vec<Order>,
    #[serde(default)]
    pub stats: Option<OrderStats>,
}

/// Rows that are not order objects at all are logged and skipped.
fn lenient_orders<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Order>, D::Error> {
    let rows = Option::<Vec<serde_json::Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(rows
        .into_iter()
        .enumerate()
        .filter_map(|(index, row)| match serde_json::from_value(row) {
            Ok(order) => Some(order),
            Err(err) => {
                tracing::warn!(index, error = %err, "skipping unreadable order row");
                None
            }
        })
        .collect())
}
