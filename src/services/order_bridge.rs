use crate::error::AppError;
use crate::order_service::{OrderServiceClient, PaymentLink};
use crate::validation::OrderIntent;

/// Relays a customer's order intent to the order service and hands back the
/// gateway payment link. Validation happens before any network call.
#[derive(Clone)]
pub struct OrderCreationBridge {
    client: OrderServiceClient,
}

impl OrderCreationBridge {
    pub fn new(client: OrderServiceClient) -> Self {
        Self { client }
    }

    pub async fn create_order(&self, intent: OrderIntent) -> Result<PaymentLink, AppError> {
        let request = intent.validate()?;
        tracing::info!(
            product = %request.product_name,
            amount = request.amount,
            "creating order"
        );

        let link = self.client.create_order(&request).await?;
        tracing::info!(order_no = ?link.order_no, "order created, payment link issued");

        Ok(link)
    }
}
