use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response};
use thiserror::Error;

use super::models::{CreateOrderRequest, OrderListing, PaymentLink};

pub const CREATE_ORDER_PATH: &str = "/api/ecommerce/create-order";
pub const NOTIFY_PATH: &str = "/web/pay/notify_ecommerce";
pub const LIST_ORDERS_PATH: &str = "/api/ecommerce/orders";
pub const LANGUAGE_HEADER: &str = "Language";

#[derive(Error, Debug)]
pub enum OrderServiceError {
    #[error("order service timed out after {0:?}")]
    Timeout(Duration),

    #[error("order service unreachable: {0}")]
    Transport(String),

    #[error("order service returned {status}: {body}")]
    Backend { status: u16, body: String },

    #[error("invalid response from order service: {0}")]
    InvalidResponse(String),
}

impl OrderServiceError {
    /// Timeouts and connection failures, as opposed to an answer we did not like.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            OrderServiceError::Timeout(_) | OrderServiceError::Transport(_)
        )
    }
}

/// Body of a notify forward: the re-encoded field set, or the untouched
/// bytes when the payload could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardBody {
    Fields(Vec<(String, String)>),
    Raw(Vec<u8>),
}

impl ForwardBody {
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            ForwardBody::Fields(fields) => url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(fields.iter())
                .finish()
                .into_bytes(),
            ForwardBody::Raw(bytes) => bytes,
        }
    }
}

/// HTTP client for the external order service. Every call is bounded by the
/// configured timeout and never retried here.
#[derive(Clone)]
pub struct OrderServiceClient {
    client: Client,
    base_url: String,
    language: String,
    timeout: Duration,
}

impl OrderServiceClient {
    pub fn new(base_url: String, language: String, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        OrderServiceClient {
            client,
            base_url,
            language,
            timeout,
        }
    }

    pub fn from_config(config: &crate::config::Config) -> Self {
        Self::new(
            config.order_service_url.clone(),
            config.order_service_language.clone(),
            config.order_service_timeout,
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn classify(&self, err: reqwest::Error) -> OrderServiceError {
        if err.is_timeout() {
            OrderServiceError::Timeout(self.timeout)
        } else {
            OrderServiceError::Transport(err.to_string())
        }
    }

    async fn ensure_success(&self, response: Response) -> Result<Response, OrderServiceError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(OrderServiceError::Backend {
            status: status.as_u16(),
            body,
        })
    }

    /// Creates the order upstream and returns the gateway payment link.
    pub async fn create_order(
        &self,
        order: &CreateOrderRequest,
    ) -> Result<PaymentLink, OrderServiceError> {
        let url = self.url(CREATE_ORDER_PATH);
        tracing::debug!(url = %url, "forwarding create-order");

        let response = self
            .client
            .post(&url)
            .header(LANGUAGE_HEADER, &self.language)
            .json(order)
            .send()
            .await
            .map_err(|e| self.classify(e))?;
        let response = self.ensure_success(response).await?;

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| OrderServiceError::InvalidResponse(e.to_string()))?;

        extract_payment_link(&body).ok_or_else(|| {
            OrderServiceError::InvalidResponse(format!("missing payment_url in {}", body))
        })
    }

    /// Posts a gateway callback payload to the notify endpoint.
    pub async fn forward_notify(&self, body: ForwardBody) -> Result<(), OrderServiceError> {
        let url = self.url(NOTIFY_PATH);

        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(LANGUAGE_HEADER, &self.language)
            .body(body.into_bytes())
            .send()
            .await
            .map_err(|e| self.classify(e))?;
        let response = self.ensure_success(response).await?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        tracing::info!(status = status.as_u16(), body = %text, "order service accepted notify");

        Ok(())
    }

    pub async fn list_orders(&self) -> Result<OrderListing, OrderServiceError> {
        let url = self.url(LIST_ORDERS_PATH);

        let response = self
            .client
            .get(&url)
            .header(LANGUAGE_HEADER, &self.language)
            .send()
            .await
            .map_err(|e| self.classify(e))?;
        let response = self.ensure_success(response).await?;

        response
            .json::<OrderListing>()
            .await
            .map_err(|e| OrderServiceError::InvalidResponse(e.to_string()))
    }

    /// Reachability probe used by the startup report.
    pub async fn ping(&self) -> Result<u16, OrderServiceError> {
        let response = self
            .client
            .get(&self.base_url)
            .send()
            .await
            .map_err(|e| self.classify(e))?;
        Ok(response.status().as_u16())
    }
}

fn extract_payment_link(body: &serde_json::Value) -> Option<PaymentLink> {
    let data = body.get("data").filter(|d| d.is_object()).unwrap_or(body);
    let payment_url = data.get("payment_url")?.as_str()?.trim();
    if payment_url.is_empty() {
        return None;
    }

    let order_no = data
        .get("order_no")
        .and_then(|v| v.as_str())
        .map(str::to_string);

    Some(PaymentLink {
        payment_url: payment_url.to_string(),
        order_no,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn sample_order() -> CreateOrderRequest {
        CreateOrderRequest {
            name: "王小明".to_string(),
            email: "ming@example.com".to_string(),
            phone: "0912345678".to_string(),
            address: "台北市信義區市府路1號".to_string(),
            amount: 1680,
            note: None,
            product_name: "生態米禮盒".to_string(),
        }
    }

    fn client(url: String) -> OrderServiceClient {
        OrderServiceClient::new(url, "cht".to_string(), Duration::from_secs(5))
    }

    #[test]
    fn extracts_nested_and_top_level_payment_url() {
        let nested = json!({"code": 200, "data": {"payment_url": "https://pay/x", "order_no": "ORD1"}});
        let link = extract_payment_link(&nested).unwrap();
        assert_eq!(link.payment_url, "https://pay/x");
        assert_eq!(link.order_no.as_deref(), Some("ORD1"));

        let flat = json!({"payment_url": "https://pay/y"});
        assert_eq!(extract_payment_link(&flat).unwrap().payment_url, "https://pay/y");

        assert!(extract_payment_link(&json!({"data": {"payment_url": ""}})).is_none());
        assert!(extract_payment_link(&json!({"code": 500})).is_none());
    }

    #[test]
    fn fields_body_is_form_encoded() {
        let body = ForwardBody::Fields(vec![
            ("Status".to_string(), "SUCCESS".to_string()),
            ("TradeInfo".to_string(), "a+b/c=".to_string()),
        ]);
        assert_eq!(
            String::from_utf8(body.into_bytes()).unwrap(),
            "Status=SUCCESS&TradeInfo=a%2Bb%2Fc%3D"
        );
    }

    #[tokio::test]
    async fn create_order_returns_payment_link() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", CREATE_ORDER_PATH)
            .match_header("language", "cht")
            .match_body(Matcher::PartialJson(json!({"phone": "0912345678", "amount": 1680})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"code":200,"data":{"payment_url":"https://ccore.newebpay.com/MPG/mpg_gateway?x=1"}}"#)
            .create_async()
            .await;

        let link = client(server.url()).create_order(&sample_order()).await.unwrap();
        assert_eq!(link.payment_url, "https://ccore.newebpay.com/MPG/mpg_gateway?x=1");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn create_order_surfaces_backend_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", CREATE_ORDER_PATH)
            .with_status(422)
            .with_body("duplicate order")
            .create_async()
            .await;

        let err = client(server.url())
            .create_order(&sample_order())
            .await
            .unwrap_err();
        match err {
            OrderServiceError::Backend { status, body } => {
                assert_eq!(status, 422);
                assert_eq!(body, "duplicate order");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn create_order_rejects_malformed_success() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", CREATE_ORDER_PATH)
            .with_status(200)
            .with_body("<html>gateway</html>")
            .create_async()
            .await;

        let err = client(server.url())
            .create_order(&sample_order())
            .await
            .unwrap_err();
        assert!(matches!(err, OrderServiceError::InvalidResponse(_)));
        assert!(!err.is_transport());
    }

    #[tokio::test]
    async fn connection_refused_is_transport_error() {
        let listener = std::net::TcpListener::bind(("127.0.0.1", 0)).unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = client(format!("http://{}", addr))
            .forward_notify(ForwardBody::Raw(b"Status=SUCCESS".to_vec()))
            .await
            .unwrap_err();
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn forward_notify_posts_form_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", NOTIFY_PATH)
            .match_header("content-type", "application/x-www-form-urlencoded")
            .match_header("language", "cht")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("Status".into(), "SUCCESS".into()),
                Matcher::UrlEncoded("MerchantOrderNo".into(), "ORD123".into()),
            ]))
            .with_status(200)
            .with_body("1|OK")
            .create_async()
            .await;

        client(server.url())
            .forward_notify(ForwardBody::Fields(vec![
                ("Status".to_string(), "SUCCESS".to_string()),
                ("MerchantOrderNo".to_string(), "ORD123".to_string()),
            ]))
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn list_orders_parses_listing() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", LIST_ORDERS_PATH)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "orders": [{
                        "id": 1,
                        "order_no": "ORD1",
                        "customer_name": "王小明",
                        "customer_email": "ming@example.com",
                        "customer_phone": "0912345678",
                        "product_name": "生態米禮盒",
                        "total_amount": 1680,
                        "payment_status": 1,
                        "order_status": 0,
                        "payment_time": "2025-01-01 10:00:00",
                        "create_time": "2025-01-01 09:58:00"
                    }],
                    "stats": {"total": 1, "paid": 1, "pending": 0, "failed": 0}
                })
                .to_string(),
            )
            .create_async()
            .await;

        let listing = client(server.url()).list_orders().await.unwrap();
        assert_eq!(listing.orders.len(), 1);
        assert_eq!(listing.stats.unwrap().paid, 1);
    }
}
