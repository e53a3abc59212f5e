use std::time::Duration;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// REST client for the payment gateway. Credentials ride on every call as
/// basic auth; the gateway issues order ids at create time and payment ids
/// once a payment completes.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    http: reqwest::Client,
    base_url: String,
    key_id: String,
    key_secret: String,
}

/// Order descriptor returned by the gateway at pre-create time and echoed
/// back to the storefront client, which feeds it to the hosted checkout.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GatewayOrderDescriptor {
    pub id: String,
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayPayment {
    pub id: String,
    #[serde(default)]
    pub order_id: Option<String>,
    pub status: String,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub contact: Option<String>,
}

#[derive(Serialize)]
struct CreateOrderBody<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
}

impl GatewayClient {
    pub fn new(
        base_url: impl Into<String>,
        key_id: impl Into<String>,
        key_secret: impl Into<String>,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            key_id: key_id.into(),
            key_secret: key_secret.into(),
        })
    }

    /// Create a gateway order. Amount is in the smallest currency unit.
    pub async fn create_order(
        &self,
        amount: i64,
        currency: &str,
        receipt: &str,
    ) -> AppResult<GatewayOrderDescriptor> {
        let url = format!("{}/v1/orders", self.base_url);
        let response = self
            .http
            .post(&url)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&CreateOrderBody {
                amount,
                currency,
                receipt,
            })
            .send()
            .await
            .map_err(|err| AppError::Gateway(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Gateway(format!(
                "order creation returned {status}"
            )));
        }

        response
            .json::<GatewayOrderDescriptor>()
            .await
            .map_err(|err| AppError::Gateway(err.to_string()))
    }

    /// Fetch a payment by id. Used to backfill contact fields when a
    /// webhook event omits them; failures degrade to `None` so the event
    /// is still applied.
    pub async fn fetch_payment(&self, payment_id: &str) -> Option<GatewayPayment> {
        let url = format!("{}/v1/payments/{}", self.base_url, payment_id);
        let response = self
            .http
            .get(&url)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .send()
            .await;

        let response = match response {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                tracing::warn!(payment_id, status = %r.status(), "payment fetch rejected");
                return None;
            }
            Err(err) => {
                tracing::warn!(payment_id, error = %err, "payment fetch failed");
                return None;
            }
        };

        match response.json::<GatewayPayment>().await {
            Ok(payment) => Some(payment),
            Err(err) => {
                tracing::warn!(payment_id, error = %err, "payment fetch returned bad body");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn create_order_parses_descriptor() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/orders"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "order_gw_1",
                "amount": 500,
                "currency": "INR",
                "status": "created"
            })))
            .mount(&server)
            .await;

        let client = GatewayClient::new(server.uri(), "key", "secret").unwrap();
        let order = client.create_order(500, "INR", "rcpt_1").await.unwrap();
        assert_eq!(order.id, "order_gw_1");
        assert_eq!(order.amount, 500);
        assert_eq!(order.currency, "INR");
    }

    #[tokio::test]
    async fn create_order_surfaces_gateway_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/orders"))
            .respond_with(ResponseTemplate::new(400))
            .mount(&server)
            .await;

        let client = GatewayClient::new(server.uri(), "key", "secret").unwrap();
        let err = client.create_order(500, "INR", "rcpt_1").await.unwrap_err();
        assert!(matches!(err, AppError::Gateway(_)));
    }

    #[tokio::test]
    async fn fetch_payment_degrades_to_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/payments/pay_missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = GatewayClient::new(server.uri(), "key", "secret").unwrap();
        assert!(client.fetch_payment("pay_missing").await.is_none());
    }
}
