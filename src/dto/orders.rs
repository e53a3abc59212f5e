use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::Order;

/// Body for `POST /orders/precreate`. Amount is in the smallest currency
/// unit, same as everywhere else.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PrecreateOrderRequest {
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    #[schema(value_type = Vec<Object>)]
    pub items: Vec<Value>,
    pub user_id: Option<Uuid>,
}

/// Body for `POST /orders` — the client-side payment-success callback.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SaveOrderRequest {
    pub user_id: Uuid,
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    #[schema(value_type = Vec<Object>)]
    pub items: Vec<Value>,
    pub gateway_order_id: String,
    pub payment_id: String,
    pub signature: String,
    pub status: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyPaymentRequest {
    pub gateway_order_id: String,
    pub payment_id: String,
    pub signature: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VerifyPaymentData {
    pub valid: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SavedOrder {
    pub order: Order,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}
