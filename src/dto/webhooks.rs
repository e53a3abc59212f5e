use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Raw gateway webhook body. The gateway has shipped the same fields in
/// several nesting shapes over time; all of them are decoded once here at
/// the boundary and collapsed into a [`PaymentNotice`]. Downstream code
/// never touches the raw shapes.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum GatewayWebhookBody {
    Enveloped(WebhookEnvelope),
    Bare(PaymentEntity),
}

#[derive(Debug, Deserialize)]
pub struct WebhookEnvelope {
    #[serde(default)]
    pub event: Option<String>,
    pub payload: EventPayload,
}

#[derive(Debug, Deserialize)]
pub struct EventPayload {
    #[serde(default)]
    pub payment: Option<Wrapped<PaymentEntity>>,
    #[serde(default)]
    pub order: Option<Wrapped<OrderEntity>>,
}

/// Entities arrive either as `{"entity": {...}}` or flat.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Wrapped<T> {
    Nested { entity: T },
    Flat(T),
}

impl<T> Wrapped<T> {
    pub fn into_inner(self) -> T {
        match self {
            Wrapped::Nested { entity } => entity,
            Wrapped::Flat(inner) => inner,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentEntity {
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

#[derive(Debug, Clone, Deserialize)]
pub struct OrderEntity {
    pub id: String,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Normalized webhook event. The orchestrator consumes only this.
#[derive(Debug, Clone)]
pub struct PaymentNotice {
    pub event: Option<String>,
    pub payment_id: String,
    pub gateway_order_id: String,
    pub status: String,
    pub amount: Option<i64>,
    pub currency: Option<String>,
    pub email: Option<String>,
    pub contact: Option<String>,
}

impl GatewayWebhookBody {
    pub fn into_notice(self) -> Result<PaymentNotice, String> {
        match self {
            GatewayWebhookBody::Enveloped(envelope) => {
                let EventPayload { payment, order } = envelope.payload;
                let payment = payment
                    .map(Wrapped::into_inner)
                    .ok_or_else(|| "event carries no payment entity".to_string())?;
                let order = order.map(Wrapped::into_inner);
                let gateway_order_id = payment
                    .order_id
                    .clone()
                    .or_else(|| order.as_ref().map(|o| o.id.clone()))
                    .ok_or_else(|| "payment carries no order reference".to_string())?;
                Ok(PaymentNotice {
                    event: envelope.event,
                    payment_id: payment.id,
                    gateway_order_id,
                    status: payment.status,
                    amount: payment.amount.or(order.as_ref().and_then(|o| o.amount)),
                    currency: payment.currency.or(order.and_then(|o| o.currency)),
                    email: payment.email,
                    contact: payment.contact,
                })
            }
            GatewayWebhookBody::Bare(payment) => {
                let gateway_order_id = payment
                    .order_id
                    .clone()
                    .ok_or_else(|| "payment carries no order reference".to_string())?;
                Ok(PaymentNotice {
                    event: None,
                    payment_id: payment.id,
                    gateway_order_id,
                    status: payment.status,
                    amount: payment.amount,
                    currency: payment.currency,
                    email: payment.email,
                    contact: payment.contact,
                })
            }
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookOutcome {
    pub updated: bool,
    pub created: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_entity_wrapped_payload() {
        let body = r#"{
            "event": "payment.captured",
            "payload": {
                "payment": {
                    "entity": {
                        "id": "pay_1",
                        "order_id": "order_gw_1",
                        "status": "captured",
                        "amount": 500,
                        "currency": "INR",
                        "email": "a@b.test",
                        "contact": "+91 99887 76655"
                    }
                }
            }
        }"#;
        let notice = serde_json::from_str::<GatewayWebhookBody>(body)
            .unwrap()
            .into_notice()
            .unwrap();
        assert_eq!(notice.payment_id, "pay_1");
        assert_eq!(notice.gateway_order_id, "order_gw_1");
        assert_eq!(notice.status, "captured");
        assert_eq!(notice.amount, Some(500));
        assert_eq!(notice.email.as_deref(), Some("a@b.test"));
    }

    #[test]
    fn decodes_flat_payload_entities() {
        let body = r#"{
            "payload": {
                "payment": {"id": "pay_2", "status": "authorized"},
                "order": {"entity": {"id": "order_gw_2", "amount": 700, "currency": "INR"}}
            }
        }"#;
        let notice = serde_json::from_str::<GatewayWebhookBody>(body)
            .unwrap()
            .into_notice()
            .unwrap();
        assert_eq!(notice.gateway_order_id, "order_gw_2");
        assert_eq!(notice.amount, Some(700));
        assert_eq!(notice.currency.as_deref(), Some("INR"));
    }

    #[test]
    fn decodes_bare_payment_body() {
        let body = r#"{"id": "pay_3", "order_id": "order_gw_3", "status": "paid"}"#;
        let notice = serde_json::from_str::<GatewayWebhookBody>(body)
            .unwrap()
            .into_notice()
            .unwrap();
        assert_eq!(notice.payment_id, "pay_3");
        assert_eq!(notice.gateway_order_id, "order_gw_3");
    }

    #[test]
    fn rejects_event_without_payment_entity() {
        let body = r#"{"payload": {"order": {"entity": {"id": "order_gw_4"}}}}"#;
        let err = serde_json::from_str::<GatewayWebhookBody>(body)
            .unwrap()
            .into_notice()
            .unwrap_err();
        assert!(err.contains("no payment entity"));
    }

    #[test]
    fn rejects_payment_without_order_reference() {
        let body = r#"{"id": "pay_5", "status": "captured"}"#;
        let err = serde_json::from_str::<GatewayWebhookBody>(body)
            .unwrap()
            .into_notice()
            .unwrap_err();
        assert!(err.contains("no order reference"));
    }
}
