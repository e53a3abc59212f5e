use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_SUCCESS: &str = "success";
pub const STATUS_FAILED: &str = "failed";

/// A paid-or-pending storefront order. One row per gateway order attempt;
/// at most one success row per gateway payment.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Order {
    pub id: Uuid,
    pub gateway_order_id: String,
    /// Issued by the gateway only once payment completes; absent while pending.
    pub payment_id: Option<String>,
    /// Proof supplied by the callback path. Stored for audit, never read
    /// back as trust material.
    pub payment_signature: Option<String>,
    /// Smallest currency unit (paise, cents) at every call site.
    pub amount: i64,
    pub currency: String,
    /// Opaque ordered list of line entries; this subsystem never looks inside.
    #[schema(value_type = Object)]
    pub items: serde_json::Value,
    pub status: String,
    pub user_id: Option<Uuid>,
    pub customer_email: Option<String>,
    /// Lower-cased, trimmed. Matching only, never display.
    pub customer_email_canonical: Option<String>,
    pub customer_phone: Option<String>,
    /// Digits only. Matching only, never display.
    pub customer_phone_normalized: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Stored customer profile, keyed by the identity provider's subject id.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub email: Option<String>,
    pub email_canonical: Option<String>,
    pub phone: Option<String>,
    pub phone_normalized: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Maps a gateway payment status onto the order lifecycle. Unknown
/// statuses pass through unchanged.
pub fn map_gateway_status(status: &str) -> String {
    match status {
        "captured" | "paid" | "authorized" => STATUS_SUCCESS.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successful_gateway_statuses_map_to_success() {
        for s in ["captured", "paid", "authorized"] {
            assert_eq!(map_gateway_status(s), STATUS_SUCCESS);
        }
    }

    #[test]
    fn other_gateway_statuses_pass_through() {
        assert_eq!(map_gateway_status("failed"), "failed");
        assert_eq!(map_gateway_status("created"), "created");
        assert_eq!(map_gateway_status("refunded"), "refunded");
    }
}
