use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Verify a hex-encoded HMAC-SHA256 over the exact payload bytes.
///
/// This is the only trust boundary protecting order state from forgery:
/// the webhook body and the callback proof both pass through here before
/// any mutation. Comparison is constant-time.
pub fn verify_hmac_hex(payload: &[u8], signature_hex: &str, secret: &[u8]) -> bool {
    if signature_hex.is_empty() || secret.is_empty() {
        return false;
    }
    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return false;
    };
    mac.update(payload);
    let expected = hex::encode(mac.finalize().into_bytes());
    constant_time_eq(expected.as_bytes(), signature_hex.as_bytes())
}

/// The callback path signs `"{gateway_order_id}|{payment_id}"`.
pub fn verify_callback_signature(
    gateway_order_id: &str,
    payment_id: &str,
    signature_hex: &str,
    secret: &[u8],
) -> bool {
    let payload = format!("{gateway_order_id}|{payment_id}");
    verify_hmac_hex(payload.as_bytes(), signature_hex, secret)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.iter().zip(b) {
        res |= x ^ y;
    }
    res == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test_webhook_secret";

    fn sign(payload: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(SECRET).unwrap();
        mac.update(payload);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn accepts_matching_signature() {
        let body = br#"{"event":"payment.captured"}"#;
        let sig = sign(body);
        assert!(verify_hmac_hex(body, &sig, SECRET));
    }

    #[test]
    fn rejects_tampered_payload() {
        let sig = sign(br#"{"amount":500}"#);
        assert!(!verify_hmac_hex(br#"{"amount":50000}"#, &sig, SECRET));
    }

    #[test]
    fn rejects_wrong_secret() {
        let body = b"payload";
        let sig = sign(body);
        assert!(!verify_hmac_hex(body, &sig, b"other_secret"));
    }

    #[test]
    fn rejects_missing_signature_or_secret() {
        assert!(!verify_hmac_hex(b"payload", "", SECRET));
        assert!(!verify_hmac_hex(b"payload", "deadbeef", b""));
    }

    #[test]
    fn rejects_truncated_signature() {
        let body = b"payload";
        let sig = sign(body);
        assert!(!verify_hmac_hex(body, &sig[..sig.len() - 2], SECRET));
    }

    #[test]
    fn callback_signature_covers_order_and_payment_ids() {
        let sig = sign(b"order_gw_1|pay_1");
        assert!(verify_callback_signature("order_gw_1", "pay_1", &sig, SECRET));
        assert!(!verify_callback_signature("order_gw_2", "pay_1", &sig, SECRET));
        assert!(!verify_callback_signature("order_gw_1", "pay_2", &sig, SECRET));
    }
}
