use uuid::Uuid;

use crate::{db::DbPool, middleware::auth::AuthUser, models::Profile, state::AppState};

/// Gateway sandbox sample values that have leaked into real traffic before.
/// Compared against the canonical/normalized forms and treated as absent.
const SENTINEL_EMAILS: [&str; 1] = ["customer@example.com"];
const SENTINEL_PHONES: [&str; 2] = ["9999999999", "919999999999"];

/// Human identity attached to an order. Display values; the canonical
/// forms are derived on demand.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CustomerIdentity {
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl CustomerIdentity {
    pub fn email_canonical(&self) -> Option<String> {
        self.email.as_deref().map(canonical_email)
    }

    pub fn phone_normalized(&self) -> Option<String> {
        self.phone.as_deref().map(normalize_phone)
    }

    fn complete(&self) -> bool {
        self.email.is_some() && self.phone.is_some()
    }

    /// First non-empty wins per field, so earlier sources take priority.
    fn fill_from(&mut self, other: CustomerIdentity) {
        if self.email.is_none() {
            self.email = other.email;
        }
        if self.phone.is_none() {
            self.phone = other.phone;
        }
    }
}

/// Candidate sources for one resolution, in priority order: explicit
/// request values, the stored profile, token claims (with a provider
/// lookup when the claims carry no contact info), and finally the
/// gateway's own contact fields for webhook-originated events.
#[derive(Debug, Default)]
pub struct IdentitySources<'a> {
    pub explicit_email: Option<&'a str>,
    pub explicit_phone: Option<&'a str>,
    pub user_id: Option<Uuid>,
    pub auth: Option<&'a AuthUser>,
    pub gateway_email: Option<&'a str>,
    pub gateway_contact: Option<&'a str>,
}

pub async fn resolve_customer_identity(
    state: &AppState,
    sources: IdentitySources<'_>,
) -> CustomerIdentity {
    let mut identity = CustomerIdentity {
        email: sanitize_email(sources.explicit_email),
        phone: sanitize_phone(sources.explicit_phone),
    };

    if !identity.complete() {
        if let Some(user_id) = sources.user_id {
            if let Some(profile) = find_profile(&state.pool, user_id).await {
                identity.fill_from(CustomerIdentity {
                    email: sanitize_email(profile.email.as_deref()),
                    phone: sanitize_phone(profile.phone.as_deref()),
                });
            }
        }
    }

    if !identity.complete() {
        if let Some(auth) = sources.auth {
            let mut email = sanitize_email(auth.email.as_deref());
            let mut phone = sanitize_phone(auth.phone.as_deref());
            if email.is_none() && phone.is_none() {
                if let Some(user) = state.identity.get_user_by_id(auth.user_id).await {
                    email = sanitize_email(user.email.as_deref());
                    phone = sanitize_phone(user.phone.as_deref());
                }
            }
            identity.fill_from(CustomerIdentity { email, phone });
        }
    }

    if !identity.complete() {
        identity.fill_from(CustomerIdentity {
            email: sanitize_email(sources.gateway_email),
            phone: sanitize_phone(sources.gateway_contact),
        });
    }

    identity
}

/// Profile lookup by the provider's subject id. Failures degrade to
/// "no profile"; an order may persist with unknown contact info.
pub async fn find_profile(pool: &DbPool, user_id: Uuid) -> Option<Profile> {
    match sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
    {
        Ok(profile) => profile,
        Err(err) => {
            tracing::warn!(user_id = %user_id, error = %err, "profile lookup failed");
            None
        }
    }
}

/// Match gateway-supplied contact fields against stored profiles to pin a
/// webhook-created order onto an account. Email wins over phone.
pub async fn find_user_by_contact(
    pool: &DbPool,
    email: Option<&str>,
    phone: Option<&str>,
) -> Option<Uuid> {
    if let Some(email) = sanitize_email(email) {
        let canonical = canonical_email(&email);
        match sqlx::query_as::<_, Profile>(
            "SELECT * FROM profiles WHERE email_canonical = $1 LIMIT 1",
        )
        .bind(&canonical)
        .fetch_optional(pool)
        .await
        {
            Ok(Some(profile)) => return Some(profile.id),
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(error = %err, "profile match by email failed");
            }
        }
    }

    if let Some(phone) = sanitize_phone(phone) {
        let normalized = normalize_phone(&phone);
        match sqlx::query_as::<_, Profile>(
            "SELECT * FROM profiles WHERE phone_normalized = $1 LIMIT 1",
        )
        .bind(&normalized)
        .fetch_optional(pool)
        .await
        {
            Ok(Some(profile)) => return Some(profile.id),
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(error = %err, "profile match by phone failed");
            }
        }
    }

    None
}

/// Lower-cased, trimmed form used strictly for equality matching.
pub fn canonical_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Digits-only form used strictly for equality matching.
pub fn normalize_phone(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

fn sanitize_email(raw: Option<&str>) -> Option<String> {
    let trimmed = raw?.trim();
    if trimmed.is_empty() {
        return None;
    }
    let canonical = canonical_email(trimmed);
    if SENTINEL_EMAILS.contains(&canonical.as_str()) {
        return None;
    }
    Some(trimmed.to_string())
}

fn sanitize_phone(raw: Option<&str>) -> Option<String> {
    let trimmed = raw?.trim();
    if trimmed.is_empty() {
        return None;
    }
    let normalized = normalize_phone(trimmed);
    if normalized.is_empty() || SENTINEL_PHONES.contains(&normalized.as_str()) {
        return None;
    }
    Some(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_email_is_idempotent() {
        let raw = "  Shopper@Example.ORG ";
        let once = canonical_email(raw);
        assert_eq!(once, "shopper@example.org");
        assert_eq!(canonical_email(&once), once);
    }

    #[test]
    fn normalize_phone_strips_non_digits() {
        let once = normalize_phone("+91 (99887) 766-55");
        assert_eq!(once, "919988776655");
        assert_eq!(normalize_phone(&once), once);
    }

    #[test]
    fn sentinel_email_treated_as_absent() {
        assert_eq!(sanitize_email(Some("Customer@Example.com")), None);
        assert_eq!(
            sanitize_email(Some("real@example.com")).as_deref(),
            Some("real@example.com")
        );
    }

    #[test]
    fn sentinel_phone_treated_as_absent() {
        assert_eq!(sanitize_phone(Some("+91 99999 99999")), None);
        assert_eq!(sanitize_phone(Some("9999999999")), None);
        assert_eq!(
            sanitize_phone(Some("+91 99887 76655")).as_deref(),
            Some("+91 99887 76655")
        );
    }

    #[test]
    fn blank_values_treated_as_absent() {
        assert_eq!(sanitize_email(Some("   ")), None);
        assert_eq!(sanitize_phone(Some("-- --")), None);
        assert_eq!(sanitize_email(None), None);
    }

    #[test]
    fn fill_from_keeps_higher_priority_fields() {
        let mut identity = CustomerIdentity {
            email: Some("explicit@shop.test".into()),
            phone: None,
        };
        identity.fill_from(CustomerIdentity {
            email: Some("profile@shop.test".into()),
            phone: Some("12345".into()),
        });
        assert_eq!(identity.email.as_deref(), Some("explicit@shop.test"));
        assert_eq!(identity.phone.as_deref(), Some("12345"));
    }
}
