use axum::http::{HeaderMap, header};
use axum::extract::FromRequestParts;
use base64::{Engine as _, engine::general_purpose};
use serde_json::Value;
use uuid::Uuid;

use crate::{dto::auth::TokenClaims, error::AppError, state::AppState};

/// How much the resolved identity can be trusted. Only `Verified` (the
/// provider confirmed the token server-side) may attribute money to an
/// account; `Decoded` identities come from an unverified token payload and
/// are good enough for read paths only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStrength {
    Verified,
    Decoded,
}

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub strength: AuthStrength,
    pub email: Option<String>,
    pub phone: Option<String>,
}

pub fn ensure_verified(user: &AuthUser) -> Result<(), AppError> {
    match user.strength {
        AuthStrength::Verified => Ok(()),
        AuthStrength::Decoded => Err(AppError::Unauthorized(
            "token could not be verified".into(),
        )),
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    /// Resolution order, first success wins:
    /// 1. bearer token confirmed by the identity provider
    /// 2. a session cookie that yields an access token, re-verified as in 1
    /// 3. unverified claims decoded from whichever token is present
    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let bearer = bearer_token(&parts.headers);
        if let Some(token) = bearer.as_deref() {
            if let Some(user) = state.identity.verify_token(token).await {
                return Ok(AuthUser {
                    user_id: user.id,
                    strength: AuthStrength::Verified,
                    email: user.email,
                    phone: user.phone,
                });
            }
        }

        let cookie_token = session_token_from_cookies(&parts.headers);
        if let Some(token) = cookie_token.as_deref() {
            if bearer.as_deref() != Some(token) {
                if let Some(user) = state.identity.verify_token(token).await {
                    return Ok(AuthUser {
                        user_id: user.id,
                        strength: AuthStrength::Verified,
                        email: user.email,
                        phone: user.phone,
                    });
                }
            }
        }

        for token in [bearer, cookie_token].into_iter().flatten() {
            if let Some(user) = decoded_identity(&token) {
                tracing::debug!(user_id = %user.user_id, "identity from unverified token payload");
                return Ok(user);
            }
        }

        Err(AppError::Unauthorized("no resolvable identity".into()))
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| token.to_string())
}

fn is_session_cookie(name: &str) -> bool {
    name == "auth-token" || name == "session-token" || name.ends_with("-auth-token")
}

fn session_token_from_cookies(headers: &HeaderMap) -> Option<String> {
    for value in headers.get_all(header::COOKIE) {
        let Ok(raw) = value.to_str() else { continue };
        for pair in raw.split(';') {
            let Some((name, value)) = pair.trim().split_once('=') else {
                continue;
            };
            if !is_session_cookie(name.trim()) {
                continue;
            }
            if let Some(token) = decode_session_cookie(value.trim()) {
                return Some(token);
            }
        }
    }
    None
}

/// Known cookie encodings: raw JSON, `base64-`-prefixed base64 JSON, or a
/// bare JWT. Malformed payloads yield `None` so the resolver falls through
/// to the next source; they must never abort the request.
pub(crate) fn decode_session_cookie(value: &str) -> Option<String> {
    if let Some(encoded) = value.strip_prefix("base64-") {
        let bytes = general_purpose::URL_SAFE_NO_PAD
            .decode(encoded)
            .or_else(|_| general_purpose::STANDARD.decode(encoded))
            .ok()?;
        let session: Value = serde_json::from_slice(&bytes).ok()?;
        return access_token_from_session(&session);
    }
    if let Ok(session) = serde_json::from_str::<Value>(value) {
        return access_token_from_session(&session);
    }
    looks_like_jwt(value).then(|| value.to_string())
}

/// Session payloads have shipped as a bare token string, as
/// `{"access_token": ...}`, as `{"currentSession": {"access_token": ...}}`
/// and as the legacy `[token, ...]` array.
fn access_token_from_session(session: &Value) -> Option<String> {
    match session {
        Value::String(token) => looks_like_jwt(token).then(|| token.clone()),
        Value::Array(items) => items
            .first()
            .and_then(Value::as_str)
            .filter(|token| looks_like_jwt(token))
            .map(str::to_string),
        Value::Object(map) => {
            if let Some(token) = map.get("access_token").and_then(Value::as_str) {
                return Some(token.to_string());
            }
            map.get("currentSession")
                .and_then(|session| session.get("access_token"))
                .and_then(Value::as_str)
                .map(str::to_string)
        }
        _ => None,
    }
}

fn looks_like_jwt(value: &str) -> bool {
    value.split('.').count() == 3
}

fn decoded_identity(token: &str) -> Option<AuthUser> {
    let claims = decode_unverified_claims(token)?;
    let user_id = claims.subject().and_then(|sub| Uuid::parse_str(sub).ok())?;
    Some(AuthUser {
        user_id,
        strength: AuthStrength::Decoded,
        email: claims.email,
        phone: claims.phone,
    })
}

/// Decode the payload segment of a JWT without checking its signature.
/// The result is low-trust by definition.
pub(crate) fn decode_unverified_claims(token: &str) -> Option<TokenClaims> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return None;
    }
    let bytes = general_purpose::URL_SAFE_NO_PAD.decode(segments[1]).ok()?;
    serde_json::from_slice(&bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jwt_with_claims(claims: &serde_json::Value) -> String {
        let header = general_purpose::URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = general_purpose::URL_SAFE_NO_PAD.encode(claims.to_string());
        format!("{header}.{payload}.unchecked")
    }

    #[test]
    fn unverified_decode_reads_sub_and_email() {
        let id = Uuid::new_v4();
        let token = jwt_with_claims(&serde_json::json!({
            "sub": id,
            "email": "shopper@example.org"
        }));
        let claims = decode_unverified_claims(&token).unwrap();
        assert_eq!(claims.subject(), Some(id.to_string().as_str()));
        assert_eq!(claims.email.as_deref(), Some("shopper@example.org"));
    }

    #[test]
    fn unverified_decode_accepts_user_id_claim() {
        let id = Uuid::new_v4();
        let token = jwt_with_claims(&serde_json::json!({ "user_id": id }));
        let user = decoded_identity(&token).unwrap();
        assert_eq!(user.user_id, id);
        assert_eq!(user.strength, AuthStrength::Decoded);
    }

    #[test]
    fn unverified_decode_swallows_garbage() {
        assert!(decode_unverified_claims("not-a-token").is_none());
        assert!(decode_unverified_claims("a.b").is_none());
        assert!(decode_unverified_claims("a.!!!.c").is_none());
    }

    #[test]
    fn cookie_decodes_plain_json_session() {
        let token = jwt_with_claims(&serde_json::json!({"sub": "x"}));
        let cookie = serde_json::json!({ "access_token": token }).to_string();
        assert_eq!(decode_session_cookie(&cookie), Some(token));
    }

    #[test]
    fn cookie_decodes_base64_prefixed_session() {
        let token = jwt_with_claims(&serde_json::json!({"sub": "x"}));
        let session = serde_json::json!({ "currentSession": { "access_token": token } });
        let cookie = format!(
            "base64-{}",
            general_purpose::URL_SAFE_NO_PAD.encode(session.to_string())
        );
        assert_eq!(decode_session_cookie(&cookie), Some(token));
    }

    #[test]
    fn cookie_decodes_legacy_array_session() {
        let token = jwt_with_claims(&serde_json::json!({"sub": "x"}));
        let cookie = serde_json::json!([token, "refresh"]).to_string();
        assert_eq!(decode_session_cookie(&cookie), Some(token));
    }

    #[test]
    fn cookie_accepts_bare_jwt_value() {
        let token = jwt_with_claims(&serde_json::json!({"sub": "x"}));
        assert_eq!(decode_session_cookie(&token), Some(token.clone()));
    }

    #[test]
    fn malformed_cookie_is_swallowed() {
        assert_eq!(decode_session_cookie("base64-!!!"), None);
        assert_eq!(decode_session_cookie("{\"access_token\": 5}"), None);
        assert_eq!(decode_session_cookie("plain-text"), None);
    }

    #[test]
    fn session_cookie_names_match_known_patterns() {
        assert!(is_session_cookie("auth-token"));
        assert!(is_session_cookie("session-token"));
        assert!(is_session_cookie("store-main-auth-token"));
        assert!(!is_session_cookie("tracking"));
    }
}
