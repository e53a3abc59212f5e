use std::time::Duration;

use serde::Deserialize;
use uuid::Uuid;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Server-side client for the identity provider's auth API. Used to turn a
/// bearer token into a confirmed user, and to look a user up by id when
/// only a subject claim is available.
///
/// Provider unavailability is always a soft failure here: callers fall
/// through to the next resolution strategy instead of aborting the request.
#[derive(Debug, Clone)]
pub struct IdentityProviderClient {
    http: reqwest::Client,
    base_url: String,
    service_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

impl IdentityProviderClient {
    pub fn new(
        base_url: impl Into<String>,
        service_key: impl Into<String>,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            service_key: service_key.into(),
        })
    }

    /// Verify a user token against the provider. `None` covers rejected
    /// tokens and provider outages alike.
    pub async fn verify_token(&self, token: &str) -> Option<ProviderUser> {
        let url = format!("{}/auth/v1/user", self.base_url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .header("apikey", &self.service_key)
            .send()
            .await;

        let response = match response {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                tracing::debug!(status = %r.status(), "token rejected by identity provider");
                return None;
            }
            Err(err) => {
                tracing::warn!(error = %err, "identity provider unreachable");
                return None;
            }
        };

        match response.json::<ProviderUser>().await {
            Ok(user) => Some(user),
            Err(err) => {
                tracing::warn!(error = %err, "identity provider returned bad body");
                None
            }
        }
    }

    /// Admin lookup by subject id, used when token claims carry no contact
    /// information.
    pub async fn get_user_by_id(&self, id: Uuid) -> Option<ProviderUser> {
        let url = format!("{}/auth/v1/admin/users/{}", self.base_url, id);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .send()
            .await;

        let response = match response {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                tracing::debug!(user_id = %id, status = %r.status(), "user lookup rejected");
                return None;
            }
            Err(err) => {
                tracing::warn!(user_id = %id, error = %err, "identity provider unreachable");
                return None;
            }
        };

        match response.json::<ProviderUser>().await {
            Ok(user) => Some(user),
            Err(err) => {
                tracing::warn!(user_id = %id, error = %err, "identity provider returned bad body");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn verify_token_returns_confirmed_user() {
        let server = MockServer::start().await;
        let user_id = Uuid::new_v4();
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .and(header("authorization", "Bearer tok_1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": user_id,
                "email": "customer@shop.test",
                "phone": "+919988776655"
            })))
            .mount(&server)
            .await;

        let client = IdentityProviderClient::new(server.uri(), "service_key").unwrap();
        let user = client.verify_token("tok_1").await.unwrap();
        assert_eq!(user.id, user_id);
        assert_eq!(user.email.as_deref(), Some("customer@shop.test"));
    }

    #[tokio::test]
    async fn rejected_token_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = IdentityProviderClient::new(server.uri(), "service_key").unwrap();
        assert!(client.verify_token("tok_bad").await.is_none());
    }

    #[tokio::test]
    async fn unreachable_provider_is_none() {
        // Port is bound by nothing; connection refused must not panic.
        let client =
            IdentityProviderClient::new("http://127.0.0.1:1", "service_key").unwrap();
        assert!(client.verify_token("tok_1").await.is_none());
    }
}
