use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    /// Payment gateway REST endpoint, e.g. `https://api.gateway.test`.
    pub gateway_base_url: String,
    pub gateway_key_id: String,
    pub gateway_key_secret: String,
    /// Shared secret for webhook body HMAC. Distinct from the key secret.
    pub gateway_webhook_secret: String,
    /// Identity provider endpoint used for server-side token verification.
    pub identity_base_url: String,
    pub identity_service_key: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let gateway_base_url = env::var("GATEWAY_BASE_URL")?;
        let gateway_key_id = env::var("GATEWAY_KEY_ID")?;
        let gateway_key_secret = env::var("GATEWAY_KEY_SECRET")?;
        let gateway_webhook_secret = env::var("GATEWAY_WEBHOOK_SECRET")?;
        let identity_base_url = env::var("IDENTITY_BASE_URL")?;
        let identity_service_key = env::var("IDENTITY_SERVICE_KEY")?;
        Ok(Self {
            database_url,
            host,
            port,
            gateway_base_url,
            gateway_key_id,
            gateway_key_secret,
            gateway_webhook_secret,
            identity_base_url,
            identity_service_key,
        })
    }
}
