use serde::{Deserialize, Serialize};

/// Claims pulled out of a bearer token when the identity provider cannot
/// confirm it. Everything here is low trust.
#[derive(Debug, Deserialize, Serialize, Default)]
pub struct TokenClaims {
    pub sub: Option<String>,
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl TokenClaims {
    pub fn subject(&self) -> Option<&str> {
        self.sub.as_deref().or(self.user_id.as_deref())
    }
}
