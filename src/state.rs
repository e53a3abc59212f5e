use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::{DbPool, OrmConn};
use crate::gateway::GatewayClient;
use crate::identity_provider::IdentityProviderClient;

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub config: Arc<AppConfig>,
    pub gateway: GatewayClient,
    pub identity: IdentityProviderClient,
}
