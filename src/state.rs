use crate::auth::{
    jwt::JwtKeys,
    repo::{MongoUserStore, UserStore},
    services::{CredentialStore, SessionIssuer},
};
use crate::config::AppConfig;
use crate::db::MongoConnector;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub credentials: CredentialStore,
    pub sessions: SessionIssuer,
}

impl AppState {
    /// Wires the MongoDB store. No connection is made here; the first
    /// request that touches the store opens it.
    pub fn init(config: AppConfig) -> Self {
        let connector = MongoConnector::new(config.mongo.clone());
        let users = Arc::new(MongoUserStore::new(connector)) as Arc<dyn UserStore>;
        Self::from_parts(Arc::new(config), users)
    }

    pub fn from_parts(config: Arc<AppConfig>, users: Arc<dyn UserStore>) -> Self {
        let jwt = Arc::new(JwtKeys::from_config(&config.jwt));
        let credentials = CredentialStore::new(users.clone());
        let sessions = SessionIssuer::new(credentials.clone(), jwt);
        Self {
            config,
            users,
            credentials,
            sessions,
        }
    }

    #[cfg(test)]
    pub fn for_tests(users: Arc<crate::auth::memory::InMemoryUserStore>) -> Self {
        use crate::config::{JwtConfig, MongoConfig};
        use std::time::Duration;

        let config = Arc::new(AppConfig {
            mongo: MongoConfig {
                uri: "mongodb://localhost:27017".into(),
                database: "eclipse_ai_test".into(),
                server_selection_timeout: Duration::from_secs(1),
                connect_timeout: Duration::from_secs(1),
                socket_timeout: Duration::from_secs(1),
                pool_size: 1,
                tls_insecure: false,
            },
            jwt: JwtConfig {
                secret: "test".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 60 * 24,
            },
        });
        Self::from_parts(config, users)
    }
}
