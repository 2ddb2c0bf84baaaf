use std::future::IntoFuture;

use mongodb::{
    bson::doc,
    error::ErrorKind,
    options::{ClientOptions, Tls, TlsOptions},
    Client, Database,
};
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::auth::{errors::StoreError, repo::ensure_indexes};
use crate::config::MongoConfig;

const APP_NAME: &str = "eclipse-api";

/// Lazily opened handle to the configured database.
///
/// The first caller builds the client and ensures indexes; concurrent first
/// callers wait on that single initialisation and share its result. A failed
/// attempt leaves the cell empty so the next request retries.
pub struct MongoConnector {
    config: MongoConfig,
    db: OnceCell<Database>,
}

impl MongoConnector {
    pub fn new(config: MongoConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &MongoConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.db.initialized()
    }

    pub async fn database(&self) -> Result<&Database, StoreError> {
        self.db.get_or_try_init(|| self.connect()).await
    }

    async fn connect(&self) -> Result<Database, StoreError> {
        let mut options = ClientOptions::parse(&self.config.uri).await.map_err(|e| {
            warn!(error = %e, "invalid mongodb connection string");
            StoreError::Unavailable(format!("parse connection string: {e}"))
        })?;
        apply_tuning(&mut options, &self.config);

        let client = Client::with_options(options)
            .map_err(|e| StoreError::Unavailable(format!("build client: {e}")))?;
        let db = client.database(&self.config.database);

        let limit = self.config.connect_timeout + self.config.server_selection_timeout;
        let ping = db.run_command(doc! { "ping": 1 }).into_future();
        match tokio::time::timeout(limit, ping).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                warn!(error = %e, "mongodb connection failed");
                return Err(StoreError::Unavailable(format!("connect: {e}")));
            }
            Err(_) => {
                warn!(timeout_ms = limit.as_millis() as u64, "mongodb connection timed out");
                return Err(StoreError::Unavailable("connect: timed out".into()));
            }
        }

        // Existing duplicate emails make the unique index fail to build. The
        // lookup before insert still applies, so serve the data regardless.
        match tokio::time::timeout(limit, ensure_indexes(&db)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) if is_connectivity_error(&e) => {
                warn!(error = %e, "mongodb connection lost while building indexes");
                return Err(StoreError::Unavailable(format!("connect: {e}")));
            }
            Ok(Err(e)) => warn!(error = %e, "unique email index not built"),
            Err(_) => warn!(timeout_ms = limit.as_millis() as u64, "index build timed out"),
        }

        info!(database = %self.config.database, "connected to mongodb");
        Ok(db)
    }
}

/// Errors that mean the server cannot be reached, as opposed to a command
/// the server rejected.
fn is_connectivity_error(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Io(_)
            | ErrorKind::ServerSelection { .. }
            | ErrorKind::ConnectionPoolCleared { .. }
            | ErrorKind::DnsResolve { .. }
    )
}

/// Copies connection tuning from config onto parsed driver options.
pub fn apply_tuning(options: &mut ClientOptions, config: &MongoConfig) {
    options.app_name = Some(APP_NAME.to_string());
    options.server_selection_timeout = Some(config.server_selection_timeout);
    options.connect_timeout = Some(config.connect_timeout);
    options.max_pool_size = Some(config.pool_size);
    options.retry_reads = Some(true);
    options.retry_writes = Some(true);
    if config.tls_insecure {
        let tls = TlsOptions::builder().allow_invalid_certificates(true).build();
        options.tls = Some(Tls::Enabled(tls));
    }
}
