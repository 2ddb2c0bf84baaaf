use anyhow::Context;

mod app;
mod auth;
mod config;
mod db;
mod routes;
mod state;

use crate::{config::AppConfig, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "eclipse_api=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = AppConfig::from_env().context("load configuration")?;
    tracing::info!(
        database = %config.mongo.database,
        pool_size = config.mongo.pool_size,
        tls_insecure = config.mongo.tls_insecure,
        "configuration loaded"
    );

    let app_state = AppState::init(config);
    app::serve(app::build_app(app_state)).await
}
