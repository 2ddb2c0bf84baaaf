use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tracing::{error, instrument};

use crate::auth::errors::ErrorBody;
use crate::state::AppState;

/// Paths reported by the not-found fallback.
pub const AVAILABLE_ENDPOINTS: [&str; 6] =
    ["test", "health", "dbtest", "signup", "login", "profile"];

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvFlags {
    pub has_mongo_uri: bool,
    pub has_jwt_secret: bool,
}

#[derive(Debug, Serialize)]
pub struct TestResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub timestamp: String,
    pub env: EnvFlags,
}

#[derive(Debug, Serialize)]
pub struct DbTestResponse {
    pub status: &'static str,
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collections: Option<Vec<String>>,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotFoundResponse {
    pub error: &'static str,
    pub available_endpoints: Vec<&'static str>,
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}

pub fn status_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/test", get(api_test))
        .route("/dbtest", get(db_test))
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK",
        message: "EclipseAI API is running",
        timestamp: now_rfc3339(),
    })
}

/// Liveness plus whether the secrets are configured. Never echoes values.
pub async fn api_test(State(state): State<AppState>) -> Json<TestResponse> {
    Json(TestResponse {
        status: "OK",
        message: "API is working!",
        timestamp: now_rfc3339(),
        env: EnvFlags {
            has_mongo_uri: !state.config.mongo.uri.is_empty(),
            has_jwt_secret: !state.config.jwt.secret.is_empty(),
        },
    })
}

#[instrument(skip_all)]
pub async fn db_test(State(state): State<AppState>) -> (StatusCode, Json<DbTestResponse>) {
    match state.users.diagnostics().await {
        Ok(report) => (
            StatusCode::OK,
            Json(DbTestResponse {
                status: "OK",
                message: "Database connection successful!",
                collections: Some(report.collections),
                timestamp: now_rfc3339(),
            }),
        ),
        Err(e) => {
            error!(error = %e, "database check failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(DbTestResponse {
                    status: "ERROR",
                    message: "Database connection failed",
                    collections: None,
                    timestamp: now_rfc3339(),
                }),
            )
        }
    }
}

pub async fn not_found() -> (StatusCode, Json<NotFoundResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(NotFoundResponse {
            error: "Endpoint not found",
            available_endpoints: AVAILABLE_ENDPOINTS.to_vec(),
        }),
    )
}

/// Known path, unsupported method.
pub async fn method_not_allowed() -> (StatusCode, Json<ErrorBody>) {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(ErrorBody {
            success: false,
            error: "Method not allowed".into(),
        }),
    )
}
