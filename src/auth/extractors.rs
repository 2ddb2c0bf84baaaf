use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;

use super::{claims::Claims, errors::AuthError, services::SessionIssuer};

/// Extracts and validates the bearer token, yielding its claims.
pub struct AuthUser(pub Claims);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    SessionIssuer: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or(AuthError::MissingToken)?;

        // Expect "Bearer <token>"
        let token = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingToken)?;

        let sessions = SessionIssuer::from_ref(state);
        let claims = sessions.verify(token).map_err(|e| {
            warn!("invalid or expired token");
            e
        })?;

        Ok(AuthUser(claims))
    }
}
