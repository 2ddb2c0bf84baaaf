use axum::{
    extract::{rejection::JsonRejection, State},
    routing::{get, post},
    Json, Router,
};
use tracing::{instrument, warn};

use crate::{
    auth::{
        dto::{
            LoginRequest, LoginResponse, ProfileResponse, ProfileUser, PublicUser, SignupRequest,
            SignupResponse,
        },
        errors::AuthError,
        extractors::AuthUser,
        services::Registration,
    },
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
}

pub fn profile_routes() -> Router<AppState> {
    Router::new().route("/profile", get(profile))
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AuthError> {
    match payload {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => {
            warn!(error = %rejection, "unreadable request body");
            Err(AuthError::Validation("Invalid request body".into()))
        }
    }
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<Json<SignupResponse>, AuthError> {
    let payload = body(payload)?;
    let user = state
        .credentials
        .register(Registration {
            first_name: payload.first_name.unwrap_or_default(),
            last_name: payload.last_name.unwrap_or_default(),
            email: payload.email.unwrap_or_default(),
            company: payload.company,
            password: payload.password.unwrap_or_default(),
            agree_terms: payload.agree_terms.unwrap_or(false),
            newsletter_opt_in: payload.newsletter.unwrap_or(false),
        })
        .await?;

    Ok(Json(SignupResponse {
        success: true,
        message: "Account created successfully!".into(),
        user: PublicUser::from(&user),
    }))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, AuthError> {
    let payload = body(payload)?;
    let session = state
        .sessions
        .authenticate(
            payload.email.as_deref().unwrap_or_default(),
            payload.password.as_deref().unwrap_or_default(),
        )
        .await?;

    Ok(Json(LoginResponse {
        success: true,
        message: "Login successful".into(),
        token: session.token,
        user: PublicUser::from(&session.user),
    }))
}

#[instrument(skip_all)]
pub async fn profile(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<Json<ProfileResponse>, AuthError> {
    let user = state
        .credentials
        .find_by_email(&claims.email)
        .await?
        .ok_or_else(|| {
            warn!(user_id = %claims.sub, "token subject no longer exists");
            AuthError::UserNotFound
        })?;

    Ok(Json(ProfileResponse {
        success: true,
        user: ProfileUser::from(&user),
    }))
}
