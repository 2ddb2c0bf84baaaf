use std::sync::Arc;

use axum::extract::FromRef;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::auth::{
    claims::Claims,
    errors::AuthError,
    jwt::JwtKeys,
    password::{hash_password, verify_password},
    repo::UserStore,
    repo_types::{NewUser, UserRecord},
};
use crate::state::AppState;

/// Input to `CredentialStore::register`.
#[derive(Debug, Default, Clone)]
pub struct Registration {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub company: Option<String>,
    pub password: String,
    pub agree_terms: bool,
    pub newsletter_opt_in: bool,
}

/// A freshly issued token together with the account it belongs to.
#[derive(Debug)]
pub struct Session {
    pub token: String,
    pub user: UserRecord,
}

fn require(value: &str, message: &str) -> Result<(), AuthError> {
    if value.is_empty() {
        return Err(AuthError::Validation(message.to_string()));
    }
    Ok(())
}

/// Unique-by-email storage of accounts and their password hashes.
#[derive(Clone)]
pub struct CredentialStore {
    users: Arc<dyn UserStore>,
}

impl CredentialStore {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    pub async fn register(&self, input: Registration) -> Result<UserRecord, AuthError> {
        const MISSING: &str = "All required fields must be provided";
        require(&input.first_name, MISSING)?;
        require(&input.last_name, MISSING)?;
        require(&input.email, MISSING)?;
        require(&input.password, MISSING)?;

        if self.users.find_by_email(&input.email).await?.is_some() {
            warn!(email = %input.email, "email already registered");
            return Err(AuthError::DuplicateEmail);
        }

        let password_hash = hash_password(&input.password)?;
        let user = self
            .users
            .insert(NewUser {
                email: input.email,
                password_hash,
                first_name: input.first_name,
                last_name: input.last_name,
                company: input.company.filter(|c| !c.is_empty()),
                agree_terms: input.agree_terms,
                newsletter_opt_in: input.newsletter_opt_in,
                created_at: OffsetDateTime::now_utc(),
            })
            .await?;

        info!(user_id = %user.id, email = %user.email, "user registered");
        Ok(user)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, AuthError> {
        Ok(self.users.find_by_email(email).await?)
    }

    /// Stamps the account with the current time and returns that time.
    pub async fn record_login(&self, email: &str) -> Result<OffsetDateTime, AuthError> {
        let at = OffsetDateTime::now_utc();
        self.users.touch_last_login(email, at).await?;
        Ok(at)
    }
}

/// Turns a credential pair into a signed, time-bounded token.
#[derive(Clone)]
pub struct SessionIssuer {
    credentials: CredentialStore,
    keys: Arc<JwtKeys>,
}

impl SessionIssuer {
    pub fn new(credentials: CredentialStore, keys: Arc<JwtKeys>) -> Self {
        Self { credentials, keys }
    }

    pub async fn authenticate(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        const MISSING: &str = "Email and password are required";
        require(email, MISSING)?;
        require(password, MISSING)?;

        let Some(mut user) = self.credentials.find_by_email(email).await? else {
            warn!(email = %email, "login unknown email");
            return Err(AuthError::InvalidCredentials);
        };

        if !verify_password(password, &user.password_hash)? {
            warn!(email = %email, user_id = %user.id, "login invalid password");
            return Err(AuthError::InvalidCredentials);
        }

        user.last_login_at = Some(self.credentials.record_login(email).await?);

        let token = self.keys.sign(&user)?;
        info!(user_id = %user.id, email = %user.email, "user logged in");
        Ok(Session { token, user })
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let claims = self.keys.verify(token)?;
        debug!(user_id = %claims.sub, "session token accepted");
        Ok(claims)
    }
}

impl FromRef<AppState> for SessionIssuer {
    fn from_ref(state: &AppState) -> Self {
        state.sessions.clone()
    }
}
