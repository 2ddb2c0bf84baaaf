use std::time::Duration;

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{debug, error};

use crate::{
    auth::{claims::Claims, errors::AuthError, repo_types::UserRecord},
    config::JwtConfig,
};

/// Signing and verification keys plus issuer settings.
#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub ttl: Duration,
}

impl JwtKeys {
    pub fn from_config(config: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            ttl: Duration::from_secs((config.ttl_minutes as u64) * 60),
        }
    }

    pub fn sign(&self, user: &UserRecord) -> Result<String, AuthError> {
        self.sign_at(user, OffsetDateTime::now_utc())
    }

    pub(crate) fn sign_at(
        &self,
        user: &UserRecord,
        issued_at: OffsetDateTime,
    ) -> Result<String, AuthError> {
        let exp = issued_at + TimeDuration::seconds(self.ttl.as_secs() as i64);
        let claims = Claims {
            sub: user.id.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            iat: issued_at.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding).map_err(|e| {
            error!(error = %e, "jwt encode failed");
            AuthError::Internal(format!("sign token: {e}"))
        })?;
        debug!(user_id = %user.id, "jwt signed");
        Ok(token)
    }

    /// Checks signature, expiry, issuer and audience. There is no revocation
    /// list: a well-formed token stays valid until `exp`.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            debug!(error = %e, "jwt rejected");
            AuthError::InvalidToken
        })?;
        debug!(user_id = %data.claims.sub, "jwt verified");
        Ok(data.claims)
    }
}
