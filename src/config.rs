use std::time::Duration;

use anyhow::{bail, Context};
use serde::Deserialize;

/// Upper bound on token lifetime: one year.
pub const MAX_TTL_MINUTES: i64 = 60 * 24 * 365;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// Connection tuning for the MongoDB user collection.
#[derive(Debug, Clone, Deserialize)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
    pub server_selection_timeout: Duration,
    pub connect_timeout: Duration,
    /// Upper bound for a single store operation.
    pub socket_timeout: Duration,
    pub pool_size: u32,
    pub tls_insecure: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub mongo: MongoConfig,
    pub jwt: JwtConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. Secrets have no
    /// fallback: a missing or blank `MONGODB_URI`/`JWT_SECRET` is an error.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mongo = MongoConfig {
            uri: required(&lookup, "MONGODB_URI")?,
            database: lookup("MONGODB_DATABASE").unwrap_or_else(|| "eclipse_ai".into()),
            server_selection_timeout: millis(&lookup, "MONGODB_SERVER_SELECTION_TIMEOUT_MS", 10_000)?,
            connect_timeout: millis(&lookup, "MONGODB_CONNECT_TIMEOUT_MS", 10_000)?,
            socket_timeout: millis(&lookup, "MONGODB_SOCKET_TIMEOUT_MS", 10_000)?,
            pool_size: parsed(&lookup, "MONGODB_POOL_SIZE", 10)?,
            tls_insecure: parsed(&lookup, "MONGODB_TLS_INSECURE", false)?,
        };

        let jwt = JwtConfig {
            secret: required(&lookup, "JWT_SECRET")?,
            issuer: lookup("JWT_ISSUER").unwrap_or_else(|| "eclipse-api".into()),
            audience: lookup("JWT_AUDIENCE").unwrap_or_else(|| "eclipse-users".into()),
            ttl_minutes: parsed(&lookup, "JWT_TTL_MINUTES", 60 * 24)?,
        };
        if jwt.ttl_minutes <= 0 || jwt.ttl_minutes > MAX_TTL_MINUTES {
            bail!("JWT_TTL_MINUTES must be between 1 and {}", MAX_TTL_MINUTES);
        }

        Ok(Self { mongo, jwt })
    }
}

fn required<F>(lookup: &F, key: &str) -> anyhow::Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => bail!("{} must be set", key),
    }
}

fn parsed<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("invalid value for {key}: {raw:?}")),
        None => Ok(default),
    }
}

fn millis<F>(lookup: &F, key: &str, default_ms: u64) -> anyhow::Result<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    parsed(lookup, key, default_ms).map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_secrets_are_set() {
        let cfg = AppConfig::from_lookup(lookup_from(&[
            ("MONGODB_URI", "mongodb://localhost:27017"),
            ("JWT_SECRET", "s3cret"),
        ]))
        .expect("config");

        assert_eq!(cfg.mongo.database, "eclipse_ai");
        assert_eq!(cfg.mongo.server_selection_timeout, Duration::from_secs(10));
        assert_eq!(cfg.mongo.connect_timeout, Duration::from_secs(10));
        assert_eq!(cfg.mongo.socket_timeout, Duration::from_secs(10));
        assert_eq!(cfg.mongo.pool_size, 10);
        assert!(!cfg.mongo.tls_insecure);
        assert_eq!(cfg.jwt.ttl_minutes, 1440);
        assert_eq!(cfg.jwt.issuer, "eclipse-api");
    }

    #[test]
    fn missing_jwt_secret_fails_fast() {
        let err = AppConfig::from_lookup(lookup_from(&[(
            "MONGODB_URI",
            "mongodb://localhost:27017",
        )]))
        .unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));
    }

    #[test]
    fn blank_mongo_uri_is_rejected() {
        let err = AppConfig::from_lookup(lookup_from(&[
            ("MONGODB_URI", "   "),
            ("JWT_SECRET", "s3cret"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("MONGODB_URI"));
    }

    #[test]
    fn connection_tuning_is_read_from_env() {
        let cfg = AppConfig::from_lookup(lookup_from(&[
            ("MONGODB_URI", "mongodb://db:27017"),
            ("JWT_SECRET", "s3cret"),
            ("MONGODB_SERVER_SELECTION_TIMEOUT_MS", "15000"),
            ("MONGODB_SOCKET_TIMEOUT_MS", "2500"),
            ("MONGODB_POOL_SIZE", "1"),
            ("MONGODB_TLS_INSECURE", "true"),
        ]))
        .expect("config");

        assert_eq!(cfg.mongo.server_selection_timeout, Duration::from_secs(15));
        assert_eq!(cfg.mongo.socket_timeout, Duration::from_millis(2500));
        assert_eq!(cfg.mongo.pool_size, 1);
        assert!(cfg.mongo.tls_insecure);
    }

    #[test]
    fn token_lifetime_is_bounded() {
        for ttl in ["0", "-5", "525601", "9223372036854775807"] {
            let err = AppConfig::from_lookup(lookup_from(&[
                ("MONGODB_URI", "mongodb://db:27017"),
                ("JWT_SECRET", "s3cret"),
                ("JWT_TTL_MINUTES", ttl),
            ]))
            .unwrap_err();
            assert!(err.to_string().contains("JWT_TTL_MINUTES"), "ttl {ttl}");
        }

        let cfg = AppConfig::from_lookup(lookup_from(&[
            ("MONGODB_URI", "mongodb://db:27017"),
            ("JWT_SECRET", "s3cret"),
            ("JWT_TTL_MINUTES", "525600"),
        ]))
        .expect("one year is allowed");
        assert_eq!(cfg.jwt.ttl_minutes, MAX_TTL_MINUTES);
    }

    #[test]
    fn garbage_numbers_are_not_silently_defaulted() {
        let err = AppConfig::from_lookup(lookup_from(&[
            ("MONGODB_URI", "mongodb://db:27017"),
            ("JWT_SECRET", "s3cret"),
            ("MONGODB_POOL_SIZE", "lots"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("MONGODB_POOL_SIZE"));
    }
}
