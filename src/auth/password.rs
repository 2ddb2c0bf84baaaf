use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use tracing::error;

use crate::auth::errors::AuthError;

/// Hashes a password with Argon2id using the crate's fixed default cost.
pub fn hash_password(plain: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            AuthError::Internal(format!("hash password: {e}"))
        })?
        .to_string();
    Ok(hash)
}

fn is_bcrypt(hash: &str) -> bool {
    ["$2a$", "$2b$", "$2x$", "$2y$"]
        .iter()
        .any(|prefix| hash.starts_with(prefix))
}

/// Checks `plain` against a stored hash. Accepts Argon2 PHC strings and the
/// bcrypt hashes written by the earlier signup service. An unreadable hash is
/// an internal error, not a mismatch.
pub fn verify_password(plain: &str, hash: &str) -> Result<bool, AuthError> {
    if is_bcrypt(hash) {
        return bcrypt::verify(plain, hash).map_err(|e| {
            error!(error = %e, "bcrypt verify error");
            AuthError::Internal(format!("verify legacy hash: {e}"))
        });
    }

    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        AuthError::Internal(format!("parse password hash: {e}"))
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let password = "Secur3P@ssw0rd!";
        let hash = hash_password(password).expect("hashing should succeed");
        assert_ne!(hash, password);
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password(password, &hash).expect("verify should succeed"));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let password = "correct-horse-battery-staple";
        let hash = hash_password(password).expect("hashing should succeed");
        assert!(!verify_password("wrong-password", &hash).expect("verify should not error"));
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        let a = hash_password("secret").unwrap();
        let b = hash_password("secret").unwrap();
        assert_ne!(a, b);
        assert!(verify_password("secret", &a).unwrap());
        assert!(verify_password("secret", &b).unwrap());
    }

    #[test]
    fn unusual_passwords_still_verify() {
        let long = "x".repeat(200);
        for password in [" ", "パスワード", "a\u{0}b", long.as_str()] {
            let hash = hash_password(password).unwrap();
            assert!(verify_password(password, &hash).unwrap());
        }
    }

    #[test]
    fn legacy_bcrypt_hashes_are_accepted() {
        let legacy = bcrypt::hash("secret", 10).expect("bcrypt hash");
        assert!(verify_password("secret", &legacy).unwrap());
        assert!(!verify_password("Secret", &legacy).unwrap());
    }

    #[test]
    fn verify_errors_on_malformed_hash() {
        let err = verify_password("anything", "not-a-valid-hash").unwrap_err();
        assert!(matches!(err, AuthError::Internal(_)));
    }
}
