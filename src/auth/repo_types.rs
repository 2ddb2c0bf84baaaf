use serde::Serialize;
use time::OffsetDateTime;

/// User record as held by the credential store.
#[derive(Debug, Clone, Serialize)]
pub struct UserRecord {
    pub id: String,                        // store-assigned id, token subject
    pub email: String,                     // unique, case-sensitive
    #[serde(skip_serializing)]
    pub password_hash: String,             // Argon2 (or legacy bcrypt) hash, never exposed
    pub first_name: String,
    pub last_name: String,
    pub company: Option<String>,
    pub agree_terms: bool,
    pub newsletter_opt_in: bool,
    pub created_at: OffsetDateTime,        // set once on insert
    pub last_login_at: Option<OffsetDateTime>,
}

/// Fields required to persist a fresh record; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub company: Option<String>,
    pub agree_terms: bool,
    pub newsletter_opt_in: bool,
    pub created_at: OffsetDateTime,
}

impl NewUser {
    pub fn into_record(self, id: String) -> UserRecord {
        UserRecord {
            id,
            email: self.email,
            password_hash: self.password_hash,
            first_name: self.first_name,
            last_name: self.last_name,
            company: self.company,
            agree_terms: self.agree_terms,
            newsletter_opt_in: self.newsletter_opt_in,
            created_at: self.created_at,
            last_login_at: None,
        }
    }
}

/// Result of a connectivity probe against the backing store.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStatus {
    pub collections: Vec<String>,
}
