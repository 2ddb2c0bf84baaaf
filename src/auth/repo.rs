use async_trait::async_trait;
use mongodb::{
    bson::{doc, oid::ObjectId, DateTime as BsonDateTime},
    error::{ErrorKind, WriteFailure},
    options::IndexOptions,
    Collection, IndexModel,
};
use serde::{Deserialize, Serialize};
use std::future::{Future, IntoFuture};
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::auth::{
    errors::StoreError,
    repo_types::{NewUser, StoreStatus, UserRecord},
};
use crate::db::MongoConnector;

const USERS_COLLECTION: &str = "users";
const DUPLICATE_KEY_CODE: i32 = 11000;

/// Persistence for user records, keyed by email.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Exact-match lookup; email is not normalized.
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError>;

    /// Persist a new record. Fails with `DuplicateEmail` if the email is taken,
    /// including when a concurrent insert won the race.
    async fn insert(&self, user: NewUser) -> Result<UserRecord, StoreError>;

    /// Set `last_login_at`. An unknown email is not an error.
    async fn touch_last_login(&self, email: &str, at: OffsetDateTime) -> Result<(), StoreError>;

    async fn diagnostics(&self) -> Result<StoreStatus, StoreError>;
}

/// Document layout of the `users` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserDocument {
    #[serde(rename = "_id")]
    id: ObjectId,
    first_name: String,
    last_name: String,
    email: String,
    #[serde(default)]
    company: Option<String>,
    password: String,
    #[serde(default)]
    agree_terms: bool,
    #[serde(default)]
    newsletter: bool,
    created_at: BsonDateTime,
    #[serde(default)]
    last_login: Option<BsonDateTime>,
}

impl UserDocument {
    fn from_new(id: ObjectId, user: &NewUser) -> Self {
        Self {
            id,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
            company: user.company.clone(),
            password: user.password_hash.clone(),
            agree_terms: user.agree_terms,
            newsletter: user.newsletter_opt_in,
            created_at: to_bson(user.created_at),
            last_login: None,
        }
    }

    fn into_record(self) -> UserRecord {
        UserRecord {
            id: self.id.to_hex(),
            email: self.email,
            password_hash: self.password,
            first_name: self.first_name,
            last_name: self.last_name,
            company: self.company,
            agree_terms: self.agree_terms,
            newsletter_opt_in: self.newsletter,
            created_at: from_bson(self.created_at),
            last_login_at: self.last_login.map(from_bson),
        }
    }
}

fn to_bson(ts: OffsetDateTime) -> BsonDateTime {
    BsonDateTime::from_millis((ts.unix_timestamp_nanos() / 1_000_000) as i64)
}

fn from_bson(ts: BsonDateTime) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(ts.timestamp_millis()) * 1_000_000)
        .unwrap_or(OffsetDateTime::UNIX_EPOCH)
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error))
            if write_error.code == DUPLICATE_KEY_CODE
    )
}

/// MongoDB-backed store. The connection is opened on first use.
pub struct MongoUserStore {
    connector: MongoConnector,
}

impl MongoUserStore {
    pub fn new(connector: MongoConnector) -> Self {
        Self { connector }
    }

    async fn users(&self) -> Result<Collection<UserDocument>, StoreError> {
        let db = self.connector.database().await?;
        Ok(db.collection::<UserDocument>(USERS_COLLECTION))
    }

    /// Runs one driver call under the configured socket timeout.
    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = mongodb::error::Result<T>>,
    {
        let limit = self.connector.config().socket_timeout;
        match tokio::time::timeout(limit, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                warn!(error = %e, op, "mongodb operation failed");
                Err(StoreError::Unavailable(format!("{op}: {e}")))
            }
            Err(_) => {
                warn!(op, timeout_ms = limit.as_millis() as u64, "mongodb operation timed out");
                Err(StoreError::Unavailable(format!("{op}: timed out")))
            }
        }
    }
}

/// Creates the unique email index the duplicate check relies on.
pub(crate) async fn ensure_indexes(db: &mongodb::Database) -> mongodb::error::Result<()> {
    let index = IndexModel::builder()
        .keys(doc! { "email": 1 })
        .options(
            IndexOptions::builder()
                .unique(true)
                .name("email_unique".to_string())
                .build(),
        )
        .build();
    db.collection::<UserDocument>(USERS_COLLECTION)
        .create_index(index)
        .await?;
    Ok(())
}

#[async_trait]
impl UserStore for MongoUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let users = self.users().await?;
        let found = self
            .bounded("find_by_email", users.find_one(doc! { "email": email }).into_future())
            .await?;
        Ok(found.map(UserDocument::into_record))
    }

    async fn insert(&self, user: NewUser) -> Result<UserRecord, StoreError> {
        let users = self.users().await?;
        let id = ObjectId::new();
        let document = UserDocument::from_new(id, &user);

        let limit = self.connector.config().socket_timeout;
        match tokio::time::timeout(limit, users.insert_one(&document).into_future()).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) if is_duplicate_key(&e) => return Err(StoreError::DuplicateEmail),
            Ok(Err(e)) => {
                warn!(error = %e, "mongodb insert failed");
                return Err(StoreError::Unavailable(format!("insert: {e}")));
            }
            Err(_) => return Err(StoreError::Unavailable("insert: timed out".into())),
        }

        debug!(user_id = %id, "user document inserted");
        Ok(user.into_record(id.to_hex()))
    }

    async fn touch_last_login(&self, email: &str, at: OffsetDateTime) -> Result<(), StoreError> {
        let users = self.users().await?;
        let result = self
            .bounded(
                "touch_last_login",
                users
                    .update_one(
                        doc! { "email": email },
                        doc! { "$set": { "lastLogin": to_bson(at) } },
                    )
                    .into_future(),
            )
            .await?;
        if result.matched_count == 0 {
            debug!("last login update matched no user");
        }
        Ok(())
    }

    async fn diagnostics(&self) -> Result<StoreStatus, StoreError> {
        debug!(connected = self.connector.is_connected(), "running store diagnostics");
        let db = self.connector.database().await?;
        self.bounded("ping", db.run_command(doc! { "ping": 1 }).into_future())
            .await?;
        let collections = self
            .bounded("list_collections", db.list_collection_names().into_future())
            .await?;
        Ok(StoreStatus { collections })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson;
    use time::macros::datetime;

    #[test]
    fn legacy_document_without_optional_fields_loads() {
        // Shape written by the previous signup handler: no agreeTerms,
        // null company, null lastLogin.
        let raw = doc! {
            "_id": ObjectId::new(),
            "firstName": "Ada",
            "lastName": "Lovelace",
            "email": "ada@example.com",
            "company": bson::Bson::Null,
            "password": "$2a$10$abcdefghijklmnopqrstuu",
            "newsletter": false,
            "createdAt": BsonDateTime::from_millis(1_700_000_000_000),
            "lastLogin": bson::Bson::Null,
        };
        let parsed: UserDocument = bson::from_document(raw).expect("document should parse");
        let record = parsed.into_record();
        assert_eq!(record.email, "ada@example.com");
        assert!(!record.agree_terms);
        assert!(record.company.is_none());
        assert!(record.last_login_at.is_none());
        assert_eq!(record.created_at.unix_timestamp(), 1_700_000_000);
    }

    #[test]
    fn document_uses_existing_field_names() {
        let user = NewUser {
            email: "a@x.com".into(),
            password_hash: "hash".into(),
            first_name: "A".into(),
            last_name: "B".into(),
            company: Some("Acme".into()),
            agree_terms: true,
            newsletter_opt_in: true,
            created_at: datetime!(2024-05-01 12:00 UTC),
        };
        let encoded = bson::to_document(&UserDocument::from_new(ObjectId::new(), &user))
            .expect("encode");
        for key in [
            "_id",
            "firstName",
            "lastName",
            "email",
            "company",
            "password",
            "agreeTerms",
            "newsletter",
            "createdAt",
            "lastLogin",
        ] {
            assert!(encoded.contains_key(key), "missing {key}");
        }
        assert_eq!(encoded.get_str("password").unwrap(), "hash");
        assert!(encoded.get_datetime("createdAt").is_ok());
    }

    #[test]
    fn bson_time_conversion_keeps_millisecond_precision() {
        let ts = datetime!(2024-05-01 12:34:56.789 UTC);
        assert_eq!(from_bson(to_bson(ts)), ts);
    }
}
