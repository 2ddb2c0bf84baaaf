use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::auth::{
    errors::StoreError,
    repo::UserStore,
    repo_types::{NewUser, StoreStatus, UserRecord},
};

/// Map-backed store for tests. Can be switched to fail like an unreachable
/// database.
#[derive(Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<String, UserRecord>>,
    next_id: AtomicU64,
    offline: AtomicBool,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub async fn count_by_email(&self, email: &str) -> usize {
        self.users
            .read()
            .await
            .values()
            .filter(|u| u.email == email)
            .count()
    }

    pub async fn remove(&self, email: &str) {
        self.users.write().await.remove(email);
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        self.check_online()?;
        Ok(self.users.read().await.get(email).cloned())
    }

    async fn insert(&self, user: NewUser) -> Result<UserRecord, StoreError> {
        self.check_online()?;
        let mut users = self.users.write().await;
        if users.contains_key(&user.email) {
            return Err(StoreError::DuplicateEmail);
        }
        let id = format!("{:024x}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let record = user.into_record(id);
        users.insert(record.email.clone(), record.clone());
        Ok(record)
    }

    async fn touch_last_login(&self, email: &str, at: OffsetDateTime) -> Result<(), StoreError> {
        self.check_online()?;
        if let Some(user) = self.users.write().await.get_mut(email) {
            user.last_login_at = Some(at);
        }
        Ok(())
    }

    async fn diagnostics(&self) -> Result<StoreStatus, StoreError> {
        self.check_online()?;
        Ok(StoreStatus {
            collections: vec!["users".to_string()],
        })
    }
}
