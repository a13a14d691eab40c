//! User directory and password hashing.
//!
//! Passwords are Argon2id-hashed with a random salt. The directory is reached through
//! [`UserStore`]; the bundled implementation keeps records in memory.

use anyhow::{anyhow, Result};
use argon2::{
    password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use async_trait::async_trait;
use rand::rngs::OsRng;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: Uuid,
    pub username: String,
    password_hash: String,
}

impl UserRecord {
    #[must_use]
    pub fn new(username: &str, password_hash: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.to_string(),
            password_hash,
        }
    }

    #[must_use]
    pub fn verify_password(&self, password: &str) -> bool {
        verify_password(password, &self.password_hash)
    }
}

#[derive(Debug)]
pub enum CreateOutcome {
    Created(UserRecord),
    AlreadyExists,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find(&self, username: &str) -> Result<Option<UserRecord>>;
    async fn create(&self, record: UserRecord) -> Result<CreateOutcome>;
}

#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<String, UserRecord>>,
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find(&self, username: &str) -> Result<Option<UserRecord>> {
        Ok(self.users.read().await.get(username).cloned())
    }

    async fn create(&self, record: UserRecord) -> Result<CreateOutcome> {
        let mut users = self.users.write().await;
        if users.contains_key(&record.username) {
            return Ok(CreateOutcome::AlreadyExists);
        }
        users.insert(record.username.clone(), record.clone());
        Ok(CreateOutcome::Created(record))
    }
}

/// Hash a password using Argon2id.
///
/// # Errors
/// Returns an error if hashing fails.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| anyhow!("failed to hash password"))
}

#[must_use]
pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify() -> Result<()> {
        let hash = hash_password("correct horse")?;
        assert!(hash.starts_with("$argon2id"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("battery staple", &hash));
        Ok(())
    }

    #[test]
    fn verify_rejects_garbage_hash() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }

    #[tokio::test]
    async fn create_is_unique_by_username() -> Result<()> {
        let store = MemoryUserStore::default();
        let first = store
            .create(UserRecord::new("alice", hash_password("pw")?))
            .await?;
        assert!(matches!(first, CreateOutcome::Created(_)));

        let second = store
            .create(UserRecord::new("alice", hash_password("other")?))
            .await?;
        assert!(matches!(second, CreateOutcome::AlreadyExists));

        let found = store.find("alice").await?;
        assert!(found.is_some_and(|user| user.verify_password("pw")));
        assert!(store.find("bob").await?.is_none());
        Ok(())
    }
}
