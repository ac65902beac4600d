//! In-crate fixtures shared by unit tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

use crate::auth::{generate_token, hash_token};
use crate::config::AppConfig;
use crate::database::models::{
    Metadata, Movie, MovieFilters, MovieInput, NewUser, Permissions, TokenRecord, TokenScope, User,
};
use crate::database::{DatabaseError, MemoryStore, SharedStore, Store};
use crate::mailer::LogMailer;
use crate::AppState;

/// Development config over a fresh memory store.
pub fn state() -> AppState {
    state_with_store(Arc::new(MemoryStore::new()))
}

pub fn state_with_store(store: SharedStore) -> AppState {
    AppState::new(AppConfig::development(), store, Arc::new(LogMailer))
}

pub fn state_with_config(config: AppConfig) -> AppState {
    AppState::new(config, Arc::new(MemoryStore::new()), Arc::new(LogMailer))
}

/// Insert a user, optionally activated, holding exactly `permissions`.
pub async fn seed_user(
    store: &dyn Store,
    email: &str,
    activated: bool,
    permissions: &[&str],
) -> User {
    let mut user = store
        .insert_user(NewUser {
            name: "Test User".to_string(),
            email: email.to_string(),
            password_hash: "not-a-bcrypt-hash".to_string(),
        })
        .await
        .unwrap();

    if activated {
        let now = Utc::now();
        let hash = hash_token(&generate_token());
        store
            .insert_token(&TokenRecord {
                hash: hash.clone(),
                user_id: user.id,
                expiry: now + chrono::Duration::minutes(5),
                scope: TokenScope::Activation,
            })
            .await
            .unwrap();
        user = store.activate_user(&hash, now).await.unwrap().unwrap();
    }

    if !permissions.is_empty() {
        store.add_permissions(user.id, permissions).await.unwrap();
    }
    user
}

/// A store whose every call fails, for proving a code path never touches it.
pub struct FailingStore;

fn unavailable<T>() -> Result<T, DatabaseError> {
    Err(DatabaseError::Timeout(Duration::from_secs(3)))
}

#[async_trait]
impl Store for FailingStore {
    async fn ping(&self) -> Result<(), DatabaseError> {
        unavailable()
    }
    async fn insert_user(&self, _user: NewUser) -> Result<User, DatabaseError> {
        unavailable()
    }
    async fn get_user(&self, _id: i64) -> Result<Option<User>, DatabaseError> {
        unavailable()
    }
    async fn get_user_by_email(&self, _email: &str) -> Result<Option<User>, DatabaseError> {
        unavailable()
    }
    async fn insert_token(&self, _token: &TokenRecord) -> Result<(), DatabaseError> {
        unavailable()
    }
    async fn get_token(&self, _hash: &[u8]) -> Result<Option<TokenRecord>, DatabaseError> {
        unavailable()
    }
    async fn delete_token(&self, _hash: &[u8]) -> Result<(), DatabaseError> {
        unavailable()
    }
    async fn activate_user(
        &self,
        _hash: &[u8],
        _now: DateTime<Utc>,
    ) -> Result<Option<User>, DatabaseError> {
        unavailable()
    }
    async fn get_permissions(&self, _user_id: i64) -> Result<Permissions, DatabaseError> {
        unavailable()
    }
    async fn add_permissions(&self, _user_id: i64, _codes: &[&str]) -> Result<(), DatabaseError> {
        unavailable()
    }
    async fn insert_movie(&self, _movie: MovieInput) -> Result<Movie, DatabaseError> {
        unavailable()
    }
    async fn get_movie(&self, _id: i64) -> Result<Option<Movie>, DatabaseError> {
        unavailable()
    }
    async fn list_movies(
        &self,
        _filters: &MovieFilters,
    ) -> Result<(Vec<Movie>, Metadata), DatabaseError> {
        unavailable()
    }
    async fn update_movie(&self, _movie: &Movie) -> Result<Movie, DatabaseError> {
        unavailable()
    }
    async fn delete_movie(&self, _id: i64) -> Result<bool, DatabaseError> {
        unavailable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn seeded_user_has_requested_state() {
        let store = MemoryStore::new();
        let user = seed_user(&store, "alice@example.com", true, &["movies:read"]).await;
        assert!(user.activated);
        assert!(store.get_permissions(user.id).await.unwrap().includes("movies:read"));
        assert_eq!(store.token_count().await, 0);
    }
}
