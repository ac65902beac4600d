use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use super::manager::DatabaseError;
use super::models::{
    Metadata, Movie, MovieFilters, MovieInput, NewUser, Permissions, TokenRecord, User,
};

pub type SharedStore = Arc<dyn Store>;

/// Connection pool occupancy, published at `/debug/vars`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub open_connections: u32,
    pub idle: usize,
    pub in_use: usize,
}

/// Key-based persistence used by the gatekeeper and the handlers.
///
/// Implementations hold no business rules: expiry, scope and single-use
/// decisions belong to the token service. The one exception is
/// [`Store::activate_user`], which must perform its check-flip-delete sequence
/// atomically with respect to concurrent callers.
#[async_trait]
pub trait Store: Send + Sync {
    async fn ping(&self) -> Result<(), DatabaseError>;

    /// `None` for stores without a connection pool.
    fn pool_stats(&self) -> Option<PoolStats> {
        None
    }

    // Users
    async fn insert_user(&self, user: NewUser) -> Result<User, DatabaseError>;
    async fn get_user(&self, id: i64) -> Result<Option<User>, DatabaseError>;
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError>;

    // Tokens
    async fn insert_token(&self, token: &TokenRecord) -> Result<(), DatabaseError>;
    async fn get_token(&self, hash: &[u8]) -> Result<Option<TokenRecord>, DatabaseError>;
    async fn delete_token(&self, hash: &[u8]) -> Result<(), DatabaseError>;

    /// Remove the activation token `hash` if it is still present and unexpired
    /// at `now`, mark its owner activated, and drop the owner's other
    /// activation tokens. Returns `None` when there was no such token, which
    /// includes losing a race against a concurrent call with the same hash.
    async fn activate_user(
        &self,
        hash: &[u8],
        now: DateTime<Utc>,
    ) -> Result<Option<User>, DatabaseError>;

    // Permissions
    async fn get_permissions(&self, user_id: i64) -> Result<Permissions, DatabaseError>;
    async fn add_permissions(&self, user_id: i64, codes: &[&str]) -> Result<(), DatabaseError>;

    // Movies
    async fn insert_movie(&self, movie: MovieInput) -> Result<Movie, DatabaseError>;
    async fn get_movie(&self, id: i64) -> Result<Option<Movie>, DatabaseError>;
    async fn list_movies(
        &self,
        filters: &MovieFilters,
    ) -> Result<(Vec<Movie>, Metadata), DatabaseError>;
    /// Optimistic update: fails with `EditConflict` when `movie.version` is stale.
    async fn update_movie(&self, movie: &Movie) -> Result<Movie, DatabaseError>;
    async fn delete_movie(&self, id: i64) -> Result<bool, DatabaseError>;
}
