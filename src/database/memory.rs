use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::Mutex;

use super::manager::DatabaseError;
use super::models::{
    Metadata, Movie, MovieFilters, MovieInput, NewUser, Permissions, TokenRecord, TokenScope, User,
};
use super::store::Store;

/// Process-local store for development and tests.
///
/// Every operation runs under one mutex, so `activate_user` is trivially
/// atomic.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    next_user_id: i64,
    next_movie_id: i64,
    users: BTreeMap<i64, User>,
    tokens: HashMap<Vec<u8>, TokenRecord>,
    permissions: HashMap<i64, Vec<String>>,
    movies: BTreeMap<i64, Movie>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live token records, expired or not.
    pub async fn token_count(&self) -> usize {
        self.inner.lock().await.tokens.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), DatabaseError> {
        Ok(())
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, DatabaseError> {
        let mut inner = self.inner.lock().await;
        if inner
            .users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(DatabaseError::DuplicateEmail);
        }
        inner.next_user_id += 1;
        let user = User {
            id: inner.next_user_id,
            created_at: Utc::now(),
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            activated: false,
            version: 1,
        };
        inner.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>, DatabaseError> {
        Ok(self.inner.lock().await.users.get(&id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn insert_token(&self, token: &TokenRecord) -> Result<(), DatabaseError> {
        let mut inner = self.inner.lock().await;
        inner.tokens.insert(token.hash.clone(), token.clone());
        Ok(())
    }

    async fn get_token(&self, hash: &[u8]) -> Result<Option<TokenRecord>, DatabaseError> {
        Ok(self.inner.lock().await.tokens.get(hash).cloned())
    }

    async fn delete_token(&self, hash: &[u8]) -> Result<(), DatabaseError> {
        self.inner.lock().await.tokens.remove(hash);
        Ok(())
    }

    async fn activate_user(
        &self,
        hash: &[u8],
        now: DateTime<Utc>,
    ) -> Result<Option<User>, DatabaseError> {
        let mut inner = self.inner.lock().await;

        let user_id = match inner.tokens.get(hash) {
            Some(t) if t.scope == TokenScope::Activation && !t.is_expired_at(now) => t.user_id,
            _ => return Ok(None),
        };

        let Some(user) = inner.users.get_mut(&user_id) else {
            inner.tokens.remove(hash);
            return Ok(None);
        };
        user.activated = true;
        user.version += 1;
        let user = user.clone();

        inner
            .tokens
            .retain(|_, t| !(t.scope == TokenScope::Activation && t.user_id == user_id));
        Ok(Some(user))
    }

    async fn get_permissions(&self, user_id: i64) -> Result<Permissions, DatabaseError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .permissions
            .get(&user_id)
            .map(|codes| codes.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn add_permissions(&self, user_id: i64, codes: &[&str]) -> Result<(), DatabaseError> {
        let mut inner = self.inner.lock().await;
        let granted = inner.permissions.entry(user_id).or_default();
        for code in codes {
            if !granted.iter().any(|c| c == code) {
                granted.push(code.to_string());
            }
        }
        Ok(())
    }

    async fn insert_movie(&self, movie: MovieInput) -> Result<Movie, DatabaseError> {
        let mut inner = self.inner.lock().await;
        inner.next_movie_id += 1;
        let movie = Movie {
            id: inner.next_movie_id,
            created_at: Utc::now(),
            title: movie.title,
            year: movie.year,
            runtime: movie.runtime,
            genres: movie.genres,
            version: 1,
        };
        inner.movies.insert(movie.id, movie.clone());
        Ok(movie)
    }

    async fn get_movie(&self, id: i64) -> Result<Option<Movie>, DatabaseError> {
        Ok(self.inner.lock().await.movies.get(&id).cloned())
    }

    async fn list_movies(
        &self,
        filters: &MovieFilters,
    ) -> Result<(Vec<Movie>, Metadata), DatabaseError> {
        let inner = self.inner.lock().await;
        let needle = filters.title.as_deref().map(str::to_lowercase);

        let mut movies: Vec<Movie> = inner
            .movies
            .values()
            .filter(|m| match &needle {
                Some(n) => m.title.to_lowercase().contains(n.as_str()),
                None => true,
            })
            .filter(|m| filters.genres.iter().all(|g| m.genres.contains(g)))
            .cloned()
            .collect();

        let column = filters.sort_column();
        movies.sort_by(|a, b| {
            let ordering = match column {
                "title" => a.title.cmp(&b.title),
                "year" => a.year.cmp(&b.year),
                "runtime" => a.runtime.cmp(&b.runtime),
                _ => a.id.cmp(&b.id),
            };
            let ordering = if filters.sort_descending() {
                ordering.reverse()
            } else {
                ordering
            };
            ordering.then(a.id.cmp(&b.id))
        });

        let total = movies.len() as i64;
        let page: Vec<Movie> = movies
            .into_iter()
            .skip(filters.offset().max(0) as usize)
            .take(filters.limit().max(0) as usize)
            .collect();

        Ok((
            page,
            Metadata::calculate(total, filters.page, filters.page_size),
        ))
    }

    async fn update_movie(&self, movie: &Movie) -> Result<Movie, DatabaseError> {
        let mut inner = self.inner.lock().await;
        match inner.movies.get_mut(&movie.id) {
            Some(stored) if stored.version == movie.version => {
                stored.title = movie.title.clone();
                stored.year = movie.year;
                stored.runtime = movie.runtime;
                stored.genres = movie.genres.clone();
                stored.version += 1;
                Ok(stored.clone())
            }
            _ => Err(DatabaseError::EditConflict),
        }
    }

    async fn delete_movie(&self, id: i64) -> Result<bool, DatabaseError> {
        Ok(self.inner.lock().await.movies.remove(&id).is_some())
    }
}
