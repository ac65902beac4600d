use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use std::future::Future;
use std::time::Duration;

use super::manager::DatabaseError;
use super::models::{
    Metadata, Movie, MovieFilters, MovieInput, NewUser, Permissions, TokenRecord, TokenScope, User,
};
use super::store::{PoolStats, Store};

const USER_COLUMNS: &str = "id, created_at, name, email, password_hash, activated, version";
const MOVIE_COLUMNS: &str = "id, created_at, title, year, runtime, genres, version";

/// PostgreSQL-backed store. Every call is bounded by `query_timeout`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    query_timeout: Duration,
}

#[derive(FromRow)]
struct TokenRow {
    hash: Vec<u8>,
    user_id: i64,
    expiry: DateTime<Utc>,
    scope: String,
}

impl TryFrom<TokenRow> for TokenRecord {
    type Error = DatabaseError;

    fn try_from(row: TokenRow) -> Result<Self, Self::Error> {
        let scope = TokenScope::parse(&row.scope).ok_or_else(|| {
            DatabaseError::Sqlx(sqlx::Error::Decode(
                format!("unknown token scope '{}'", row.scope).into(),
            ))
        })?;
        Ok(TokenRecord {
            hash: row.hash,
            user_id: row.user_id,
            expiry: row.expiry,
            scope,
        })
    }
}

#[derive(FromRow)]
struct MovieRow {
    total: i64,
    #[sqlx(flatten)]
    movie: Movie,
}

impl PgStore {
    pub fn new(pool: PgPool, query_timeout: Duration) -> Self {
        Self { pool, query_timeout }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run `fut` under the configured deadline. Dropping an in-flight
    /// transaction on timeout rolls it back.
    async fn bounded<T, F>(&self, fut: F) -> Result<T, DatabaseError>
    where
        F: Future<Output = Result<T, DatabaseError>>,
    {
        match tokio::time::timeout(self.query_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(DatabaseError::Timeout(self.query_timeout)),
        }
    }
}

fn is_unique_violation(err: &sqlx::Error, constraint: &str) -> bool {
    match err {
        sqlx::Error::Database(db) => db.constraint() == Some(constraint),
        _ => false,
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), DatabaseError> {
        self.bounded(super::manager::health_check(&self.pool)).await
    }

    fn pool_stats(&self) -> Option<PoolStats> {
        let pool = self.pool();
        let open_connections = pool.size();
        let idle = pool.num_idle();
        Some(PoolStats {
            open_connections,
            idle,
            in_use: (open_connections as usize).saturating_sub(idle),
        })
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, DatabaseError> {
        let query = format!(
            "INSERT INTO users (name, email, password_hash, activated)
             VALUES ($1, $2, $3, false)
             RETURNING {USER_COLUMNS}"
        );
        self.bounded(async {
            sqlx::query_as::<_, User>(&query)
                .bind(&user.name)
                .bind(&user.email)
                .bind(&user.password_hash)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| {
                    if is_unique_violation(&e, "users_email_key") {
                        DatabaseError::DuplicateEmail
                    } else {
                        e.into()
                    }
                })
        })
        .await
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>, DatabaseError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        self.bounded(async {
            Ok(sqlx::query_as::<_, User>(&query)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?)
        })
        .await
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower($1)");
        self.bounded(async {
            Ok(sqlx::query_as::<_, User>(&query)
                .bind(email)
                .fetch_optional(&self.pool)
                .await?)
        })
        .await
    }

    async fn insert_token(&self, token: &TokenRecord) -> Result<(), DatabaseError> {
        self.bounded(async {
            sqlx::query(
                "INSERT INTO tokens (hash, user_id, expiry, scope) VALUES ($1, $2, $3, $4)",
            )
            .bind(&token.hash)
            .bind(token.user_id)
            .bind(token.expiry)
            .bind(token.scope.as_str())
            .execute(&self.pool)
            .await?;
            Ok(())
        })
        .await
    }

    async fn get_token(&self, hash: &[u8]) -> Result<Option<TokenRecord>, DatabaseError> {
        self.bounded(async {
            let row = sqlx::query_as::<_, TokenRow>(
                "SELECT hash, user_id, expiry, scope FROM tokens WHERE hash = $1",
            )
            .bind(hash)
            .fetch_optional(&self.pool)
            .await?;
            row.map(TokenRecord::try_from).transpose()
        })
        .await
    }

    async fn delete_token(&self, hash: &[u8]) -> Result<(), DatabaseError> {
        self.bounded(async {
            sqlx::query("DELETE FROM tokens WHERE hash = $1")
                .bind(hash)
                .execute(&self.pool)
                .await?;
            Ok(())
        })
        .await
    }

    async fn activate_user(
        &self,
        hash: &[u8],
        now: DateTime<Utc>,
    ) -> Result<Option<User>, DatabaseError> {
        let update = format!(
            "UPDATE users SET activated = true, version = version + 1
             WHERE id = $1
             RETURNING {USER_COLUMNS}"
        );
        self.bounded(async {
            let mut tx = self.pool.begin().await?;

            // The row lock taken by DELETE makes a concurrent attempt on the
            // same hash wait for this transaction and then delete nothing.
            let user_id: Option<i64> = sqlx::query_scalar(
                "DELETE FROM tokens
                 WHERE hash = $1 AND scope = $2 AND expiry >= $3
                 RETURNING user_id",
            )
            .bind(hash)
            .bind(TokenScope::Activation.as_str())
            .bind(now)
            .fetch_optional(&mut *tx)
            .await?;

            let Some(user_id) = user_id else {
                tx.rollback().await?;
                return Ok(None);
            };

            let user = sqlx::query_as::<_, User>(&update)
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?;

            sqlx::query("DELETE FROM tokens WHERE scope = $1 AND user_id = $2")
                .bind(TokenScope::Activation.as_str())
                .bind(user_id)
                .execute(&mut *tx)
                .await?;

            tx.commit().await?;
            Ok(user)
        })
        .await
    }

    async fn get_permissions(&self, user_id: i64) -> Result<Permissions, DatabaseError> {
        self.bounded(async {
            let codes: Vec<String> = sqlx::query_scalar(
                "SELECT permissions.code
                 FROM permissions
                 INNER JOIN users_permissions ON users_permissions.permission_id = permissions.id
                 WHERE users_permissions.user_id = $1",
            )
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
            Ok(codes.into_iter().collect())
        })
        .await
    }

    async fn add_permissions(&self, user_id: i64, codes: &[&str]) -> Result<(), DatabaseError> {
        let codes: Vec<String> = codes.iter().map(|c| c.to_string()).collect();
        self.bounded(async {
            sqlx::query(
                "INSERT INTO users_permissions (user_id, permission_id)
                 SELECT $1, permissions.id FROM permissions WHERE permissions.code = ANY($2)
                 ON CONFLICT DO NOTHING",
            )
            .bind(user_id)
            .bind(&codes)
            .execute(&self.pool)
            .await?;
            Ok(())
        })
        .await
    }

    async fn insert_movie(&self, movie: MovieInput) -> Result<Movie, DatabaseError> {
        let query = format!(
            "INSERT INTO movies (title, year, runtime, genres)
             VALUES ($1, $2, $3, $4)
             RETURNING {MOVIE_COLUMNS}"
        );
        self.bounded(async {
            Ok(sqlx::query_as::<_, Movie>(&query)
                .bind(&movie.title)
                .bind(movie.year)
                .bind(movie.runtime)
                .bind(&movie.genres)
                .fetch_one(&self.pool)
                .await?)
        })
        .await
    }

    async fn get_movie(&self, id: i64) -> Result<Option<Movie>, DatabaseError> {
        let query = format!("SELECT {MOVIE_COLUMNS} FROM movies WHERE id = $1");
        self.bounded(async {
            Ok(sqlx::query_as::<_, Movie>(&query)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?)
        })
        .await
    }

    async fn list_movies(
        &self,
        filters: &MovieFilters,
    ) -> Result<(Vec<Movie>, Metadata), DatabaseError> {
        // sort_column() only ever yields a fixed column name
        let direction = if filters.sort_descending() { "DESC" } else { "ASC" };
        let query = format!(
            "SELECT count(*) OVER() AS total, {MOVIE_COLUMNS}
             FROM movies
             WHERE ($1::text IS NULL OR title ILIKE '%' || $1 || '%')
             AND (genres @> $2 OR $2 = '{{}}')
             ORDER BY {} {direction}, id ASC
             LIMIT $3 OFFSET $4",
            filters.sort_column()
        );
        self.bounded(async {
            let rows = sqlx::query_as::<_, MovieRow>(&query)
                .bind(filters.title.as_deref())
                .bind(&filters.genres)
                .bind(filters.limit())
                .bind(filters.offset())
                .fetch_all(&self.pool)
                .await?;

            let total = rows.first().map(|r| r.total).unwrap_or(0);
            let movies = rows.into_iter().map(|r| r.movie).collect();
            Ok((movies, Metadata::calculate(total, filters.page, filters.page_size)))
        })
        .await
    }

    async fn update_movie(&self, movie: &Movie) -> Result<Movie, DatabaseError> {
        let query = format!(
            "UPDATE movies
             SET title = $1, year = $2, runtime = $3, genres = $4, version = version + 1
             WHERE id = $5 AND version = $6
             RETURNING {MOVIE_COLUMNS}"
        );
        self.bounded(async {
            sqlx::query_as::<_, Movie>(&query)
                .bind(&movie.title)
                .bind(movie.year)
                .bind(movie.runtime)
                .bind(&movie.genres)
                .bind(movie.id)
                .bind(movie.version)
                .fetch_optional(&self.pool)
                .await?
                .ok_or(DatabaseError::EditConflict)
        })
        .await
    }

    async fn delete_movie(&self, id: i64) -> Result<bool, DatabaseError> {
        self.bounded(async {
            let result = sqlx::query("DELETE FROM movies WHERE id = $1")
                .bind(id)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected() > 0)
        })
        .await
    }
}
