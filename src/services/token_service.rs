use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::auth::{generate_token, hash_token, is_well_formed_token, AuthError};
use crate::database::models::{TokenRecord, TokenScope, User};
use crate::database::SharedStore;

/// A freshly minted token. `plaintext` is handed to the client exactly once;
/// only `record` is persisted.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub plaintext: String,
    pub record: TokenRecord,
}

/// Business rules for opaque tokens: hashing, expiry, scope and single use.
/// Storage is delegated to the shared store.
#[derive(Clone)]
pub struct TokenService {
    store: SharedStore,
}

impl TokenService {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn issue(
        &self,
        user_id: i64,
        scope: TokenScope,
        ttl: chrono::Duration,
    ) -> Result<IssuedToken, AuthError> {
        self.issue_at(user_id, scope, ttl, Utc::now()).await
    }

    pub(crate) async fn issue_at(
        &self,
        user_id: i64,
        scope: TokenScope,
        ttl: chrono::Duration,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, AuthError> {
        let plaintext = generate_token();
        let record = TokenRecord {
            hash: hash_token(&plaintext),
            user_id,
            expiry: now + ttl,
            scope,
        };
        self.store.insert_token(&record).await?;
        debug!(user_id, scope = %scope, expiry = %record.expiry, "issued token");
        Ok(IssuedToken { plaintext, record })
    }

    /// Resolve an authentication token to its user.
    pub async fn authenticate(&self, plaintext: &str) -> Result<User, AuthError> {
        self.authenticate_at(plaintext, Utc::now()).await
    }

    pub(crate) async fn authenticate_at(
        &self,
        plaintext: &str,
        now: DateTime<Utc>,
    ) -> Result<User, AuthError> {
        let record = self
            .validate(plaintext, TokenScope::Authentication, now)
            .await?;
        self.store
            .get_user(record.user_id)
            .await?
            .ok_or(AuthError::InvalidToken)
    }

    /// Spend an activation token and mark its owner activated. Of several
    /// concurrent calls with the same token at most one returns `Ok`.
    pub async fn consume_activation(&self, plaintext: &str) -> Result<User, AuthError> {
        self.consume_activation_at(plaintext, Utc::now()).await
    }

    pub(crate) async fn consume_activation_at(
        &self,
        plaintext: &str,
        now: DateTime<Utc>,
    ) -> Result<User, AuthError> {
        let record = self.validate(plaintext, TokenScope::Activation, now).await?;
        match self.store.activate_user(&record.hash, now).await? {
            Some(user) => {
                debug!(user_id = user.id, "account activated");
                Ok(user)
            }
            None => Err(AuthError::InvalidToken),
        }
    }

    async fn validate(
        &self,
        plaintext: &str,
        scope: TokenScope,
        now: DateTime<Utc>,
    ) -> Result<TokenRecord, AuthError> {
        if !is_well_formed_token(plaintext) {
            return Err(AuthError::InvalidToken);
        }

        let hash = hash_token(plaintext);
        let record = self
            .store
            .get_token(&hash)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        if record.scope != scope {
            return Err(AuthError::InvalidToken);
        }

        if record.is_expired_at(now) {
            if let Err(e) = self.store.delete_token(&hash).await {
                warn!(user_id = record.user_id, "failed to delete expired token: {}", e);
            }
            return Err(AuthError::ExpiredToken);
        }

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{MemoryStore, Store};
    use crate::testing::{seed_user, FailingStore};
    use chrono::Duration;
    use std::sync::Arc;

    fn service() -> (Arc<MemoryStore>, TokenService) {
        let store = Arc::new(MemoryStore::new());
        let tokens = TokenService::new(store.clone());
        (store, tokens)
    }

    #[tokio::test]
    async fn only_the_hash_is_persisted() {
        let (store, tokens) = service();
        let user = seed_user(store.as_ref(), "alice@example.com", true, &[]).await;

        let issued = tokens
            .issue(user.id, TokenScope::Authentication, Duration::hours(24))
            .await
            .unwrap();

        assert_eq!(issued.plaintext.len(), crate::auth::TOKEN_LEN);
        assert_ne!(issued.record.hash, issued.plaintext.as_bytes());
        let stored = store
            .get_token(&hash_token(&issued.plaintext))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored, issued.record);
        assert!(store.get_token(issued.plaintext.as_bytes()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn token_is_valid_until_expiry_and_deleted_after() {
        let (store, tokens) = service();
        let user = seed_user(store.as_ref(), "alice@example.com", true, &[]).await;
        let issued_at = Utc::now();
        let ttl = Duration::minutes(30);

        let issued = tokens
            .issue_at(user.id, TokenScope::Authentication, ttl, issued_at)
            .await
            .unwrap();

        let just_before = issued_at + ttl - Duration::milliseconds(1);
        let found = tokens
            .authenticate_at(&issued.plaintext, just_before)
            .await
            .unwrap();
        assert_eq!(found.id, user.id);

        let just_after = issued_at + ttl + Duration::milliseconds(1);
        let err = tokens
            .authenticate_at(&issued.plaintext, just_after)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::ExpiredToken));
        assert_eq!(store.token_count().await, 0);

        let err = tokens
            .authenticate_at(&issued.plaintext, just_after)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));
    }

    #[tokio::test]
    async fn unknown_and_garbage_tokens_are_invalid() {
        let (_, tokens) = service();

        let err = tokens.authenticate("garbage").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));

        let err = tokens.authenticate(&generate_token()).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));
    }

    #[tokio::test]
    async fn malformed_token_never_reaches_the_store() {
        let tokens = TokenService::new(Arc::new(FailingStore));
        let err = tokens.authenticate("not a token").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));

        let err = tokens.authenticate(&generate_token()).await.unwrap_err();
        assert!(matches!(err, AuthError::Store(_)));
    }

    #[tokio::test]
    async fn scopes_are_not_interchangeable() {
        let (store, tokens) = service();
        let user = seed_user(store.as_ref(), "alice@example.com", false, &[]).await;

        let activation = tokens
            .issue(user.id, TokenScope::Activation, Duration::days(3))
            .await
            .unwrap();
        let err = tokens.authenticate(&activation.plaintext).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));

        let authentication = tokens
            .issue(user.id, TokenScope::Authentication, Duration::hours(1))
            .await
            .unwrap();
        let err = tokens
            .consume_activation(&authentication.plaintext)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));

        let user = store.get_user(user.id).await.unwrap().unwrap();
        assert!(!user.activated);
    }

    #[tokio::test]
    async fn activation_is_single_use() {
        let (store, tokens) = service();
        let user = seed_user(store.as_ref(), "alice@example.com", false, &[]).await;
        let issued = tokens
            .issue(user.id, TokenScope::Activation, Duration::days(3))
            .await
            .unwrap();

        let activated = tokens.consume_activation(&issued.plaintext).await.unwrap();
        assert!(activated.activated);

        let err = tokens
            .consume_activation(&issued.plaintext)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));
    }

    #[tokio::test]
    async fn expired_activation_token_leaves_account_inactive() {
        let (store, tokens) = service();
        let user = seed_user(store.as_ref(), "alice@example.com", false, &[]).await;
        let issued_at = Utc::now() - Duration::days(4);
        let issued = tokens
            .issue_at(user.id, TokenScope::Activation, Duration::days(3), issued_at)
            .await
            .unwrap();

        let err = tokens
            .consume_activation(&issued.plaintext)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::ExpiredToken));
        assert!(!store.get_user(user.id).await.unwrap().unwrap().activated);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_activation_succeeds_exactly_once() {
        for _ in 0..20 {
            let (store, tokens) = service();
            let user = seed_user(store.as_ref(), "alice@example.com", false, &[]).await;
            let issued = tokens
                .issue(user.id, TokenScope::Activation, Duration::days(3))
                .await
                .unwrap();

            let a = {
                let tokens = tokens.clone();
                let plaintext = issued.plaintext.clone();
                tokio::spawn(async move { tokens.consume_activation(&plaintext).await })
            };
            let b = {
                let tokens = tokens.clone();
                let plaintext = issued.plaintext.clone();
                tokio::spawn(async move { tokens.consume_activation(&plaintext).await })
            };
            let (a, b) = tokio::join!(a, b);
            let results = [a.unwrap(), b.unwrap()];

            let wins = results.iter().filter(|r| r.is_ok()).count();
            assert_eq!(wins, 1);
            assert!(results
                .iter()
                .any(|r| matches!(r, Err(AuthError::InvalidToken))));
            assert!(store.get_user(user.id).await.unwrap().unwrap().activated);
        }
    }
}
