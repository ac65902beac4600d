//! Password hashing via bcrypt.

use tokio::sync::OnceCell;

use super::AuthError;

/// bcrypt cost factor.
const BCRYPT_COST: u32 = 12;

/// bcrypt ignores input past 72 bytes, so longer passwords are rejected upstream.
pub const MAX_PASSWORD_BYTES: usize = 72;
pub const MIN_PASSWORD_BYTES: usize = 8;

/// Hash with bcrypt off the async executor.
pub async fn hash_password(password: String) -> Result<String, AuthError> {
    run_blocking(move || bcrypt::hash(password, BCRYPT_COST)).await
}

/// Verify a password against a stored bcrypt hash.
pub async fn verify_password(password: String, hash: String) -> Result<bool, AuthError> {
    run_blocking(move || bcrypt::verify(password, &hash)).await
}

/// Spend the same bcrypt work as [`verify_password`] when there is no stored
/// hash to check against. Always `false`.
pub async fn verify_against_placeholder(password: String) -> Result<bool, AuthError> {
    static PLACEHOLDER: OnceCell<String> = OnceCell::const_new();
    let hash = PLACEHOLDER
        .get_or_try_init(|| hash_password("reel-api placeholder credential".to_string()))
        .await?
        .clone();
    verify_password(password, hash).await?;
    Ok(false)
}

async fn run_blocking<T, F>(f: F) -> Result<T, AuthError>
where
    F: FnOnce() -> Result<T, bcrypt::BcryptError> + Send + 'static,
    T: Send + 'static,
{
    Ok(tokio::task::spawn_blocking(f).await??)
}
