pub mod password;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::database::DatabaseError;

/// Random bytes behind every plaintext token.
pub const TOKEN_BYTES: usize = 16;

/// Length of the encoded plaintext: 16 bytes in unpadded base64.
pub const TOKEN_LEN: usize = 22;

/// Gatekeeper failures. Client-side variants never carry detail that would
/// tell a caller which specific check failed beyond the category.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("malformed authorization header")]
    MalformedAuthHeader,

    #[error("invalid token")]
    InvalidToken,

    #[error("expired token")]
    ExpiredToken,

    #[error("authentication required")]
    AuthenticationRequired,

    #[error("account not activated")]
    AccountNotActivated,

    #[error("permission denied")]
    PermissionDenied,

    #[error("invalid authentication credentials")]
    InvalidCredentials,

    #[error("store unavailable: {0}")]
    Store(#[from] DatabaseError),

    #[error("password hashing failed: {0}")]
    Password(#[from] bcrypt::BcryptError),

    #[error("password hashing task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Fresh plaintext token from the OS CSPRNG, URL-safe for transport.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// SHA-256 digest of the plaintext; this is what gets stored and looked up.
pub fn hash_token(plaintext: &str) -> Vec<u8> {
    Sha256::digest(plaintext.as_bytes()).to_vec()
}

/// Cheap shape check so obviously bad input never reaches the store.
pub fn is_well_formed_token(plaintext: &str) -> bool {
    plaintext.len() == TOKEN_LEN
        && plaintext
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_tokens_are_well_formed_and_distinct() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), TOKEN_LEN);
        assert!(is_well_formed_token(&a));
        assert_ne!(a, b);
    }

    #[test]
    fn hash_is_sha256_and_deterministic() {
        let digest = hash_token("Y3QMGX3PJ3WLRL2YRTQGQ6KRHU");
        assert_eq!(digest.len(), 32);
        assert_eq!(digest, hash_token("Y3QMGX3PJ3WLRL2YRTQGQ6KRHU"));
        assert_ne!(digest, hash_token("Y3QMGX3PJ3WLRL2YRTQGQ6KRHV"));
    }

    #[test]
    fn shape_check_rejects_wrong_length_and_charset() {
        assert!(!is_well_formed_token("short"));
        assert!(!is_well_formed_token("abcdefghijklmnopqrst+/"));
        assert!(is_well_formed_token("abcdefghijklmnopqrst-_"));
    }
}
