//! Opaque bearer tokens for invites and sign links
//!
//! Invite tokens are stored only as their SHA-256 hash; the raw value is shown
//! to the admin exactly once. Sign-link tokens are stored raw because the link
//! itself is the credential and is looked up on every prefill.

use rand::Rng;
use sha2::{Digest, Sha256};

/// Generate a secure random token
///
/// Returns a 32-byte hex-encoded token (64 characters)
pub fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    hex::encode(bytes)
}

/// Hash a token using SHA-256
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.trim().as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_generation() {
        let token1 = generate_token();
        let token2 = generate_token();

        assert_eq!(token1.len(), 64);
        assert_ne!(token1, token2);
        assert!(token1.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_token_hashing() {
        let hash1 = hash_token("test_token_12345");
        let hash2 = hash_token("test_token_12345");

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
        assert_ne!(hash1, hash_token("different_token"));
        // Pasted tokens often carry a trailing newline
        assert_eq!(hash1, hash_token("test_token_12345\n"));
    }
}
