//! Invitation token generation and hashing.
//!
//! Tokens come from the operating system's CSPRNG and are URL-safe base64.
//! Only the SHA-256 digest is ever stored.

use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Generate a random, URL-safe invitation token from `bytes` random bytes.
pub fn generate_token(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    OsRng.fill_bytes(&mut buf);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(&buf)
}

/// Digest under which a token is stored and looked up.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_tokens_are_unique_and_url_safe() {
        let tokens: HashSet<String> = (0..64).map(|_| generate_token(32)).collect();
        assert_eq!(tokens.len(), 64);
        for token in &tokens {
            // 32 bytes -> 43 unpadded base64 chars
            assert_eq!(token.len(), 43);
            assert!(token.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        }
    }

    #[test]
    fn test_hash_is_stable_and_distinct() {
        let token = generate_token(32);
        assert_eq!(hash_token(&token), hash_token(&token));
        assert_ne!(hash_token(&token), token);
        assert_ne!(hash_token("a"), hash_token("b"));
    }
}
