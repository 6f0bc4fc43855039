//! SHA-256 request hashing.
//!
//! Integrity-sensitive commands attach a request hash derived from the
//! account id and the session cookie. The hash is the lowercase hex SHA-256
//! of `"<account-id>:<session-cookie>"`.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Length of a hex-encoded SHA-256 digest.
pub const INTEGRITY_TOKEN_HEX_LEN: usize = 64;

/// Hex-encoded SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Request hash over the account id and session cookie.
pub fn integrity_token(account_id: &str, session_cookie: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(account_id.as_bytes());
    hasher.update(b":");
    hasher.update(session_cookie.as_bytes());
    hex::encode(hasher.finalize())
}

/// Compare two tokens without leaking the position of the first mismatch.
pub fn tokens_match(expected: &str, candidate: &str) -> bool {
    expected.len() == candidate.len() && bool::from(expected.as_bytes().ct_eq(candidate.as_bytes()))
}
