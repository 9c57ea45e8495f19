//! Opaque session tokens.
//!
//! The client holds the raw token; the database only ever stores its SHA-256
//! digest.

use rand::Rng;
use sha2::{Digest, Sha256};

/// Token length in characters
pub const TOKEN_LEN: usize = 32;

/// Generate a new session token
pub fn generate_session_token() -> String {
  let mut rng = rand::rng();
  (0..TOKEN_LEN)
    .map(|_| {
      let idx = rng.random_range(0..36u8);
      if idx < 10 {
        (b'0' + idx) as char
      } else {
        (b'a' + idx - 10) as char
      }
    })
    .collect()
}

/// Digest stored in `sessions.token_hash`
pub fn hash_token(token: &str) -> String {
  hex::encode(Sha256::digest(token.as_bytes()))
}
