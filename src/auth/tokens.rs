use sha2::{Digest, Sha256};

use crate::validator::Validator;

pub const SCOPE_ACTIVATION: &str = "activation";
pub const SCOPE_AUTHENTICATION: &str = "authentication";

/// Plaintext tokens are base32 (no padding) of 16 random bytes.
pub const TOKEN_PLAINTEXT_LEN: usize = 26;

/// SHA-256 of a presented plaintext token, as stored in `tokens.hash`.
pub fn token_digest(plaintext: &str) -> [u8; 32] {
    Sha256::digest(plaintext.as_bytes()).into()
}

pub fn validate_token_plaintext(v: &mut Validator, plaintext: &str) {
    v.check(!plaintext.is_empty(), "token", "must be provided");
    v.check(
        plaintext.len() == TOKEN_PLAINTEXT_LEN,
        "token",
        "must be 26 bytes long",
    );
}
