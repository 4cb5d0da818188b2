use std::fmt;

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use tracing::error;

/// Argon2id cost: memory in KiB, iterations, lanes.
pub const ARGON2_M_COST: u32 = 19 * 1024;
pub const ARGON2_T_COST: u32 = 2;
pub const ARGON2_P_COST: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("password hashing failed: {0}")]
    Hash(argon2::password_hash::Error),
    #[error("stored password hash is malformed: {0}")]
    Malformed(String),
    #[error("no password hash to verify against")]
    MissingHash,
}

fn hasher() -> Result<Argon2<'static>, CredentialError> {
    let params = Params::new(ARGON2_M_COST, ARGON2_T_COST, ARGON2_P_COST, None)
        .map_err(|e| CredentialError::Hash(e.into()))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// A user's password credential.
///
/// `hash` is the PHC-encoded Argon2id hash and is the only part ever
/// persisted. `plaintext` is populated by [`Password::set`] so the value can
/// be validated after hashing; it never leaves the process.
#[derive(Clone, Default)]
pub struct Password {
    plaintext: Option<String>,
    hash: Option<Vec<u8>>,
}

impl Password {
    pub fn from_hash(hash: Vec<u8>) -> Self {
        Self {
            plaintext: None,
            hash: Some(hash),
        }
    }

    pub fn set(&mut self, plaintext: &str) -> Result<(), CredentialError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = hasher()?
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|e| {
                error!(error = %e, "argon2 hash_password error");
                CredentialError::Hash(e)
            })?
            .to_string();

        self.plaintext = Some(plaintext.to_string());
        self.hash = Some(hash.into_bytes());
        Ok(())
    }

    /// Checks `plaintext` against the stored hash.
    ///
    /// A wrong password is `Ok(false)`; `Err` means verification itself could
    /// not run (no hash, unparsable hash, primitive failure).
    pub fn matches(&self, plaintext: &str) -> Result<bool, CredentialError> {
        let raw = self.hash.as_deref().ok_or(CredentialError::MissingHash)?;
        let encoded =
            std::str::from_utf8(raw).map_err(|e| CredentialError::Malformed(e.to_string()))?;
        let parsed = PasswordHash::new(encoded).map_err(|e| {
            error!(error = %e, "argon2 parse hash error");
            CredentialError::Malformed(e.to_string())
        })?;

        // Parameters come from the PHC string, so hashes made with older
        // costs still verify.
        match Argon2::default().verify_password(plaintext.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(CredentialError::Hash(e)),
        }
    }

    pub fn plaintext(&self) -> Option<&str> {
        self.plaintext.as_deref()
    }

    pub fn hash(&self) -> Option<&[u8]> {
        self.hash.as_deref()
    }

    /// The hash to write to storage. Panics when there is none: persisting a
    /// credential-less user is a bug, not an input error.
    pub fn persisted_hash(&self) -> &[u8] {
        match self.hash.as_deref() {
            Some(hash) => hash,
            None => panic!("missing password hash for user"),
        }
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Password")
            .field("plaintext", &self.plaintext.as_ref().map(|_| "<redacted>"))
            .field("hash", &self.hash.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Passwords rejected regardless of length.
pub const COMMON_PASSWORDS: &[&str] = &[
    "password",
    "password1",
    "password12",
    "password123",
    "password1234",
    "12345678",
    "123456789",
    "1234567890",
    "11111111",
    "00000000",
    "87654321",
    "qwertyuiop",
    "qwerty123",
    "qwerty12345",
    "1q2w3e4r",
    "1qaz2wsx",
    "zaq12wsx",
    "abcd1234",
    "abc12345",
    "iloveyou",
    "sunshine",
    "princess",
    "football",
    "baseball",
    "welcome1",
    "letmein1",
    "trustno1",
    "superman",
    "starwars",
    "whatever",
    "passw0rd",
    "p@ssw0rd",
    "changeme",
    "admin123",
    "administrator",
    "monkey123",
    "dragon123",
    "master123",
    "computer",
    "internet",
];
