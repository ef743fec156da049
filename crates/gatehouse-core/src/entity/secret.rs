//! Secret hashing and id derivation

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Derive the short user id (6 chars) from a secret.
///
/// This is NOT used to prove the client knows the secret; it only
/// identifies the client, so a client has a single value to remember
/// instead of a username/passphrase pair. A password hash cannot be
/// used here because its output changes on every hashing, so we take
/// the first 6 hex characters of a SHA-256 digest instead. Two clients
/// therefore cannot share the same secret; since only the admin
/// registers clients, only the admin can observe such a collision.
pub fn derive_id(secret: &str) -> String {
    let sum = hex::encode(Sha256::digest(secret.as_bytes()));
    sum[..6].to_string()
}

/// Hash a plaintext secret into an Argon2 PHC string for storage.
pub fn hash_secret(secret: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::SecretHash(e.to_string()))
}

/// Verify a plaintext secret against a stored Argon2 hash.
pub fn verify_secret(secret: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(secret.as_bytes(), &parsed)
        .is_ok()
}
