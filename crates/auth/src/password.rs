//! bcrypt password hashing.

use thiserror::Error;

/// Work factor for newly stored hashes.
pub const HASH_COST: u32 = bcrypt::DEFAULT_COST;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("failed to hash password: {0}")]
    Hash(String),

    #[error("stored password hash is unusable: {0}")]
    InvalidHash(String),

    #[error("password check did not complete: {0}")]
    Task(String),
}

/// Hash with an explicit cost (seeding and tests use the bcrypt minimum).
pub fn hash_password_with_cost(password: &str, cost: u32) -> Result<String, PasswordError> {
    bcrypt::hash(password, cost).map_err(|e| PasswordError::Hash(e.to_string()))
}

/// Compare a plaintext password with a stored hash.
///
/// `Ok(false)` means the password does not match; `Err` means the hash
/// itself could not be parsed.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    bcrypt::verify(password, hash).map_err(|e| PasswordError::InvalidHash(e.to_string()))
}

/// [`verify_password`] on the blocking pool, keeping bcrypt off the async workers.
pub async fn verify_password_blocking(password: String, hash: String) -> Result<bool, PasswordError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| PasswordError::Task(e.to_string()))?
}
