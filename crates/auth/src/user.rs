//! User records and the credential store seam.

use async_trait::async_trait;
use thiserror::Error;

use stockledger_core::UserId;

use crate::Role;

/// A stored user: identity, salted password hash, single role.
///
/// Read-only from this crate's point of view.
#[derive(Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
}

// The hash is never printed.
impl core::fmt::Debug for User {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("password_hash", &"<redacted>")
            .field("role", &self.role)
            .finish()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CredentialStoreError {
    #[error("credential store unavailable: {0}")]
    Unavailable(String),

    #[error("corrupt user row: {0}")]
    Corrupt(String),
}

/// Lookup of users by username.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// `Ok(None)` when no such user exists.
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, CredentialStoreError>;
}
