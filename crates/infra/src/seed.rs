//! Startup user provisioning.

use thiserror::Error;

use stockledger_auth::{PasswordError, hash_password_with_cost};

use crate::config::SeedUser;
use crate::repository::{RepositoryError, UserSeeder};

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("failed to hash password for '{username}': {source}")]
    Password {
        username: String,
        source: PasswordError,
    },

    #[error(transparent)]
    Store(#[from] RepositoryError),
}

/// Ensure every configured user exists. Existing users are left untouched.
pub async fn seed_users(seeder: &dyn UserSeeder, users: &[SeedUser], cost: u32) -> Result<(), SeedError> {
    for user in users {
        let hash = hash_password_with_cost(&user.password, cost).map_err(|source| SeedError::Password {
            username: user.username.clone(),
            source,
        })?;
        let id = seeder.ensure_user(&user.username, &hash, user.role).await?;
        tracing::info!(user_id = %id, username = %user.username, role = %user.role, "user ensured");
    }
    Ok(())
}
