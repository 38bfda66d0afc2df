use async_trait::async_trait;
use thiserror::Error;

use stockledger_auth::Role;
use stockledger_core::{ItemId, UserId};
use stockledger_inventory::{Item, ItemDraft, ItemHistory};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// The statement touched zero rows.
    #[error("item {0} not found")]
    NotFound(ItemId),

    /// Connection-level or otherwise retryable failure.
    #[error("store unavailable during {operation}: {message}")]
    Unavailable { operation: String, message: String },

    #[error("constraint violated during {operation}: {message}")]
    Constraint { operation: String, message: String },

    #[error("database error during {operation}: {message}")]
    Database { operation: String, message: String },

    #[error("corrupt row in {operation}: {message}")]
    Corrupt { operation: String, message: String },
}

impl RepositoryError {
    pub fn is_transient(&self) -> bool {
        matches!(self, RepositoryError::Unavailable { .. })
    }

    pub(crate) fn corrupt(operation: &str, message: impl Into<String>) -> Self {
        RepositoryError::Corrupt {
            operation: operation.to_string(),
            message: message.into(),
        }
    }
}

/// Write path plus listing for items.
///
/// Mutations commit the item change and its history row together or not at
/// all. A missing target is `NotFound` and leaves no history behind.
#[async_trait]
pub trait ItemRepository: Send + Sync {
    async fn create(&self, actor: UserId, draft: &ItemDraft) -> Result<ItemId, RepositoryError>;

    /// All items ordered by id.
    async fn list(&self) -> Result<Vec<Item>, RepositoryError>;

    async fn update(&self, actor: UserId, id: ItemId, draft: &ItemDraft) -> Result<(), RepositoryError>;

    async fn delete(&self, actor: UserId, id: ItemId) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait HistoryReader: Send + Sync {
    /// History rows for one item ordered by `changed_at`, then id.
    ///
    /// An item with no rows yields an empty vector.
    async fn get_by_item_id(&self, item_id: ItemId) -> Result<Vec<ItemHistory>, RepositoryError>;
}

/// Idempotent user provisioning used at startup.
#[async_trait]
pub trait UserSeeder: Send + Sync {
    /// Insert the user unless the username already exists; returns its id.
    async fn ensure_user(
        &self,
        username: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<UserId, RepositoryError>;
}
