//! Inventory application service: validation in front of the audited repository.

use std::sync::Arc;

use thiserror::Error;
use tracing::instrument;

use stockledger_core::{DomainError, ItemId, UserId};
use stockledger_inventory::{Item, ItemDraft, ItemHistory};

use crate::repository::{HistoryReader, ItemRepository, RepositoryError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] DomainError),

    #[error("item {0} not found")]
    NotFound(ItemId),

    #[error(transparent)]
    Store(RepositoryError),
}

impl From<RepositoryError> for ServiceError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::NotFound(id) => ServiceError::NotFound(id),
            other => ServiceError::Store(other),
        }
    }
}

#[derive(Clone)]
pub struct InventoryService {
    items: Arc<dyn ItemRepository>,
    history: Arc<dyn HistoryReader>,
}

impl InventoryService {
    pub fn new(items: Arc<dyn ItemRepository>, history: Arc<dyn HistoryReader>) -> Self {
        Self { items, history }
    }

    #[instrument(skip(self, draft), fields(actor = %actor), err)]
    pub async fn add_item(&self, actor: UserId, draft: &ItemDraft) -> Result<ItemId, ServiceError> {
        draft.validate_for_create()?;
        let id = self.items.create(actor, draft).await?;
        tracing::info!(item_id = %id, "item created");
        Ok(id)
    }

    pub async fn inventory(&self) -> Result<Vec<Item>, ServiceError> {
        Ok(self.items.list().await?)
    }

    #[instrument(skip(self, draft), fields(actor = %actor, item_id = %id), err)]
    pub async fn update_item(&self, actor: UserId, id: ItemId, draft: &ItemDraft) -> Result<(), ServiceError> {
        draft.validate_for_update()?;
        self.items.update(actor, id, draft).await?;
        tracing::info!("item updated");
        Ok(())
    }

    #[instrument(skip(self), fields(actor = %actor, item_id = %id), err)]
    pub async fn delete_item(&self, actor: UserId, id: ItemId) -> Result<(), ServiceError> {
        self.items.delete(actor, id).await?;
        tracing::info!("item deleted");
        Ok(())
    }

    /// Ledger for one item. An empty ledger means the id never existed.
    pub async fn item_history(&self, id: ItemId) -> Result<Vec<ItemHistory>, ServiceError> {
        let rows = self.history.get_by_item_id(id).await?;
        if rows.is_empty() {
            return Err(ServiceError::NotFound(id));
        }
        Ok(rows)
    }
}
