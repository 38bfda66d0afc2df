use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;

use stockledger_auth::{CredentialStore, CredentialStoreError, Role, User};
use stockledger_core::{ItemId, UserId};
use stockledger_inventory::{Item, ItemDraft, ItemHistory, ItemSnapshot, Operation};

use super::r#trait::{HistoryReader, ItemRepository, RepositoryError, UserSeeder};

#[derive(Debug, Default)]
struct State {
    items: BTreeMap<ItemId, Item>,
    history: Vec<ItemHistory>,
    users: HashMap<String, User>,
    last_item_id: i64,
    last_history_id: i64,
    last_user_id: i64,
}

impl State {
    /// Build the ledger row for a mutation before anything is applied, so a
    /// serialization failure leaves the state untouched.
    fn history_row(
        &self,
        actor: UserId,
        item_id: ItemId,
        operation: Operation,
        old: Option<&Item>,
        new: Option<&Item>,
    ) -> Result<ItemHistory, RepositoryError> {
        let image = |item: Option<&Item>| {
            item.map(|i| ItemSnapshot::from(i).to_json())
                .transpose()
                .map_err(|e| RepositoryError::corrupt("snapshot_item", e.to_string()))
        };

        Ok(ItemHistory {
            id: self.last_history_id + 1,
            item_id,
            user_id: actor,
            operation,
            old_value: image(old)?,
            new_value: image(new)?,
            changed_at: Utc::now(),
        })
    }

    fn append(&mut self, row: ItemHistory) {
        self.last_history_id = row.id;
        self.history.push(row);
    }
}

/// In-memory items, ledger and users for tests/dev.
///
/// There is no trigger here: each mutation computes its history row in code
/// and applies both under one write lock.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Total number of ledger rows across all items.
    pub fn history_len(&self) -> usize {
        self.state.read().map(|s| s.history.len()).unwrap_or(0)
    }

    fn write(&self, operation: &str) -> Result<std::sync::RwLockWriteGuard<'_, State>, RepositoryError> {
        self.state.write().map_err(|_| RepositoryError::Database {
            operation: operation.to_string(),
            message: "lock poisoned".to_string(),
        })
    }

    fn read(&self, operation: &str) -> Result<std::sync::RwLockReadGuard<'_, State>, RepositoryError> {
        self.state.read().map_err(|_| RepositoryError::Database {
            operation: operation.to_string(),
            message: "lock poisoned".to_string(),
        })
    }
}

#[async_trait]
impl ItemRepository for InMemoryStore {
    async fn create(&self, actor: UserId, draft: &ItemDraft) -> Result<ItemId, RepositoryError> {
        let mut state = self.write("create_item")?;

        let now = Utc::now();
        let item = Item {
            id: ItemId::new(state.last_item_id + 1),
            name: draft.name.clone(),
            description: draft.description.clone(),
            quantity: draft.quantity,
            created_at: now,
            updated_at: now,
        };
        let row = state.history_row(actor, item.id, Operation::Insert, None, Some(&item))?;

        let id = item.id;
        state.last_item_id = id.get();
        state.items.insert(id, item);
        state.append(row);
        Ok(id)
    }

    async fn list(&self) -> Result<Vec<Item>, RepositoryError> {
        let state = self.read("list_items")?;
        Ok(state.items.values().cloned().collect())
    }

    async fn update(&self, actor: UserId, id: ItemId, draft: &ItemDraft) -> Result<(), RepositoryError> {
        let mut state = self.write("update_item")?;

        let old = state.items.get(&id).cloned().ok_or(RepositoryError::NotFound(id))?;
        let new = Item {
            name: draft.name.clone(),
            description: draft.description.clone(),
            quantity: draft.quantity,
            updated_at: Utc::now(),
            ..old.clone()
        };
        let row = state.history_row(actor, id, Operation::Update, Some(&old), Some(&new))?;

        state.items.insert(id, new);
        state.append(row);
        Ok(())
    }

    async fn delete(&self, actor: UserId, id: ItemId) -> Result<(), RepositoryError> {
        let mut state = self.write("delete_item")?;

        let old = state.items.get(&id).ok_or(RepositoryError::NotFound(id))?;
        let row = state.history_row(actor, id, Operation::Delete, Some(old), None)?;

        state.items.remove(&id);
        state.append(row);
        Ok(())
    }
}

#[async_trait]
impl HistoryReader for InMemoryStore {
    async fn get_by_item_id(&self, item_id: ItemId) -> Result<Vec<ItemHistory>, RepositoryError> {
        let state = self.read("get_item_history")?;
        // Appended in commit order, which is also changed_at order.
        Ok(state
            .history
            .iter()
            .filter(|h| h.item_id == item_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl CredentialStore for InMemoryStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, CredentialStoreError> {
        let state = self
            .state
            .read()
            .map_err(|_| CredentialStoreError::Unavailable("lock poisoned".to_string()))?;
        Ok(state.users.get(username).cloned())
    }
}

#[async_trait]
impl UserSeeder for InMemoryStore {
    async fn ensure_user(
        &self,
        username: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<UserId, RepositoryError> {
        let mut state = self.write("ensure_user")?;
        if let Some(existing) = state.users.get(username) {
            return Ok(existing.id);
        }

        let id = UserId::new(state.last_user_id + 1);
        state.last_user_id = id.get();
        state.users.insert(
            username.to_string(),
            User {
                id,
                username: username.to_string(),
                password_hash: password_hash.to_string(),
                role,
            },
        );
        Ok(id)
    }
}
