//! Postgres-backed audited item repository and credential store.
//!
//! ## Audit binding
//!
//! Every mutating call runs in one transaction:
//! 1. `set_config('stockledger.user_id', <actor>, true)` binds the actor to
//!    the transaction only
//! 2. the INSERT/UPDATE/DELETE runs
//! 3. the `items_audit` row trigger appends to `items_history` using the
//!    bound actor and the OLD/NEW row images
//! 4. commit
//!
//! A trigger failure aborts the statement, so the item change and its history
//! row commit together or not at all. Dropping the transaction handle on any
//! early return rolls it back.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | RepositoryError |
//! |------------|----------------------|-----------------|
//! | Database | `23xxx` (integrity) | `Constraint` |
//! | Database | `08xxx`, `53xxx`, `57xxx`, `40001`, `40P01` | `Unavailable` |
//! | Database | any other | `Database` |
//! | Io, Tls, PoolTimedOut, PoolClosed, WorkerCrashed | N/A | `Unavailable` |
//! | RowNotFound, decode failures | N/A | `Corrupt` |
//! | Other | N/A | `Database` |

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use tracing::{Span, field, instrument};

use stockledger_auth::{CredentialStore, CredentialStoreError, Role, User};
use stockledger_core::{ItemId, UserId};
use stockledger_inventory::{Item, ItemDraft, ItemHistory, Operation};

use super::r#trait::{HistoryReader, ItemRepository, RepositoryError, UserSeeder};
use crate::retry::{RetryConfig, with_retry};

/// Transaction-local setting read by the audit trigger.
pub const ACTOR_SETTING: &str = "stockledger.user_id";

#[derive(Debug, Clone)]
pub struct PostgresItemRepository {
    pool: Arc<PgPool>,
    retry: RetryConfig,
}

impl PostgresItemRepository {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
            retry: RetryConfig::default(),
        }
    }

    /// Open a transaction with `actor` bound for the audit trigger.
    async fn begin_as(
        &self,
        actor: UserId,
        operation: &str,
    ) -> Result<Transaction<'static, Postgres>, RepositoryError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query("SELECT set_config($1, $2, true)")
            .bind(ACTOR_SETTING)
            .bind(actor.get().to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;

        Ok(tx)
    }

    /// Commit when the statement hit a row; otherwise roll back and report `NotFound`.
    async fn finish(
        tx: Transaction<'static, Postgres>,
        rows_affected: u64,
        id: ItemId,
    ) -> Result<(), RepositoryError> {
        if rows_affected == 0 {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(RepositoryError::NotFound(id));
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }
}

#[async_trait]
impl ItemRepository for PostgresItemRepository {
    #[instrument(skip(self, draft), fields(actor = %actor, item_id = field::Empty), err)]
    async fn create(&self, actor: UserId, draft: &ItemDraft) -> Result<ItemId, RepositoryError> {
        let mut tx = self.begin_as(actor, "create_item").await?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO items (name, description, quantity)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(&draft.name)
        .bind(&draft.description)
        .bind(draft.quantity)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("create_item", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Span::current().record("item_id", id);
        Ok(ItemId::new(id))
    }

    #[instrument(skip(self), fields(item_count = field::Empty), err)]
    async fn list(&self) -> Result<Vec<Item>, RepositoryError> {
        let pool: &PgPool = &self.pool;

        let rows = with_retry(&self.retry, "list_items", move || async move {
            sqlx::query(
                r#"
                SELECT id, name, description, quantity, created_at, updated_at
                FROM items
                ORDER BY id ASC
                "#,
            )
            .fetch_all(pool)
            .await
            .map_err(|e| map_sqlx_error("list_items", e))
        })
        .await?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let item = ItemRow::from_row(&row)
                .map_err(|e| RepositoryError::corrupt("list_items", e.to_string()))?;
            items.push(item.into());
        }

        Span::current().record("item_count", items.len());
        Ok(items)
    }

    #[instrument(skip(self, draft), fields(actor = %actor, item_id = %id), err)]
    async fn update(&self, actor: UserId, id: ItemId, draft: &ItemDraft) -> Result<(), RepositoryError> {
        let mut tx = self.begin_as(actor, "update_item").await?;

        let result = sqlx::query(
            r#"
            UPDATE items
            SET name = $1, description = $2, quantity = $3, updated_at = NOW()
            WHERE id = $4
            "#,
        )
        .bind(&draft.name)
        .bind(&draft.description)
        .bind(draft.quantity)
        .bind(id.get())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_item", e))?;

        Self::finish(tx, result.rows_affected(), id).await
    }

    #[instrument(skip(self), fields(actor = %actor, item_id = %id), err)]
    async fn delete(&self, actor: UserId, id: ItemId) -> Result<(), RepositoryError> {
        let mut tx = self.begin_as(actor, "delete_item").await?;

        let result = sqlx::query("DELETE FROM items WHERE id = $1")
            .bind(id.get())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_item", e))?;

        Self::finish(tx, result.rows_affected(), id).await
    }
}

#[async_trait]
impl HistoryReader for PostgresItemRepository {
    #[instrument(skip(self), fields(item_id = %item_id, row_count = field::Empty), err)]
    async fn get_by_item_id(&self, item_id: ItemId) -> Result<Vec<ItemHistory>, RepositoryError> {
        let pool: &PgPool = &self.pool;

        let rows = with_retry(&self.retry, "get_item_history", move || async move {
            sqlx::query(
                r#"
                SELECT id, item_id, user_id, operation, old_value, new_value, changed_at
                FROM items_history
                WHERE item_id = $1
                ORDER BY changed_at ASC, id ASC
                "#,
            )
            .bind(item_id.get())
            .fetch_all(pool)
            .await
            .map_err(|e| map_sqlx_error("get_item_history", e))
        })
        .await?;

        let mut history = Vec::with_capacity(rows.len());
        for row in rows {
            let entry = HistoryRow::from_row(&row)
                .map_err(|e| RepositoryError::corrupt("get_item_history", e.to_string()))?;
            history.push(entry.try_into()?);
        }

        Span::current().record("row_count", history.len());
        Ok(history)
    }
}

/// Users table lookups.
#[derive(Debug, Clone)]
pub struct PostgresCredentialStore {
    pool: Arc<PgPool>,
    retry: RetryConfig,
}

impl PostgresCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
            retry: RetryConfig::default(),
        }
    }
}

#[async_trait]
impl CredentialStore for PostgresCredentialStore {
    #[instrument(skip(self), fields(username = %username, found = field::Empty), err)]
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, CredentialStoreError> {
        let pool: &PgPool = &self.pool;

        let row = with_retry(&self.retry, "find_user", move || async move {
            sqlx::query(
                r#"
                SELECT id, username, password_hash, role
                FROM users
                WHERE username = $1
                "#,
            )
            .bind(username)
            .fetch_optional(pool)
            .await
            .map_err(|e| map_sqlx_error("find_user", e))
        })
        .await
        .map_err(|e| match e {
            RepositoryError::Unavailable { .. } => CredentialStoreError::Unavailable(e.to_string()),
            other => CredentialStoreError::Corrupt(other.to_string()),
        })?;

        Span::current().record("found", row.is_some());
        let Some(row) = row else {
            return Ok(None);
        };

        let id: i64 = row
            .try_get("id")
            .map_err(|e| CredentialStoreError::Corrupt(e.to_string()))?;
        let role: String = row
            .try_get("role")
            .map_err(|e| CredentialStoreError::Corrupt(e.to_string()))?;
        let role: Role = role
            .parse()
            .map_err(|e: stockledger_auth::UnknownRole| CredentialStoreError::Corrupt(e.to_string()))?;

        Ok(Some(User {
            id: UserId::new(id),
            username: row
                .try_get("username")
                .map_err(|e| CredentialStoreError::Corrupt(e.to_string()))?,
            password_hash: row
                .try_get("password_hash")
                .map_err(|e| CredentialStoreError::Corrupt(e.to_string()))?,
            role,
        }))
    }
}

#[async_trait]
impl UserSeeder for PostgresCredentialStore {
    #[instrument(skip(self, password_hash), fields(username = %username, role = %role), err)]
    async fn ensure_user(
        &self,
        username: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<UserId, RepositoryError> {
        // The no-op update makes RETURNING yield the existing id on conflict.
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO users (username, password_hash, role)
            VALUES ($1, $2, $3)
            ON CONFLICT (username) DO UPDATE SET username = EXCLUDED.username
            RETURNING id
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .bind(role.as_str())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("ensure_user", e))?;

        Ok(UserId::new(id))
    }
}

/// Map SQLx errors to repository errors.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> RepositoryError {
    let operation = operation.to_string();
    match &err {
        sqlx::Error::Database(db_err) => {
            let message = db_err.message().to_string();
            let code = db_err.code().map(|c| c.into_owned()).unwrap_or_default();
            match code.as_str() {
                c if c.starts_with("23") => RepositoryError::Constraint { operation, message },
                c if c.starts_with("08") || c.starts_with("53") || c.starts_with("57") => {
                    RepositoryError::Unavailable { operation, message }
                }
                "40001" | "40P01" => RepositoryError::Unavailable { operation, message },
                _ => RepositoryError::Database { operation, message },
            }
        }
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => RepositoryError::Unavailable {
            operation,
            message: err.to_string(),
        },
        sqlx::Error::RowNotFound
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::Decode(_) => RepositoryError::Corrupt {
            operation,
            message: err.to_string(),
        },
        _ => RepositoryError::Database {
            operation,
            message: err.to_string(),
        },
    }
}

// SQLx row types

#[derive(Debug)]
struct ItemRow {
    id: i64,
    name: String,
    description: String,
    quantity: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for ItemRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(ItemRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            quantity: row.try_get("quantity")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl From<ItemRow> for Item {
    fn from(row: ItemRow) -> Self {
        Item {
            id: ItemId::new(row.id),
            name: row.name,
            description: row.description,
            quantity: row.quantity,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug)]
struct HistoryRow {
    id: i64,
    item_id: i64,
    user_id: i64,
    operation: String,
    old_value: Option<String>,
    new_value: Option<String>,
    changed_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for HistoryRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(HistoryRow {
            id: row.try_get("id")?,
            item_id: row.try_get("item_id")?,
            user_id: row.try_get("user_id")?,
            operation: row.try_get("operation")?,
            old_value: row.try_get("old_value")?,
            new_value: row.try_get("new_value")?,
            changed_at: row.try_get("changed_at")?,
        })
    }
}

impl TryFrom<HistoryRow> for ItemHistory {
    type Error = RepositoryError;

    fn try_from(row: HistoryRow) -> Result<Self, Self::Error> {
        let operation: Operation = row
            .operation
            .parse()
            .map_err(|e: stockledger_inventory::UnknownOperation| {
                RepositoryError::corrupt("get_item_history", e.to_string())
            })?;

        Ok(ItemHistory {
            id: row.id,
            item_id: ItemId::new(row.item_id),
            user_id: UserId::new(row.user_id),
            operation,
            old_value: row.old_value,
            new_value: row.new_value,
            changed_at: row.changed_at,
        })
    }
}
