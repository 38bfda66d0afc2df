//! Audited item storage.
//!
//! Every mutation takes the acting [`UserId`](stockledger_core::UserId)
//! explicitly and produces exactly one history row in the same atomic unit.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryStore;
pub use postgres::{PostgresCredentialStore, PostgresItemRepository};
pub use r#trait::{HistoryReader, ItemRepository, RepositoryError, UserSeeder};
