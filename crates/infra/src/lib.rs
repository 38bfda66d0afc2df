//! Infrastructure layer: configuration, Postgres wiring, audited repositories.

pub mod config;
pub mod db;
pub mod repository;
pub mod retry;
pub mod seed;
pub mod service;

pub use config::{AppConfig, StorageBackend};
pub use service::{InventoryService, ServiceError};
