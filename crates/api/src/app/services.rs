//! Service wiring: storage backend, token service, seeded users.

use std::sync::Arc;

use anyhow::Context;

use stockledger_auth::{CredentialStore, TokenService};
use stockledger_infra::config::{AppConfig, StorageBackend};
use stockledger_infra::db;
use stockledger_infra::repository::{InMemoryStore, PostgresCredentialStore, PostgresItemRepository, UserSeeder};
use stockledger_infra::seed::seed_users;
use stockledger_infra::InventoryService;

/// Shared, read-only request state.
#[derive(Clone)]
pub struct AppState {
    pub tokens: Arc<TokenService>,
    pub inventory: InventoryService,
}

impl AppState {
    pub fn new(tokens: Arc<TokenService>, inventory: InventoryService) -> Self {
        Self { tokens, inventory }
    }

    /// Everything backed by one [`InMemoryStore`] (dev/test).
    ///
    /// `hash_cost` must match the cost the store's users were seeded with.
    pub fn in_memory(jwt_secret: &str, hash_cost: u32, store: Arc<InMemoryStore>) -> Self {
        let tokens = TokenService::new(jwt_secret.as_bytes(), store.clone()).with_hash_cost(hash_cost);
        let tokens = Arc::new(tokens);
        let inventory = InventoryService::new(store.clone(), store);
        Self::new(tokens, inventory)
    }
}

/// Build state for the configured backend, running migrations and seeding users.
pub async fn build_state(config: &AppConfig) -> anyhow::Result<AppState> {
    match config.storage {
        StorageBackend::Memory => {
            tracing::warn!("using in-memory storage; data is lost on shutdown");
            let store = InMemoryStore::arc();
            seed(store.as_ref(), config).await?;
            Ok(AppState::in_memory(&config.jwt_secret, config.password_hash_cost, store))
        }
        StorageBackend::Postgres => {
            let pool = db::connect(&config.database)
                .await
                .context("failed to connect to postgres")?;
            db::run_migrations(&pool).await.context("failed to run migrations")?;

            let users = Arc::new(PostgresCredentialStore::new(pool.clone()));
            seed(users.as_ref(), config).await?;

            let credentials: Arc<dyn CredentialStore> = users;
            let items = Arc::new(PostgresItemRepository::new(pool));
            let tokens = Arc::new(
                TokenService::new(config.jwt_secret.as_bytes(), credentials)
                    .with_hash_cost(config.password_hash_cost),
            );
            Ok(AppState::new(tokens, InventoryService::new(items.clone(), items)))
        }
    }
}

async fn seed(seeder: &dyn UserSeeder, config: &AppConfig) -> anyhow::Result<()> {
    seed_users(seeder, &config.seed_users, config.password_hash_cost)
        .await
        .context("failed to seed users")
}
