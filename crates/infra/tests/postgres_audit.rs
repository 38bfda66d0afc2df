//! Audit trigger tests against a real Postgres.
//!
//! Skipped unless `STOCKLEDGER_TEST_DATABASE_URL` points at a disposable database.

use chrono::Utc;
use sqlx::PgPool;

use stockledger_auth::{CredentialStore, Role};
use stockledger_core::{ItemId, UserId};
use stockledger_infra::config::DatabaseConfig;
use stockledger_infra::db;
use stockledger_infra::repository::{
    HistoryReader, ItemRepository, PostgresCredentialStore, PostgresItemRepository, RepositoryError,
    UserSeeder,
};
use stockledger_inventory::{ItemDraft, Operation};

async fn test_pool() -> Option<PgPool> {
    let url = std::env::var("STOCKLEDGER_TEST_DATABASE_URL").ok()?;
    let cfg = DatabaseConfig {
        url,
        max_connections: 4,
        min_connections: 0,
        ping_timeout_seconds: 3,
    };
    let pool = db::connect(&cfg).await.expect("connect to test database");
    db::run_migrations(&pool).await.expect("run migrations");
    Some(pool)
}

async fn seed_actor(pool: &PgPool, role: Role) -> UserId {
    let username = format!("actor-{}", Utc::now().timestamp_nanos_opt().unwrap_or_default());
    PostgresCredentialStore::new(pool.clone())
        .ensure_user(&username, "$2b$04$unused", role)
        .await
        .expect("seed actor")
}

#[tokio::test]
async fn create_update_delete_each_write_one_attributed_row() {
    let Some(pool) = test_pool().await else {
        eprintln!("skipping: STOCKLEDGER_TEST_DATABASE_URL not set");
        return;
    };
    let actor = seed_actor(&pool, Role::Admin).await;
    let repo = PostgresItemRepository::new(pool);

    let id = repo.create(actor, &ItemDraft::new("Widget", "", 10)).await.unwrap();
    repo.update(actor, id, &ItemDraft::new("Widget", "", 15)).await.unwrap();
    repo.delete(actor, id).await.unwrap();

    let history = repo.get_by_item_id(id).await.unwrap();
    let ops: Vec<Operation> = history.iter().map(|h| h.operation).collect();
    assert_eq!(ops, vec![Operation::Insert, Operation::Update, Operation::Delete]);
    assert!(history.iter().all(|h| h.user_id == actor));

    assert_eq!(history[0].old_value, None);
    assert_eq!(history[0].new_snapshot().unwrap().unwrap().quantity, 10);
    assert_eq!(history[1].old_snapshot().unwrap().unwrap().quantity, 10);
    assert_eq!(history[1].new_snapshot().unwrap().unwrap().quantity, 15);
    assert_eq!(history[2].new_value, None);
    assert_eq!(history[2].old_snapshot().unwrap().unwrap().quantity, 15);
}

#[tokio::test]
async fn missing_item_is_not_found_without_history() {
    let Some(pool) = test_pool().await else {
        eprintln!("skipping: STOCKLEDGER_TEST_DATABASE_URL not set");
        return;
    };
    let actor = seed_actor(&pool, Role::Admin).await;
    let repo = PostgresItemRepository::new(pool);
    let missing = ItemId::new(i64::MAX);

    assert_eq!(
        repo.update(actor, missing, &ItemDraft::new("Widget", "", 1)).await,
        Err(RepositoryError::NotFound(missing))
    );
    assert_eq!(repo.delete(actor, missing).await, Err(RepositoryError::NotFound(missing)));
    assert!(repo.get_by_item_id(missing).await.unwrap().is_empty());
}

#[tokio::test]
async fn racing_deletes_log_exactly_once() {
    let Some(pool) = test_pool().await else {
        eprintln!("skipping: STOCKLEDGER_TEST_DATABASE_URL not set");
        return;
    };
    let actor = seed_actor(&pool, Role::Admin).await;
    let repo = PostgresItemRepository::new(pool);
    let id = repo.create(actor, &ItemDraft::new("Widget", "", 1)).await.unwrap();

    let (first, second) = tokio::join!(repo.delete(actor, id), repo.delete(actor, id));
    let results = [first, second];

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        results.iter().filter(|r| **r == Err(RepositoryError::NotFound(id))).count(),
        1
    );
    let history = repo.get_by_item_id(id).await.unwrap();
    let ops: Vec<Operation> = history.iter().map(|h| h.operation).collect();
    assert_eq!(ops, vec![Operation::Insert, Operation::Delete]);
}

#[tokio::test]
async fn mutation_without_bound_actor_is_rejected() {
    let Some(pool) = test_pool().await else {
        eprintln!("skipping: STOCKLEDGER_TEST_DATABASE_URL not set");
        return;
    };

    let result = sqlx::query("INSERT INTO items (name, description, quantity) VALUES ('Orphan', '', 1)")
        .execute(&pool)
        .await;
    assert!(result.is_err());

    let orphans: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items WHERE name = 'Orphan'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(orphans, 0);
}

#[tokio::test]
async fn actor_binding_does_not_outlive_its_transaction() {
    let Some(pool) = test_pool().await else {
        eprintln!("skipping: STOCKLEDGER_TEST_DATABASE_URL not set");
        return;
    };
    let actor = seed_actor(&pool, Role::Manager).await;
    let repo = PostgresItemRepository::new(pool.clone());
    repo.create(actor, &ItemDraft::new("Widget", "", 1)).await.unwrap();

    // Every pooled connection must come back without the setting.
    for _ in 0..4 {
        let setting: Option<String> =
            sqlx::query_scalar("SELECT NULLIF(current_setting('stockledger.user_id', true), '')")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(setting, None);
    }
}

#[tokio::test]
async fn credential_store_reads_seeded_user() {
    let Some(pool) = test_pool().await else {
        eprintln!("skipping: STOCKLEDGER_TEST_DATABASE_URL not set");
        return;
    };
    let store = PostgresCredentialStore::new(pool);
    let id = store.ensure_user("pg-viewer", "$2b$04$hash", Role::Viewer).await.unwrap();
    let again = store.ensure_user("pg-viewer", "$2b$04$other", Role::Admin).await.unwrap();
    assert_eq!(id, again);

    let user = store.find_by_username("pg-viewer").await.unwrap().unwrap();
    assert_eq!(user.id, id);
    assert_eq!(user.role, Role::Viewer);
    assert_eq!(store.find_by_username("pg-nobody").await.unwrap(), None);
}
