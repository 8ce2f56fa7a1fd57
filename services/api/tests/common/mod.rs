//! Shared fixtures for the api integration tests.

use api_lib::adapters::{auth::SqliteAuthAdapter, db::SqliteStore};
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use uuid::Uuid;

/// Opens a fresh in-memory store. One pooled connection keeps every test
/// hermetic (each `sqlite::memory:` connection is its own database).
pub async fn open_store() -> (Arc<SqliteStore>, SqliteAuthAdapter) {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("failed to open in-memory sqlite");
    let store = Arc::new(SqliteStore::new(pool.clone()));
    store.init_schema().await.expect("failed to create schema");
    (store, SqliteAuthAdapter::new(pool))
}

pub async fn seed_user(auth: &SqliteAuthAdapter, display_name: &str) -> Uuid {
    let id = Uuid::new_v4();
    auth.ensure_user(id, display_name)
        .await
        .expect("failed to seed user");
    id
}
