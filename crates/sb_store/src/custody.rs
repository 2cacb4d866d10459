//! SQLite-backed custody store.
//!
//! WAL journal mode and foreign keys are configured at connection time,
//! not inside a migration — SQLite forbids changing `journal_mode` inside
//! a transaction and sqlx wraps every migration in one.

use std::path::Path;

use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool};

use crate::error::StoreError;

/// Handle to the local key database. Cheap to clone (pool is Arc
/// internally); close once at teardown.
#[derive(Clone)]
pub struct CustodyStore {
    pool: SqlitePool,
}

impl CustodyStore {
    /// Open (or create) the custody database at `db_path` and run pending
    /// migrations. Every error path before the pool exists leaves nothing
    /// to release; after that the pool is owned by the returned handle.
    pub async fn open(db_path: &Path) -> Result<Self, StoreError> {
        let opts = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePool::connect_with(opts).await?;

        if let Err(e) = sqlx::migrate!("./migrations").run(&pool).await {
            // Do not leak the half-initialised pool.
            pool.close().await;
            return Err(StoreError::Migration(e.to_string()));
        }

        Ok(Self { pool })
    }

    /// Release the underlying pool. Idempotent.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Persist the exported private key for `user_id`. Overwrites any
    /// previous key for the same user (idempotent).
    pub async fn store_private_key(&self, user_id: &str, key_der: &[u8]) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO private_keys (user_id, key_der, created_at, updated_at) \
             VALUES (?, ?, ?, ?) \
             ON CONFLICT(user_id) DO UPDATE SET key_der = excluded.key_der, updated_at = excluded.updated_at",
        )
        .bind(user_id)
        .bind(key_der)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        tracing::debug!(target: "sb_store", event = "private_key_stored", user_id = %user_id);
        Ok(())
    }

    /// Load the private key for `user_id`. `Ok(None)` means no key was
    /// ever stored here — the caller cannot decrypt, but nothing is broken.
    pub async fn load_private_key(&self, user_id: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let row: Option<(Vec<u8>,)> =
            sqlx::query_as("SELECT key_der FROM private_keys WHERE user_id = ?")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        if row.is_none() {
            tracing::debug!(target: "sb_store", event = "private_key_absent", user_id = %user_id);
        }
        Ok(row.map(|(der,)| der))
    }
}
