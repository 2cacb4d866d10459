use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The storage backend could not be reached or the query failed.
    /// Callers degrade to "read-only as ciphertext" — they must never
    /// treat this as a missing key.
    #[error("Custody store unavailable: {0}")]
    Unavailable(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migration(String),
}
