//! Error type for the persistence layer.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The pool had no free connection. Acquisition never blocks; callers
    /// are expected to size the concurrency limit within the pool size.
    #[error("No database connection available (pool of {0} exhausted)")]
    NoConnectionAvailable(usize),

    /// An error surfaced by the embedded database.
    #[error("Database error: {0}")]
    Database(#[from] duckdb::Error),
}
