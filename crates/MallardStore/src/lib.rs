//! # DuckDB persistence for materialized view rows
//!
//! Three pieces, constructed once at startup and handed to the pipeline
//! by explicit injection (there is no global state):
//!
//! - [`ConnectionPool`]: a fixed-size pool of connections to one embedded
//!   database; acquisition fails immediately rather than blocking
//! - [`TableManager`]: idempotent table creation with a sequence-backed
//!   surrogate `id` primary key and the semantic-to-storage type map
//! - [`UpsertEngine`]: transactional delete-by-resource-key + insert
//!   batches with `{inserted, deleted, updated, errors}` accounting

pub mod error;
pub mod pool;
pub mod sql;
pub mod table;
pub mod upsert;

pub use error::StoreError;
pub use pool::{ConnectionPool, PooledConnection};
pub use table::{TableManager, storage_type};
pub use upsert::{UpsertEngine, UpsertSummary};
