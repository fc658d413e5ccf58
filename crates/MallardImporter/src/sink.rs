//! Row sinks: where the stream processor sends materialized rows.

use async_trait::async_trait;
use mallard_store::{UpsertEngine, UpsertSummary};
use mallard_views::{Plan, Row};
use std::sync::Arc;
use tracing::{error, info};

use crate::error::ImportError;

/// Consumer of materialized rows.
#[async_trait]
pub trait RowSink: Send {
    /// Accept the rows produced from one resource.
    async fn accept(&mut self, rows: Vec<Row>) -> Result<(), ImportError>;

    /// Write out anything still buffered.
    async fn flush(&mut self) -> Result<(), ImportError>;
}

/// Buffers rows and upserts them in chunks of `batch_size`.
///
/// A failed chunk is accounted (`errors` grows by the chunk size, the
/// transaction was rolled back by the engine) and the stream continues
/// with the next chunk; the pipeline never retries.
pub struct BatchingSink {
    engine: UpsertEngine,
    plan: Arc<Plan>,
    columns: Vec<String>,
    batch_size: usize,
    buffer: Vec<Row>,
    summary: UpsertSummary,
}

impl BatchingSink {
    pub fn new(engine: UpsertEngine, plan: Arc<Plan>, batch_size: usize) -> Self {
        let columns = plan.column_names();
        Self {
            engine,
            plan,
            columns,
            batch_size: batch_size.max(1),
            buffer: Vec::new(),
            summary: UpsertSummary::default(),
        }
    }

    /// Counters accumulated across every flushed chunk.
    pub fn summary(&self) -> UpsertSummary {
        self.summary
    }

    fn write_chunk(&mut self, chunk: Vec<Row>) {
        let table = self.plan.table_name();
        let chunk_len = chunk.len();
        match self.engine.upsert(
            &table,
            &self.columns,
            &chunk,
            &self.plan.resource_key_column(),
        ) {
            Ok(outcome) => {
                self.summary.merge(&outcome);
                info!(
                    table = %table,
                    rows = chunk_len,
                    inserted = outcome.inserted,
                    updated = outcome.updated,
                    "batch completed"
                );
            }
            Err(error) => {
                // The whole chunk rolled back; skip it and move on.
                self.summary.errors += chunk_len;
                error!(table = %table, rows = chunk_len, %error, "batch failed");
            }
        }
    }
}

#[async_trait]
impl RowSink for BatchingSink {
    async fn accept(&mut self, rows: Vec<Row>) -> Result<(), ImportError> {
        self.buffer.extend(rows);
        while self.buffer.len() >= self.batch_size {
            let rest = self.buffer.split_off(self.batch_size);
            let chunk = std::mem::replace(&mut self.buffer, rest);
            self.write_chunk(chunk);
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ImportError> {
        if !self.buffer.is_empty() {
            let chunk = std::mem::take(&mut self.buffer);
            self.write_chunk(chunk);
        }
        Ok(())
    }
}

/// Collects every row in memory; used by tests and dry runs.
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub rows: Vec<Row>,
}

#[async_trait]
impl RowSink for CollectingSink {
    async fn accept(&mut self, rows: Vec<Row>) -> Result<(), ImportError> {
        self.rows.extend(rows);
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ImportError> {
        Ok(())
    }
}
