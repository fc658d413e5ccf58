//! Line-oriented NDJSON stream processing.
//!
//! Each non-blank line is a candidate resource: parsed, type-gated,
//! materialized under a bounded-concurrency limiter, and handed to the
//! sink in materialization-completion order. Rows from one resource stay
//! contiguous and ordered; ordering across resources is unspecified.

use mallard_views::Materializer;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::error::ImportError;
use crate::sink::RowSink;

const PROGRESS_INTERVAL: u64 = 1_000;

/// Counters for one processed stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    /// Non-blank lines seen.
    pub total_records: u64,
    /// Resources that matched the plan's type and passed the where clauses.
    pub parsed_records: u64,
    /// Lines that failed to parse, were not objects, or whose
    /// materialization died.
    pub invalid_records: u64,
    /// Rows handed to the sink.
    pub rows_emitted: u64,
}

/// Streams one NDJSON file through a materializer.
pub struct StreamProcessor {
    materializer: Arc<Materializer>,
    concurrency_limit: usize,
}

impl StreamProcessor {
    pub fn new(materializer: Materializer, concurrency_limit: usize) -> Self {
        Self {
            materializer: Arc::new(materializer),
            concurrency_limit: concurrency_limit.max(1),
        }
    }

    /// Read `path` line by line, dispatch matching resources to the
    /// materializer, and emit rows to `sink`.
    pub async fn process(
        &self,
        path: &Path,
        sink: &mut dyn RowSink,
    ) -> Result<StreamStats, ImportError> {
        let file = File::open(path).await?;
        let file_bytes = file.metadata().await?.len();
        let mut lines = BufReader::new(file).lines();

        let limiter = Arc::new(Semaphore::new(self.concurrency_limit));
        let mut in_flight: JoinSet<(bool, Vec<mallard_views::Row>)> = JoinSet::new();
        let mut stats = StreamStats::default();
        let started = Instant::now();
        let mut bytes_seen: u64 = 0;
        let resource_type = self.materializer.plan().resource().to_string();

        while let Some(line) = lines.next_line().await? {
            bytes_seen += line.len() as u64 + 1;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            stats.total_records += 1;

            match serde_json::from_str::<Value>(trimmed) {
                Ok(resource) if resource.is_object() => {
                    // Non-matching resource types are skipped silently.
                    let line_type = resource.get("resourceType").and_then(Value::as_str);
                    if line_type == Some(resource_type.as_str()) {
                        let permit = limiter
                            .clone()
                            .acquire_owned()
                            .await
                            .map_err(|e| ImportError::Processing(e.to_string()))?;
                        let materializer = Arc::clone(&self.materializer);
                        in_flight.spawn(async move {
                            let outcome = materializer.apply(&resource);
                            drop(permit);
                            (outcome.admitted, outcome.rows)
                        });
                    }
                }
                Ok(_) => {
                    stats.invalid_records += 1;
                    warn!(line = trimmed, "failed record: not a JSON object");
                }
                Err(error) => {
                    stats.invalid_records += 1;
                    warn!(line = trimmed, %error, "failed record: invalid JSON");
                }
            }

            // Drain whatever finished without stalling the reader.
            while let Some(done) = in_flight.try_join_next() {
                Self::collect(done, &mut stats, sink).await?;
            }

            if stats.total_records % PROGRESS_INTERVAL == 0 {
                let elapsed = started.elapsed().as_secs_f64().max(f64::EPSILON);
                let records_per_sec = stats.total_records as f64 / elapsed;
                let eta_secs = if bytes_seen > 0 {
                    elapsed * (file_bytes.saturating_sub(bytes_seen)) as f64 / bytes_seen as f64
                } else {
                    0.0
                };
                info!(
                    records = stats.total_records,
                    records_per_sec = records_per_sec.round(),
                    eta_secs = eta_secs.round(),
                    "progress"
                );
            }
        }

        while let Some(done) = in_flight.join_next().await {
            Self::collect(done, &mut stats, sink).await?;
        }
        sink.flush().await?;

        Ok(stats)
    }

    async fn collect(
        done: Result<(bool, Vec<mallard_views::Row>), tokio::task::JoinError>,
        stats: &mut StreamStats,
        sink: &mut dyn RowSink,
    ) -> Result<(), ImportError> {
        match done {
            Ok((admitted, rows)) => {
                if admitted {
                    stats.parsed_records += 1;
                }
                stats.rows_emitted += rows.len() as u64;
                if !rows.is_empty() {
                    sink.accept(rows).await?;
                }
            }
            Err(error) => {
                stats.invalid_records += 1;
                warn!(%error, "failed record: materialization died");
            }
        }
        Ok(())
    }
}
