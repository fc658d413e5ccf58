//! Per-view import driver.
//!
//! Scans the view definitions folder, and for each view: compile, ensure
//! the destination table, stream the input, upsert in batches, log a run
//! summary. A view that fails to compile or locate its input is skipped;
//! the run continues with the remaining views.

use chrono::Utc;
use mallard_store::{ConnectionPool, TableManager, UpsertEngine, UpsertSummary};
use mallard_views::{Materializer, Plan, ViewDefinition, compile};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::ImportError;
use crate::processor::{StreamProcessor, StreamStats};
use crate::sink::BatchingSink;

/// Outcome of importing one view.
#[derive(Debug, Clone)]
pub struct ViewRunSummary {
    pub view_name: String,
    pub table_name: String,
    pub stats: StreamStats,
    pub upserts: UpsertSummary,
    pub elapsed_secs: f64,
}

/// Owns the process-wide state (pool, table manager, upsert engine) and
/// drives every configured view through the pipeline.
pub struct Runner {
    config: Config,
    pool: ConnectionPool,
    tables: TableManager,
    engine: UpsertEngine,
}

impl Runner {
    pub fn new(config: Config) -> Result<Self, ImportError> {
        if config.ndjson_file_path.is_none() && config.bulk_export_folder.is_none() {
            return Err(ImportError::Config(
                "either ndjsonFilePath or bulkExportFolder must be set".to_string(),
            ));
        }
        std::fs::create_dir_all(&config.duckdb_folder)?;
        let pool = ConnectionPool::open(config.database_path(), config.connection_pool_size)?;
        let tables = TableManager::new(pool.clone());
        let engine = UpsertEngine::new(pool.clone());
        Ok(Self {
            config,
            pool,
            tables,
            engine,
        })
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Import every view found in the view definitions folder.
    pub async fn run(&self) -> Result<Vec<ViewRunSummary>, ImportError> {
        let view_files = self.scan_view_definitions()?;
        if view_files.is_empty() {
            warn!(
                folder = %self.config.view_definitions_folder.display(),
                "no ViewDefinition files found"
            );
        }

        let mut summaries = Vec::new();
        for view_file in view_files {
            match self.run_view(&view_file).await {
                Ok(Some(summary)) => summaries.push(summary),
                Ok(None) => {}
                Err(error) => {
                    error!(
                        view_file = %view_file.display(),
                        %error,
                        "view import failed, continuing with next view"
                    );
                }
            }
        }
        Ok(summaries)
    }

    async fn run_view(&self, view_file: &Path) -> Result<Option<ViewRunSummary>, ImportError> {
        let plan = match self.load_plan(view_file) {
            Ok(plan) => Arc::new(plan),
            Err(error) => {
                // Fatal for this view only.
                error!(view_file = %view_file.display(), %error, "invalid ViewDefinition");
                return Ok(None);
            }
        };

        let input = match self.resolve_input(&plan) {
            Some(path) => path,
            None => {
                warn!(
                    view = plan.view_name(),
                    resource = plan.resource(),
                    "no input file for view, skipping"
                );
                return Ok(None);
            }
        };

        let table_name = plan.table_name();
        self.tables.ensure_table(&table_name, plan.columns())?;

        info!(
            view = plan.view_name(),
            table = %table_name,
            input = %input.display(),
            started_at = %Utc::now().to_rfc3339(),
            "view import started"
        );

        let started = std::time::Instant::now();
        let processor = StreamProcessor::new(
            Materializer::new(Arc::clone(&plan)),
            self.config.effective_concurrency(),
        );
        let mut sink = BatchingSink::new(
            self.engine.clone(),
            Arc::clone(&plan),
            self.config.batch_size,
        );
        let stats = processor.process(&input, &mut sink).await?;
        let upserts = sink.summary();
        let elapsed_secs = started.elapsed().as_secs_f64();

        info!(
            view = plan.view_name(),
            table = %table_name,
            total_records = stats.total_records,
            parsed_records = stats.parsed_records,
            invalid_records = stats.invalid_records,
            rows = stats.rows_emitted,
            inserted = upserts.inserted,
            deleted = upserts.deleted,
            updated = upserts.updated,
            errors = upserts.errors,
            elapsed_secs,
            "run summary"
        );

        Ok(Some(ViewRunSummary {
            view_name: plan.view_name().to_string(),
            table_name,
            stats,
            upserts,
            elapsed_secs,
        }))
    }

    fn load_plan(&self, view_file: &Path) -> Result<Plan, ImportError> {
        let text = std::fs::read_to_string(view_file)?;
        let json: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| ImportError::Processing(format!("invalid JSON: {}", e)))?;
        let view = ViewDefinition::from_json(json)?;
        Ok(compile(&view)?)
    }

    fn scan_view_definitions(&self) -> Result<Vec<PathBuf>, ImportError> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.config.view_definitions_folder)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Pick the NDJSON input for a view: the explicit file when set,
    /// otherwise `<ResourceType>.ndjson` in the bulk export folder.
    fn resolve_input(&self, plan: &Plan) -> Option<PathBuf> {
        if let Some(path) = &self.config.ndjson_file_path {
            return path.exists().then(|| path.clone());
        }
        let folder = self.config.bulk_export_folder.as_ref()?;
        let candidates = [
            folder.join(format!("{}.ndjson", plan.resource())),
            folder.join(format!("{}.ndjson", plan.resource().to_lowercase())),
        ];
        candidates.into_iter().find(|p| p.exists())
    }
}
