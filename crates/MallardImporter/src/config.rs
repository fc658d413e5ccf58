//! Importer configuration.
//!
//! Every option is a command-line flag with an environment-variable
//! fallback, so deployments can configure the importer entirely through
//! `MALLARD_*` variables.

use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "mallard-importer",
    about = "Streams FHIR NDJSON through ViewDefinitions into DuckDB tables",
    version
)]
pub struct Config {
    /// Enable verbose trace logging.
    #[arg(long, env = "MALLARD_DEBUG")]
    pub debug: bool,

    /// false runs the pipeline strictly serially; true enables the
    /// bounded-concurrency pipeline.
    #[arg(
        long,
        env = "MALLARD_ASYNC_PROCESSING",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub async_processing: bool,

    /// Directory scanned for ViewDefinition JSON files.
    #[arg(long, env = "MALLARD_VIEW_DEFINITIONS_FOLDER")]
    pub view_definitions_folder: PathBuf,

    /// Explicit NDJSON input file, used for every view.
    #[arg(long, env = "MALLARD_NDJSON_FILE_PATH")]
    pub ndjson_file_path: Option<PathBuf>,

    /// Bulk-export directory holding one `<ResourceType>.ndjson` per type;
    /// each view reads the file matching its resource.
    #[arg(long, env = "MALLARD_BULK_EXPORT_FOLDER")]
    pub bulk_export_folder: Option<PathBuf>,

    /// Directory holding the embedded database file.
    #[arg(long, env = "MALLARD_DUCKDB_FOLDER", default_value = ".")]
    pub duckdb_folder: PathBuf,

    /// Embedded database file name.
    #[arg(long, env = "MALLARD_DUCKDB_FILE_NAME", default_value = "mallard.duckdb")]
    pub duckdb_file_name: String,

    /// Fixed connection pool size, created at startup.
    #[arg(long, env = "MALLARD_CONNECTION_POOL_SIZE", default_value_t = 4)]
    pub connection_pool_size: usize,

    /// Maximum in-flight materializations / inserts.
    #[arg(long, env = "MALLARD_CONCURRENCY_LIMIT", default_value_t = 4)]
    pub concurrency_limit: usize,

    /// Rows per upsert chunk.
    #[arg(long, env = "MALLARD_BATCH_SIZE", default_value_t = 1000)]
    pub batch_size: usize,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "MALLARD_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Directory for rolling log files; console-only when unset.
    #[arg(long, env = "MALLARD_LOGS_FOLDER")]
    pub logs_folder: Option<PathBuf>,
}

impl Config {
    /// Path of the embedded database file.
    pub fn database_path(&self) -> PathBuf {
        self.duckdb_folder.join(&self.duckdb_file_name)
    }

    /// The limiter capacity actually used: 1 when the pipeline is serial,
    /// otherwise the configured limit clamped to the pool size so that
    /// acquisition can never outrun the pool.
    pub fn effective_concurrency(&self) -> usize {
        if !self.async_processing {
            1
        } else {
            self.concurrency_limit
                .clamp(1, self.connection_pool_size.max(1))
        }
    }
}
