//! # NDJSON import pipeline
//!
//! Drives FHIR resources from newline-delimited JSON files through
//! compiled view definitions into DuckDB tables:
//!
//! - [`processor`]: line-oriented stream processing with failure
//!   isolation, counters and progress events, under a bounded-concurrency
//!   limiter
//! - [`sink`]: the [`sink::RowSink`] seam with a batching database sink
//!   and an in-memory collecting sink
//! - [`runner`]: the per-view driver tying compiler, table manager,
//!   stream processor and upsert engine together
//! - [`config`] / [`logging`]: flag/env configuration and tracing setup

pub mod config;
pub mod error;
pub mod logging;
pub mod processor;
pub mod runner;
pub mod sink;

pub use config::Config;
pub use error::ImportError;
pub use processor::{StreamProcessor, StreamStats};
pub use runner::{Runner, ViewRunSummary};
pub use sink::{BatchingSink, CollectingSink, RowSink};
