//! Logging bootstrap for the importer binary.
//!
//! Console logging always; an additional non-blocking daily-rolling file
//! layer when a logs folder is configured. `RUST_LOG` overrides the
//! configured level.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

/// Initialize the global subscriber. The returned guard must stay alive
/// for the process lifetime so buffered file output is flushed.
pub fn init_logging(config: &Config) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let level = if config.debug { "trace" } else { &config.log_level };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "mallard_importer={level},mallard_views={level},mallard_store={level},mallard_fhir_path={level}"
        ))
    });

    let console_layer = fmt::layer().with_target(true);
    let registry = tracing_subscriber::registry().with(filter).with(console_layer);

    match &config.logs_folder {
        Some(folder) => {
            if let Err(error) = std::fs::create_dir_all(folder) {
                // Fall back to console-only rather than refusing to start.
                registry.init();
                tracing::warn!(folder = %folder.display(), %error, "cannot create logs folder");
                return None;
            }
            let appender = tracing_appender::rolling::daily(folder, "mallard-importer.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            registry
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Some(guard)
        }
        None => {
            registry.init();
            None
        }
    }
}
