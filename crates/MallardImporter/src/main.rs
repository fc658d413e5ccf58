use clap::Parser;
use mallard_importer::{Config, Runner, logging};

#[tokio::main]
async fn main() {
    let config = Config::parse();
    let _log_guard = logging::init_logging(&config);

    let runner = match Runner::new(config) {
        Ok(runner) => runner,
        Err(error) => {
            eprintln!("mallard-importer: {}", error);
            std::process::exit(1);
        }
    };

    match runner.run().await {
        Ok(summaries) => {
            for summary in &summaries {
                println!(
                    "{}: {} rows into '{}' ({} inserted, {} updated, {} errors) in {:.2}s",
                    summary.view_name,
                    summary.stats.rows_emitted,
                    summary.table_name,
                    summary.upserts.inserted,
                    summary.upserts.updated,
                    summary.upserts.errors,
                    summary.elapsed_secs
                );
            }
        }
        Err(error) => {
            eprintln!("mallard-importer: {}", error);
            std::process::exit(1);
        }
    }
}
