//! Error type for the import pipeline.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    View(#[from] mallard_views::ViewError),

    #[error(transparent)]
    Store(#[from] mallard_store::StoreError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Processing error: {0}")]
    Processing(String),
}
