//! Error type for view compilation and materialization.

use thiserror::Error;

/// Errors raised while validating, compiling or applying a ViewDefinition.
#[derive(Debug, Error)]
pub enum ViewError {
    /// ViewDefinition structure validation failed. The message names the
    /// offending field and, where applicable, the rejected value.
    #[error("Invalid ViewDefinition: {0}")]
    InvalidViewDefinition(String),

    /// A column name does not match `^[A-Za-z][A-Za-z0-9_]*$`.
    #[error("Invalid column name: '{0}'")]
    InvalidColumnName(String),

    /// A FHIRPath expression in the ViewDefinition failed to parse.
    #[error("Invalid FHIRPath expression '{expression}': {source}")]
    InvalidExpression {
        expression: String,
        #[source]
        source: mallard_fhir_path::FhirPathError,
    },

    /// The ViewDefinition JSON could not be deserialized.
    #[error("Invalid ViewDefinition: {0}")]
    Deserialization(#[from] serde_json::Error),
}
