//! Error types for parsing and evaluating FHIRPath expressions.

use thiserror::Error;

/// Errors raised while parsing or evaluating a FHIRPath expression.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FhirPathError {
    /// The expression text could not be tokenized or parsed.
    #[error("Parse error at position {position}: {message}")]
    ParseError { position: usize, message: String },

    /// A referenced external constant (`%name`) is not defined.
    #[error("Undefined constant: %{0}")]
    UndefinedConstant(String),

    /// A function was called that the engine does not know.
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    /// A function was called with the wrong number of arguments.
    #[error("Function '{function}' expects {expected} arguments, got {actual}")]
    InvalidArity {
        function: String,
        expected: String,
        actual: usize,
    },

    /// An operator or function received operands it cannot work with.
    #[error("Type error: {0}")]
    TypeError(String),

    /// A singleton was required but the collection had several items.
    #[error("Expected a single value, found a collection of {0} items")]
    SingletonRequired(usize),

    /// Division by zero in `/`, `div` or `mod`.
    #[error("Division by zero")]
    DivisionByZero,
}

pub type Result<T> = std::result::Result<T, FhirPathError>;
