//! # FHIRPath engine for JSON FHIR resources
//!
//! This crate implements the portion of the FHIRPath expression language
//! that tabular view definitions exercise, evaluated directly over
//! `serde_json::Value` resources in the R4 model. Every expression
//! evaluates to an ordered collection of JSON values.
//!
//! The engine also provides the two key helpers used by view columns:
//! `getResourceKey()` (the resource's own `id`) and
//! `getReferenceKey([Type])` (the target id of a Reference element),
//! plus external constants injected through [`EvaluationContext`].
//!
//! ## Usage
//!
//! ```rust
//! use mallard_fhir_path::{EvaluationContext, Expression};
//! use serde_json::json;
//!
//! let patient = json!({
//!     "resourceType": "Patient",
//!     "id": "pt-1",
//!     "name": [{"family": "Lovelace", "given": ["Ada"]}]
//! });
//!
//! let expr = Expression::parse("name.family").unwrap();
//! let result = expr.evaluate(&patient, &EvaluationContext::new()).unwrap();
//! assert_eq!(result, vec![json!("Lovelace")]);
//! ```

pub mod ast;
pub mod context;
pub mod error;
pub mod evaluator;
mod functions;
pub mod lexer;
pub mod parser;
pub mod token;

use serde_json::Value;

pub use context::EvaluationContext;
pub use error::FhirPathError;

/// A parsed, reusable FHIRPath expression.
///
/// Parsing happens once; evaluation can then run against any number of
/// resources. The expression is immutable and cheap to clone.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    ast: ast::AstNode,
}

impl Expression {
    /// Parse an expression string.
    pub fn parse(source: &str) -> Result<Self, FhirPathError> {
        let ast = parser::parse(source)?;
        Ok(Self {
            source: source.to_string(),
            ast,
        })
    }

    /// The original expression text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate against a single root value (typically a resource or an
    /// iteration element).
    pub fn evaluate(
        &self,
        root: &Value,
        ctx: &EvaluationContext,
    ) -> Result<Vec<Value>, FhirPathError> {
        evaluator::evaluate(&self.ast, std::slice::from_ref(root), ctx)
    }

    /// Evaluate against an input collection.
    pub fn evaluate_collection(
        &self,
        input: &[Value],
        ctx: &EvaluationContext,
    ) -> Result<Vec<Value>, FhirPathError> {
        evaluator::evaluate(&self.ast, input, ctx)
    }
}

impl std::fmt::Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

impl std::str::FromStr for Expression {
    type Err = FhirPathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
