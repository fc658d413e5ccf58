//! Adapter between compiled plans and the FHIRPath engine.
//!
//! Evaluation through the binding never fails: engine errors degrade to an
//! empty collection and surface as a structured log event, so a bad
//! expression can null out a column without losing the row or the stream.

use mallard_fhir_path::{EvaluationContext, Expression};
use serde_json::Value;
use tracing::warn;

use crate::plan::Constant;

/// Per-plan evaluation state: the engine context with every declared
/// constant registered as `%name`.
#[derive(Debug, Clone, Default)]
pub struct PathBinding {
    ctx: EvaluationContext,
}

impl PathBinding {
    pub fn new(constants: &[Constant]) -> Self {
        let mut ctx = EvaluationContext::new();
        for constant in constants {
            ctx.set_constant(constant.name.clone(), constant.value.clone());
        }
        Self { ctx }
    }

    /// Evaluate `expr` with `scope` as the focus; errors become the empty
    /// collection.
    pub fn evaluate(&self, expr: &Expression, scope: &Value) -> Vec<Value> {
        match expr.evaluate(scope, &self.ctx) {
            Ok(values) => values,
            Err(error) => {
                warn!(
                    expression = expr.source(),
                    error = %error,
                    "FHIRPath evaluation failed, treating as empty"
                );
                Vec::new()
            }
        }
    }

    /// A where clause admits the resource only when it evaluates to a
    /// non-empty collection whose first element is boolean `true`.
    pub fn clause_admits(&self, clause: &Expression, resource: &Value) -> bool {
        matches!(
            self.evaluate(clause, resource).first(),
            Some(Value::Bool(true))
        )
    }
}
