//! Evaluation context: external constants visible to an expression.

use serde_json::Value;
use std::collections::HashMap;

/// Holds the external constants (`%name`) available during evaluation.
///
/// The context is built once per compiled view and shared across every
/// resource in a stream; it carries no per-resource state.
#[derive(Debug, Clone, Default)]
pub struct EvaluationContext {
    constants: HashMap<String, Value>,
}

impl EvaluationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an external constant under `name`.
    pub fn set_constant(&mut self, name: impl Into<String>, value: Value) {
        self.constants.insert(name.into(), value);
    }

    pub fn constant(&self, name: &str) -> Option<&Value> {
        self.constants.get(name)
    }
}
