//! Row materialization: applying a compiled plan to one resource.
//!
//! The materializer walks the branch tree depth-first, carrying the current
//! scope element (the whole resource at top level, the iteration element
//! inside a `forEach`) and expanding an accumulator of partial rows. A
//! `forEach` over N accumulator rows and M iteration elements yields N x M
//! rows; `forEachOrNull` substitutes a single null element when the scope
//! is empty; `unionAll` concatenates its alternatives' outputs.

use serde_json::Value;
use std::sync::Arc;

use crate::binding::PathBinding;
use crate::plan::{Branch, BranchKind, Column, Plan};

/// One output row: values aligned with the plan's declared column order.
/// `None` is a SQL null.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub values: Vec<Option<Value>>,
}

impl Row {
    fn empty(width: usize) -> Self {
        Self {
            values: vec![None; width],
        }
    }

    fn is_all_null(&self) -> bool {
        self.values.iter().all(Option::is_none)
    }
}

/// Outcome of applying a plan to one resource.
#[derive(Debug, Clone)]
pub struct Materialized {
    /// False when the resource failed the type gate or a where clause.
    pub admitted: bool,
    pub rows: Vec<Row>,
}

impl Materialized {
    fn rejected() -> Self {
        Self {
            admitted: false,
            rows: Vec::new(),
        }
    }
}

/// Applies one compiled plan to resources, producing flat rows.
///
/// The plan is shared behind an `Arc`, so one materializer can be cloned
/// into any number of concurrent tasks.
#[derive(Debug, Clone)]
pub struct Materializer {
    plan: Arc<Plan>,
    binding: PathBinding,
}

impl Materializer {
    pub fn new(plan: impl Into<Arc<Plan>>) -> Self {
        let plan = plan.into();
        let binding = PathBinding::new(plan.constants());
        Self { plan, binding }
    }

    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    /// Apply the plan to one resource. The result is complete or empty,
    /// never partial: an all-null candidate row is suppressed, and a
    /// rejected resource reports `admitted = false` with no rows.
    pub fn apply(&self, resource: &Value) -> Materialized {
        let resource_type = resource.get("resourceType").and_then(Value::as_str);
        if resource_type != Some(self.plan.resource()) {
            return Materialized::rejected();
        }

        for clause in self.plan.where_clauses() {
            if !self.binding.clause_admits(clause, resource) {
                return Materialized::rejected();
            }
        }

        let width = self.plan.columns().len();
        let mut combinations = vec![Row::empty(width)];
        for branch in self.plan.branches() {
            combinations = self.expand_branch(branch, resource, combinations);
        }

        combinations.retain(|row| !row.is_all_null());
        Materialized {
            admitted: true,
            rows: combinations,
        }
    }

    /// Convenience wrapper returning only the rows.
    pub fn materialize(&self, resource: &Value) -> Vec<Row> {
        self.apply(resource).rows
    }

    fn expand_branch(&self, branch: &Branch, scope: &Value, incoming: Vec<Row>) -> Vec<Row> {
        match branch.kind {
            BranchKind::Leaf => self.expand_scope(branch, scope, incoming),
            BranchKind::Union => {
                let mut merged = Vec::new();
                for alternative in &branch.children {
                    merged.extend(self.expand_branch(alternative, scope, incoming.clone()));
                }
                merged
            }
            BranchKind::ForEach | BranchKind::ForEachOrNull => {
                // The compiler guarantees an iteration expression here.
                let Some(iter_expr) = branch.iter_expr.as_ref() else {
                    return incoming;
                };
                let mut items = self.binding.evaluate(iter_expr, scope);
                if items.is_empty() {
                    if branch.kind == BranchKind::ForEach {
                        return Vec::new();
                    }
                    // Outer join: one null element keeps the parent row
                    // alive with this branch's columns null.
                    items.push(Value::Null);
                }

                let mut expanded = Vec::new();
                for item in &items {
                    expanded.extend(self.expand_scope(branch, item, incoming.clone()));
                }
                expanded
            }
        }
    }

    /// Evaluate a branch's own columns against `scope`, then run its
    /// children in the same scope, in declaration order.
    fn expand_scope(&self, branch: &Branch, scope: &Value, incoming: Vec<Row>) -> Vec<Row> {
        let mut rows = incoming;
        if !branch.columns.is_empty() {
            for row in &mut rows {
                for column in &branch.columns {
                    if let Some(index) = self.column_index(&column.name) {
                        row.values[index] = self.column_value(column, scope);
                    }
                }
            }
        }
        for child in &branch.children {
            rows = self.expand_branch(child, scope, rows);
        }
        rows
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.plan.columns().iter().position(|c| c.name == name)
    }

    fn column_value(&self, column: &Column, scope: &Value) -> Option<Value> {
        let mut values = self.binding.evaluate(&column.expr, scope);
        values.retain(|v| !v.is_null());

        if column.collection {
            return Some(Value::Array(values));
        }
        match values.len() {
            0 => None,
            1 => values.pop(),
            // A multi-valued result in a scalar column keeps every element;
            // the store layer serializes it as JSON text.
            _ => Some(Value::Array(values)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use crate::model::ViewDefinition;
    use serde_json::json;

    fn plan_for(view: serde_json::Value) -> Plan {
        compile(&ViewDefinition::from_json(view).unwrap()).unwrap()
    }

    #[test]
    fn test_type_gate_rejects_other_resources() {
        let plan = plan_for(json!({
            "name": "v", "status": "active", "resource": "Patient",
            "select": [{"column": [{"path": "id", "name": "id"}]}]
        }));
        let materializer = Materializer::new(plan.clone());
        let out = materializer.apply(&json!({"resourceType": "Observation", "id": "1"}));
        assert!(!out.admitted);
        assert!(out.rows.is_empty());
    }

    #[test]
    fn test_where_clause_requires_boolean_true_head() {
        let plan = plan_for(json!({
            "name": "v", "status": "active", "resource": "Patient",
            "where": [{"path": "active = true"}],
            "select": [{"column": [{"path": "id", "name": "id"}]}]
        }));
        let materializer = Materializer::new(plan.clone());

        let active = json!({"resourceType": "Patient", "id": "1", "active": true});
        assert!(materializer.apply(&active).admitted);

        let inactive = json!({"resourceType": "Patient", "id": "2", "active": false});
        assert!(!materializer.apply(&inactive).admitted);

        // Missing field: the clause evaluates to empty, which excludes.
        let unknown = json!({"resourceType": "Patient", "id": "3"});
        assert!(!materializer.apply(&unknown).admitted);
    }

    #[test]
    fn test_scalar_for_each_scope_treated_as_one_element() {
        let plan = plan_for(json!({
            "name": "v", "status": "active", "resource": "Patient",
            "select": [{
                "forEach": "maritalStatus",
                "column": [{"path": "text", "name": "status_text"}]
            }]
        }));
        let materializer = Materializer::new(plan.clone());
        let patient = json!({
            "resourceType": "Patient",
            "maritalStatus": {"text": "Married"}
        });
        let rows = materializer.materialize(&patient);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].values[0], Some(json!("Married")));
    }

    #[test]
    fn test_all_null_rows_suppressed() {
        let plan = plan_for(json!({
            "name": "v", "status": "active", "resource": "Patient",
            "select": [{"column": [
                {"path": "gender", "name": "gender"},
                {"path": "birthDate", "name": "birth_date"}
            ]}]
        }));
        let materializer = Materializer::new(plan.clone());
        let rows = materializer.materialize(&json!({"resourceType": "Patient", "id": "1"}));
        assert!(rows.is_empty());
    }

    #[test]
    fn test_rows_keep_declared_column_width() {
        let plan = plan_for(json!({
            "name": "v", "status": "active", "resource": "Patient",
            "select": [
                {"column": [{"path": "id", "name": "id"}]},
                {"forEachOrNull": "address", "column": [{"path": "city", "name": "city"}]}
            ]
        }));
        let materializer = Materializer::new(plan.clone());
        let rows = materializer.materialize(&json!({"resourceType": "Patient", "id": "1"}));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].values.len(), plan.columns().len());
        assert_eq!(rows[0].values, vec![Some(json!("1")), None]);
    }
}
