//! Compiled plan types.
//!
//! A [`Plan`] is produced once per ViewDefinition, is immutable, and is
//! shared across every resource of a stream. The [`Branch`] tree is the
//! resolved form of the source `select` tree: one node per select, tagged
//! with its structural kind and dotted positional path.

use mallard_fhir_path::Expression;
use serde_json::Value;

/// Resolved, immutable execution plan for one ViewDefinition.
#[derive(Debug, Clone)]
pub struct Plan {
    pub(crate) view_name: String,
    pub(crate) resource: String,
    pub(crate) columns: Vec<Column>,
    pub(crate) branches: Vec<Branch>,
    pub(crate) where_clauses: Vec<Expression>,
    pub(crate) constants: Vec<Constant>,
}

impl Plan {
    /// The ViewDefinition's name as declared.
    pub fn view_name(&self) -> &str {
        &self.view_name
    }

    /// Destination table name: the lowercased view name.
    pub fn table_name(&self) -> String {
        self.view_name.to_lowercase()
    }

    /// The FHIR resource type this view projects.
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// The resource-key column name, `<resource-lowercased>_id`.
    pub fn resource_key_column(&self) -> String {
        format!("{}_id", self.resource.to_lowercase())
    }

    /// All output columns in declaration order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Output column names in declaration order.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Root branches, one per top-level select.
    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }

    pub fn where_clauses(&self) -> &[Expression] {
        &self.where_clauses
    }

    pub fn constants(&self) -> &[Constant] {
        &self.constants
    }
}

/// A resolved output column.
#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub path: String,
    pub expr: Expression,
    /// Semantic FHIR type, `"string"` unless declared.
    pub r#type: String,
    pub collection: bool,
    pub description: Option<String>,
    pub tags: Vec<(String, String)>,
    /// Dotted positional path of the owning select node.
    pub select_path: String,
}

impl Column {
    /// The value of a tag, e.g. the `ansi/type` storage override.
    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(tag, _)| tag == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Structural kind of a select node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchKind {
    /// Plain select: columns evaluated against the enclosing scope.
    Leaf,
    /// Inner-join iteration: no iteration elements, no rows.
    ForEach,
    /// Outer-join iteration: an empty scope still yields one null element.
    ForEachOrNull,
    /// Vertical merge of alternative child branches.
    Union,
}

/// One resolved select node.
#[derive(Debug, Clone)]
pub struct Branch {
    pub select_path: String,
    pub kind: BranchKind,
    /// Iteration scope expression; present exactly for `ForEach`/`ForEachOrNull`.
    pub iter_expr: Option<Expression>,
    pub columns: Vec<Column>,
    pub children: Vec<Branch>,
}

/// A declared constant, exposed to expressions as `%name`.
#[derive(Debug, Clone)]
pub struct Constant {
    pub name: String,
    pub value: Value,
    /// Lowercased `value[x]` suffix, e.g. `"string"`.
    pub r#type: String,
}
