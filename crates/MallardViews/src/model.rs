//! Serde data model for ViewDefinition resources.
//!
//! Only the fields the compiler consumes are modeled; unknown fields are
//! ignored on deserialization.

use serde::Deserialize;
use serde_json::Value;

use crate::error::ViewError;

/// A declarative mapping from a FHIR resource type to a tabular projection.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewDefinition {
    pub name: Option<String>,
    pub status: Option<String>,
    pub resource: Option<String>,
    #[serde(default)]
    pub constant: Vec<ConstantDef>,
    #[serde(default, rename = "where")]
    pub where_clauses: Vec<WhereClause>,
    pub select: Option<Vec<SelectNode>>,
}

impl ViewDefinition {
    /// Parse a ViewDefinition from its JSON form.
    pub fn from_json(value: Value) -> Result<Self, ViewError> {
        Ok(serde_json::from_value(value)?)
    }
}

/// One node of the recursive `select` tree.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectNode {
    #[serde(default)]
    pub column: Vec<ColumnDef>,
    pub for_each: Option<String>,
    pub for_each_or_null: Option<String>,
    #[serde(default)]
    pub select: Vec<SelectNode>,
    #[serde(default)]
    pub union_all: Vec<SelectNode>,
}

/// A leaf output column.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDef {
    pub path: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub r#type: Option<String>,
    pub collection: Option<bool>,
    #[serde(default)]
    pub tag: Vec<ColumnTag>,
}

/// A named tag on a column, e.g. `ansi/type` storage overrides.
#[derive(Debug, Clone, Deserialize)]
pub struct ColumnTag {
    pub name: String,
    pub value: String,
}

/// A resource filter expression.
#[derive(Debug, Clone, Deserialize)]
pub struct WhereClause {
    pub path: Option<String>,
    pub description: Option<String>,
}

/// A declared constant. The value arrives under any `value[x]` attribute
/// (`valueString`, `valueInteger`, ...), captured through the flattened map.
#[derive(Debug, Clone, Deserialize)]
pub struct ConstantDef {
    pub name: Option<String>,
    #[serde(flatten)]
    pub rest: serde_json::Map<String, Value>,
}

impl ConstantDef {
    /// Find the `value[x]` attribute: returns `(value, lowercased type suffix)`.
    pub fn value_entry(&self) -> Option<(&Value, String)> {
        self.rest.iter().find_map(|(key, value)| {
            key.strip_prefix("value")
                .filter(|suffix| !suffix.is_empty() && !value.is_null())
                .map(|suffix| (value, suffix.to_lowercase()))
        })
    }
}
