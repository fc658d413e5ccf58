//! ViewDefinition validation and plan compilation.
//!
//! Recursive descent over the `select` tree. Each visited node receives a
//! `selectPath` built from its positional index path (root index first,
//! dot-separated); `unionAll` children get `<parent>.union.<index>`.

use mallard_fhir_path::Expression;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ViewError;
use crate::model::{ColumnDef, SelectNode, ViewDefinition};
use crate::plan::{Branch, BranchKind, Column, Constant, Plan};

static COLUMN_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new("^[A-Za-z][A-Za-z0-9_]*$").expect("valid regex"));

/// Compile a ViewDefinition into an immutable [`Plan`].
///
/// Fails with [`ViewError::InvalidViewDefinition`] (or
/// [`ViewError::InvalidColumnName`]) naming the offending field. The
/// compiler touches neither the filesystem nor the database.
pub fn compile(view: &ViewDefinition) -> Result<Plan, ViewError> {
    let name = require(&view.name, "name")?;
    require(&view.status, "status")?;
    let resource = require(&view.resource, "resource")?;

    let selects = view
        .select
        .as_ref()
        .ok_or_else(|| ViewError::InvalidViewDefinition("Missing required field: select".into()))?;
    if selects.is_empty() {
        return Err(ViewError::InvalidViewDefinition(
            "Field 'select' must be a non-empty sequence".into(),
        ));
    }

    let constants = compile_constants(view)?;

    let mut where_clauses = Vec::with_capacity(view.where_clauses.len());
    for clause in &view.where_clauses {
        let path = clause.path.as_deref().ok_or_else(|| {
            ViewError::InvalidViewDefinition("Where clause is missing required field: path".into())
        })?;
        where_clauses.push(parse_expression(path)?);
    }

    let mut columns = Vec::new();
    let mut branches = Vec::with_capacity(selects.len());
    for (index, select) in selects.iter().enumerate() {
        branches.push(compile_select(select, index.to_string(), &mut columns)?);
    }

    Ok(Plan {
        view_name: name.to_string(),
        resource: resource.to_string(),
        columns,
        branches,
        where_clauses,
        constants,
    })
}

fn require<'a>(field: &'a Option<String>, name: &str) -> Result<&'a str, ViewError> {
    match field.as_deref() {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(ViewError::InvalidViewDefinition(format!(
            "Missing required field: {}",
            name
        ))),
    }
}

fn compile_constants(view: &ViewDefinition) -> Result<Vec<Constant>, ViewError> {
    let mut constants = Vec::with_capacity(view.constant.len());
    for def in &view.constant {
        let name = def.name.as_deref().ok_or_else(|| {
            ViewError::InvalidViewDefinition("Constant is missing required field: name".into())
        })?;
        let (value, r#type) = def.value_entry().ok_or_else(|| {
            ViewError::InvalidViewDefinition(format!(
                "Constant '{}' has no value[x] attribute",
                name
            ))
        })?;
        constants.push(Constant {
            name: name.to_string(),
            value: value.clone(),
            r#type,
        });
    }
    Ok(constants)
}

fn compile_select(
    node: &SelectNode,
    select_path: String,
    all_columns: &mut Vec<Column>,
) -> Result<Branch, ViewError> {
    let (kind, iter_expr) = match (&node.for_each, &node.for_each_or_null) {
        (Some(_), Some(_)) => {
            return Err(ViewError::InvalidViewDefinition(format!(
                "Select '{}' declares both forEach and forEachOrNull",
                select_path
            )));
        }
        (Some(path), None) => (BranchKind::ForEach, Some(parse_expression(path)?)),
        (None, Some(path)) => (BranchKind::ForEachOrNull, Some(parse_expression(path)?)),
        (None, None) => (BranchKind::Leaf, None),
    };

    let mut columns = Vec::with_capacity(node.column.len());
    for def in &node.column {
        let column = compile_column(def, &select_path)?;
        // First declaration wins; union alternatives re-declare shared names.
        if !all_columns.iter().any(|c| c.name == column.name) {
            all_columns.push(column.clone());
        }
        columns.push(column);
    }

    let mut children = Vec::new();
    for (index, child) in node.select.iter().enumerate() {
        children.push(compile_select(
            child,
            format!("{}.{}", select_path, index),
            all_columns,
        )?);
    }

    if !node.union_all.is_empty() {
        let mut alternatives = Vec::with_capacity(node.union_all.len());
        for (index, child) in node.union_all.iter().enumerate() {
            alternatives.push(compile_select(
                child,
                format!("{}.union.{}", select_path, index),
                all_columns,
            )?);
        }
        children.push(Branch {
            select_path: format!("{}.union", select_path),
            kind: BranchKind::Union,
            iter_expr: None,
            columns: Vec::new(),
            children: alternatives,
        });
    }

    Ok(Branch {
        select_path,
        kind,
        iter_expr,
        columns,
        children,
    })
}

fn compile_column(def: &ColumnDef, select_path: &str) -> Result<Column, ViewError> {
    let name = def.name.as_deref().ok_or_else(|| {
        ViewError::InvalidViewDefinition(format!(
            "Column in select '{}' is missing required field: name",
            select_path
        ))
    })?;
    if !COLUMN_NAME_RE.is_match(name) {
        return Err(ViewError::InvalidColumnName(name.to_string()));
    }
    let path = def.path.as_deref().ok_or_else(|| {
        ViewError::InvalidViewDefinition(format!(
            "Column '{}' is missing required field: path",
            name
        ))
    })?;

    Ok(Column {
        name: name.to_string(),
        path: path.to_string(),
        expr: parse_expression(path)?,
        r#type: def.r#type.clone().unwrap_or_else(|| "string".to_string()),
        collection: def.collection.unwrap_or(false),
        description: def.description.clone(),
        tags: def
            .tag
            .iter()
            .map(|t| (t.name.clone(), t.value.clone()))
            .collect(),
        select_path: select_path.to_string(),
    })
}

fn parse_expression(path: &str) -> Result<Expression, ViewError> {
    Expression::parse(path).map_err(|source| ViewError::InvalidExpression {
        expression: path.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn view(value: serde_json::Value) -> ViewDefinition {
        ViewDefinition::from_json(value).unwrap()
    }

    #[test]
    fn test_compile_minimal_view() {
        let plan = compile(&view(json!({
            "name": "PatientDemographics",
            "status": "active",
            "resource": "Patient",
            "select": [{
                "column": [
                    {"path": "id", "name": "patient_id"},
                    {"path": "gender", "name": "gender"}
                ]
            }]
        })))
        .unwrap();

        assert_eq!(plan.view_name(), "PatientDemographics");
        assert_eq!(plan.table_name(), "patientdemographics");
        assert_eq!(plan.resource(), "Patient");
        assert_eq!(plan.resource_key_column(), "patient_id");
        assert_eq!(plan.column_names(), vec!["patient_id", "gender"]);
        assert_eq!(plan.branches().len(), 1);
        assert_eq!(plan.branches()[0].select_path, "0");
        assert_eq!(plan.branches()[0].kind, BranchKind::Leaf);
    }

    #[test]
    fn test_missing_required_fields() {
        for field in ["name", "status", "resource"] {
            let mut body = json!({
                "name": "v",
                "status": "active",
                "resource": "Patient",
                "select": [{"column": [{"path": "id", "name": "id"}]}]
            });
            body.as_object_mut().unwrap().remove(field);
            let err = compile(&view(body)).unwrap_err();
            assert!(
                err.to_string().contains(field),
                "error for '{}' was: {}",
                field,
                err
            );
        }
    }

    #[test]
    fn test_empty_select_rejected() {
        let err = compile(&view(json!({
            "name": "v", "status": "active", "resource": "Patient", "select": []
        })))
        .unwrap_err();
        assert!(err.to_string().contains("select"));
    }

    #[test]
    fn test_invalid_column_name_rejected() {
        let err = compile(&view(json!({
            "name": "v", "status": "active", "resource": "Patient",
            "select": [{"column": [{"path": "id", "name": "1bad"}]}]
        })))
        .unwrap_err();
        assert!(matches!(err, ViewError::InvalidColumnName(name) if name == "1bad"));
    }

    #[test]
    fn test_select_paths_for_nested_and_union() {
        let plan = compile(&view(json!({
            "name": "v", "status": "active", "resource": "Patient",
            "select": [
                {"column": [{"path": "id", "name": "id"}]},
                {
                    "forEach": "address",
                    "column": [{"path": "city", "name": "city"}],
                    "select": [{"column": [{"path": "state", "name": "state"}]}],
                    "unionAll": [
                        {"column": [{"path": "line.first()", "name": "line"}]},
                        {"column": [{"path": "text", "name": "line"}]}
                    ]
                }
            ]
        })))
        .unwrap();

        let second = &plan.branches()[1];
        assert_eq!(second.select_path, "1");
        assert_eq!(second.kind, BranchKind::ForEach);
        assert!(second.iter_expr.is_some());
        assert_eq!(second.children[0].select_path, "1.0");
        let union = &second.children[1];
        assert_eq!(union.kind, BranchKind::Union);
        assert_eq!(union.select_path, "1.union");
        assert_eq!(union.children[0].select_path, "1.union.0");
        assert_eq!(union.children[1].select_path, "1.union.1");
        // The shared union column is declared once.
        assert_eq!(plan.column_names(), vec!["id", "city", "state", "line"]);
    }

    #[test]
    fn test_column_defaults() {
        let plan = compile(&view(json!({
            "name": "v", "status": "active", "resource": "Patient",
            "select": [{"column": [{"path": "gender", "name": "gender"}]}]
        })))
        .unwrap();
        let column = &plan.columns()[0];
        assert_eq!(column.r#type, "string");
        assert!(!column.collection);
    }

    #[test]
    fn test_constants_extracted_with_type_suffix() {
        let plan = compile(&view(json!({
            "name": "v", "status": "active", "resource": "Patient",
            "constant": [
                {"name": "src", "valueString": "import"},
                {"name": "minAge", "valueInteger": 18}
            ],
            "select": [{"column": [{"path": "id", "name": "id"}]}]
        })))
        .unwrap();

        assert_eq!(plan.constants().len(), 2);
        assert_eq!(plan.constants()[0].name, "src");
        assert_eq!(plan.constants()[0].value, json!("import"));
        assert_eq!(plan.constants()[0].r#type, "string");
        assert_eq!(plan.constants()[1].r#type, "integer");
    }

    #[test]
    fn test_constant_without_value_rejected() {
        let err = compile(&view(json!({
            "name": "v", "status": "active", "resource": "Patient",
            "constant": [{"name": "src"}],
            "select": [{"column": [{"path": "id", "name": "id"}]}]
        })))
        .unwrap_err();
        assert!(err.to_string().contains("src"));
    }

    #[test]
    fn test_for_each_and_for_each_or_null_conflict() {
        let err = compile(&view(json!({
            "name": "v", "status": "active", "resource": "Patient",
            "select": [{
                "forEach": "address",
                "forEachOrNull": "address",
                "column": [{"path": "city", "name": "city"}]
            }]
        })))
        .unwrap_err();
        assert!(err.to_string().contains("forEach"));
    }

    #[test]
    fn test_bad_fhirpath_rejected_at_compile_time() {
        let err = compile(&view(json!({
            "name": "v", "status": "active", "resource": "Patient",
            "select": [{"column": [{"path": "name..family", "name": "family"}]}]
        })))
        .unwrap_err();
        assert!(matches!(err, ViewError::InvalidExpression { .. }));
    }

    #[test]
    fn test_ansi_type_tag_surfaced() {
        let plan = compile(&view(json!({
            "name": "v", "status": "active", "resource": "Patient",
            "select": [{"column": [{
                "path": "id", "name": "id",
                "tag": [{"name": "ansi/type", "value": "TEXT"}]
            }]}]
        })))
        .unwrap();
        assert_eq!(plan.columns()[0].tag("ansi/type"), Some("TEXT"));
    }
}
