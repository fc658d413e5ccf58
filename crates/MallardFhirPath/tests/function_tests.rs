//! Tests for the function invocation table, in particular the view-layer
//! key helpers.

use mallard_fhir_path::{EvaluationContext, Expression};
use serde_json::{Value, json};

fn eval(expr: &str, resource: Value) -> Vec<Value> {
    Expression::parse(expr)
        .unwrap()
        .evaluate(&resource, &EvaluationContext::new())
        .unwrap()
}

#[test]
fn test_first_and_last() {
    let patient = json!({"name": [{"family": "a"}, {"family": "b"}]});
    assert_eq!(eval("name.family.first()", patient.clone()), vec![json!("a")]);
    assert_eq!(eval("name.family.last()", patient), vec![json!("b")]);
}

#[test]
fn test_count_and_empty() {
    let patient = json!({"name": [{"family": "a"}, {"family": "b"}]});
    assert_eq!(eval("name.count()", patient.clone()), vec![json!(2)]);
    assert_eq!(eval("name.empty()", patient.clone()), vec![json!(false)]);
    assert_eq!(eval("address.empty()", patient), vec![json!(true)]);
}

#[test]
fn test_exists_with_criteria() {
    let patient = json!({
        "telecom": [
            {"system": "phone", "value": "555"},
            {"system": "email", "value": "a@b.c"}
        ]
    });
    assert_eq!(
        eval("telecom.exists(system = 'email')", patient.clone()),
        vec![json!(true)]
    );
    assert_eq!(
        eval("telecom.exists(system = 'fax')", patient),
        vec![json!(false)]
    );
}

#[test]
fn test_where_filters_items() {
    let patient = json!({
        "name": [
            {"use": "official", "family": "Lovelace"},
            {"use": "maiden", "family": "Byron"}
        ]
    });
    assert_eq!(
        eval("name.where(use = 'official').family", patient),
        vec![json!("Lovelace")]
    );
}

#[test]
fn test_select_projects_items() {
    let patient = json!({
        "name": [{"given": ["Ada", "Augusta"]}, {"given": ["Countess"]}]
    });
    assert_eq!(
        eval("name.select(given.first())", patient),
        vec![json!("Ada"), json!("Countess")]
    );
}

#[test]
fn test_join_with_separator() {
    let address = json!({"line": ["123 Main St", "Apt 4"]});
    assert_eq!(
        eval("line.join('\\n')", address),
        vec![json!("123 Main St\nApt 4")]
    );
}

#[test]
fn test_join_empty_collection() {
    let address = json!({});
    assert_eq!(eval("line.join(',')", address), vec![json!("")]);
}

#[test]
fn test_not() {
    let patient = json!({"active": false});
    assert_eq!(eval("active.not()", patient), vec![json!(true)]);
}

#[test]
fn test_to_string_on_number() {
    let obs = json!({"valueQuantity": {"value": 7}});
    assert_eq!(eval("valueQuantity.value.toString()", obs), vec![json!("7")]);
}

#[test]
fn test_extension_by_url() {
    let patient = json!({
        "extension": [
            {"url": "http://example.org/a", "valueString": "one"},
            {"url": "http://example.org/b", "valueString": "two"}
        ]
    });
    assert_eq!(
        eval("extension('http://example.org/b').valueString", patient),
        vec![json!("two")]
    );
}

#[test]
fn test_get_resource_key() {
    let patient = json!({"resourceType": "Patient", "id": "pt-7"});
    assert_eq!(eval("getResourceKey()", patient), vec![json!("pt-7")]);
}

#[test]
fn test_get_resource_key_missing_id() {
    let patient = json!({"resourceType": "Patient"});
    assert!(eval("getResourceKey()", patient).is_empty());
}

#[test]
fn test_get_reference_key_relative() {
    let obs = json!({"subject": {"reference": "Patient/2"}});
    assert_eq!(eval("subject.getReferenceKey()", obs), vec![json!("2")]);
}

#[test]
fn test_get_reference_key_with_matching_type() {
    let obs = json!({"subject": {"reference": "Patient/2"}});
    assert_eq!(
        eval("subject.getReferenceKey('Patient')", obs.clone()),
        vec![json!("2")]
    );
    // Bare type specifiers work too.
    assert_eq!(
        eval("subject.getReferenceKey(Patient)", obs),
        vec![json!("2")]
    );
}

#[test]
fn test_get_reference_key_type_mismatch() {
    let obs = json!({"subject": {"reference": "Group/9"}});
    assert!(eval("subject.getReferenceKey('Patient')", obs).is_empty());
}

#[test]
fn test_get_reference_key_absolute_url() {
    let obs = json!({"subject": {"reference": "https://fhir.example.org/r4/Patient/abc"}});
    assert_eq!(
        eval("subject.getReferenceKey('Patient')", obs),
        vec![json!("abc")]
    );
}

#[test]
fn test_get_reference_key_versioned() {
    let obs = json!({"subject": {"reference": "Patient/2/_history/5"}});
    assert_eq!(eval("subject.getReferenceKey()", obs), vec![json!("2")]);
}

#[test]
fn test_get_reference_key_missing_reference() {
    let obs = json!({"subject": {}});
    assert!(eval("subject.getReferenceKey()", obs).is_empty());
    let obs = json!({"resourceType": "Observation"});
    assert!(eval("subject.getReferenceKey()", obs).is_empty());
}

#[test]
fn test_get_reference_key_malformed() {
    let obs = json!({"subject": {"reference": "urn:uuid:0000"}});
    assert!(eval("subject.getReferenceKey()", obs).is_empty());
}

#[test]
fn test_unknown_function_errors() {
    let expr = Expression::parse("resolve()").unwrap();
    assert!(expr.evaluate(&json!({}), &EvaluationContext::new()).is_err());
}
