//! Tree-walking evaluator over JSON FHIR resources.
//!
//! Every expression evaluates to an ordered collection of JSON values.
//! Member access flattens arrays the way FHIRPath path navigation does:
//! `Patient.name.given` yields one collection with every given name.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde_json::{Number, Value};
use std::str::FromStr;

use crate::ast::{AstNode, BinaryOperator};
use crate::context::EvaluationContext;
use crate::error::{FhirPathError, Result};
use crate::functions;

/// Evaluate `node` against the `input` collection.
pub fn evaluate(node: &AstNode, input: &[Value], ctx: &EvaluationContext) -> Result<Vec<Value>> {
    match node {
        AstNode::EmptyLiteral => Ok(Vec::new()),
        AstNode::BooleanLiteral(b) => Ok(vec![Value::Bool(*b)]),
        AstNode::IntegerLiteral(i) => Ok(vec![Value::Number(Number::from(*i))]),
        AstNode::DecimalLiteral(d) => Ok(vec![decimal_to_value(*d)]),
        AstNode::StringLiteral(s) | AstNode::DateTimeLiteral(s) => {
            Ok(vec![Value::String(s.clone())])
        }
        AstNode::This => Ok(input.to_vec()),
        AstNode::ExternalConstant(name) => match ctx.constant(name) {
            Some(value) => Ok(vec![value.clone()]),
            None => Err(FhirPathError::UndefinedConstant(name.clone())),
        },
        AstNode::Member(name) => {
            let mut out = Vec::new();
            for item in input {
                navigate(item, name, &mut out);
            }
            Ok(out)
        }
        AstNode::Function { name, args } => functions::call(name, args, input, ctx),
        AstNode::Invocation { target, invocation } => {
            let focus = evaluate(target, input, ctx)?;
            evaluate(invocation, &focus, ctx)
        }
        AstNode::Indexer { collection, index } => {
            let items = evaluate(collection, input, ctx)?;
            let idx = evaluate(index, input, ctx)?;
            let idx = match singleton(&idx)? {
                Some(Value::Number(n)) => n.as_i64().ok_or_else(|| {
                    FhirPathError::TypeError("indexer requires an integer".to_string())
                })?,
                Some(other) => {
                    return Err(FhirPathError::TypeError(format!(
                        "indexer requires an integer, got {}",
                        type_name(other)
                    )));
                }
                None => return Ok(Vec::new()),
            };
            if idx < 0 {
                return Ok(Vec::new());
            }
            Ok(items.into_iter().nth(idx as usize).into_iter().collect())
        }
        AstNode::Polarity { negate, operand } => {
            let items = evaluate(operand, input, ctx)?;
            match singleton(&items)? {
                None => Ok(Vec::new()),
                Some(value) => {
                    let d = to_decimal(value)?;
                    let d = if *negate { -d } else { d };
                    Ok(vec![decimal_to_value(d)])
                }
            }
        }
        AstNode::Binary {
            left,
            operator,
            right,
        } => evaluate_binary(left, *operator, right, input, ctx),
    }
}

/// Path navigation on one item, flattening array-valued elements.
fn navigate(item: &Value, name: &str, out: &mut Vec<Value>) {
    if let Value::Object(map) = item {
        // A leading resource-type segment (`Patient.name`) resolves to the
        // resource itself when the types line up.
        if map.get("resourceType").and_then(Value::as_str) == Some(name) {
            out.push(item.clone());
            return;
        }
        match map.get(name) {
            Some(Value::Array(items)) => out.extend(items.iter().cloned()),
            Some(Value::Null) | None => {}
            Some(value) => out.push(value.clone()),
        }
    }
}

fn evaluate_binary(
    left: &AstNode,
    operator: BinaryOperator,
    right: &AstNode,
    input: &[Value],
    ctx: &EvaluationContext,
) -> Result<Vec<Value>> {
    let lhs = evaluate(left, input, ctx)?;
    let rhs = evaluate(right, input, ctx)?;

    match operator {
        BinaryOperator::Union => {
            let mut merged = lhs;
            for item in rhs {
                if !merged.contains(&item) {
                    merged.push(item);
                }
            }
            Ok(merged)
        }
        BinaryOperator::And | BinaryOperator::Or | BinaryOperator::Xor => {
            let l = boolean_operand(&lhs)?;
            let r = boolean_operand(&rhs)?;
            let result = match operator {
                BinaryOperator::And => match (l, r) {
                    (Some(false), _) | (_, Some(false)) => Some(false),
                    (Some(true), Some(true)) => Some(true),
                    _ => None,
                },
                BinaryOperator::Or => match (l, r) {
                    (Some(true), _) | (_, Some(true)) => Some(true),
                    (Some(false), Some(false)) => Some(false),
                    _ => None,
                },
                _ => match (l, r) {
                    (Some(a), Some(b)) => Some(a != b),
                    _ => None,
                },
            };
            Ok(result.map(Value::Bool).into_iter().collect())
        }
        BinaryOperator::Equal | BinaryOperator::NotEqual => {
            if lhs.is_empty() || rhs.is_empty() {
                return Ok(Vec::new());
            }
            let mut equal = lhs.len() == rhs.len();
            if equal {
                for (a, b) in lhs.iter().zip(rhs.iter()) {
                    if !values_equal(a, b) {
                        equal = false;
                        break;
                    }
                }
            }
            let result = if operator == BinaryOperator::Equal {
                equal
            } else {
                !equal
            };
            Ok(vec![Value::Bool(result)])
        }
        BinaryOperator::LessThan
        | BinaryOperator::LessThanOrEqual
        | BinaryOperator::GreaterThan
        | BinaryOperator::GreaterThanOrEqual => {
            let (a, b) = match (singleton(&lhs)?, singleton(&rhs)?) {
                (Some(a), Some(b)) => (a, b),
                _ => return Ok(Vec::new()),
            };
            let ordering = compare_values(a, b)?;
            let result = match operator {
                BinaryOperator::LessThan => ordering.is_lt(),
                BinaryOperator::LessThanOrEqual => ordering.is_le(),
                BinaryOperator::GreaterThan => ordering.is_gt(),
                _ => ordering.is_ge(),
            };
            Ok(vec![Value::Bool(result)])
        }
        BinaryOperator::Concat => {
            let a = singleton(&lhs)?.map(string_operand).transpose()?.unwrap_or_default();
            let b = singleton(&rhs)?.map(string_operand).transpose()?.unwrap_or_default();
            Ok(vec![Value::String(format!("{}{}", a, b))])
        }
        BinaryOperator::Add
        | BinaryOperator::Subtract
        | BinaryOperator::Multiply
        | BinaryOperator::Divide
        | BinaryOperator::Div
        | BinaryOperator::Mod => {
            let (a, b) = match (singleton(&lhs)?, singleton(&rhs)?) {
                (Some(a), Some(b)) => (a, b),
                _ => return Ok(Vec::new()),
            };
            // `+` doubles as string concatenation.
            if operator == BinaryOperator::Add {
                if let (Value::String(a), Value::String(b)) = (a, b) {
                    return Ok(vec![Value::String(format!("{}{}", a, b))]);
                }
            }
            let a = to_decimal(a)?;
            let b = to_decimal(b)?;
            let result = match operator {
                BinaryOperator::Add => a + b,
                BinaryOperator::Subtract => a - b,
                BinaryOperator::Multiply => a * b,
                BinaryOperator::Divide => {
                    if b.is_zero() {
                        return Err(FhirPathError::DivisionByZero);
                    }
                    a / b
                }
                BinaryOperator::Div => {
                    if b.is_zero() {
                        return Err(FhirPathError::DivisionByZero);
                    }
                    (a / b).trunc()
                }
                _ => {
                    if b.is_zero() {
                        return Err(FhirPathError::DivisionByZero);
                    }
                    a % b
                }
            };
            Ok(vec![decimal_to_value(result)])
        }
    }
}

/// Expect at most one item; error on larger collections.
pub(crate) fn singleton(items: &[Value]) -> Result<Option<&Value>> {
    match items {
        [] => Ok(None),
        [item] => Ok(Some(item)),
        _ => Err(FhirPathError::SingletonRequired(items.len())),
    }
}

/// Boolean coercion for logic operators: a single non-boolean item is truthy.
fn boolean_operand(items: &[Value]) -> Result<Option<bool>> {
    Ok(match singleton(items)? {
        None => None,
        Some(Value::Bool(b)) => Some(*b),
        Some(_) => Some(true),
    })
}

fn string_operand(value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(FhirPathError::TypeError(format!(
            "expected a string, got {}",
            type_name(other)
        ))),
    }
}

/// Value equality; numbers compare numerically so `1.0 = 1` holds.
pub(crate) fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => match (to_decimal(a), to_decimal(b)) {
            (Ok(x), Ok(y)) => x == y,
            _ => false,
        },
        _ => a == b,
    }
}

fn compare_values(a: &Value, b: &Value) -> Result<std::cmp::Ordering> {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => Ok(to_decimal(a)?.cmp(&to_decimal(b)?)),
        (Value::String(x), Value::String(y)) => Ok(x.cmp(y)),
        _ => Err(FhirPathError::TypeError(format!(
            "cannot compare {} with {}",
            type_name(a),
            type_name(b)
        ))),
    }
}

pub(crate) fn to_decimal(value: &Value) -> Result<Decimal> {
    match value {
        Value::Number(n) => Decimal::from_str(&n.to_string()).map_err(|e| {
            FhirPathError::TypeError(format!("number out of decimal range: {}", e))
        }),
        Value::String(s) => Decimal::from_str(s)
            .map_err(|_| FhirPathError::TypeError(format!("'{}' is not a number", s))),
        other => Err(FhirPathError::TypeError(format!(
            "expected a number, got {}",
            type_name(other)
        ))),
    }
}

pub(crate) fn decimal_to_value(d: Decimal) -> Value {
    if d.fract().is_zero() {
        if let Some(i) = d.to_i64() {
            return Value::Number(Number::from(i));
        }
    }
    match d.to_f64().and_then(Number::from_f64) {
        Some(n) => Value::Number(n),
        None => Value::String(d.to_string()),
    }
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "collection",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use serde_json::json;

    fn eval(expr: &str, resource: &Value) -> Vec<Value> {
        let ast = parse(expr).unwrap();
        evaluate(&ast, std::slice::from_ref(resource), &EvaluationContext::new()).unwrap()
    }

    #[test]
    fn test_member_flattens_arrays() {
        let patient = json!({
            "resourceType": "Patient",
            "name": [
                {"given": ["Ada", "Mary"]},
                {"given": ["Grace"]}
            ]
        });
        assert_eq!(
            eval("name.given", &patient),
            vec![json!("Ada"), json!("Mary"), json!("Grace")]
        );
    }

    #[test]
    fn test_resource_type_head() {
        let patient = json!({"resourceType": "Patient", "gender": "female"});
        assert_eq!(eval("Patient.gender", &patient), vec![json!("female")]);
    }

    #[test]
    fn test_missing_member_is_empty() {
        let patient = json!({"resourceType": "Patient"});
        assert!(eval("address.city", &patient).is_empty());
    }

    #[test]
    fn test_equality_with_boolean() {
        let patient = json!({"resourceType": "Patient", "active": true});
        assert_eq!(eval("active = true", &patient), vec![json!(true)]);
        assert_eq!(eval("active = false", &patient), vec![json!(false)]);
    }

    #[test]
    fn test_equality_on_empty_is_empty() {
        let patient = json!({"resourceType": "Patient"});
        assert!(eval("gender = 'male'", &patient).is_empty());
    }

    #[test]
    fn test_numeric_comparison() {
        let obs = json!({"resourceType": "Observation", "valueQuantity": {"value": 7.2}});
        assert_eq!(eval("valueQuantity.value > 5", &obs), vec![json!(true)]);
        assert_eq!(eval("valueQuantity.value <= 7.2", &obs), vec![json!(true)]);
    }

    #[test]
    fn test_indexer() {
        let patient = json!({"name": [{"family": "Lovelace"}, {"family": "Hopper"}]});
        assert_eq!(eval("name[1].family", &patient), vec![json!("Hopper")]);
        assert!(eval("name[5]", &patient).is_empty());
    }

    #[test]
    fn test_and_or_three_valued() {
        let patient = json!({"resourceType": "Patient", "active": true});
        assert_eq!(eval("active and true", &patient), vec![json!(true)]);
        // unknown `and` true stays empty
        assert!(eval("deceasedBoolean and true", &patient).is_empty());
        // unknown `or` true is true
        assert_eq!(eval("deceasedBoolean or true", &patient), vec![json!(true)]);
    }

    #[test]
    fn test_arithmetic() {
        let v = json!({});
        assert_eq!(eval("2 + 3 * 4", &v), vec![json!(14)]);
        assert_eq!(eval("7 div 2", &v), vec![json!(3)]);
        assert_eq!(eval("7 mod 2", &v), vec![json!(1)]);
        assert_eq!(eval("1.5 + 1.5", &v), vec![json!(3)]);
    }

    #[test]
    fn test_string_concat_operators() {
        let v = json!({});
        assert_eq!(eval("'a' + 'b'", &v), vec![json!("ab")]);
        assert_eq!(eval("'a' & 'b'", &v), vec![json!("ab")]);
    }

    #[test]
    fn test_union_dedupes() {
        let patient = json!({"a": ["x", "y"], "b": ["y", "z"]});
        assert_eq!(
            eval("a | b", &patient),
            vec![json!("x"), json!("y"), json!("z")]
        );
    }

    #[test]
    fn test_constant_lookup() {
        let ast = parse("%src").unwrap();
        let mut ctx = EvaluationContext::new();
        ctx.set_constant("src", json!("import"));
        let result = evaluate(&ast, &[json!({})], &ctx).unwrap();
        assert_eq!(result, vec![json!("import")]);
    }

    #[test]
    fn test_undefined_constant_errors() {
        let ast = parse("%nope").unwrap();
        let err = evaluate(&ast, &[json!({})], &EvaluationContext::new()).unwrap_err();
        assert_eq!(err, FhirPathError::UndefinedConstant("nope".to_string()));
    }
}
