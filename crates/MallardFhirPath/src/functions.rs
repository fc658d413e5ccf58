//! Function invocation table.
//!
//! Besides the core FHIRPath functions this registers the two view-layer
//! helpers, `getResourceKey()` and `getReferenceKey([Type])`, which
//! resolve row keys independently of the resource type.

use serde_json::{Number, Value};

use crate::ast::AstNode;
use crate::context::EvaluationContext;
use crate::error::{FhirPathError, Result};
use crate::evaluator::{evaluate, singleton, type_name};

pub fn call(
    name: &str,
    args: &[AstNode],
    input: &[Value],
    ctx: &EvaluationContext,
) -> Result<Vec<Value>> {
    match name {
        "first" => {
            expect_arity(name, args, 0, 0)?;
            Ok(input.first().cloned().into_iter().collect())
        }
        "last" => {
            expect_arity(name, args, 0, 0)?;
            Ok(input.last().cloned().into_iter().collect())
        }
        "count" => {
            expect_arity(name, args, 0, 0)?;
            Ok(vec![Value::Number(Number::from(input.len()))])
        }
        "empty" => {
            expect_arity(name, args, 0, 0)?;
            Ok(vec![Value::Bool(input.is_empty())])
        }
        "exists" => {
            expect_arity(name, args, 0, 1)?;
            match args.first() {
                None => Ok(vec![Value::Bool(!input.is_empty())]),
                Some(criteria) => {
                    for item in input {
                        if matches(criteria, item, ctx)? {
                            return Ok(vec![Value::Bool(true)]);
                        }
                    }
                    Ok(vec![Value::Bool(false)])
                }
            }
        }
        "not" => {
            expect_arity(name, args, 0, 0)?;
            Ok(match singleton(input)? {
                Some(Value::Bool(b)) => vec![Value::Bool(!b)],
                Some(_) => vec![Value::Bool(false)],
                None => Vec::new(),
            })
        }
        "where" => {
            expect_arity(name, args, 1, 1)?;
            let mut out = Vec::new();
            for item in input {
                if matches(&args[0], item, ctx)? {
                    out.push(item.clone());
                }
            }
            Ok(out)
        }
        "select" => {
            expect_arity(name, args, 1, 1)?;
            let mut out = Vec::new();
            for item in input {
                out.extend(evaluate(&args[0], std::slice::from_ref(item), ctx)?);
            }
            Ok(out)
        }
        "join" => {
            expect_arity(name, args, 0, 1)?;
            let separator = match args.first() {
                None => String::new(),
                Some(arg) => {
                    let sep = evaluate(arg, input, ctx)?;
                    match singleton(&sep)? {
                        Some(Value::String(s)) => s.clone(),
                        Some(other) => {
                            return Err(FhirPathError::TypeError(format!(
                                "join() separator must be a string, got {}",
                                type_name(other)
                            )));
                        }
                        None => String::new(),
                    }
                }
            };
            let parts: Result<Vec<String>> = input.iter().map(stringify).collect();
            Ok(vec![Value::String(parts?.join(&separator))])
        }
        "toString" => {
            expect_arity(name, args, 0, 0)?;
            Ok(match singleton(input)? {
                Some(value) => vec![Value::String(stringify(value)?)],
                None => Vec::new(),
            })
        }
        "extension" => {
            expect_arity(name, args, 1, 1)?;
            let url = evaluate(&args[0], input, ctx)?;
            let url = match singleton(&url)? {
                Some(Value::String(s)) => s.clone(),
                _ => {
                    return Err(FhirPathError::TypeError(
                        "extension() requires a url string".to_string(),
                    ));
                }
            };
            let mut out = Vec::new();
            for item in input {
                if let Some(Value::Array(extensions)) = item.get("extension") {
                    for ext in extensions {
                        if ext.get("url").and_then(Value::as_str) == Some(url.as_str()) {
                            out.push(ext.clone());
                        }
                    }
                }
            }
            Ok(out)
        }
        "getResourceKey" => {
            expect_arity(name, args, 0, 0)?;
            let mut out = Vec::new();
            for item in input {
                if let Some(id) = item.get("id") {
                    if !id.is_null() {
                        out.push(id.clone());
                    }
                }
            }
            Ok(out)
        }
        "getReferenceKey" => {
            expect_arity(name, args, 0, 1)?;
            let wanted_type = match args.first() {
                None => None,
                // The type argument is a type specifier, not an expression:
                // both getReferenceKey(Patient) and getReferenceKey('Patient').
                Some(AstNode::Member(t)) => Some(t.clone()),
                Some(AstNode::StringLiteral(t)) => Some(t.clone()),
                Some(_) => {
                    return Err(FhirPathError::TypeError(
                        "getReferenceKey() requires a resource type specifier".to_string(),
                    ));
                }
            };
            let mut out = Vec::new();
            for item in input {
                if let Some((resource_type, id)) = reference_parts(item) {
                    match &wanted_type {
                        Some(t) if *t != resource_type => {}
                        _ => out.push(Value::String(id)),
                    }
                }
            }
            Ok(out)
        }
        other => Err(FhirPathError::UnknownFunction(other.to_string())),
    }
}

/// Evaluate a criteria expression against one item; non-empty collections
/// whose head is not `false` count as a match.
fn matches(criteria: &AstNode, item: &Value, ctx: &EvaluationContext) -> Result<bool> {
    let result = evaluate(criteria, std::slice::from_ref(item), ctx)?;
    Ok(match result.first() {
        Some(Value::Bool(b)) => *b,
        Some(_) => true,
        None => false,
    })
}

fn stringify(value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(FhirPathError::TypeError(format!(
            "cannot convert {} to a string",
            type_name(other)
        ))),
    }
}

/// Pull `(resourceType, id)` out of a Reference element or a bare
/// reference string. Relative (`Patient/1`), absolute
/// (`https://host/fhir/Patient/1`) and versioned
/// (`Patient/1/_history/2`) forms are recognized.
fn reference_parts(item: &Value) -> Option<(String, String)> {
    let reference = match item {
        Value::String(s) => s.as_str(),
        Value::Object(map) => map.get("reference")?.as_str()?,
        _ => return None,
    };

    let mut segments: Vec<&str> = reference.split('/').filter(|s| !s.is_empty()).collect();
    if segments.len() >= 4 && segments[segments.len() - 2] == "_history" {
        segments.truncate(segments.len() - 2);
    }
    if segments.len() < 2 {
        return None;
    }
    let id = segments[segments.len() - 1];
    let resource_type = segments[segments.len() - 2];
    if resource_type.is_empty()
        || id.is_empty()
        || !resource_type.chars().next().is_some_and(|c| c.is_ascii_uppercase())
    {
        return None;
    }
    Some((resource_type.to_string(), id.to_string()))
}

fn expect_arity(name: &str, args: &[AstNode], min: usize, max: usize) -> Result<()> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            min.to_string()
        } else {
            format!("{} to {}", min, max)
        };
        return Err(FhirPathError::InvalidArity {
            function: name.to_string(),
            expected,
            actual: args.len(),
        });
    }
    Ok(())
}
