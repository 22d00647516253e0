//! Boolean mini-language used by `visible`, `hidden` and the `If` component.
//!
//! A condition is either a plain value (resolved, then coerced to a boolean)
//! or an object with one operator key:
//!
//! | Operator | Operand | Meaning |
//! |----------|---------|---------|
//! | `$and` | array | every operand holds; empty is `true` |
//! | `$or` | array | some operand holds; empty is `false` |
//! | `$not` | condition | negation |
//! | `$eq` / `$ne` | `[a, b]` | equality, numbers compared numerically |
//! | `$gt` / `$lt` | `[a, b]` | numeric comparison, else string ordering |
//! | `$includes` | `[haystack, needle]` | array element, substring or object key |
//! | `$isEmpty` | value | undefined, `""`, `[]` or `{}` |
//! | `$auth` | `true`/`false`/path | logged-in check, or truthy `auth.<path>` |

use serde_json::Value;
use std::cmp::Ordering;

use super::expr::{resolve_value, ResolveMode};
use super::scope::Scope;

pub fn evaluate_condition(condition: &Value, scope: &Scope) -> bool {
    if let Value::Object(map) = condition {
        if map.len() == 1 {
            if let Some((op, operand)) = map.iter().next() {
                if let Some(result) = evaluate_operator(op, operand, scope) {
                    return result;
                }
            }
        }
    }
    is_truthy(&resolve_value(condition, scope, ResolveMode::Deep))
}

fn evaluate_operator(op: &str, operand: &Value, scope: &Scope) -> Option<bool> {
    let result = match op {
        "$and" => operands(operand).iter().all(|c| evaluate_condition(c, scope)),
        "$or" => operands(operand).iter().any(|c| evaluate_condition(c, scope)),
        "$not" => !evaluate_condition(operand, scope),
        "$eq" => {
            let (a, b) = pair(operand, scope);
            loosely_equal(&a, &b)
        }
        "$ne" => {
            let (a, b) = pair(operand, scope);
            !loosely_equal(&a, &b)
        }
        "$gt" => {
            let (a, b) = pair(operand, scope);
            compare(&a, &b) == Some(Ordering::Greater)
        }
        "$lt" => {
            let (a, b) = pair(operand, scope);
            compare(&a, &b) == Some(Ordering::Less)
        }
        "$includes" => {
            let (haystack, needle) = pair(operand, scope);
            includes(&haystack, &needle)
        }
        "$isEmpty" => is_empty(&resolve_value(operand, scope, ResolveMode::Deep)),
        "$auth" => match operand {
            Value::Bool(expected) => is_logged_in(scope) == *expected,
            Value::String(path) => scope
                .lookup(&format!("auth.{}", path.trim_start_matches("auth.")))
                .map(is_truthy)
                .unwrap_or(false),
            _ => is_logged_in(scope),
        },
        _ => return None,
    };
    Some(result)
}

/// Operand list; a non-array operand counts as a single condition.
fn operands(operand: &Value) -> Vec<Value> {
    match operand {
        Value::Array(items) => items.clone(),
        other => vec![other.clone()],
    }
}

fn pair(operand: &Value, scope: &Scope) -> (Value, Value) {
    let resolved = resolve_value(operand, scope, ResolveMode::Deep);
    match resolved {
        Value::Array(mut items) if items.len() >= 2 => {
            let b = items.swap_remove(1);
            let a = items.swap_remove(0);
            (a, b)
        }
        Value::Array(mut items) if items.len() == 1 => (items.swap_remove(0), Value::Null),
        other => (other, Value::Null),
    }
}

/// Logged in when the auth snapshot carries a user or an explicit flag.
fn is_logged_in(scope: &Scope) -> bool {
    let Some(auth) = scope.root("auth") else {
        return false;
    };
    match auth.get("logged_in").or_else(|| auth.get("loggedIn")) {
        Some(flag) => is_truthy(flag),
        None => auth.get("user").map(|u| !u.is_null()).unwrap_or(false),
    }
}

/// JavaScript-like truthiness, with `"true"`/`"false"` strings read as
/// booleans.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(false),
        Value::String(s) => match s.trim() {
            "" | "false" => false,
            _ => true,
        },
        Value::Array(_) | Value::Object(_) => true,
    }
}

pub fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn loosely_equal(a: &Value, b: &Value) -> bool {
    if a.is_number() || b.is_number() {
        if let (Some(x), Some(y)) = (as_number(a), as_number(b)) {
            return x == y;
        }
    }
    a == b
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (as_number(a), as_number(b)) {
        (Some(x), Some(y)) => x.partial_cmp(&y),
        _ => match (a, b) {
            (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
            _ => None,
        },
    }
}

fn includes(haystack: &Value, needle: &Value) -> bool {
    match haystack {
        Value::Array(items) => items.iter().any(|item| loosely_equal(item, needle)),
        Value::String(s) => match needle {
            Value::String(n) => s.contains(n.as_str()),
            Value::Null => false,
            other => s.contains(&other.to_string()),
        },
        Value::Object(map) => needle.as_str().map(|k| map.contains_key(k)).unwrap_or(false),
        _ => false,
    }
}
