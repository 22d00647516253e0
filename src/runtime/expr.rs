//! Expression resolution: templates, structured references and recursive
//! prop values.
//!
//! - `"{{state.count}}"` (whole string) resolves to the raw value, keeping its
//!   JSON type.
//! - `"count: {{state.count}}"` resolves to a string; undefined and `null`
//!   render as `""`.
//! - `"$state.count"`, `"$auth.user.handle"`, `"$form"` resolve against the
//!   named scope root.
//! - Arrays and objects resolve element-wise. In [`ResolveMode::PreserveNodes`]
//!   nested UiNode objects are returned untouched so structural components
//!   can render them against their own scope.

use serde_json::{Map, Value};

use super::scope::{Scope, SCOPE_ROOTS};
use crate::manifest::looks_like_node;

/// One piece of a template string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    Text(&'a str),
    /// Trimmed source of a `{{ ... }}` expression.
    Expr(&'a str),
}

/// Split `template` into literal text and `{{ }}` expressions. An unterminated
/// `{{` is kept as text.
pub fn tokenize(template: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        let Some(close) = rest[open + 2..].find("}}") else {
            break;
        };
        if open > 0 {
            tokens.push(Token::Text(&rest[..open]));
        }
        tokens.push(Token::Expr(rest[open + 2..open + 2 + close].trim()));
        rest = &rest[open + 2 + close + 2..];
    }
    if !rest.is_empty() {
        tokens.push(Token::Text(rest));
    }
    tokens
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolveMode {
    /// Resolve everything, including nested nodes.
    #[default]
    Deep,
    /// Leave nested UiNode objects untouched.
    PreserveNodes,
}

/// Resolve any prop or action value against `scope`.
pub fn resolve_value(value: &Value, scope: &Scope, mode: ResolveMode) -> Value {
    match value {
        Value::String(s) => resolve_string(s, scope),
        Value::Array(items) => Value::Array(items.iter().map(|v| resolve_value(v, scope, mode)).collect()),
        Value::Object(_) if mode == ResolveMode::PreserveNodes && looks_like_node(value) => value.clone(),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), resolve_value(v, scope, mode)))
                .collect::<Map<String, Value>>(),
        ),
        other => other.clone(),
    }
}

/// Resolve one string: structured reference, template or literal.
pub fn resolve_string(s: &str, scope: &Scope) -> Value {
    if let Some(reference) = resolve_reference(s, scope) {
        return reference;
    }
    if !s.contains("{{") {
        return Value::String(s.to_string());
    }

    let tokens = tokenize(s);
    if let [Token::Expr(expr)] = tokens.as_slice() {
        return evaluate(expr, scope);
    }

    let mut out = String::new();
    for token in tokens {
        match token {
            Token::Text(text) => out.push_str(text),
            Token::Expr(expr) => out.push_str(&stringify(&evaluate(expr, scope))),
        }
    }
    Value::String(out)
}

/// `$root.path` reference. `None` when `s` is not a reference to a known
/// root; `Some(Null)` when it is but nothing is bound there.
pub fn resolve_reference(s: &str, scope: &Scope) -> Option<Value> {
    let path = s.strip_prefix('$')?;
    let root_end = path.find(['.', '[']).unwrap_or(path.len());
    if !SCOPE_ROOTS.contains(&&path[..root_end]) {
        return None;
    }
    Some(scope.lookup(path).cloned().unwrap_or(Value::Null))
}

/// Evaluate the inside of `{{ }}`: a literal or a scope path.
pub fn evaluate(expr: &str, scope: &Scope) -> Value {
    let expr = expr.trim();
    match expr {
        "" | "null" | "undefined" => return Value::Null,
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Some(text) = quoted(expr) {
        return Value::String(text.to_string());
    }
    if let Ok(n) = expr.parse::<i64>() {
        return Value::from(n);
    }
    if let Ok(n) = expr.parse::<f64>() {
        return Value::from(n);
    }
    let path = expr.strip_prefix('$').unwrap_or(expr);
    scope.lookup(path).cloned().unwrap_or(Value::Null)
}

fn quoted(expr: &str) -> Option<&str> {
    ['"', '\''].iter().find_map(|q| {
        expr.strip_prefix(*q)
            .and_then(|rest| rest.strip_suffix(*q))
    })
}

/// String form used for embedded templates and display.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
