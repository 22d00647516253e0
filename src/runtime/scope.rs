//! Evaluation context for expressions, conditions and actions.

use serde_json::{Map, Value};

use crate::utils::json_path::PathMapper;

/// Roots that `$`-prefixed structured references may name.
pub const SCOPE_ROOTS: [&str; 7] = ["state", "data", "item", "auth", "form", "params", "payload"];

/// Named roots (`state`, `item`, ...) visible to an expression. Cheap to
/// clone; structural components derive child scopes with [`Scope::with`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scope {
    roots: Map<String, Value>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Child scope with `root` bound to `value`.
    pub fn with(&self, root: impl Into<String>, value: Value) -> Self {
        let mut child = self.clone();
        child.roots.insert(root.into(), value);
        child
    }

    pub fn set(&mut self, root: impl Into<String>, value: Value) {
        self.roots.insert(root.into(), value);
    }

    pub fn root(&self, name: &str) -> Option<&Value> {
        self.roots.get(name)
    }

    /// Look up `root.path`. `None` when the root or any segment is missing.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let path = path.trim();
        let split = path.find(['.', '[']).unwrap_or(path.len());
        let (root, rest) = path.split_at(split);
        let value = self.roots.get(root)?;
        let rest = rest.strip_prefix('.').unwrap_or(rest);
        PathMapper::get_path(value, rest)
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.roots.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lookup_walks_roots_and_indices() {
        let scope = Scope::new()
            .with("state", json!({"count": 3, "items": [{"title": "a"}]}))
            .with("item", json!(["x", "y"]));

        assert_eq!(scope.lookup("state.count"), Some(&json!(3)));
        assert_eq!(scope.lookup("state.items[0].title"), Some(&json!("a")));
        assert_eq!(scope.lookup("item[1]"), Some(&json!("y")));
        assert_eq!(scope.lookup("state"), scope.root("state"));
        assert_eq!(scope.lookup("auth.user"), None);
    }

    #[test]
    fn child_scope_shadows_without_touching_parent() {
        let parent = Scope::new().with("item", json!(1));
        let child = parent.with("item", json!(2));
        assert_eq!(parent.lookup("item"), Some(&json!(1)));
        assert_eq!(child.lookup("item"), Some(&json!(2)));
    }
}
