//! Per-fragment structural validators.
//!
//! Each validator takes one parsed fragment, reports field/type/enum failures
//! as `Structural` issues with a JSON path, and returns the entries that
//! passed, annotated with their provenance. Cross-fragment invariants are
//! checked later by the aggregator.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::issue::{Issue, IssueKind, Provenance};
use super::model::{
    ApHandlerDefinition, BucketDefinition, CollectionDefinition, HttpMethod, RouteDefinition,
    ScreenDefinition, StateField, StateType, UiNode, ViewInsertDefinition,
};

/// Collects structural issues for one fragment file.
pub struct FragmentChecker<'a> {
    file: &'a str,
    issues: &'a mut Vec<Issue>,
}

impl<'a> FragmentChecker<'a> {
    pub fn new(file: &'a str, issues: &'a mut Vec<Issue>) -> Self {
        Self { file, issues }
    }

    fn root(&self) -> Provenance {
        Provenance::new(self.file, "")
    }

    fn fail(&mut self, at: &Provenance, message: impl Into<String>) {
        self.issues
            .push(Issue::error(IssueKind::Structural, message).at(at.clone()));
    }

    fn object<'v>(&mut self, value: &'v Value, at: &Provenance) -> Option<&'v Map<String, Value>> {
        match value.as_object() {
            Some(map) => Some(map),
            None => {
                self.fail(at, format!("expected an object, found {}", type_name(value)));
                None
            }
        }
    }

    fn required_string(&mut self, obj: &Map<String, Value>, key: &str, at: &Provenance) -> Option<String> {
        match obj.get(key) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
            Some(Value::String(_)) => {
                self.fail(&at.child(key), format!("'{}' must not be empty", key));
                None
            }
            Some(other) => {
                self.fail(
                    &at.child(key),
                    format!("'{}' must be a string, found {}", key, type_name(other)),
                );
                None
            }
            None => {
                self.fail(at, format!("missing required field '{}'", key));
                None
            }
        }
    }

    /// `Ok(None)` when absent, `Err(())` when present with the wrong type.
    fn optional_string(&mut self, obj: &Map<String, Value>, key: &str, at: &Provenance) -> Result<Option<String>, ()> {
        match obj.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => {
                self.fail(
                    &at.child(key),
                    format!("'{}' must be a string, found {}", key, type_name(other)),
                );
                Err(())
            }
        }
    }

    fn array<'v>(&mut self, obj: &'v Map<String, Value>, key: &str, at: &Provenance, required: bool) -> Option<&'v Vec<Value>> {
        match obj.get(key) {
            Some(Value::Array(items)) => Some(items),
            None | Some(Value::Null) if !required => None,
            None | Some(Value::Null) => {
                self.fail(at, format!("missing required field '{}'", key));
                None
            }
            Some(other) => {
                self.fail(
                    &at.child(key),
                    format!("'{}' must be an array, found {}", key, type_name(other)),
                );
                None
            }
        }
    }

    fn keyed_object<'v>(&mut self, obj: &'v Map<String, Value>, key: &str, at: &Provenance) -> Option<&'v Map<String, Value>> {
        match obj.get(key) {
            Some(Value::Object(map)) => Some(map),
            None | Some(Value::Null) => {
                self.fail(at, format!("missing required field '{}'", key));
                None
            }
            Some(other) => {
                self.fail(
                    &at.child(key),
                    format!("'{}' must be an object, found {}", key, type_name(other)),
                );
                None
            }
        }
    }

    // ---- routes -------------------------------------------------------

    /// `{schema_version?, routes: [{id, method, path, handler, auth?, description?}]}`
    pub fn routes(&mut self, doc: &Value) -> Vec<RouteDefinition> {
        let root = self.root();
        let Some(obj) = self.object(doc, &root) else {
            return Vec::new();
        };
        let Some(items) = self.array(obj, "routes", &root, true) else {
            return Vec::new();
        };

        let base = root.child("routes");
        items
            .iter()
            .enumerate()
            .filter_map(|(i, item)| self.route(item, base.child(format!("[{}]", i))))
            .collect()
    }

    fn route(&mut self, item: &Value, at: Provenance) -> Option<RouteDefinition> {
        let obj = self.object(item, &at)?;
        let before = self.issues.len();

        let id = self.required_string(obj, "id", &at);
        let method = self.required_string(obj, "method", &at).and_then(|m| {
            let parsed = HttpMethod::parse(&m);
            if parsed.is_none() {
                self.fail(
                    &at.child("method"),
                    format!("unsupported method '{}' (expected one of GET, POST, PUT, PATCH, DELETE)", m),
                );
            }
            parsed
        });
        let path = self.required_string(obj, "path", &at).and_then(|p| {
            if p.starts_with('/') {
                Some(p)
            } else {
                self.fail(&at.child("path"), format!("path '{}' must start with '/'", p));
                None
            }
        });
        let handler = self.required_string(obj, "handler", &at);
        let auth = match obj.get("auth") {
            None | Some(Value::Null) => None,
            Some(Value::Bool(b)) => Some(*b),
            Some(other) => {
                self.fail(
                    &at.child("auth"),
                    format!("'auth' must be a boolean, found {}", type_name(other)),
                );
                None
            }
        };
        let description = self.optional_string(obj, "description", &at).ok().flatten();

        if self.issues.len() > before {
            return None;
        }
        Some(RouteDefinition {
            id: id?,
            method: method?,
            path: path?,
            handler: handler?,
            auth,
            description,
            source: at,
        })
    }

    // ---- views --------------------------------------------------------

    /// `{schema_version?, screens?: [...], insert?: [...]}`
    pub fn views(&mut self, doc: &Value) -> (Vec<ScreenDefinition>, Vec<ViewInsertDefinition>) {
        let root = self.root();
        let Some(obj) = self.object(doc, &root) else {
            return (Vec::new(), Vec::new());
        };

        let mut screens = Vec::new();
        if let Some(items) = self.array(obj, "screens", &root, false) {
            let base = root.child("screens");
            for (i, item) in items.iter().enumerate() {
                if let Some(screen) = self.screen(item, base.child(format!("[{}]", i))) {
                    screens.push(screen);
                }
            }
        }

        let mut inserts = Vec::new();
        if let Some(items) = self.array(obj, "insert", &root, false) {
            let base = root.child("insert");
            for (i, item) in items.iter().enumerate() {
                if let Some(insert) = self.insert(item, base.child(format!("[{}]", i))) {
                    inserts.push(insert);
                }
            }
        }

        (screens, inserts)
    }

    fn screen(&mut self, item: &Value, at: Provenance) -> Option<ScreenDefinition> {
        let obj = self.object(item, &at)?;
        let before = self.issues.len();

        let id = self.required_string(obj, "id", &at);
        let route = match self.optional_string(obj, "route", &at) {
            Ok(Some(r)) if !r.starts_with('/') => {
                self.fail(&at.child("route"), format!("route '{}' must start with '/'", r));
                None
            }
            Ok(r) => r,
            Err(()) => None,
        };
        let title = self.optional_string(obj, "title", &at).ok().flatten();
        let layout = match obj.get("layout") {
            Some(value) => self.ui_node(value, &at.child("layout")),
            None => {
                self.fail(&at, "missing required field 'layout'");
                None
            }
        };
        let state = self.state_fields(obj, &at);

        if self.issues.len() > before {
            return None;
        }
        Some(ScreenDefinition {
            id: id?,
            route,
            title,
            layout: layout?,
            state,
            source: at,
        })
    }

    fn state_fields(&mut self, obj: &Map<String, Value>, at: &Provenance) -> BTreeMap<String, StateField> {
        let mut fields = BTreeMap::new();
        let decls = match obj.get("state") {
            None | Some(Value::Null) => return fields,
            Some(Value::Object(map)) => map,
            Some(other) => {
                self.fail(
                    &at.child("state"),
                    format!("'state' must be an object, found {}", type_name(other)),
                );
                return fields;
            }
        };

        let base = at.child("state");
        for (key, decl) in decls {
            let field_at = base.child(key);
            let Some(decl) = self.object(decl, &field_at) else {
                continue;
            };
            let Some(kind_raw) = self.required_string(decl, "type", &field_at) else {
                continue;
            };
            let Some(kind) = StateType::parse(&kind_raw) else {
                self.fail(
                    &field_at.child("type"),
                    format!(
                        "unknown state type '{}' (expected string, number, boolean, array, object or any)",
                        kind_raw
                    ),
                );
                continue;
            };
            let default = decl.get("default").cloned();
            if let Some(ref value) = default {
                if !kind.accepts(value) {
                    self.fail(
                        &field_at.child("default"),
                        format!(
                            "default for '{}' must be {}, found {}",
                            key,
                            kind_raw,
                            type_name(value)
                        ),
                    );
                    continue;
                }
            }
            fields.insert(key.clone(), StateField { kind, default });
        }
        fields
    }

    fn insert(&mut self, item: &Value, at: Provenance) -> Option<ViewInsertDefinition> {
        let obj = self.object(item, &at)?;
        let before = self.issues.len();

        let screen = self.required_string(obj, "screen", &at);
        let position = self.required_string(obj, "position", &at);
        let order = match obj.get("order") {
            None | Some(Value::Null) => 0,
            Some(Value::Number(n)) if n.is_i64() => n.as_i64().unwrap_or_default(),
            Some(other) => {
                self.fail(
                    &at.child("order"),
                    format!("'order' must be an integer, found {}", other),
                );
                0
            }
        };
        let node = match obj.get("node") {
            Some(value) => self.ui_node(value, &at.child("node")),
            None => {
                self.fail(&at, "missing required field 'node'");
                None
            }
        };

        if self.issues.len() > before {
            return None;
        }
        Some(ViewInsertDefinition {
            screen: screen?,
            position: position?,
            order,
            node: node?,
            source: at,
        })
    }

    /// `{type, props?, children?}`, recursively.
    pub fn ui_node(&mut self, value: &Value, at: &Provenance) -> Option<UiNode> {
        let obj = self.object(value, at)?;
        let kind = self.required_string(obj, "type", at);

        let props = match obj.get("props") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(other) => {
                self.fail(
                    &at.child("props"),
                    format!("'props' must be an object, found {}", type_name(other)),
                );
                Map::new()
            }
        };

        let mut children = Vec::new();
        let mut children_ok = true;
        if let Some(items) = self.array(obj, "children", at, false) {
            let base = at.child("children");
            for (i, child) in items.iter().enumerate() {
                match self.ui_node(child, &base.child(format!("[{}]", i))) {
                    Some(node) => children.push(node),
                    None => children_ok = false,
                }
            }
        }

        if !children_ok {
            return None;
        }
        Some(UiNode {
            kind: kind?,
            props,
            children,
        })
    }

    // ---- ap -----------------------------------------------------------

    /// `{handlers: [{id, handler, match?}]}`
    pub fn ap_handlers(&mut self, doc: &Value) -> Vec<ApHandlerDefinition> {
        let root = self.root();
        let Some(obj) = self.object(doc, &root) else {
            return Vec::new();
        };
        let Some(items) = self.array(obj, "handlers", &root, true) else {
            return Vec::new();
        };

        let base = root.child("handlers");
        let mut out = Vec::new();
        for (i, item) in items.iter().enumerate() {
            let at = base.child(format!("[{}]", i));
            let Some(entry) = self.object(item, &at) else {
                continue;
            };
            let id = self.required_string(entry, "id", &at);
            let handler = self.required_string(entry, "handler", &at);
            if let (Some(id), Some(handler)) = (id, handler) {
                out.push(ApHandlerDefinition {
                    id,
                    handler,
                    r#match: entry.get("match").filter(|v| !v.is_null()).cloned(),
                    source: at,
                });
            }
        }
        out
    }

    // ---- data ---------------------------------------------------------

    /// `{collections: {<id>: {engine?, schema, primary_key?, indexes?}}}`
    pub fn collections(&mut self, doc: &Value) -> Vec<(String, CollectionDefinition)> {
        let root = self.root();
        let Some(obj) = self.object(doc, &root) else {
            return Vec::new();
        };
        let Some(map) = self.keyed_object(obj, "collections", &root) else {
            return Vec::new();
        };

        let base = root.child("collections");
        let mut out = Vec::new();
        for (key, item) in map {
            let at = base.child(key);
            let Some(entry) = self.object(item, &at) else {
                continue;
            };
            let before = self.issues.len();

            let engine = self.optional_string(entry, "engine", &at).ok().flatten();
            let schema = self.keyed_object(entry, "schema", &at).cloned();
            let primary_key = self.optional_string(entry, "primary_key", &at).ok().flatten();
            let indexes = self
                .array(entry, "indexes", &at, false)
                .cloned()
                .unwrap_or_default();

            if self.issues.len() > before {
                continue;
            }
            if let Some(schema) = schema {
                out.push((
                    key.clone(),
                    CollectionDefinition {
                        engine,
                        schema,
                        primary_key,
                        indexes,
                        source: at,
                    },
                ));
            }
        }
        out
    }

    // ---- storage ------------------------------------------------------

    /// `{buckets: {<id>: {base_path, allowed_mime?, max_size_mb?, engine?}}}`
    pub fn buckets(&mut self, doc: &Value) -> Vec<(String, BucketDefinition)> {
        let root = self.root();
        let Some(obj) = self.object(doc, &root) else {
            return Vec::new();
        };
        let Some(map) = self.keyed_object(obj, "buckets", &root) else {
            return Vec::new();
        };

        let base = root.child("buckets");
        let mut out = Vec::new();
        for (key, item) in map {
            let at = base.child(key);
            let Some(entry) = self.object(item, &at) else {
                continue;
            };
            let before = self.issues.len();

            let base_path = self.required_string(entry, "base_path", &at);
            let engine = self.optional_string(entry, "engine", &at).ok().flatten();

            let mut allowed_mime = Vec::new();
            if let Some(items) = self.array(entry, "allowed_mime", &at, false) {
                for (i, mime) in items.iter().enumerate() {
                    match mime.as_str() {
                        Some(m) if is_mime_pattern(m) => allowed_mime.push(m.to_string()),
                        _ => self.fail(
                            &at.child("allowed_mime").child(format!("[{}]", i)),
                            format!("invalid MIME type pattern {}", mime),
                        ),
                    }
                }
            }

            let max_size_mb = match entry.get("max_size_mb") {
                None | Some(Value::Null) => None,
                Some(Value::Number(n)) if n.as_f64().map(|v| v > 0.0).unwrap_or(false) => n.as_f64(),
                Some(other) => {
                    self.fail(
                        &at.child("max_size_mb"),
                        format!("'max_size_mb' must be a positive number, found {}", other),
                    );
                    None
                }
            };

            if self.issues.len() > before {
                continue;
            }
            if let Some(base_path) = base_path {
                out.push((
                    key.clone(),
                    BucketDefinition {
                        base_path,
                        allowed_mime,
                        max_size_mb,
                        engine,
                        source: at,
                    },
                ));
            }
        }
        out
    }
}

fn is_mime_pattern(raw: &str) -> bool {
    let mut parts = raw.splitn(2, '/');
    let (Some(kind), Some(sub)) = (parts.next(), parts.next()) else {
        return false;
    };
    let token = |s: &str| {
        !s.is_empty()
            && s.chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '+' | '.' | '_'))
    };
    (token(kind) || kind == "*") && (token(sub) || sub == "*")
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn route_entries_are_checked_field_by_field() {
        let mut issues = Vec::new();
        let routes = FragmentChecker::new("app/routes/feed.json", &mut issues).routes(&json!({
            "routes": [
                {"id": "feed", "method": "get", "path": "/api/feed", "handler": "listFeed"},
                {"id": "bad", "method": "FETCH", "path": "api/x", "handler": "h"},
                {"method": "POST", "path": "/api/y", "handler": 3}
            ]
        }));

        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].method, HttpMethod::Get);
        assert_eq!(routes[0].source.path, "routes[0]");

        let paths: Vec<_> = issues
            .iter()
            .map(|i| i.location.as_ref().unwrap().path.clone())
            .collect();
        assert!(paths.contains(&"routes[1].method".to_string()));
        assert!(paths.contains(&"routes[1].path".to_string()));
        assert!(paths.contains(&"routes[2]".to_string()));
        assert!(paths.contains(&"routes[2].handler".to_string()));
        assert!(issues.iter().all(|i| i.kind == IssueKind::Structural));
    }

    #[test]
    fn nested_ui_node_errors_carry_paths() {
        let mut issues = Vec::new();
        let (screens, _) = FragmentChecker::new("v.json", &mut issues).views(&json!({
            "screens": [{
                "id": "screen.feed",
                "route": "/feed",
                "layout": {"type": "Column", "children": [{"props": {}}]}
            }]
        }));
        assert!(screens.is_empty());
        assert_eq!(
            issues[0].location.as_ref().unwrap().path,
            "screens[0].layout.children[0]"
        );
    }

    #[test]
    fn state_defaults_must_match_declared_type() {
        let mut issues = Vec::new();
        let (screens, _) = FragmentChecker::new("v.json", &mut issues).views(&json!({
            "screens": [{
                "id": "screen.counter",
                "layout": {"type": "Text"},
                "state": {"count": {"type": "number", "default": "zero"}}
            }]
        }));
        assert!(screens.is_empty());
        assert_eq!(
            issues[0].location.as_ref().unwrap().path,
            "screens[0].state.count.default"
        );
    }

    #[test]
    fn insert_order_defaults_to_zero() {
        let mut issues = Vec::new();
        let (_, inserts) = FragmentChecker::new("v.json", &mut issues).views(&json!({
            "insert": [{"screen": "screen.home", "position": "header", "node": {"type": "Banner"}}]
        }));
        assert!(issues.is_empty());
        assert_eq!(inserts[0].order, 0);
    }

    #[test]
    fn bucket_and_collection_shapes() {
        let mut issues = Vec::new();
        let buckets = FragmentChecker::new("s.json", &mut issues).buckets(&json!({
            "buckets": {
                "media": {"base_path": "media/", "allowed_mime": ["image/*", "video/mp4"], "max_size_mb": 50},
                "bad": {"base_path": "x", "allowed_mime": ["image"], "max_size_mb": 0}
            }
        }));
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].0, "media");
        assert_eq!(issues.len(), 2);

        let mut issues = Vec::new();
        let collections = FragmentChecker::new("d.json", &mut issues).collections(&json!({
            "collections": {"posts": {"schema": {"id": "string"}}, "broken": {"engine": "sql"}}
        }));
        assert_eq!(collections.len(), 1);
        assert_eq!(issues.len(), 1);
    }
}
