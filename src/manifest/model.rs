//! App manifest structure
//!
//! The merged, validated description of an app's routes, screens, protocol
//! handlers, data collections and storage buckets. Produced once per load
//! cycle and never mutated afterwards.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

use super::issue::Provenance;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AppManifest {
    pub schema_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub routes: Vec<RouteDefinition>,
    #[serde(default)]
    pub views: ViewsSection,
    #[serde(default)]
    pub ap: ApSection,
    #[serde(default)]
    pub data: DataSection,
    #[serde(default)]
    pub storage: StorageSection,
}

impl AppManifest {
    pub fn empty(schema_version: impl Into<String>) -> Self {
        Self {
            schema_version: schema_version.into(),
            version: None,
            routes: Vec::new(),
            views: ViewsSection::default(),
            ap: ApSection::default(),
            data: DataSection::default(),
            storage: StorageSection::default(),
        }
    }

    pub fn screen(&self, id: &str) -> Option<&ScreenDefinition> {
        self.views.screens.iter().find(|s| s.id == id)
    }

    pub fn route(&self, id: &str) -> Option<&RouteDefinition> {
        self.routes.iter().find(|r| r.id == id)
    }

    /// Inserts targeting `screen_id`, in render order.
    pub fn inserts_for<'a>(
        &'a self,
        screen_id: &'a str,
    ) -> impl Iterator<Item = &'a ViewInsertDefinition> + 'a {
        self.views.insert.iter().filter(move |i| i.screen == screen_id)
    }

    /// JSON Schema describing the merged manifest.
    pub fn json_schema() -> Value {
        let schema = schemars::schema_for!(AppManifest);
        serde_json::to_value(schema).unwrap_or(Value::Null)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub const ALL: [HttpMethod; 5] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Patch,
        HttpMethod::Delete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(raw.trim()))
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RouteDefinition {
    pub id: String,
    pub method: HttpMethod,
    pub path: String,
    pub handler: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip)]
    pub source: Provenance,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ViewsSection {
    #[serde(default)]
    pub screens: Vec<ScreenDefinition>,
    #[serde(default)]
    pub insert: Vec<ViewInsertDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ScreenDefinition {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub layout: UiNode,
    /// Typed defaults for the per-instance state store.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub state: BTreeMap<String, StateField>,
    #[serde(skip)]
    pub source: Provenance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum StateType {
    String,
    Number,
    Boolean,
    Array,
    Object,
    Any,
}

impl StateType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "string" => Some(StateType::String),
            "number" => Some(StateType::Number),
            "boolean" => Some(StateType::Boolean),
            "array" => Some(StateType::Array),
            "object" => Some(StateType::Object),
            "any" => Some(StateType::Any),
            _ => None,
        }
    }

    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            StateType::String => value.is_string(),
            StateType::Number => value.is_number(),
            StateType::Boolean => value.is_boolean(),
            StateType::Array => value.is_array(),
            StateType::Object => value.is_object(),
            StateType::Any => true,
        }
    }

    pub fn empty_value(&self) -> Value {
        match self {
            StateType::String => Value::String(String::new()),
            StateType::Number => Value::from(0),
            StateType::Boolean => Value::Bool(false),
            StateType::Array => Value::Array(Vec::new()),
            StateType::Object => Value::Object(Map::new()),
            StateType::Any => Value::Null,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StateField {
    #[serde(rename = "type")]
    pub kind: StateType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl StateField {
    pub fn initial_value(&self) -> Value {
        self.default
            .clone()
            .unwrap_or_else(|| self.kind.empty_value())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ViewInsertDefinition {
    /// Target screen id.
    pub screen: String,
    /// Slot key inside the target screen.
    pub position: String,
    #[serde(default)]
    pub order: i64,
    pub node: UiNode,
    #[serde(skip)]
    pub source: Provenance,
}

/// A typed, generic description of one renderable element.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct UiNode {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    #[schemars(with = "BTreeMap<String, Value>")]
    pub props: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<UiNode>,
}

impl UiNode {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            props: Map::new(),
            children: Vec::new(),
        }
    }

    pub fn with_prop(mut self, key: impl Into<String>, value: Value) -> Self {
        self.props.insert(key.into(), value);
        self
    }

    pub fn with_child(mut self, child: UiNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn prop(&self, key: &str) -> Option<&Value> {
        self.props.get(key)
    }

    /// Recognize a UiNode embedded in a prop value (`{"type": "...", ...}`).
    pub fn from_value(value: &Value) -> Option<UiNode> {
        if !looks_like_node(value) {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }

    /// Depth-first walk over this node, its children and nodes nested in props.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a Map<String, Value>)) {
        visit(&self.props);
        for value in self.props.values() {
            walk_value(value, visit);
        }
        for child in &self.children {
            child.walk(visit);
        }
    }
}

fn walk_value<'a>(value: &'a Value, visit: &mut dyn FnMut(&'a Map<String, Value>)) {
    match value {
        Value::Object(map) if looks_like_node(value) => {
            if let Some(Value::Object(props)) = map.get("props") {
                visit(props);
                for v in props.values() {
                    walk_value(v, visit);
                }
            }
            if let Some(Value::Array(children)) = map.get("children") {
                for child in children {
                    walk_value(child, visit);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                walk_value(item, visit);
            }
        }
        _ => {}
    }
}

/// A JSON object with a string `type` member is treated as a node.
pub fn looks_like_node(value: &Value) -> bool {
    value
        .as_object()
        .and_then(|m| m.get("type"))
        .map(Value::is_string)
        .unwrap_or(false)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ApSection {
    #[serde(default)]
    pub handlers: Vec<ApHandlerDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ApHandlerDefinition {
    pub id: String,
    pub handler: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#match: Option<Value>,
    #[serde(skip)]
    pub source: Provenance,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DataSection {
    #[serde(default)]
    pub collections: BTreeMap<String, CollectionDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CollectionDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
    #[schemars(with = "BTreeMap<String, Value>")]
    pub schema: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indexes: Vec<Value>,
    #[serde(skip)]
    pub source: Provenance,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StorageSection {
    #[serde(default)]
    pub buckets: BTreeMap<String, BucketDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BucketDefinition {
    pub base_path: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_mime: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size_mb: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
    #[serde(skip)]
    pub source: Provenance,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ui_node_round_trips_type_field() {
        let node: UiNode = serde_json::from_value(json!({
            "type": "Column",
            "children": [{"type": "Text", "props": {"text": "hi"}}]
        }))
        .unwrap();
        assert_eq!(node.kind, "Column");
        assert_eq!(node.children[0].prop("text"), Some(&json!("hi")));
    }

    #[test]
    fn walk_visits_nested_prop_nodes() {
        let node: UiNode = serde_json::from_value(json!({
            "type": "If",
            "props": {
                "when": true,
                "then": {"type": "Button", "props": {"action": "action.send_dm"}}
            },
            "children": [{"type": "Button", "props": {"action": "action.edit_profile"}}]
        }))
        .unwrap();

        let mut actions = Vec::new();
        node.walk(&mut |props| {
            if let Some(Value::String(a)) = props.get("action") {
                actions.push(a.clone());
            }
        });
        actions.sort();
        assert_eq!(actions, vec!["action.edit_profile", "action.send_dm"]);
    }

    #[test]
    fn state_defaults_fall_back_to_type_empty_value() {
        let field = StateField { kind: StateType::Number, default: None };
        assert_eq!(field.initial_value(), json!(0));
        let field = StateField { kind: StateType::String, default: Some(json!("x")) };
        assert_eq!(field.initial_value(), json!("x"));
    }

    #[test]
    fn schema_mentions_sections() {
        let schema = AppManifest::json_schema();
        let text = schema.to_string();
        assert!(text.contains("routes"));
        assert!(text.contains("collections"));
    }
}
