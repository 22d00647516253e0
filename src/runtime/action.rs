//! Action DSL: declarative side effects attached to UI nodes.
//!
//! Any handler position (`action`, `onSuccess`, `onConfirm`, ...) accepts
//! - a JSON array, run as an implicit sequence,
//! - a single action object identified by its `type`,
//! - a string naming a host-registered action,
//! - or, from Rust, a plain callback.
//!
//! All four normalize to [`Handler`]. Values inside actions stay unresolved
//! until dispatch so they see the current state and payload.

use futures::future::BoxFuture;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

use super::error::RuntimeError;

/// Host callback: receives the payload, optionally yields a result that
/// becomes the next payload in a sequence.
pub type ActionCallback =
    Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Option<Value>, RuntimeError>> + Send + Sync>;

#[derive(Clone)]
pub enum Handler {
    Sequence(Vec<Handler>),
    Action(Box<Action>),
    Named(String),
    Callback(ActionCallback),
}

impl Handler {
    /// Normalize a JSON handler value. Never fails: malformed configs become
    /// [`Action::Unknown`], which is logged and skipped at dispatch.
    pub fn from_value(value: &Value) -> Handler {
        match value {
            Value::Array(items) => Handler::Sequence(items.iter().map(Handler::from_value).collect()),
            Value::String(name) => Handler::Named(name.clone()),
            Value::Object(map) => Handler::Action(Box::new(Action::from_map(map))),
            other => Handler::Action(Box::new(Action::Unknown {
                kind: super::expr::stringify(other),
            })),
        }
    }

    pub fn callback<F, Fut>(f: F) -> Handler
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<Option<Value>, RuntimeError>> + Send + 'static,
    {
        Handler::Callback(Arc::new(
            move |payload| -> BoxFuture<'static, Result<Option<Value>, RuntimeError>> { Box::pin(f(payload)) },
        ))
    }
}

impl From<Action> for Handler {
    fn from(action: Action) -> Self {
        Handler::Action(Box::new(action))
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handler::Sequence(steps) => f.debug_tuple("Sequence").field(steps).finish(),
            Handler::Action(action) => f.debug_tuple("Action").field(action).finish(),
            Handler::Named(name) => f.debug_tuple("Named").field(name).finish(),
            Handler::Callback(_) => f.write_str("Callback(..)"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToastVariant {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

impl ToastVariant {
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "success" => ToastVariant::Success,
            "warning" | "warn" => ToastVariant::Warning,
            "error" | "danger" => ToastVariant::Error,
            _ => ToastVariant::Info,
        }
    }
}

/// Which refetchers a `refresh` targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshTargets {
    All,
    Only(Vec<String>),
}

impl RefreshTargets {
    /// `true` → all, `"id"` → one, `["a", "b"]` → several.
    fn from_value(value: &Value) -> Option<RefreshTargets> {
        match value {
            Value::Bool(true) => Some(RefreshTargets::All),
            Value::String(id) => Some(RefreshTargets::Only(vec![id.clone()])),
            Value::Array(ids) => Some(RefreshTargets::Only(
                ids.iter().filter_map(|v| v.as_str().map(str::to_string)).collect(),
            )),
            _ => None,
        }
    }

    pub fn as_slice(&self) -> Option<&[String]> {
        match self {
            RefreshTargets::All => None,
            RefreshTargets::Only(ids) => Some(ids),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiAction {
    pub endpoint: Value,
    pub method: Value,
    pub query: Option<Value>,
    pub body: Option<Value>,
    pub headers: Option<Value>,
    pub on_success: Option<Handler>,
    pub on_error: Option<Handler>,
    pub refresh: Option<RefreshTargets>,
}

#[derive(Debug, Clone)]
pub enum Action {
    SetState { key: String, value: Value },
    Navigate { to: Value, replace: bool },
    Api(ApiAction),
    Refresh { targets: RefreshTargets },
    Sequence(Vec<Handler>),
    /// Host-registered action by name, with an optional payload override.
    Named { name: String, payload: Option<Value> },
    Toast { message: Value, variant: ToastVariant },
    Confirm {
        message: Value,
        on_confirm: Option<Handler>,
        on_cancel: Option<Handler>,
    },
    /// Unrecognized `type`; logged and skipped.
    Unknown { kind: String },
}

/// First present key among camelCase/snake_case spellings.
fn field<'a>(map: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names.iter().find_map(|n| map.get(*n)).filter(|v| !v.is_null())
}

fn handler_field(map: &Map<String, Value>, names: &[&str]) -> Option<Handler> {
    field(map, names).map(Handler::from_value)
}

impl Action {
    pub fn from_map(map: &Map<String, Value>) -> Action {
        let kind = map.get("type").and_then(Value::as_str).unwrap_or_default();
        match kind {
            "setState" | "set_state" => match field(map, &["key", "path"]).and_then(Value::as_str) {
                Some(key) => Action::SetState {
                    key: key.to_string(),
                    value: map.get("value").cloned().unwrap_or(Value::Null),
                },
                None => Action::Unknown {
                    kind: "setState without key".to_string(),
                },
            },
            "navigate" => Action::Navigate {
                to: field(map, &["to", "path"]).cloned().unwrap_or(Value::Null),
                replace: map.get("replace").and_then(Value::as_bool).unwrap_or(false),
            },
            "api" => Action::Api(ApiAction {
                endpoint: field(map, &["endpoint", "url"]).cloned().unwrap_or(Value::Null),
                method: map.get("method").cloned().unwrap_or(Value::Null),
                query: field(map, &["query", "params"]).cloned(),
                body: field(map, &["body", "data"]).cloned(),
                headers: map.get("headers").cloned(),
                on_success: handler_field(map, &["onSuccess", "on_success"]),
                on_error: handler_field(map, &["onError", "on_error"]),
                refresh: map.get("refresh").and_then(RefreshTargets::from_value),
            }),
            "refresh" => Action::Refresh {
                targets: field(map, &["targets", "target", "ids"])
                    .and_then(RefreshTargets::from_value)
                    .unwrap_or(RefreshTargets::All),
            },
            "sequence" => Action::Sequence(
                field(map, &["steps", "actions"])
                    .and_then(Value::as_array)
                    .map(|steps| steps.iter().map(Handler::from_value).collect())
                    .unwrap_or_default(),
            ),
            "action" => match field(map, &["name", "action"]).and_then(Value::as_str) {
                Some(name) => Action::Named {
                    name: name.to_string(),
                    payload: map.get("payload").cloned(),
                },
                None => Action::Unknown {
                    kind: "action without name".to_string(),
                },
            },
            "toast" => Action::Toast {
                message: map.get("message").cloned().unwrap_or(Value::Null),
                variant: field(map, &["variant", "kind", "level"])
                    .and_then(Value::as_str)
                    .map(ToastVariant::parse)
                    .unwrap_or_default(),
            },
            "confirm" => Action::Confirm {
                message: map.get("message").cloned().unwrap_or(Value::Null),
                on_confirm: handler_field(map, &["onConfirm", "on_confirm", "then"]),
                on_cancel: handler_field(map, &["onCancel", "on_cancel", "else"]),
            },
            other => Action::Unknown {
                kind: other.to_string(),
            },
        }
    }
}
