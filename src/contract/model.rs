//! UI reachability contract document.

use jsonschema::{Draft, JSONSchema};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// `{schema_version, screens[], actions[]}`. Advisory only; never merged
/// into the manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UiContract {
    #[serde(default)]
    pub schema_version: Option<String>,
    #[serde(default)]
    pub screens: Vec<ContractScreen>,
    #[serde(default)]
    pub actions: Vec<ContractAction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractScreen {
    pub id: String,
    #[serde(default)]
    pub routes: Vec<String>,
    /// Signed so negative values can be reported instead of rejected.
    #[serde(default)]
    pub steps_from_home: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractAction {
    pub id: String,
    #[serde(default)]
    pub available_on: Vec<String>,
    #[serde(default)]
    pub max_steps_from_home: Option<i64>,
}

/// Screens every contract must list.
pub const REQUIRED_SCREENS: &[&str] = &[
    "screen.home",
    "screen.onboarding",
    "screen.profile",
    "screen.profile_edit",
    "screen.settings",
    "screen.notifications",
    "screen.user_profile",
    "screen.dm_list",
    "screen.dm_thread",
];

/// Actions every contract must list.
pub const REQUIRED_ACTIONS: &[&str] = &[
    "action.open_composer",
    "action.send_post",
    "action.open_notifications",
    "action.open_dm_thread",
    "action.send_dm",
    "action.edit_profile",
];

/// A hard requirement for one named action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionRule {
    pub action: &'static str,
    /// Screen the action must be available on.
    pub host_screen: &'static str,
    pub max_steps: i64,
}

pub const ACTION_RULES: &[ActionRule] = &[
    ActionRule {
        action: "action.open_composer",
        host_screen: "screen.home",
        max_steps: 1,
    },
    ActionRule {
        action: "action.open_notifications",
        host_screen: "screen.home",
        max_steps: 1,
    },
    ActionRule {
        action: "action.open_dm_thread",
        host_screen: "screen.dm_list",
        max_steps: 2,
    },
    ActionRule {
        action: "action.send_dm",
        host_screen: "screen.dm_thread",
        max_steps: 3,
    },
    ActionRule {
        action: "action.edit_profile",
        host_screen: "screen.profile",
        max_steps: 2,
    },
];

fn shape_schema() -> Value {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "object",
        "required": ["screens", "actions"],
        "properties": {
            "schema_version": {"type": "string"},
            "screens": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["id", "routes", "steps_from_home"],
                    "properties": {
                        "id": {"type": "string"},
                        "routes": {"type": "array", "items": {"type": "string"}},
                        "steps_from_home": {"type": "integer"}
                    }
                }
            },
            "actions": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["id", "available_on", "max_steps_from_home"],
                    "properties": {
                        "id": {"type": "string"},
                        "available_on": {"type": "array", "items": {"type": "string"}},
                        "max_steps_from_home": {"type": "integer"}
                    }
                }
            }
        }
    })
}

static SHAPE: Lazy<Option<JSONSchema>> = Lazy::new(|| {
    JSONSchema::options()
        .with_draft(Draft::Draft7)
        .compile(&shape_schema())
        .map_err(|e| tracing::error!(error = %e, "failed to compile ui contract schema"))
        .ok()
});

/// Shape errors as `(instance path, message)` pairs. Empty when the document
/// matches.
pub fn shape_errors(doc: &Value) -> Vec<(String, String)> {
    let Some(schema) = SHAPE.as_ref() else {
        return Vec::new();
    };
    match schema.validate(doc) {
        Ok(()) => Vec::new(),
        Err(errors) => errors
            .map(|e| (e.instance_path.to_string(), e.to_string()))
            .collect(),
    }
}
