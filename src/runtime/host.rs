//! Host collaborators consumed by the runtime.

use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex};

use super::action::ToastVariant;
use super::error::RuntimeError;
use super::expr::stringify;
use crate::manifest::HttpMethod;

#[async_trait]
pub trait Navigator: Send + Sync {
    async fn navigate(&self, path: &str, replace: bool);
}

pub trait ToastSink: Send + Sync {
    fn toast(&self, message: &str, variant: ToastVariant);
}

#[async_trait]
pub trait ConfirmPrompt: Send + Sync {
    async fn confirm(&self, message: &str) -> bool;
}

/// HTTP client used by the `api` action. Returns the decoded response body
/// (`Null` for empty bodies).
#[async_trait]
pub trait ApiClient: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<Value, RuntimeError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: HttpMethod,
    pub endpoint: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: ApiBody,
    pub bearer_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum ApiBody {
    #[default]
    Empty,
    Json(Value),
    Multipart(Vec<MultipartField>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum MultipartField {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        content_type: Option<String>,
        data: Bytes,
    },
}

/// Key marking a file-like value: `{"$file": {name, content_type?, data}}`
/// with base64 `data`.
pub const FILE_MARKER: &str = "$file";

pub fn is_file_like(value: &Value) -> bool {
    value.get(FILE_MARKER).map(Value::is_object).unwrap_or(false)
}

/// Build the request body. Objects containing a file-like member switch to
/// multipart; everything else is sent as JSON.
pub fn build_body(body: Option<Value>) -> Result<ApiBody, RuntimeError> {
    let Some(body) = body.filter(|b| !b.is_null()) else {
        return Ok(ApiBody::Empty);
    };
    let Value::Object(map) = &body else {
        return Ok(ApiBody::Json(body));
    };
    let has_file = map
        .values()
        .any(|v| is_file_like(v) || v.as_array().map(|a| a.iter().any(is_file_like)).unwrap_or(false));
    if !has_file {
        return Ok(ApiBody::Json(body));
    }

    let mut fields = Vec::new();
    for (name, value) in map {
        match value {
            Value::Array(items) if items.iter().any(is_file_like) => {
                for item in items {
                    fields.push(multipart_field(name, item)?);
                }
            }
            other => fields.push(multipart_field(name, other)?),
        }
    }
    Ok(ApiBody::Multipart(fields))
}

fn multipart_field(name: &str, value: &Value) -> Result<MultipartField, RuntimeError> {
    let Some(file) = value.get(FILE_MARKER).and_then(Value::as_object) else {
        let value = match value {
            Value::Object(_) | Value::Array(_) => value.to_string(),
            other => stringify(other),
        };
        return Ok(MultipartField::Text {
            name: name.to_string(),
            value,
        });
    };
    decode_file(name, file)
}

fn decode_file(field: &str, file: &Map<String, Value>) -> Result<MultipartField, RuntimeError> {
    let invalid = |reason: &str| RuntimeError::InvalidFile {
        field: field.to_string(),
        reason: reason.to_string(),
    };
    let encoded = file
        .get("data")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid("missing base64 'data'"))?;
    // Accept data URLs as produced by browser file readers.
    let encoded = match encoded.split_once(";base64,") {
        Some((_, rest)) => rest,
        None => encoded,
    };
    let data = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| invalid(&e.to_string()))?;

    Ok(MultipartField::File {
        name: field.to_string(),
        file_name: file
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or(field)
            .to_string(),
        content_type: file
            .get("content_type")
            .or_else(|| file.get("contentType"))
            .and_then(Value::as_str)
            .map(str::to_string),
        data: Bytes::from(data),
    })
}

/// Flatten a resolved `query`/`headers` object into string pairs. `null`
/// values are dropped.
pub fn string_pairs(value: Option<&Value>) -> Vec<(String, String)> {
    value
        .and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), stringify(v)))
                .collect()
        })
        .unwrap_or_default()
}

/// Navigator that records calls. Useful for tests and headless hosts.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    pub calls: Mutex<Vec<(String, bool)>>,
}

#[async_trait]
impl Navigator for RecordingNavigator {
    async fn navigate(&self, path: &str, replace: bool) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((path.to_string(), replace));
        }
    }
}

/// Navigator that only logs. Default for hosts without routing.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNavigator;

#[async_trait]
impl Navigator for LogNavigator {
    async fn navigate(&self, path: &str, replace: bool) {
        tracing::info!(path = %path, replace, "navigate");
    }
}

/// Toast sink that records messages.
#[derive(Debug, Default)]
pub struct RecordingToasts {
    pub messages: Mutex<Vec<(String, ToastVariant)>>,
}

impl ToastSink for RecordingToasts {
    fn toast(&self, message: &str, variant: ToastVariant) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push((message.to_string(), variant));
        }
    }
}

/// Toast sink that forwards to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogToasts;

impl ToastSink for LogToasts {
    fn toast(&self, message: &str, variant: ToastVariant) {
        match variant {
            ToastVariant::Error => tracing::error!(toast = %message),
            ToastVariant::Warning => tracing::warn!(toast = %message),
            _ => tracing::info!(toast = %message),
        }
    }
}

/// Confirm prompt with a fixed answer.
#[derive(Debug, Clone, Copy)]
pub struct FixedConfirm(pub bool);

#[async_trait]
impl ConfirmPrompt for FixedConfirm {
    async fn confirm(&self, _message: &str) -> bool {
        self.0
    }
}

/// Everything the runtime calls out to.
#[derive(Clone)]
pub struct HostBridges {
    pub navigator: Arc<dyn Navigator>,
    pub toasts: Arc<dyn ToastSink>,
    pub confirm: Arc<dyn ConfirmPrompt>,
    pub api: Option<Arc<dyn ApiClient>>,
}

impl Default for HostBridges {
    fn default() -> Self {
        Self {
            navigator: Arc::new(LogNavigator),
            toasts: Arc::new(LogToasts),
            confirm: Arc::new(FixedConfirm(false)),
            api: None,
        }
    }
}
