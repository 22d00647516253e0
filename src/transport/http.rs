use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Method, Proxy, StatusCode};
use serde_json::Value;
use std::env;
use std::time::Duration;
use url::Url;

use crate::manifest::HttpMethod;
use crate::runtime::{ApiBody, ApiClient, ApiRequest, MultipartField, RuntimeError};

/// reqwest-backed client for the `api` action.
///
/// Relative endpoints are joined onto the base URL (`APP_API_BASE_URL`);
/// absolute endpoints are used as-is.
#[derive(Debug, Clone)]
pub struct ReqwestApiClient {
    client: reqwest::Client,
    base_url: Option<Url>,
}

impl ReqwestApiClient {
    /// Build from the environment: `APP_API_BASE_URL`, `APP_HTTP_TIMEOUT_SECS`
    /// (default 30) and `APP_PROXY_URL`.
    pub fn from_env() -> Result<Self, TransportError> {
        let base_url = env::var("APP_API_BASE_URL").ok().filter(|s| !s.trim().is_empty());
        Self::new(base_url.as_deref())
    }

    pub fn new(base_url: Option<&str>) -> Result<Self, TransportError> {
        let timeout_secs = env::var("APP_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(30);

        let mut builder = reqwest::Client::builder().timeout(Duration::from_secs(timeout_secs));

        if let Ok(proxy_url) = env::var("APP_PROXY_URL") {
            match Proxy::all(&proxy_url) {
                Ok(proxy) => builder = builder.proxy(proxy),
                Err(e) => tracing::warn!(proxy = %proxy_url, error = %e, "ignoring invalid proxy url"),
            }
        }

        let client = builder.build()?;
        let base_url = base_url.map(parse_base).transpose()?;
        Ok(Self { client, base_url })
    }

    /// Use a preconfigured `reqwest::Client`.
    pub fn with_client(client: reqwest::Client, base_url: Option<&str>) -> Result<Self, TransportError> {
        Ok(Self {
            client,
            base_url: base_url.map(parse_base).transpose()?,
        })
    }

    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    fn resolve(&self, endpoint: &str) -> Result<Url, TransportError> {
        if let Ok(url) = Url::parse(endpoint) {
            return Ok(url);
        }
        let base = self
            .base_url
            .as_ref()
            .ok_or_else(|| TransportError::Other(format!("relative endpoint '{}' without base url", endpoint)))?;
        Ok(base.join(endpoint.trim_start_matches('/'))?)
    }

    async fn execute(&self, request: ApiRequest) -> Result<Value, TransportError> {
        let url = self.resolve(&request.endpoint)?;
        let mut req = self.client.request(to_method(request.method), url);

        if let Some(token) = &request.bearer_token {
            req = req.bearer_auth(token);
        }
        for (k, v) in &request.headers {
            req = req.header(k.as_str(), v.as_str());
        }
        if !request.query.is_empty() {
            req = req.query(&request.query);
        }

        req = match request.body {
            ApiBody::Empty => req,
            ApiBody::Json(body) => req.json(&body),
            ApiBody::Multipart(fields) => req.multipart(build_form(fields)?),
        };

        let response = req.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(TransportError::Status {
                status,
                message: error_message(&text).unwrap_or_else(|| status.to_string()),
            });
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        // Non-JSON success bodies are passed through as a string.
        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }
}

#[async_trait]
impl ApiClient for ReqwestApiClient {
    async fn send(&self, request: ApiRequest) -> Result<Value, RuntimeError> {
        self.execute(request).await.map_err(RuntimeError::from)
    }
}

fn parse_base(raw: &str) -> Result<Url, TransportError> {
    // Without a trailing slash `join` would replace the last path segment.
    let raw = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{}/", raw)
    };
    Ok(Url::parse(&raw)?)
}

fn to_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
    }
}

fn build_form(fields: Vec<MultipartField>) -> Result<Form, TransportError> {
    let mut form = Form::new();
    for field in fields {
        form = match field {
            MultipartField::Text { name, value } => form.text(name, value),
            MultipartField::File {
                name,
                file_name,
                content_type,
                data,
            } => {
                let mut part = Part::bytes(data.to_vec()).file_name(file_name);
                if let Some(mime) = content_type {
                    part = part.mime_str(&mime)?;
                }
                form.part(name, part)
            }
        };
    }
    Ok(form)
}

/// `message` or `error` (string or `{message}`) from a JSON error body.
fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let pick = |v: &Value| -> Option<String> {
        match v {
            Value::String(s) => Some(s.clone()),
            Value::Object(o) => o.get("message").and_then(Value::as_str).map(str::to_string),
            _ => None,
        }
    };
    value
        .get("message")
        .and_then(pick)
        .or_else(|| value.get("error").and_then(pick))
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("HTTP {status}: {message}")]
    Status { status: StatusCode, message: String },

    #[error("Transport error: {0}")]
    Other(String),
}

impl TransportError {
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(status.as_u16()),
            TransportError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

impl From<TransportError> for RuntimeError {
    fn from(e: TransportError) -> Self {
        let status = e.status();
        let message = match e {
            TransportError::Status { message, .. } => message,
            other => other.to_string(),
        };
        RuntimeError::Api { status, message }
    }
}
