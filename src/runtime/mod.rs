//! UI runtime interpreter.
//!
//! # UI Runtime
//!
//! Mounts a declared screen, seeds its state from the declared defaults,
//! renders its layout through a registry of component renderers and executes
//! the declarative action DSL attached to nodes. Side effects leave the
//! runtime through host bridges (navigation, toasts, confirmation, HTTP).
//!
//! ## Module Structure
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`action`] | Action DSL and handler normalization |
//! | [`component`] | Renderer registry, render context and built-in structural components |
//! | [`condition`] | Boolean condition language |
//! | [`error`] | Action execution errors |
//! | [`expr`] | Template and reference resolution |
//! | [`host`] | Host bridge traits and request body building |
//! | [`refresh`] | Named refetch hooks |
//! | [`scope`] | Expression scope |
//! | [`screen`] | Screen lifecycle and action dispatch |
//! | [`state`] | Reactive state store |
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use app_manifest::manifest::ManifestLoader;
//! use app_manifest::runtime::{Handler, ScreenRuntime};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let result = ManifestLoader::new(".").load().await;
//!     let manifest = Arc::new(result.manifest.ok_or("manifest rejected")?);
//!
//!     let screen = ScreenRuntime::builder(manifest, "screen.home").build()?;
//!     screen.initialize()?;
//!     let tree = screen.render()?;
//!     println!("{}", tree.text_content());
//!
//!     let bump = Handler::from_value(&json!({"type": "setState", "key": "count", "value": 2}));
//!     screen.dispatch(&bump, json!(null)).await;
//!     Ok(())
//! }
//! ```

pub mod action;
pub mod component;
pub mod condition;
pub mod error;
pub mod expr;
pub mod host;
pub mod refresh;
pub mod scope;
pub mod screen;
pub mod state;

pub use action::{Action, ActionCallback, ApiAction, Handler, RefreshTargets, ToastVariant};
pub use component::{
    ComponentRegistry, ComponentRegistryBuilder, ComponentRenderer, ElementRenderer, RenderContext,
    RenderedNode,
};
pub use condition::{evaluate_condition, is_truthy};
pub use error::RuntimeError;
pub use expr::{resolve_reference, resolve_string, resolve_value, stringify, ResolveMode};
pub use host::{
    ApiBody, ApiClient, ApiRequest, ConfirmPrompt, FixedConfirm, HostBridges, LogNavigator,
    LogToasts, MultipartField, Navigator, RecordingNavigator, RecordingToasts, ToastSink, FILE_MARKER,
};
pub use refresh::{RefreshRegistry, Refetcher};
pub use scope::Scope;
pub use screen::{ScreenPhase, ScreenRuntime, ScreenRuntimeBuilder};
pub use state::StateStore;
