//! Mounted screen instance: lifecycle, state, rendering and action dispatch.
//!
//! Lifecycle: `Idle → Initialized → Rendering → Unmounted`. Unmounting is
//! terminal. Actions still in flight when the screen unmounts (an `api`
//! call awaiting its response, for example) keep running, but their state
//! writes and navigations are dropped.

use async_recursion::async_recursion;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tracing::Instrument;
use uuid::Uuid;

use super::action::{Action, ApiAction, Handler, ToastVariant};
use super::component::{ComponentRegistry, RenderContext, RenderedNode};
use super::error::RuntimeError;
use super::expr::{resolve_string, resolve_value, stringify, ResolveMode};
use super::host::{build_body, string_pairs, ApiClient, ApiRequest, ConfirmPrompt, HostBridges, Navigator, ToastSink};
use super::refresh::RefreshRegistry;
use super::scope::Scope;
use super::state::StateStore;
use crate::manifest::{AppManifest, HttpMethod, StateField, UiNode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenPhase {
    Idle,
    Initialized,
    Rendering,
    Unmounted,
}

impl fmt::Display for ScreenPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScreenPhase::Idle => "idle",
            ScreenPhase::Initialized => "initialized",
            ScreenPhase::Rendering => "rendering",
            ScreenPhase::Unmounted => "unmounted",
        };
        f.write_str(name)
    }
}

pub struct ScreenRuntimeBuilder {
    manifest: Arc<AppManifest>,
    screen_id: String,
    params: Map<String, Value>,
    auth: Value,
    host: HostBridges,
    named: HashMap<String, Handler>,
    components: Option<ComponentRegistry>,
}

impl ScreenRuntimeBuilder {
    /// Route parameters captured by the router.
    pub fn params(mut self, params: BTreeMap<String, String>) -> Self {
        self.params = params.into_iter().map(|(k, v)| (k, Value::String(v))).collect();
        self
    }

    /// Identity snapshot. `auth.token` is sent as bearer token by `api`
    /// actions; `auth.user` marks the session as logged in.
    pub fn auth(mut self, auth: Value) -> Self {
        self.auth = auth;
        self
    }

    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.host.navigator = navigator;
        self
    }

    pub fn toasts(mut self, toasts: Arc<dyn ToastSink>) -> Self {
        self.host.toasts = toasts;
        self
    }

    pub fn confirm(mut self, confirm: Arc<dyn ConfirmPrompt>) -> Self {
        self.host.confirm = confirm;
        self
    }

    pub fn api_client(mut self, api: Arc<dyn ApiClient>) -> Self {
        self.host.api = Some(api);
        self
    }

    /// Register a named action, reachable from `"name"` handler strings and
    /// `{"type": "action", "name": ...}` configs.
    pub fn named_action(mut self, name: impl Into<String>, handler: Handler) -> Self {
        self.named.insert(name.into(), handler);
        self
    }

    pub fn components(mut self, components: ComponentRegistry) -> Self {
        self.components = Some(components);
        self
    }

    pub fn build(self) -> Result<ScreenRuntime, RuntimeError> {
        let screen = self
            .manifest
            .screen(&self.screen_id)
            .ok_or_else(|| RuntimeError::ScreenNotFound(self.screen_id.clone()))?;

        let mut slots: BTreeMap<String, Vec<UiNode>> = BTreeMap::new();
        for insert in self.manifest.inserts_for(&self.screen_id) {
            slots
                .entry(insert.position.clone())
                .or_default()
                .push(insert.node.clone());
        }

        let inner = ScreenInner {
            instance_id: Uuid::new_v4(),
            screen_id: self.screen_id.clone(),
            layout: screen.layout.clone(),
            declared_state: screen.state.clone(),
            slots,
            phase: Mutex::new(ScreenPhase::Idle),
            active: AtomicBool::new(true),
            state: StateStore::new(Value::Object(Map::new())),
            data: RwLock::new(Map::new()),
            params: self.params,
            auth: self.auth,
            refreshers: RefreshRegistry::new(),
            host: self.host,
            named: self.named,
            components: self.components.unwrap_or_default(),
        };
        tracing::debug!(screen = %inner.screen_id, instance = %inner.instance_id, "screen runtime created");
        Ok(ScreenRuntime {
            inner: Arc::new(inner),
        })
    }
}

struct ScreenInner {
    instance_id: Uuid,
    screen_id: String,
    layout: UiNode,
    declared_state: BTreeMap<String, StateField>,
    slots: BTreeMap<String, Vec<UiNode>>,
    phase: Mutex<ScreenPhase>,
    active: AtomicBool,
    state: StateStore,
    data: RwLock<Map<String, Value>>,
    params: Map<String, Value>,
    auth: Value,
    refreshers: RefreshRegistry,
    host: HostBridges,
    named: HashMap<String, Handler>,
    components: ComponentRegistry,
}

/// One mounted screen. Cheap to clone; clones share the same instance.
#[derive(Clone)]
pub struct ScreenRuntime {
    inner: Arc<ScreenInner>,
}

impl ScreenRuntime {
    pub fn builder(manifest: Arc<AppManifest>, screen_id: impl Into<String>) -> ScreenRuntimeBuilder {
        ScreenRuntimeBuilder {
            manifest,
            screen_id: screen_id.into(),
            params: Map::new(),
            auth: Value::Null,
            host: HostBridges::default(),
            named: HashMap::new(),
            components: None,
        }
    }

    pub fn instance_id(&self) -> Uuid {
        self.inner.instance_id
    }

    pub fn screen_id(&self) -> &str {
        &self.inner.screen_id
    }

    pub fn phase(&self) -> ScreenPhase {
        self.inner
            .phase
            .lock()
            .map(|p| *p)
            .unwrap_or(ScreenPhase::Unmounted)
    }

    /// `false` once the screen has unmounted.
    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> &StateStore {
        &self.inner.state
    }

    pub fn refreshers(&self) -> &RefreshRegistry {
        &self.inner.refreshers
    }

    fn transition(&self, allowed: &[ScreenPhase], to: ScreenPhase) -> Result<(), RuntimeError> {
        let mut phase = self.inner.phase.lock().map_err(|_| RuntimeError::Unmounted {
            instance: self.inner.instance_id.to_string(),
        })?;
        if *phase == ScreenPhase::Unmounted {
            return Err(RuntimeError::Unmounted {
                instance: self.inner.instance_id.to_string(),
            });
        }
        if !allowed.contains(&phase) {
            return Err(RuntimeError::InvalidTransition {
                from: phase.to_string(),
                to: to.to_string(),
            });
        }
        *phase = to;
        Ok(())
    }

    /// `idle → initialized`: seed state from the declared typed defaults.
    pub fn initialize(&self) -> Result<(), RuntimeError> {
        self.transition(&[ScreenPhase::Idle], ScreenPhase::Initialized)?;
        let initial = StateStore::from_declared(&self.inner.declared_state).snapshot();
        self.inner.state.reset(initial);
        tracing::debug!(screen = %self.inner.screen_id, instance = %self.inner.instance_id, "screen initialized");
        Ok(())
    }

    /// Render the screen layout against the current state.
    pub fn render(&self) -> Result<RenderedNode, RuntimeError> {
        self.transition(
            &[ScreenPhase::Initialized, ScreenPhase::Rendering],
            ScreenPhase::Rendering,
        )?;
        let ctx = RenderContext::new(&self.inner.components, &self.inner.slots, self.scope());
        Ok(ctx.render(&self.inner.layout))
    }

    /// Terminal. Idempotent.
    pub fn unmount(&self) {
        if let Ok(mut phase) = self.inner.phase.lock() {
            *phase = ScreenPhase::Unmounted;
        }
        if self.inner.active.swap(false, Ordering::SeqCst) {
            self.inner.refreshers.clear();
            tracing::debug!(screen = %self.inner.screen_id, instance = %self.inner.instance_id, "screen unmounted");
        }
    }

    /// Publish data fetched by a data-bound component under `data.<key>`.
    pub fn set_data(&self, key: impl Into<String>, value: Value) {
        if !self.is_active() {
            return;
        }
        if let Ok(mut data) = self.inner.data.write() {
            data.insert(key.into(), value);
        }
    }

    /// Current scope: `state`, `form` (the `state.form` object), `data`,
    /// `auth` and `params`.
    pub fn scope(&self) -> Scope {
        let state = self.inner.state.snapshot();
        let form = state.get("form").cloned().unwrap_or_else(|| json!({}));
        let data = self
            .inner
            .data
            .read()
            .map(|d| Value::Object(d.clone()))
            .unwrap_or(Value::Null);
        Scope::new()
            .with("state", state)
            .with("form", form)
            .with("data", data)
            .with("auth", self.inner.auth.clone())
            .with("params", Value::Object(self.inner.params.clone()))
    }

    /// `base` with live state and the given payload.
    fn scope_for(&self, base: &Scope, payload: Value) -> Scope {
        let state = self.inner.state.snapshot();
        let form = state.get("form").cloned().unwrap_or_else(|| json!({}));
        base.with("state", state)
            .with("form", form)
            .with("payload", payload)
    }

    /// Fire-and-forget refresh of the selected refetchers (`None` = all).
    pub fn refresh(&self, targets: Option<&[String]>) -> usize {
        self.inner.refreshers.refresh(targets)
    }

    pub async fn refresh_and_wait(&self, targets: Option<&[String]>) -> usize {
        self.inner.refreshers.refresh_and_wait(targets).await
    }

    /// Run `handler` in the screen scope. Errors are contained here: they are
    /// logged and shown as an error toast, and `None` is returned.
    pub async fn dispatch(&self, handler: &Handler, payload: Value) -> Option<Value> {
        let scope = self.scope();
        self.dispatch_in(handler, payload, &scope).await
    }

    /// Run `handler` in an explicit scope (e.g. an item scope captured at
    /// render time).
    pub async fn dispatch_in(&self, handler: &Handler, payload: Value, scope: &Scope) -> Option<Value> {
        if !self.is_active() {
            tracing::warn!(screen = %self.inner.screen_id, "dispatch on unmounted screen ignored");
            return None;
        }
        let span = tracing::debug_span!(
            "action",
            screen = %self.inner.screen_id,
            instance = %self.inner.instance_id
        );
        match self.execute(handler, payload, scope, &[]).instrument(span).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(screen = %self.inner.screen_id, error = %e, "action failed");
                self.inner.host.toasts.toast(&e.to_string(), ToastVariant::Error);
                None
            }
        }
    }

    /// Fire the handler stored under `event` on a rendered element, in the
    /// scope the element was rendered in.
    pub async fn handle_event(&self, element: &RenderedNode, event: &str, payload: Value) -> Option<Value> {
        let RenderedNode::Element { props, scope, .. } = element else {
            return None;
        };
        let handler = Handler::from_value(props.get(event)?);
        self.dispatch_in(&handler, payload, scope).await
    }

    /// `chain` holds the named actions currently being expanded; entering
    /// one of them again is a cycle and fails the invocation.
    #[async_recursion]
    async fn execute(
        &self,
        handler: &Handler,
        payload: Value,
        base: &Scope,
        chain: &[String],
    ) -> Result<Option<Value>, RuntimeError> {
        match handler {
            Handler::Sequence(steps) => self.run_sequence(steps, payload, base, chain).await,
            Handler::Action(action) => self.run_action(action, payload, base, chain).await,
            Handler::Named(name) => {
                if chain.contains(name) {
                    return Err(RuntimeError::invalid_action(format!(
                        "named action cycle: {} -> {}",
                        chain.join(" -> "),
                        name
                    )));
                }
                let handler = self
                    .inner
                    .named
                    .get(name)
                    .cloned()
                    .ok_or_else(|| RuntimeError::UnknownNamedAction(name.clone()))?;
                let mut chain = chain.to_vec();
                chain.push(name.clone());
                self.execute(&handler, payload, base, &chain).await
            }
            Handler::Callback(callback) => callback(payload).await,
        }
    }

    /// Each step's defined result becomes the next step's payload.
    async fn run_sequence(
        &self,
        steps: &[Handler],
        payload: Value,
        base: &Scope,
        chain: &[String],
    ) -> Result<Option<Value>, RuntimeError> {
        let mut current = payload;
        let mut last = None;
        for step in steps {
            if let Some(result) = self.execute(step, current.clone(), base, chain).await? {
                current = result.clone();
                last = Some(result);
            }
        }
        Ok(last)
    }

    async fn run_action(
        &self,
        action: &Action,
        payload: Value,
        base: &Scope,
        chain: &[String],
    ) -> Result<Option<Value>, RuntimeError> {
        match action {
            Action::SetState { key, value } => {
                let scope = self.scope_for(base, payload);
                let key = stringify(&resolve_string(key, &scope));
                let value = resolve_value(value, &scope, ResolveMode::Deep);
                if !self.is_active() {
                    tracing::debug!(key = %key, "state write after unmount dropped");
                    return Ok(None);
                }
                self.inner.state.set(&key, value)?;
                Ok(None)
            }
            Action::Navigate { to, replace } => {
                let scope = self.scope_for(base, payload);
                let path = stringify(&resolve_value(to, &scope, ResolveMode::Deep));
                if path.is_empty() {
                    return Err(RuntimeError::invalid_action("navigate without a target"));
                }
                if !self.is_active() {
                    tracing::debug!(path = %path, "navigation after unmount dropped");
                    return Ok(None);
                }
                self.inner.host.navigator.navigate(&path, *replace).await;
                Ok(None)
            }
            Action::Api(api) => self.run_api(api, payload, base, chain).await,
            Action::Refresh { targets } => {
                self.refresh(targets.as_slice());
                Ok(None)
            }
            Action::Sequence(steps) => self.run_sequence(steps, payload, base, chain).await,
            Action::Named {
                name,
                payload: override_payload,
            } => {
                let payload = match override_payload {
                    Some(p) => resolve_value(p, &self.scope_for(base, payload), ResolveMode::Deep),
                    None => payload,
                };
                let named = Handler::Named(name.clone());
                self.execute(&named, payload, base, chain).await
            }
            Action::Toast { message, variant } => {
                let scope = self.scope_for(base, payload);
                let message = stringify(&resolve_value(message, &scope, ResolveMode::Deep));
                self.inner.host.toasts.toast(&message, *variant);
                Ok(None)
            }
            Action::Confirm {
                message,
                on_confirm,
                on_cancel,
            } => {
                let scope = self.scope_for(base, payload.clone());
                let message = stringify(&resolve_value(message, &scope, ResolveMode::Deep));
                let confirmed = self.inner.host.confirm.confirm(&message).await;
                let branch = if confirmed { on_confirm } else { on_cancel };
                match branch {
                    Some(handler) => self.execute(handler, payload, base, chain).await,
                    None => Ok(None),
                }
            }
            Action::Unknown { kind } => {
                tracing::warn!(kind = %kind, "unknown action type, skipped");
                Ok(None)
            }
        }
    }

    async fn run_api(
        &self,
        api: &ApiAction,
        payload: Value,
        base: &Scope,
        chain: &[String],
    ) -> Result<Option<Value>, RuntimeError> {
        let scope = self.scope_for(base, payload);
        let resolve = |v: &Value| resolve_value(v, &scope, ResolveMode::Deep);

        let endpoint = stringify(&resolve(&api.endpoint));
        if endpoint.is_empty() {
            return Err(RuntimeError::invalid_action("api action without endpoint"));
        }
        let body = api.body.as_ref().map(resolve);
        let method = match resolve(&api.method) {
            Value::Null => {
                if body.is_some() {
                    HttpMethod::Post
                } else {
                    HttpMethod::Get
                }
            }
            raw => {
                let raw = stringify(&raw);
                HttpMethod::parse(&raw)
                    .ok_or_else(|| RuntimeError::invalid_action(format!("unsupported method '{}'", raw)))?
            }
        };

        let request = ApiRequest {
            method,
            query: string_pairs(api.query.as_ref().map(resolve).as_ref()),
            headers: string_pairs(api.headers.as_ref().map(resolve).as_ref()),
            body: build_body(body)?,
            bearer_token: scope
                .lookup("auth.token")
                .or_else(|| scope.lookup("auth.access_token"))
                .and_then(Value::as_str)
                .filter(|t| !t.is_empty())
                .map(str::to_string),
            endpoint,
        };
        let client = self.inner.host.api.clone().ok_or(RuntimeError::NoApiClient)?;

        tracing::debug!(method = %request.method, endpoint = %request.endpoint, "api action");
        match client.send(request).await {
            Ok(response) => {
                if let Some(targets) = &api.refresh {
                    self.refresh(targets.as_slice());
                }
                match &api.on_success {
                    Some(handler) => {
                        let result = self.execute(handler, response.clone(), base, chain).await?;
                        Ok(result.or(Some(response)))
                    }
                    None => Ok(Some(response)),
                }
            }
            Err(e) => match &api.on_error {
                Some(handler) => {
                    tracing::warn!(error = %e, "api action failed, running error branch");
                    let error = json!({"message": e.to_string(), "status": e.status()});
                    self.execute(handler, error, base, chain).await?;
                    Ok(None)
                }
                None => Err(e),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{ScreenDefinition, StateType};
    use crate::runtime::host::RecordingToasts;

    fn manifest() -> Arc<AppManifest> {
        let mut m = AppManifest::empty("1.0.0");
        let mut state = BTreeMap::new();
        state.insert(
            "count".to_string(),
            StateField {
                kind: StateType::Number,
                default: Some(json!(1)),
            },
        );
        m.views.screens.push(ScreenDefinition {
            id: "screen.counter".into(),
            route: Some("/counter".into()),
            title: None,
            layout: UiNode::new("Text").with_prop("text", json!("count: {{state.count}}")),
            state,
            source: Default::default(),
        });
        Arc::new(m)
    }

    #[test]
    fn lifecycle_is_enforced() {
        let screen = ScreenRuntime::builder(manifest(), "screen.counter").build().unwrap();
        assert_eq!(screen.phase(), ScreenPhase::Idle);
        assert!(matches!(screen.render(), Err(RuntimeError::InvalidTransition { .. })));

        screen.initialize().unwrap();
        assert_eq!(screen.render().unwrap(), RenderedNode::Text("count: 1".into()));
        assert_eq!(screen.phase(), ScreenPhase::Rendering);

        screen.unmount();
        assert!(!screen.is_active());
        assert!(matches!(screen.render(), Err(RuntimeError::Unmounted { .. })));
    }

    #[test]
    fn unknown_screen_is_rejected() {
        assert!(matches!(
            ScreenRuntime::builder(manifest(), "screen.nope").build(),
            Err(RuntimeError::ScreenNotFound(_))
        ));
    }

    #[tokio::test]
    async fn writes_after_unmount_are_dropped() {
        let screen = ScreenRuntime::builder(manifest(), "screen.counter").build().unwrap();
        screen.initialize().unwrap();
        let set = Handler::from_value(&json!({"type": "setState", "key": "count", "value": 5}));
        let scope = screen.scope();

        screen.unmount();
        assert_eq!(screen.dispatch_in(&set, Value::Null, &scope).await, None);
        assert_eq!(screen.state().get("count"), Some(json!(1)));
    }

    #[tokio::test]
    async fn named_action_cycles_are_contained() {
        let toasts = Arc::new(RecordingToasts::default());
        let screen = ScreenRuntime::builder(manifest(), "screen.counter")
            .toasts(toasts.clone())
            .named_action("loop", Handler::Named("loop".into()))
            .named_action("ping", Handler::Named("pong".into()))
            .named_action("pong", Handler::from_value(&json!([{"type": "setState", "key": "count", "value": 2}, "ping"])))
            .build()
            .unwrap();
        screen.initialize().unwrap();

        assert_eq!(screen.dispatch(&Handler::Named("loop".into()), Value::Null).await, None);
        assert_eq!(screen.dispatch(&Handler::Named("ping".into()), Value::Null).await, None);

        let messages = toasts.messages.lock().unwrap().clone();
        assert_eq!(messages.len(), 2);
        assert!(messages.iter().all(|(_, v)| *v == ToastVariant::Error));
        assert!(messages[0].0.contains("loop -> loop"), "{:?}", messages);
        assert!(messages[1].0.contains("ping -> pong -> ping"), "{:?}", messages);
        // Steps before the cycle still ran.
        assert_eq!(screen.state().get("count"), Some(json!(2)));
        assert!(screen.is_active());
    }

    #[tokio::test]
    async fn repeated_named_steps_are_not_cycles() {
        let screen = ScreenRuntime::builder(manifest(), "screen.counter")
            .named_action("bump", Handler::from_value(&json!({"type": "setState", "key": "count", "value": "{{payload}}"})))
            .build()
            .unwrap();
        screen.initialize().unwrap();

        let twice = Handler::from_value(&json!(["bump", "bump"]));
        assert_eq!(screen.dispatch(&twice, json!(7)).await, None);
        assert_eq!(screen.state().get("count"), Some(json!(7)));
    }
}
