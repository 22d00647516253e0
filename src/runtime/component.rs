//! Component registry and UiNode rendering.
//!
//! Rendering order for every node:
//! 1. `hidden` (if it holds, render nothing), then `visible` (default true).
//!    Invisible nodes skip prop resolution and children entirely.
//! 2. Props are resolved against the current scope. Nested UiNode subtrees
//!    and handler props (`action`, `onClick`, ...) are left untouched.
//! 3. The renderer registered for the node's `type` produces the output; an
//!    unregistered type yields a [`RenderedNode::Diagnostic`].

use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::condition::evaluate_condition;
use super::expr::{resolve_value, stringify, ResolveMode};
use super::scope::Scope;
use crate::manifest::UiNode;

/// Host-neutral render output.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderedNode {
    Element {
        kind: String,
        props: Map<String, Value>,
        children: Vec<RenderedNode>,
        /// Scope the element was rendered in; used when its handlers fire.
        scope: Scope,
    },
    Text(String),
    Fragment(Vec<RenderedNode>),
    /// Visible placeholder for nodes that could not be rendered.
    Diagnostic { kind: String, message: String },
    Empty,
}

impl RenderedNode {
    /// Depth-first search for the first element of `kind`.
    pub fn find(&self, kind: &str) -> Option<&RenderedNode> {
        match self {
            RenderedNode::Element {
                kind: k, children, ..
            } => {
                if k == kind {
                    Some(self)
                } else {
                    children.iter().find_map(|c| c.find(kind))
                }
            }
            RenderedNode::Fragment(children) => children.iter().find_map(|c| c.find(kind)),
            _ => None,
        }
    }

    /// All elements of `kind`, in document order.
    pub fn find_all<'a>(&'a self, kind: &str, out: &mut Vec<&'a RenderedNode>) {
        match self {
            RenderedNode::Element {
                kind: k, children, ..
            } => {
                if k == kind {
                    out.push(self);
                }
                for c in children {
                    c.find_all(kind, out);
                }
            }
            RenderedNode::Fragment(children) => {
                for c in children {
                    c.find_all(kind, out);
                }
            }
            _ => {}
        }
    }

    pub fn prop(&self, key: &str) -> Option<&Value> {
        match self {
            RenderedNode::Element { props, .. } => props.get(key),
            _ => None,
        }
    }

    /// Concatenated text of all `Text` descendants.
    pub fn text_content(&self) -> String {
        match self {
            RenderedNode::Text(t) => t.clone(),
            RenderedNode::Element { children, .. } | RenderedNode::Fragment(children) => {
                children.iter().map(RenderedNode::text_content).collect()
            }
            _ => String::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            RenderedNode::Empty => true,
            RenderedNode::Fragment(children) => children.iter().all(RenderedNode::is_empty),
            _ => false,
        }
    }
}

pub trait ComponentRenderer: Send + Sync {
    fn render(&self, node: &UiNode, props: Map<String, Value>, ctx: &RenderContext<'_>) -> RenderedNode;
}

struct FnRenderer<F>(F);

impl<F> ComponentRenderer for FnRenderer<F>
where
    F: Fn(&UiNode, Map<String, Value>, &RenderContext<'_>) -> RenderedNode + Send + Sync,
{
    fn render(&self, node: &UiNode, props: Map<String, Value>, ctx: &RenderContext<'_>) -> RenderedNode {
        (self.0)(node, props, ctx)
    }
}

/// Passes resolved props through and renders children in place.
pub struct ElementRenderer;

impl ComponentRenderer for ElementRenderer {
    fn render(&self, node: &UiNode, props: Map<String, Value>, ctx: &RenderContext<'_>) -> RenderedNode {
        RenderedNode::Element {
            kind: node.kind.clone(),
            props,
            children: ctx.render_children(&node.children),
            scope: ctx.scope().clone(),
        }
    }
}

/// Closed `type → renderer` map. Built once; immutable afterwards.
#[derive(Clone)]
pub struct ComponentRegistry {
    renderers: Arc<HashMap<String, Arc<dyn ComponentRenderer>>>,
}

impl ComponentRegistry {
    /// Builder preloaded with the structural components (`Fragment`, `If`,
    /// `Each`, `Paginated`, `Slot`, `Text`).
    pub fn builder() -> ComponentRegistryBuilder {
        ComponentRegistryBuilder::default().with_builtins()
    }

    /// Builder without any components.
    pub fn bare() -> ComponentRegistryBuilder {
        ComponentRegistryBuilder::default()
    }

    pub fn get(&self, kind: &str) -> Option<&Arc<dyn ComponentRenderer>> {
        self.renderers.get(kind)
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.renderers.contains_key(kind)
    }

    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.renderers.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[derive(Default)]
pub struct ComponentRegistryBuilder {
    renderers: HashMap<String, Arc<dyn ComponentRenderer>>,
}

impl ComponentRegistryBuilder {
    /// Register `renderer` for `kind`, replacing any earlier registration.
    pub fn register(mut self, kind: impl Into<String>, renderer: impl ComponentRenderer + 'static) -> Self {
        self.renderers.insert(kind.into(), Arc::new(renderer));
        self
    }

    pub fn register_fn<F>(self, kind: impl Into<String>, f: F) -> Self
    where
        F: Fn(&UiNode, Map<String, Value>, &RenderContext<'_>) -> RenderedNode + Send + Sync + 'static,
    {
        self.register(kind, FnRenderer(f))
    }

    /// Register plain host elements (`Button`, `Column`, ...).
    pub fn register_elements<I, S>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for kind in kinds {
            self = self.register(kind, ElementRenderer);
        }
        self
    }

    fn with_builtins(self) -> Self {
        self.register_fn("Fragment", |node, _props, ctx| {
            RenderedNode::Fragment(ctx.render_children(&node.children))
        })
        .register_fn("Text", |_node, props, _ctx| {
            let text = props.get("text").or_else(|| props.get("value")).map(stringify);
            RenderedNode::Text(text.unwrap_or_default())
        })
        .register_fn("If", render_if)
        .register_fn("Each", render_each)
        .register_fn("Paginated", render_paginated)
        .register_fn("Slot", |_node, props, ctx| {
            let name = props.get("name").map(stringify).unwrap_or_default();
            RenderedNode::Fragment(ctx.render_slot(&name))
        })
    }

    pub fn build(self) -> ComponentRegistry {
        ComponentRegistry {
            renderers: Arc::new(self.renderers),
        }
    }
}

/// Condition and branches are read unresolved: the condition evaluator and
/// `render_value` each resolve exactly once against the current scope.
fn render_if(node: &UiNode, _props: Map<String, Value>, ctx: &RenderContext<'_>) -> RenderedNode {
    let holds = node
        .props
        .get("when")
        .or_else(|| node.props.get("condition"))
        .map(|c| evaluate_condition(c, ctx.scope()))
        .unwrap_or(false);
    let branch = if holds { "then" } else { "else" };
    match node.props.get(branch) {
        Some(value) => ctx.render_value(value),
        None if holds => RenderedNode::Fragment(ctx.render_children(&node.children)),
        None => RenderedNode::Empty,
    }
}

/// Child scope for one repeated item: `item`, optional alias and `index`.
fn item_scope(base: &Scope, props: &Map<String, Value>, item: &Value, index: usize) -> Scope {
    let mut scope = base.with("item", item.clone()).with("index", Value::from(index));
    if let Some(alias) = props.get("as").and_then(Value::as_str) {
        scope.set(alias, item.clone());
    }
    scope
}

fn render_items(node: &UiNode, props: &Map<String, Value>, items: &[Value], offset: usize, ctx: &RenderContext<'_>) -> Vec<RenderedNode> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let child = ctx.with_scope(item_scope(ctx.scope(), props, item, offset + i));
            RenderedNode::Fragment(child.render_children(&node.children))
        })
        .collect()
}

fn render_each(node: &UiNode, props: Map<String, Value>, ctx: &RenderContext<'_>) -> RenderedNode {
    let items = props.get("items").and_then(Value::as_array).cloned().unwrap_or_default();
    if items.is_empty() {
        return node.props.get("empty").map(|e| ctx.render_value(e)).unwrap_or(RenderedNode::Empty);
    }
    RenderedNode::Fragment(render_items(node, &props, &items, 0, ctx))
}

fn render_paginated(node: &UiNode, props: Map<String, Value>, ctx: &RenderContext<'_>) -> RenderedNode {
    let items = props.get("items").and_then(Value::as_array).cloned().unwrap_or_default();
    let page_size = props
        .get("page_size")
        .or_else(|| props.get("pageSize"))
        .and_then(Value::as_u64)
        .filter(|n| *n > 0)
        .map(|n| usize::try_from(n).unwrap_or(usize::MAX))
        .unwrap_or(10);
    let page_count = items.len().div_ceil(page_size).max(1);
    let page = current_page(&props, ctx).min(page_count - 1);

    let start = page.saturating_mul(page_size).min(items.len());
    let end = start.saturating_add(page_size).min(items.len());
    let children = render_items(node, &props, &items[start..end], start, ctx);

    let mut out = Map::new();
    out.insert("page".into(), Value::from(page));
    out.insert("page_size".into(), Value::from(page_size));
    out.insert("page_count".into(), Value::from(page_count));
    out.insert("total".into(), Value::from(items.len()));
    RenderedNode::Element {
        kind: node.kind.clone(),
        props: out,
        children,
        scope: ctx.scope().clone(),
    }
}

/// Page index from the state key named by `page_key`, else from `page`.
fn current_page(props: &Map<String, Value>, ctx: &RenderContext<'_>) -> usize {
    let as_index = |p: &Value| p.as_u64().or_else(|| p.as_str().and_then(|s| s.trim().parse().ok()));
    let page = match props.get("page_key").or_else(|| props.get("pageKey")).and_then(Value::as_str) {
        Some(key) => ctx.scope().lookup(&format!("state.{}", key)).and_then(as_index),
        None => props.get("page").and_then(as_index),
    };
    page.map(|p| usize::try_from(p).unwrap_or(usize::MAX)).unwrap_or(0)
}

/// Props that carry action handlers are resolved at dispatch time.
fn is_handler_key(key: &str) -> bool {
    key == "action"
        || key
            .strip_prefix("on")
            .and_then(|rest| rest.chars().next())
            .map(|c| c.is_ascii_uppercase())
            .unwrap_or(false)
}

/// Everything a renderer may use to recurse.
pub struct RenderContext<'a> {
    registry: &'a ComponentRegistry,
    slots: &'a BTreeMap<String, Vec<UiNode>>,
    scope: Scope,
}

impl<'a> RenderContext<'a> {
    pub fn new(registry: &'a ComponentRegistry, slots: &'a BTreeMap<String, Vec<UiNode>>, scope: Scope) -> Self {
        Self { registry, slots, scope }
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Same registry and slots, different scope.
    pub fn with_scope(&self, scope: Scope) -> RenderContext<'a> {
        RenderContext {
            registry: self.registry,
            slots: self.slots,
            scope,
        }
    }

    pub fn is_visible(&self, node: &UiNode) -> bool {
        if let Some(hidden) = node.props.get("hidden") {
            if evaluate_condition(hidden, &self.scope) {
                return false;
            }
        }
        node.props
            .get("visible")
            .map(|v| evaluate_condition(v, &self.scope))
            .unwrap_or(true)
    }

    pub fn resolve_props(&self, node: &UiNode) -> Map<String, Value> {
        node.props
            .iter()
            .filter(|(k, _)| k.as_str() != "hidden" && k.as_str() != "visible")
            .map(|(k, v)| {
                let value = if is_handler_key(k) {
                    v.clone()
                } else {
                    resolve_value(v, &self.scope, ResolveMode::PreserveNodes)
                };
                (k.clone(), value)
            })
            .collect()
    }

    pub fn render(&self, node: &UiNode) -> RenderedNode {
        if !self.is_visible(node) {
            return RenderedNode::Empty;
        }
        let props = self.resolve_props(node);
        match self.registry.get(&node.kind) {
            Some(renderer) => renderer.render(node, props, self),
            None => {
                tracing::warn!(kind = %node.kind, "no renderer registered for node type");
                RenderedNode::Diagnostic {
                    kind: node.kind.clone(),
                    message: format!("Unknown component type '{}'", node.kind),
                }
            }
        }
    }

    pub fn render_children(&self, children: &[UiNode]) -> Vec<RenderedNode> {
        children
            .iter()
            .map(|c| self.render(c))
            .filter(|r| *r != RenderedNode::Empty)
            .collect()
    }

    /// Render a prop value holding a node or a list of nodes.
    pub fn render_value(&self, value: &Value) -> RenderedNode {
        match value {
            Value::Array(items) => RenderedNode::Fragment(
                items
                    .iter()
                    .map(|v| self.render_value(v))
                    .filter(|r| *r != RenderedNode::Empty)
                    .collect(),
            ),
            Value::Null => RenderedNode::Empty,
            Value::String(s) => RenderedNode::Text(stringify(&resolve_value(
                &Value::String(s.clone()),
                &self.scope,
                ResolveMode::Deep,
            ))),
            other => match UiNode::from_value(other) {
                Some(node) => self.render(&node),
                None => RenderedNode::Diagnostic {
                    kind: "value".to_string(),
                    message: format!("Expected a node, found {}", other),
                },
            },
        }
    }

    /// Inserts contributed to the named slot of the current screen.
    pub fn render_slot(&self, name: &str) -> Vec<RenderedNode> {
        self.slots
            .get(name)
            .map(|nodes| self.render_children(nodes))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(value: Value) -> UiNode {
        serde_json::from_value(value).unwrap()
    }

    fn render(registry: &ComponentRegistry, scope: Scope, value: Value) -> RenderedNode {
        let slots = BTreeMap::new();
        RenderContext::new(registry, &slots, scope).render(&node(value))
    }

    fn registry() -> ComponentRegistry {
        ComponentRegistry::builder()
            .register_elements(["Column", "Button"])
            .build()
    }

    #[test]
    fn unknown_type_renders_diagnostic() {
        let out = render(&registry(), Scope::new(), json!({"type": "Carousel"}));
        assert!(matches!(out, RenderedNode::Diagnostic { ref kind, .. } if kind == "Carousel"));
    }

    #[test]
    fn invisible_nodes_skip_everything() {
        let scope = Scope::new().with("state", json!({"busy": true}));
        let out = render(
            &registry(),
            scope.clone(),
            json!({"type": "Carousel", "props": {"hidden": "{{state.busy}}"}}),
        );
        assert_eq!(out, RenderedNode::Empty);

        let out = render(&registry(), scope, json!({"type": "Column", "props": {"visible": {"$not": "$state.busy"}}}));
        assert_eq!(out, RenderedNode::Empty);
    }

    #[test]
    fn handler_props_stay_unresolved() {
        let out = render(
            &registry(),
            Scope::new().with("state", json!({"label": "Go"})),
            json!({"type": "Button", "props": {
                "label": "{{state.label}}",
                "onClick": {"type": "navigate", "to": "/posts/{{payload.id}}"}
            }}),
        );
        assert_eq!(out.prop("label"), Some(&json!("Go")));
        assert_eq!(out.prop("onClick").unwrap()["to"], json!("/posts/{{payload.id}}"));
    }

    #[test]
    fn each_binds_item_and_alias() {
        let out = render(
            &registry(),
            Scope::new().with("data", json!({"posts": [{"title": "a"}, {"title": "b"}]})),
            json!({"type": "Each", "props": {"items": "$data.posts", "as": "post"}, "children": [
                {"type": "Text", "props": {"text": "{{index}}:{{post.title}}|"}}
            ]}),
        );
        assert_eq!(out.text_content(), "0:a|1:b|");
    }

    #[test]
    fn if_renders_branch_nodes_in_current_scope() {
        let out = render(
            &registry(),
            Scope::new().with("auth", json!({"user": {"handle": "ada"}})),
            json!({"type": "If", "props": {
                "when": {"$auth": true},
                "then": {"type": "Text", "props": {"text": "@{{auth.user.handle}}"}},
                "else": {"type": "Text", "props": {"text": "Sign in"}}
            }}),
        );
        assert_eq!(out.text_content(), "@ada");
    }

    #[test]
    fn paginated_slices_items() {
        let out = render(
            &registry(),
            Scope::new().with("state", json!({"page": 1})),
            json!({"type": "Paginated", "props": {"items": [1, 2, 3, 4, 5], "page_size": 2, "page": "{{state.page}}"},
                   "children": [{"type": "Text", "props": {"text": "{{item}}"}}]}),
        );
        assert_eq!(out.text_content(), "34");
        assert_eq!(out.prop("page_count"), Some(&json!(3)));
    }

    #[test]
    fn if_does_not_reevaluate_resolved_data() {
        let scope = Scope::new()
            .with("state", json!({"title": "{{auth.token}}", "label": "$auth.token"}))
            .with("auth", json!({"token": "s3cret"}));

        let out = render(
            &registry(),
            scope.clone(),
            json!({"type": "If", "props": {
                "when": {"$eq": ["$state.title", "s3cret"]},
                "then": {"type": "Text", "props": {"text": "LEAK"}}
            }}),
        );
        assert_eq!(out, RenderedNode::Empty);

        let out = render(
            &registry(),
            scope,
            json!({"type": "If", "props": {
                "when": true,
                "then": "{{state.label}}"
            }}),
        );
        assert_eq!(out.text_content(), "$auth.token");
    }

    #[test]
    fn paginated_survives_huge_page_sizes() {
        let out = render(
            &registry(),
            Scope::new(),
            json!({"type": "Paginated", "props": {"items": [1, 2, 3], "page_size": u64::MAX, "page": u64::MAX},
                   "children": [{"type": "Text", "props": {"text": "{{item}}"}}]}),
        );
        assert_eq!(out.text_content(), "123");
        assert_eq!(out.prop("page"), Some(&json!(0)));
        assert_eq!(out.prop("page_count"), Some(&json!(1)));
    }

    #[test]
    fn paginated_reads_page_from_state_key() {
        let out = render(
            &registry(),
            Scope::new().with("state", json!({"feed": {"page": 2}})),
            json!({"type": "Paginated", "props": {"items": [1, 2, 3, 4, 5], "page_size": 2, "page_key": "feed.page"},
                   "children": [{"type": "Text", "props": {"text": "{{item}}"}}]}),
        );
        assert_eq!(out.text_content(), "5");
        assert_eq!(out.prop("page"), Some(&json!(2)));
    }
}
