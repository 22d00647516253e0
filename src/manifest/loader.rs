//! Fragment loader and manifest aggregator.
//!
//! A load cycle reads the root descriptor, reads every `*.json` fragment of
//! the five sections (filename order within a section, sections read
//! concurrently), validates each entry structurally, then merges everything
//! and checks the cross-fragment invariants. Any error-severity issue fails
//! the whole cycle closed: no manifest is returned. Nothing is thrown; every
//! problem is reported through [`LoadResult::issues`].

use futures::future::join_all;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use super::config::{AppLayout, RootDescriptor, Section, ROOT_DESCRIPTOR_FILE};
use super::error::ManifestError;
use super::issue::{Issue, IssueKind, IssueList, Provenance};
use super::model::{
    ApHandlerDefinition, AppManifest, BucketDefinition, CollectionDefinition, RouteDefinition,
    ScreenDefinition, ViewInsertDefinition,
};
use super::schema::{check_compatibility, Compatibility, APP_MANIFEST_SCHEMA_VERSION};
use super::sections::{type_name, FragmentChecker};
use super::source::{FragmentSource, FsFragmentSource};
use crate::routes::{core_route_for_screen, find_core_route_owner, is_core_screen, reserved_prefix_for};

/// Outcome of one load cycle.
#[derive(Debug, Clone)]
pub struct LoadResult {
    /// Present only when no error-severity issue was found.
    pub manifest: Option<AppManifest>,
    pub layout: AppLayout,
    pub issues: Vec<Issue>,
}

impl LoadResult {
    pub fn has_errors(&self) -> bool {
        self.issues.has_errors()
    }

    pub fn errors(&self) -> Vec<&Issue> {
        self.issues.errors()
    }

    pub fn warnings(&self) -> Vec<&Issue> {
        self.issues.warnings()
    }
}

/// Loader configuration: where fragments come from and which handler names
/// exist on the host.
#[derive(Clone)]
pub struct ManifestLoader {
    source: Arc<dyn FragmentSource>,
    root_dir: String,
    handlers: Option<HashSet<String>>,
}

impl ManifestLoader {
    /// Load from the local file system rooted at `root`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            source: Arc::new(FsFragmentSource::new(root)),
            root_dir: String::new(),
            handlers: None,
        }
    }

    /// Load from an arbitrary source; `root_dir` is relative to the source.
    pub fn with_source(source: Arc<dyn FragmentSource>, root_dir: impl Into<String>) -> Self {
        Self {
            source,
            root_dir: root_dir.into(),
            handlers: None,
        }
    }

    /// Enable the unresolved-handler check against this set of names.
    pub fn with_handlers<I, S>(mut self, handlers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.handlers = Some(handlers.into_iter().map(Into::into).collect());
        self
    }

    pub async fn load(&self) -> LoadResult {
        load_app_manifest(self.source.as_ref(), &self.root_dir, self.handlers.as_ref()).await
    }
}

/// One parsed fragment file.
struct Fragment {
    file: String,
    doc: Value,
}

/// Load, validate and merge all fragments under `root_dir`.
///
/// The handler-name check is skipped when `available_handlers` is `None`.
pub async fn load_app_manifest(
    source: &dyn FragmentSource,
    root_dir: &str,
    available_handlers: Option<&HashSet<String>>,
) -> LoadResult {
    let mut issues = Vec::new();

    let Some(descriptor) = read_descriptor(source, root_dir, &mut issues).await else {
        return LoadResult {
            manifest: None,
            layout: AppLayout::default(),
            issues,
        };
    };
    let layout = AppLayout::resolve(&descriptor.layout);

    let reads = Section::ALL
        .iter()
        .map(|section| read_section(source, root_dir, &layout, *section));
    let sections = join_all(reads).await;

    let mut merger = Merger::new(available_handlers);
    for (section, (fragments, read_issues)) in Section::ALL.iter().zip(sections) {
        issues.extend(read_issues);
        for fragment in fragments {
            if section.is_versioned() {
                check_fragment_version(&fragment, &mut issues);
            }
            let mut checker = FragmentChecker::new(&fragment.file, &mut issues);
            match section {
                Section::Routes => merger.routes.extend(checker.routes(&fragment.doc)),
                Section::Views => {
                    let (screens, inserts) = checker.views(&fragment.doc);
                    merger.screens.extend(screens);
                    merger.inserts.extend(inserts);
                }
                Section::Ap => merger.handlers.extend(checker.ap_handlers(&fragment.doc)),
                Section::Data => merger.collections.extend(checker.collections(&fragment.doc)),
                Section::Storage => merger.buckets.extend(checker.buckets(&fragment.doc)),
            }
        }
    }

    let manifest = merger.merge(&descriptor, &mut issues);
    let failed = issues.has_errors();

    tracing::info!(
        root = %root_dir,
        routes = manifest.routes.len(),
        screens = manifest.views.screens.len(),
        inserts = manifest.views.insert.len(),
        errors = issues.errors().len(),
        warnings = issues.warnings().len(),
        "app manifest load cycle finished"
    );

    LoadResult {
        manifest: if failed { None } else { Some(manifest) },
        layout,
        issues,
    }
}

fn join_path(dir: &str, name: &str) -> String {
    let dir = dir.trim_end_matches('/');
    if dir.is_empty() || dir == "." {
        name.to_string()
    } else {
        format!("{}/{}", dir, name)
    }
}

async fn read_descriptor(
    source: &dyn FragmentSource,
    root_dir: &str,
    issues: &mut Vec<Issue>,
) -> Option<RootDescriptor> {
    let file = join_path(root_dir, ROOT_DESCRIPTOR_FILE);
    let doc = read_json(source, &file, issues).await?;
    let at = Provenance::new(&file, "");

    let descriptor: RootDescriptor = match serde_json::from_value(doc) {
        Ok(d) => d,
        Err(e) => {
            issues.push(
                Issue::error(IssueKind::Structural, format!("invalid root descriptor: {}", e))
                    .at(at)
                    .with_hint("Expected {\"schema_version\": \"1.0.0\", \"version\"?: string, \"layout\"?: object}"),
            );
            return None;
        }
    };

    match check_compatibility(&descriptor.schema_version) {
        Compatibility::Compatible => {}
        Compatibility::Drift { declared } => issues.push(
            Issue::warning(
                IssueKind::Version,
                format!(
                    "manifest schema_version {} differs from runtime {} (minor/patch drift)",
                    declared, APP_MANIFEST_SCHEMA_VERSION
                ),
            )
            .at(at.child("schema_version")),
        ),
        Compatibility::Incompatible { declared } => {
            issues.push(
                Issue::error(
                    IssueKind::Version,
                    format!(
                        "manifest schema_version {} is incompatible with runtime {}",
                        declared, APP_MANIFEST_SCHEMA_VERSION
                    ),
                )
                .at(at.child("schema_version")),
            );
            return None;
        }
        Compatibility::Malformed => {
            issues.push(
                Issue::error(
                    IssueKind::Version,
                    format!("malformed schema_version '{}'", descriptor.schema_version),
                )
                .at(at.child("schema_version")),
            );
            return None;
        }
    }

    Some(descriptor)
}

/// Read and parse one JSON file, turning failures into issues.
async fn read_json(source: &dyn FragmentSource, file: &str, issues: &mut Vec<Issue>) -> Option<Value> {
    let at = Provenance::new(file, "");
    let text = match source.read_file(file).await {
        Ok(text) => text,
        Err(e) => {
            let message = match e {
                ManifestError::NotFound { .. } => format!("{} not found", file),
                other => other.to_string(),
            };
            issues.push(Issue::error(IssueKind::Source, message).at(at));
            return None;
        }
    };

    match serde_json::from_str::<Value>(&text) {
        Ok(doc) => Some(doc),
        Err(e) => {
            issues.push(
                Issue::error(
                    IssueKind::Parse,
                    format!("invalid JSON at line {}, column {}: {}", e.line(), e.column(), e),
                )
                .at(at),
            );
            None
        }
    }
}

async fn read_section(
    source: &dyn FragmentSource,
    root_dir: &str,
    layout: &AppLayout,
    section: Section,
) -> (Vec<Fragment>, Vec<Issue>) {
    let mut issues = Vec::new();
    let dir = join_path(root_dir, layout.dir_for(section));

    let mut names = match source.list_files(&dir).await {
        Ok(names) => names,
        Err(e) if e.is_not_found() => {
            tracing::debug!(section = ?section, dir = %dir, "section directory missing, treating as empty");
            return (Vec::new(), issues);
        }
        Err(e) => {
            issues.push(Issue::error(IssueKind::Source, e.to_string()).at(Provenance::new(&dir, "")));
            return (Vec::new(), issues);
        }
    };

    names.retain(|n| {
        Path::new(n)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("json"))
            .unwrap_or(false)
    });
    names.sort();

    let mut fragments = Vec::new();
    for name in names {
        let file = join_path(&dir, &name);
        tracing::debug!(section = ?section, file = %file, "reading fragment");
        if let Some(doc) = read_json(source, &file, &mut issues).await {
            fragments.push(Fragment { file, doc });
        }
    }
    (fragments, issues)
}

fn check_fragment_version(fragment: &Fragment, issues: &mut Vec<Issue>) {
    let at = Provenance::new(&fragment.file, "schema_version");
    let declared = match fragment.doc.get("schema_version") {
        None | Some(Value::Null) => return,
        Some(Value::String(s)) => s,
        Some(other) => {
            issues.push(
                Issue::error(
                    IssueKind::Version,
                    format!("schema_version must be a string, found {}", type_name(other)),
                )
                .at(at),
            );
            return;
        }
    };

    match check_compatibility(declared) {
        Compatibility::Compatible => {}
        Compatibility::Drift { declared } => issues.push(
            Issue::warning(
                IssueKind::Version,
                format!(
                    "fragment schema_version {} drifts from runtime {}",
                    declared, APP_MANIFEST_SCHEMA_VERSION
                ),
            )
            .at(at),
        ),
        Compatibility::Incompatible { declared } => issues.push(
            Issue::error(
                IssueKind::Version,
                format!(
                    "fragment schema_version {} has a different major version than runtime {}",
                    declared, APP_MANIFEST_SCHEMA_VERSION
                ),
            )
            .at(at)
            .with_hint("Migrate the fragment to the runtime's major schema version."),
        ),
        Compatibility::Malformed => issues.push(
            Issue::error(
                IssueKind::Version,
                format!("malformed schema_version '{}'", declared),
            )
            .at(at),
        ),
    }
}

/// Accumulates validated entries from every fragment, then enforces the
/// cross-fragment invariants.
struct Merger<'h> {
    handlers_available: Option<&'h HashSet<String>>,
    routes: Vec<RouteDefinition>,
    screens: Vec<ScreenDefinition>,
    inserts: Vec<ViewInsertDefinition>,
    handlers: Vec<ApHandlerDefinition>,
    collections: Vec<(String, CollectionDefinition)>,
    buckets: Vec<(String, BucketDefinition)>,
}

impl<'h> Merger<'h> {
    fn new(handlers_available: Option<&'h HashSet<String>>) -> Self {
        Self {
            handlers_available,
            routes: Vec::new(),
            screens: Vec::new(),
            inserts: Vec::new(),
            handlers: Vec::new(),
            collections: Vec::new(),
            buckets: Vec::new(),
        }
    }

    fn check_handler(&self, handler: &str, owner: &str, at: &Provenance, issues: &mut Vec<Issue>) {
        if let Some(available) = self.handlers_available {
            if !available.contains(handler) {
                issues.push(
                    Issue::error(
                        IssueKind::Conflict,
                        format!("{} references unknown handler '{}'", owner, handler),
                    )
                    .at(at.child("handler")),
                );
            }
        }
    }

    fn merge(self, descriptor: &RootDescriptor, issues: &mut Vec<Issue>) -> AppManifest {
        let mut manifest = AppManifest::empty(descriptor.schema_version.clone());
        manifest.version = descriptor.version.clone();

        manifest.routes = self.merge_routes(issues);
        manifest.views.screens = self.merge_screens(issues);
        manifest.views.insert = self.merge_inserts(&manifest.views.screens, issues);
        manifest.ap.handlers = self.merge_ap_handlers(issues);
        manifest.data.collections = merge_keyed(self.collections, "collection", |c| &c.source, issues);
        manifest.storage.buckets = merge_keyed(self.buckets, "bucket", |b| &b.source, issues);
        manifest
    }

    fn merge_routes(&self, issues: &mut Vec<Issue>) -> Vec<RouteDefinition> {
        let mut by_id: HashMap<&str, &Provenance> = HashMap::new();
        let mut by_key: HashMap<(String, String), &Provenance> = HashMap::new();
        let mut out = Vec::new();

        for route in &self.routes {
            let mut ok = true;

            if let Some(first) = by_id.get(route.id.as_str()) {
                issues.push(duplicate("route id", &route.id, &route.source, first));
                ok = false;
            } else {
                by_id.insert(&route.id, &route.source);
            }

            let key = (route.method.to_string(), route_key(&route.path));
            if let Some(first) = by_key.get(&key) {
                issues.push(duplicate(
                    "route",
                    &format!("{} {}", route.method, route.path),
                    &route.source,
                    first,
                ));
                ok = false;
            } else {
                by_key.insert(key, &route.source);
            }

            if let Some(issue) = reserved_path_issue(&route.path, &route.source.child("path")) {
                issues.push(issue);
                ok = false;
            }

            self.check_handler(&route.handler, &format!("route '{}'", route.id), &route.source, issues);

            if ok {
                out.push(route.clone());
            }
        }
        out
    }

    fn merge_screens(&self, issues: &mut Vec<Issue>) -> Vec<ScreenDefinition> {
        let mut by_id: HashMap<String, Provenance> = HashMap::new();
        let mut by_route: HashMap<String, (String, Provenance)> = HashMap::new();
        let mut out = Vec::new();

        for screen in &self.screens {
            let mut screen = screen.clone();
            let at = screen.source.clone();

            if let Some(first) = by_id.get(&screen.id) {
                issues.push(duplicate("screen id", &screen.id, &at, first));
                continue;
            }

            if let Some(fixed) = core_route_for_screen(&screen.id) {
                match screen.route.as_deref() {
                    Some(route) if route != fixed => {
                        issues.push(
                            Issue::error(
                                IssueKind::ReservedNamespace,
                                format!(
                                    "core screen '{}' must use its fixed route '{}', not '{}'",
                                    screen.id, fixed, route
                                ),
                            )
                            .at(at.child("route")),
                        );
                        continue;
                    }
                    Some(_) => {}
                    None => screen.route = Some(fixed.to_string()),
                }
            } else if let Some(route) = screen.route.as_deref() {
                if let Some(issue) = reserved_path_issue(route, &at.child("route")) {
                    issues.push(issue);
                    continue;
                }
            }

            if let Some(route) = screen.route.as_deref() {
                let key = route_key(route);
                if let Some((other, first)) = by_route.get(&key) {
                    issues.push(
                        Issue::error(
                            IssueKind::Conflict,
                            format!(
                                "screen route '{}' of '{}' is already used by '{}' ({})",
                                route, screen.id, other, first.file
                            ),
                        )
                        .at(at.child("route"))
                        .related_to(first.clone()),
                    );
                    continue;
                }
                by_route.insert(key, (screen.id.clone(), at.clone()));
            }

            by_id.insert(screen.id.clone(), at);
            out.push(screen);
        }
        out
    }

    fn merge_inserts(&self, screens: &[ScreenDefinition], issues: &mut Vec<Issue>) -> Vec<ViewInsertDefinition> {
        let known: HashSet<&str> = screens.iter().map(|s| s.id.as_str()).collect();
        let mut out: Vec<ViewInsertDefinition> = self
            .inserts
            .iter()
            .filter(|insert| {
                let exists = known.contains(insert.screen.as_str()) || is_core_screen(&insert.screen);
                if !exists {
                    issues.push(
                        Issue::error(
                            IssueKind::Conflict,
                            format!(
                                "insert targets unknown screen '{}' (slot '{}')",
                                insert.screen, insert.position
                            ),
                        )
                        .at(insert.source.child("screen")),
                    );
                }
                exists
            })
            .cloned()
            .collect();

        // Stable: equal (screen, position, order) keep fragment order.
        out.sort_by(|a, b| {
            (a.screen.as_str(), a.position.as_str(), a.order).cmp(&(
                b.screen.as_str(),
                b.position.as_str(),
                b.order,
            ))
        });
        out
    }

    fn merge_ap_handlers(&self, issues: &mut Vec<Issue>) -> Vec<ApHandlerDefinition> {
        let mut by_id: HashMap<&str, &Provenance> = HashMap::new();
        let mut out = Vec::new();
        for handler in &self.handlers {
            if let Some(first) = by_id.get(handler.id.as_str()) {
                issues.push(duplicate("ap handler id", &handler.id, &handler.source, first));
                continue;
            }
            by_id.insert(&handler.id, &handler.source);
            self.check_handler(
                &handler.handler,
                &format!("ap handler '{}'", handler.id),
                &handler.source,
                issues,
            );
            out.push(handler.clone());
        }
        out
    }
}

fn merge_keyed<T>(
    entries: Vec<(String, T)>,
    what: &str,
    source_of: impl Fn(&T) -> &Provenance,
    issues: &mut Vec<Issue>,
) -> BTreeMap<String, T> {
    let mut out: BTreeMap<String, T> = BTreeMap::new();
    for (key, entry) in entries {
        if let Some(first) = out.get(&key) {
            issues.push(duplicate(what, &key, source_of(&entry), source_of(first)));
            continue;
        }
        out.insert(key, entry);
    }
    out
}

fn duplicate(what: &str, key: &str, at: &Provenance, first: &Provenance) -> Issue {
    Issue::error(
        IssueKind::Conflict,
        format!(
            "duplicate {} '{}' declared in {} and {}",
            what, key, first.file, at.file
        ),
    )
    .at(at.clone())
    .related_to(first.clone())
}

/// Reserved-prefix and core-screen collision check for an app-declared path.
fn reserved_path_issue(path: &str, at: &Provenance) -> Option<Issue> {
    if let Some(prefix) = reserved_prefix_for(path) {
        return Some(
            Issue::error(
                IssueKind::ReservedNamespace,
                format!("path '{}' falls under reserved prefix '{}'", path, prefix),
            )
            .at(at.clone()),
        );
    }
    find_core_route_owner(path).map(|owner| {
        Issue::error(
            IssueKind::ReservedNamespace,
            format!(
                "path '{}' collides with core screen '{}' (fixed route '{}')",
                path, owner.screen_id, owner.path
            ),
        )
        .at(at.clone())
    })
}

/// Comparison key for paths: trailing slashes are insignificant.
fn route_key(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}
