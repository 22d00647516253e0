//! Cross-checks a reachability contract against a merged manifest.
//!
//! Every finding is a warning: the contract documents navigation depth
//! targets, it never blocks publishing a manifest.

use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use super::model::{shape_errors, UiContract, ACTION_RULES, REQUIRED_ACTIONS, REQUIRED_SCREENS};
use crate::manifest::{
    AppManifest, Issue, IssueKind, Provenance, SchemaVersion, UI_CONTRACT_SCHEMA_VERSION,
};
use crate::routes::core_route_for_screen;

/// `<namespace>.[a-z_]+`
fn is_namespaced_id(id: &str, namespace: &str) -> bool {
    id.strip_prefix(namespace)
        .and_then(|rest| rest.strip_prefix('.'))
        .map(|name| !name.is_empty() && name.chars().all(|c| c.is_ascii_lowercase() || c == '_'))
        .unwrap_or(false)
}

/// Validate `contract` (the raw contract document) against `manifest`.
/// `source` names the contract file in issue locations.
pub fn validate_ui_contract_against_manifest(manifest: &AppManifest, contract: &Value, source: &str) -> Vec<Issue> {
    let mut check = ContractCheck {
        source,
        issues: Vec::new(),
    };

    for (path, message) in shape_errors(contract) {
        let path = path.trim_start_matches('/').replace('/', ".");
        check.warn(&path, format!("contract shape: {}", message));
    }

    let contract: UiContract = match serde_json::from_value(contract.clone()) {
        Ok(c) => c,
        Err(e) => {
            check.warn("", format!("contract could not be read: {}", e));
            return check.issues;
        }
    };

    check.schema_version(&contract);
    let distances = check.screens(manifest, &contract);
    let references = collect_action_references(manifest);
    check.actions(&contract, &distances, &references);
    check.required(&contract);
    check.named_rules(&contract, &distances);

    tracing::debug!(
        source = %source,
        warnings = check.issues.len(),
        "validated ui contract"
    );
    check.issues
}

/// `props.action` string literals per screen, from layouts and inserts.
pub fn collect_action_references(manifest: &AppManifest) -> HashMap<String, BTreeSet<String>> {
    let mut refs: HashMap<String, BTreeSet<String>> = HashMap::new();
    let mut collect = |screen: &str, node: &crate::manifest::UiNode| {
        let entry = refs.entry(screen.to_string()).or_default();
        node.walk(&mut |props| {
            if let Some(Value::String(action)) = props.get("action") {
                entry.insert(action.clone());
            }
        });
    };

    for screen in &manifest.views.screens {
        collect(&screen.id, &screen.layout);
    }
    for insert in &manifest.views.insert {
        collect(&insert.screen, &insert.node);
    }
    refs
}

/// A reference matches either the full action id or its bare name
/// (`action.send_dm` or `send_dm`).
fn references_action(refs: &BTreeSet<String>, action_id: &str) -> bool {
    let bare = action_id.strip_prefix("action.").unwrap_or(action_id);
    refs.contains(action_id) || refs.contains(bare)
}

struct ContractCheck<'a> {
    source: &'a str,
    issues: Vec<Issue>,
}

impl ContractCheck<'_> {
    fn warn(&mut self, path: &str, message: impl Into<String>) {
        self.issues
            .push(Issue::warning(IssueKind::Contract, message).at(Provenance::new(self.source, path)));
    }

    fn schema_version(&mut self, contract: &UiContract) {
        let Some(declared) = contract.schema_version.as_deref() else {
            self.warn(
                "schema_version",
                format!("contract does not declare schema_version (expected {})", UI_CONTRACT_SCHEMA_VERSION),
            );
            return;
        };
        let expected = SchemaVersion::parse(UI_CONTRACT_SCHEMA_VERSION);
        match (SchemaVersion::parse(declared), expected) {
            (Some(d), Some(e)) if d.major == e.major => {}
            (Some(_), _) => self.warn(
                "schema_version",
                format!(
                    "contract schema_version {} is incompatible with {}",
                    declared, UI_CONTRACT_SCHEMA_VERSION
                ),
            ),
            (None, _) => self.warn("schema_version", format!("malformed contract schema_version '{}'", declared)),
        }
    }

    /// Checks screen entries and returns the known distance per screen id.
    fn screens(&mut self, manifest: &AppManifest, contract: &UiContract) -> BTreeMap<String, i64> {
        let mut distances = BTreeMap::new();
        let mut seen = HashSet::new();

        for (i, screen) in contract.screens.iter().enumerate() {
            let at = format!("screens[{}]", i);
            if !is_namespaced_id(&screen.id, "screen") {
                self.warn(&at, format!("screen id '{}' must match screen.[a-z_]+", screen.id));
            }
            if !seen.insert(screen.id.as_str()) {
                self.warn(&at, format!("duplicate contract screen '{}'", screen.id));
                continue;
            }

            if screen.routes.is_empty() {
                self.warn(&format!("{}.routes", at), format!("screen '{}' declares no route", screen.id));
            }

            match screen.steps_from_home {
                Some(steps) if steps >= 0 => {
                    distances.insert(screen.id.clone(), steps);
                }
                Some(steps) => self.warn(
                    &format!("{}.steps_from_home", at),
                    format!("screen '{}' has negative steps_from_home {}", screen.id, steps),
                ),
                None => self.warn(
                    &format!("{}.steps_from_home", at),
                    format!("screen '{}' does not declare steps_from_home", screen.id),
                ),
            }

            let expected_route = core_route_for_screen(&screen.id)
                .map(str::to_string)
                .or_else(|| manifest.screen(&screen.id).and_then(|s| s.route.clone()));
            let known = core_route_for_screen(&screen.id).is_some() || manifest.screen(&screen.id).is_some();
            if !known {
                self.warn(
                    &at,
                    format!("contract screen '{}' is neither declared in the manifest nor a core screen", screen.id),
                );
            }
            if let Some(expected) = expected_route {
                for (j, route) in screen.routes.iter().enumerate() {
                    if route.trim_end_matches('/') != expected.trim_end_matches('/') {
                        self.warn(
                            &format!("{}.routes[{}]", at, j),
                            format!(
                                "contract route '{}' for '{}' does not match its route '{}'",
                                route, screen.id, expected
                            ),
                        );
                    }
                }
            }
        }

        match distances.get("screen.home") {
            Some(0) | None => {}
            Some(steps) => {
                let steps = *steps;
                self.warn("screens", format!("screen.home must be at distance 0, found {}", steps));
            }
        }
        distances
    }

    fn actions(
        &mut self,
        contract: &UiContract,
        distances: &BTreeMap<String, i64>,
        references: &HashMap<String, BTreeSet<String>>,
    ) {
        let mut seen = HashSet::new();
        for (i, action) in contract.actions.iter().enumerate() {
            let at = format!("actions[{}]", i);
            if !is_namespaced_id(&action.id, "action") {
                self.warn(&at, format!("action id '{}' must match action.[a-z_]+", action.id));
            }
            if !seen.insert(action.id.as_str()) {
                self.warn(&at, format!("duplicate contract action '{}'", action.id));
                continue;
            }

            if action.available_on.is_empty() {
                self.warn(
                    &format!("{}.available_on", at),
                    format!("action '{}' is not available on any screen", action.id),
                );
                continue;
            }

            let mut best: Option<i64> = None;
            for (j, screen) in action.available_on.iter().enumerate() {
                match distances.get(screen) {
                    Some(d) => best = Some(best.map_or(*d, |b| b.min(*d))),
                    None => self.warn(
                        &format!("{}.available_on[{}]", at, j),
                        format!("action '{}' is available on '{}', which has no known distance", action.id, screen),
                    ),
                }
            }

            match (action.max_steps_from_home, best) {
                (Some(max), _) if max < 0 => self.warn(
                    &format!("{}.max_steps_from_home", at),
                    format!("action '{}' has negative max_steps_from_home {}", action.id, max),
                ),
                (Some(max), Some(best)) if best > max => self.warn(
                    &format!("{}.max_steps_from_home", at),
                    format!(
                        "action '{}' is reachable in {} steps at best, budget is {}",
                        action.id, best, max
                    ),
                ),
                (None, _) => self.warn(
                    &format!("{}.max_steps_from_home", at),
                    format!("action '{}' does not declare max_steps_from_home", action.id),
                ),
                _ => {}
            }

            let referenced = action.available_on.iter().any(|screen| {
                references
                    .get(screen)
                    .map(|refs| references_action(refs, &action.id))
                    .unwrap_or(false)
            });
            if !referenced {
                self.warn(
                    &at,
                    format!(
                        "action '{}' is not referenced by any node on {}",
                        action.id,
                        action.available_on.join(", ")
                    ),
                );
            }
        }
    }

    fn required(&mut self, contract: &UiContract) {
        let screens: HashSet<&str> = contract.screens.iter().map(|s| s.id.as_str()).collect();
        let actions: HashSet<&str> = contract.actions.iter().map(|a| a.id.as_str()).collect();

        for id in REQUIRED_SCREENS.iter().filter(|id| !screens.contains(*id)) {
            self.warn("screens", format!("required screen '{}' is missing from the contract", id));
        }
        for id in REQUIRED_ACTIONS.iter().filter(|id| !actions.contains(*id)) {
            self.warn("actions", format!("required action '{}' is missing from the contract", id));
        }
    }

    fn named_rules(&mut self, contract: &UiContract, distances: &BTreeMap<String, i64>) {
        for rule in ACTION_RULES {
            let Some((i, action)) = contract
                .actions
                .iter()
                .enumerate()
                .find(|(_, a)| a.id == rule.action)
            else {
                continue;
            };
            let at = format!("actions[{}]", i);

            if !action.available_on.iter().any(|s| s == rule.host_screen) {
                self.warn(
                    &format!("{}.available_on", at),
                    format!("'{}' must be available on '{}'", rule.action, rule.host_screen),
                );
            }
            if let Some(max) = action.max_steps_from_home {
                if max > rule.max_steps {
                    self.warn(
                        &format!("{}.max_steps_from_home", at),
                        format!(
                            "'{}' must be reachable within {} steps, contract allows {}",
                            rule.action, rule.max_steps, max
                        ),
                    );
                }
            }
            if let Some(d) = distances.get(rule.host_screen) {
                if *d > rule.max_steps {
                    self.warn(
                        &format!("{}.available_on", at),
                        format!(
                            "'{}' is {} steps from home, '{}' requires at most {}",
                            rule.host_screen, d, rule.action, rule.max_steps
                        ),
                    );
                }
            }
        }
    }
}
