//! Section-by-section comparison of two published manifest snapshots.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::manifest::{Issue, IssueKind, Provenance};
use crate::utils::json_path::PathMapper;

/// A manifest as stored in a revision: raw JSON text or an already parsed
/// document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ManifestSnapshot {
    Text(String),
    Parsed(Value),
}

impl From<&str> for ManifestSnapshot {
    fn from(text: &str) -> Self {
        ManifestSnapshot::Text(text.to_string())
    }
}

impl From<String> for ManifestSnapshot {
    fn from(text: String) -> Self {
        ManifestSnapshot::Text(text)
    }
}

impl From<Value> for ManifestSnapshot {
    fn from(doc: Value) -> Self {
        ManifestSnapshot::Parsed(doc)
    }
}

/// One immutable published revision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionSnapshot {
    pub id: String,
    #[serde(alias = "manifest_snapshot")]
    pub manifest_snapshot: ManifestSnapshot,
    #[serde(default, alias = "script_snapshot_ref")]
    pub script_snapshot_ref: Option<String>,
}

impl RevisionSnapshot {
    pub fn new(id: impl Into<String>, manifest: impl Into<ManifestSnapshot>) -> Self {
        Self {
            id: id.into(),
            manifest_snapshot: manifest.into(),
            script_snapshot_ref: None,
        }
    }

    pub fn with_script_ref(mut self, script_ref: impl Into<String>) -> Self {
        self.script_snapshot_ref = Some(script_ref.into());
        self
    }
}

/// Sorted id sets for one section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub changed: Vec<String>,
    pub unchanged: Vec<String>,
}

impl SectionDiff {
    /// `true` when nothing was added, removed or changed.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionDiff {
    pub issues: Vec<Issue>,
    pub script_changed: bool,
    pub manifest_version_changed: bool,
    pub routes: SectionDiff,
    pub screens: SectionDiff,
    pub ap_handlers: SectionDiff,
    pub collections: SectionDiff,
    pub buckets: SectionDiff,
}

impl RevisionDiff {
    pub fn has_changes(&self) -> bool {
        self.script_changed
            || self.manifest_version_changed
            || [
                &self.routes,
                &self.screens,
                &self.ap_handlers,
                &self.collections,
                &self.buckets,
            ]
            .iter()
            .any(|s| !s.is_empty())
    }
}

/// How entries of a section are identified.
#[derive(Clone, Copy)]
enum Keying {
    /// Array of objects, keyed by their `id` field.
    IdField,
    /// Object keyed by map key.
    MapKey,
}

const SECTIONS: [(&str, Keying); 5] = [
    ("routes", Keying::IdField),
    ("views.screens", Keying::IdField),
    ("ap.handlers", Keying::IdField),
    ("data.collections", Keying::MapKey),
    ("storage.buckets", Keying::MapKey),
];

/// Compare two revisions. Never fails: unparsable snapshots are reported in
/// `issues` and produce empty section diffs.
pub fn diff_app_revision_manifests(from: &RevisionSnapshot, to: &RevisionSnapshot) -> RevisionDiff {
    let mut diff = RevisionDiff {
        script_changed: from.script_snapshot_ref != to.script_snapshot_ref,
        ..Default::default()
    };

    let from_doc = parse_snapshot(from, &mut diff.issues);
    let to_doc = parse_snapshot(to, &mut diff.issues);
    let (Some(from_doc), Some(to_doc)) = (from_doc, to_doc) else {
        return diff;
    };

    diff.manifest_version_changed = from_doc.get("version") != to_doc.get("version");

    let sections: Vec<SectionDiff> = SECTIONS
        .iter()
        .map(|(path, keying)| {
            let before = section_entries(&from_doc, &from.id, path, *keying, &mut diff.issues);
            let after = section_entries(&to_doc, &to.id, path, *keying, &mut diff.issues);
            diff_entries(&before, &after)
        })
        .collect();
    // Same order as SECTIONS.
    let mut sections = sections.into_iter();
    diff.routes = sections.next().unwrap_or_default();
    diff.screens = sections.next().unwrap_or_default();
    diff.ap_handlers = sections.next().unwrap_or_default();
    diff.collections = sections.next().unwrap_or_default();
    diff.buckets = sections.next().unwrap_or_default();

    tracing::debug!(
        from = %from.id,
        to = %to.id,
        changed = diff.has_changes(),
        "diffed revision manifests"
    );
    diff
}

fn parse_snapshot(snapshot: &RevisionSnapshot, issues: &mut Vec<Issue>) -> Option<Value> {
    let at = Provenance::new(&snapshot.id, "manifestSnapshot");
    let doc = match &snapshot.manifest_snapshot {
        ManifestSnapshot::Parsed(doc) => doc.clone(),
        ManifestSnapshot::Text(text) => match serde_json::from_str::<Value>(text) {
            Ok(doc) => doc,
            Err(e) => {
                issues.push(
                    Issue::error(
                        IssueKind::Parse,
                        format!("revision '{}' manifest snapshot is not valid JSON: {}", snapshot.id, e),
                    )
                    .at(at),
                );
                return None;
            }
        },
    };

    if doc.is_object() {
        Some(doc)
    } else {
        issues.push(
            Issue::error(
                IssueKind::Structural,
                format!("revision '{}' manifest snapshot must be a JSON object", snapshot.id),
            )
            .at(at),
        );
        None
    }
}

fn section_entries<'a>(
    doc: &'a Value,
    revision: &str,
    path: &str,
    keying: Keying,
    issues: &mut Vec<Issue>,
) -> BTreeMap<String, &'a Value> {
    let mut out = BTreeMap::new();
    let at = Provenance::new(revision, path);

    let section = match PathMapper::get_path(doc, path) {
        None | Some(Value::Null) => return out,
        Some(section) => section,
    };

    match (keying, section) {
        (Keying::IdField, Value::Array(items)) => {
            for (i, item) in items.iter().enumerate() {
                match item.get("id").and_then(Value::as_str) {
                    Some(id) => {
                        if out.insert(id.to_string(), item).is_some() {
                            issues.push(
                                Issue::warning(
                                    IssueKind::Conflict,
                                    format!("duplicate id '{}' in {}, last entry wins", id, path),
                                )
                                .at(at.child(format!("[{}]", i))),
                            );
                        }
                    }
                    None => issues.push(
                        Issue::warning(IssueKind::Structural, format!("entry without an id skipped in {}", path))
                            .at(at.child(format!("[{}]", i))),
                    ),
                }
            }
        }
        (Keying::MapKey, Value::Object(map)) => {
            out.extend(map.iter().map(|(k, v)| (k.clone(), v)));
        }
        (Keying::IdField, _) => issues.push(
            Issue::warning(IssueKind::Structural, format!("{} is not an array, treated as empty", path)).at(at),
        ),
        (Keying::MapKey, _) => issues.push(
            Issue::warning(IssueKind::Structural, format!("{} is not an object, treated as empty", path)).at(at),
        ),
    }
    out
}

/// JSON value equality is independent of object key order.
fn diff_entries(before: &BTreeMap<String, &Value>, after: &BTreeMap<String, &Value>) -> SectionDiff {
    let mut diff = SectionDiff::default();
    for (id, old) in before {
        match after.get(id) {
            None => diff.removed.push(id.clone()),
            Some(new) if new == old => diff.unchanged.push(id.clone()),
            Some(_) => diff.changed.push(id.clone()),
        }
    }
    diff.added = after
        .keys()
        .filter(|id| !before.contains_key(*id))
        .cloned()
        .collect();
    diff
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn object_key_order_does_not_count_as_change() {
        let a = RevisionSnapshot::new("r1", r#"{"routes": [{"id": "feed", "method": "GET", "path": "/api/feed"}]}"#);
        let b = RevisionSnapshot::new("r2", r#"{"routes": [{"path": "/api/feed", "id": "feed", "method": "GET"}]}"#);
        let diff = diff_app_revision_manifests(&a, &b);
        assert_eq!(diff.routes.unchanged, vec!["feed"]);
        assert!(!diff.has_changes());
    }

    #[test]
    fn entries_without_id_are_skipped_with_warning() {
        let a = RevisionSnapshot::new("r1", json!({"ap": {"handlers": [{"handler": "inbox"}]}}));
        let diff = diff_app_revision_manifests(&a, &a.clone());
        assert!(diff.ap_handlers.unchanged.is_empty());
        assert_eq!(diff.issues.len(), 2);
        assert_eq!(diff.issues[0].location.as_ref().unwrap().path, "ap.handlers[0]");
    }

    #[test]
    fn non_object_snapshot_is_reported() {
        let a = RevisionSnapshot::new("r1", json!([1, 2]));
        let b = RevisionSnapshot::new("r2", json!({}));
        let diff = diff_app_revision_manifests(&a, &b);
        assert_eq!(diff.issues.len(), 1);
        assert_eq!(diff.issues[0].kind, IssueKind::Structural);
    }

    #[test]
    fn snapshot_deserializes_from_either_case() {
        let snap: RevisionSnapshot =
            serde_json::from_value(json!({"id": "r1", "manifest_snapshot": "{}", "scriptSnapshotRef": "s1"})).unwrap();
        assert_eq!(snap.manifest_snapshot, ManifestSnapshot::Text("{}".into()));
        assert_eq!(snap.script_snapshot_ref.as_deref(), Some("s1"));
    }
}
