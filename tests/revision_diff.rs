mod common;

use app_manifest::manifest::{load_app_manifest, IssueKind};
use app_manifest::revision::{diff_app_revision_manifests, RevisionDiff, RevisionSnapshot};
use serde_json::{json, Value};

async fn published() -> Value {
    let manifest = load_app_manifest(&common::social_app(), "", None)
        .await
        .manifest
        .expect("fixture app should validate");
    serde_json::to_value(&manifest).unwrap()
}

#[tokio::test]
async fn test_diff_between_published_revisions() {
    let before = published().await;
    let mut after = before.clone();

    after["version"] = json!("8");
    after["routes"].as_array_mut().unwrap().retain(|r| r["id"] != "dm.send");
    after["routes"].as_array_mut().unwrap().push(json!({
        "id": "post.delete", "method": "DELETE", "path": "/api/posts/:id", "handler": "post.delete"
    }));
    after["views"]["screens"][0]["title"] = json!("Home");
    after["storage"]["buckets"]["avatars"] = json!({"base_path": "avatars/"});

    let diff = diff_app_revision_manifests(
        &RevisionSnapshot::new("rev-1", before).with_script_ref("scripts@1"),
        &RevisionSnapshot::new("rev-2", after).with_script_ref("scripts@1"),
    );

    assert!(diff.issues.is_empty(), "{:#?}", diff.issues);
    assert!(diff.has_changes());
    assert!(diff.manifest_version_changed);
    assert!(!diff.script_changed);

    assert_eq!(diff.routes.added, vec!["post.delete"]);
    assert_eq!(diff.routes.removed, vec!["dm.send"]);
    assert_eq!(diff.routes.unchanged, vec!["feed.list", "post.create"]);
    assert_eq!(diff.screens.changed, vec!["screen.home"]);
    assert_eq!(diff.buckets.added, vec!["avatars"]);
    assert!(diff.collections.is_empty());
    assert!(diff.ap_handlers.is_empty());
}

#[tokio::test]
async fn test_identical_revisions_have_no_changes() {
    let doc = published().await;
    let text = doc.to_string();
    let diff = diff_app_revision_manifests(
        &RevisionSnapshot::new("a", doc),
        &RevisionSnapshot::new("b", text),
    );
    assert!(!diff.has_changes());
    assert_eq!(diff.screens.unchanged.len(), 4);
}

#[test]
fn test_script_ref_change_alone_is_a_change() {
    let doc = json!({"schema_version": "1.0.0"});
    let diff = diff_app_revision_manifests(
        &RevisionSnapshot::new("a", doc.clone()).with_script_ref("s1"),
        &RevisionSnapshot::new("b", doc).with_script_ref("s2"),
    );
    assert!(diff.script_changed);
    assert!(diff.has_changes());
}

#[test]
fn test_unparsable_snapshot_yields_issue_and_empty_diff() {
    let diff = diff_app_revision_manifests(
        &RevisionSnapshot::new("a", "{ nope"),
        &RevisionSnapshot::new("b", json!({"routes": [{"id": "x"}]})),
    );
    assert_eq!(diff.issues.len(), 1);
    assert_eq!(diff.issues[0].kind, IssueKind::Parse);
    assert!(diff.routes.is_empty());
    assert!(diff.routes.unchanged.is_empty());
}

#[test]
fn test_snapshot_records_accept_camel_and_snake_case() {
    let camel: RevisionSnapshot = serde_json::from_value(json!({
        "id": "r1", "manifestSnapshot": "{}", "scriptSnapshotRef": "s"
    }))
    .unwrap();
    let snake: RevisionSnapshot = serde_json::from_value(json!({
        "id": "r1", "manifest_snapshot": "{}", "script_snapshot_ref": "s"
    }))
    .unwrap();
    assert_eq!(camel, snake);
}

#[test]
fn test_diff_serializes_with_camel_case_keys() {
    let diff = RevisionDiff::default();
    let value = serde_json::to_value(&diff).unwrap();
    assert!(value.get("apHandlers").is_some());
    assert!(value.get("manifestVersionChanged").is_some());
}
