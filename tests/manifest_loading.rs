mod common;

use std::sync::Arc;

use app_manifest::manifest::{
    load_app_manifest, IssueKind, ManifestLoader, ManifestRegistry, ReloadOutcome, Severity,
};
use common::{social_app, HANDLERS};

#[tokio::test]
async fn test_valid_app_merges_every_section() {
    let handlers = HANDLERS.iter().map(|h| h.to_string()).collect();
    let result = load_app_manifest(&social_app(), "", Some(&handlers)).await;
    assert!(!result.has_errors(), "{:#?}", result.issues);

    let manifest = result.manifest.expect("manifest should be published");
    assert_eq!(manifest.version.as_deref(), Some("7"));
    assert_eq!(manifest.routes.len(), 3);
    assert_eq!(manifest.views.screens.len(), 4);
    assert_eq!(manifest.ap.handlers[0].id, "ap.inbox");
    assert!(manifest.data.collections.contains_key("posts"));
    assert_eq!(manifest.storage.buckets["media"].allowed_mime, vec!["image/*"]);

    // Core screens without a route get their fixed path.
    assert_eq!(manifest.screen("screen.home").unwrap().route.as_deref(), Some("/"));
    assert_eq!(manifest.screen("screen.profile").unwrap().route.as_deref(), Some("/profile"));

    // Inserts are ordered by `order`, the unordered one first.
    let footer: Vec<i64> = manifest.inserts_for("screen.home").map(|i| i.order).collect();
    assert_eq!(footer, vec![0, 10, 20]);
}

#[tokio::test]
async fn test_unknown_handler_rejects_the_whole_manifest() {
    let handlers = ["feed.list".to_string()].into_iter().collect();
    let result = load_app_manifest(&social_app(), "", Some(&handlers)).await;

    assert!(result.manifest.is_none());
    let errors = result.errors();
    assert_eq!(errors.len(), 3, "{:#?}", errors);
    assert!(errors.iter().all(|i| i.kind == IssueKind::Conflict));
    assert!(errors.iter().any(|i| i.message.contains("'dm.send'")));
}

#[tokio::test]
async fn test_handler_check_is_skipped_without_a_handler_set() {
    let result = load_app_manifest(&social_app(), "", None).await;
    assert!(result.manifest.is_some(), "{:#?}", result.issues);
}

#[tokio::test]
async fn test_duplicate_route_ids_report_both_files() {
    let src = social_app().with_file(
        "app/routes/extra.json",
        r#"{"routes": [{"id": "feed.list", "method": "GET", "path": "/api/feed2", "handler": "feed.list"}]}"#,
    );
    let result = load_app_manifest(&src, "", None).await;
    assert!(result.manifest.is_none());

    let issue = result.errors()[0];
    assert_eq!(issue.kind, IssueKind::Conflict);
    assert_eq!(issue.location.as_ref().unwrap().file, "app/routes/extra.json");
    assert_eq!(issue.related.as_ref().unwrap().file, "app/routes/core.json");
}

#[tokio::test]
async fn test_duplicate_method_and_path_under_new_id_reports_both_files() {
    let src = social_app().with_file(
        "app/routes/extra.json",
        r#"{"routes": [
            {"id": "post.submit", "method": "POST", "path": "/api/posts/", "handler": "post.create"},
            {"id": "post.list", "method": "GET", "path": "/api/posts", "handler": "feed.list"}
        ]}"#,
    );
    let result = load_app_manifest(&src, "", None).await;
    assert!(result.manifest.is_none());

    let errors = result.errors();
    assert_eq!(errors.len(), 1, "{:#?}", errors);
    let issue = errors[0];
    assert_eq!(issue.kind, IssueKind::Conflict);
    assert!(issue.message.contains("POST /api/posts/"), "{}", issue.message);
    assert_eq!(issue.location.as_ref().unwrap().file, "app/routes/extra.json");
    assert_eq!(issue.location.as_ref().unwrap().path, "routes[0]");
    assert_eq!(issue.related.as_ref().unwrap().file, "app/routes/core.json");
}

#[tokio::test]
async fn test_reserved_namespaces_are_enforced() {
    let src = social_app()
        .with_file(
            "app/routes/auth.json",
            r#"{"routes": [{"id": "auth.cb", "method": "GET", "path": "/auth/callback", "handler": "x"}]}"#,
        )
        .with_file(
            "app/views/settings.json",
            r#"{"screens": [
                {"id": "screen.my_settings", "route": "/settings", "layout": {"type": "X"}},
                {"id": "screen.onboarding", "route": "/welcome", "layout": {"type": "X"}}
            ]}"#,
        );
    let result = load_app_manifest(&src, "", None).await;
    assert!(result.manifest.is_none());

    let reserved: Vec<_> = result
        .errors()
        .into_iter()
        .filter(|i| i.kind == IssueKind::ReservedNamespace)
        .collect();
    assert_eq!(reserved.len(), 3, "{:#?}", result.issues);
}

#[tokio::test]
async fn test_dangling_insert_target_is_a_conflict() {
    let src = social_app().with_file(
        "app/views/30-bad.json",
        r#"{"insert": [{"screen": "screen.missing", "position": "top", "node": {"type": "X"}}]}"#,
    );
    let result = load_app_manifest(&src, "", None).await;
    assert!(result.manifest.is_none());
    assert!(result.errors()[0].message.contains("screen.missing"));
}

#[tokio::test]
async fn test_parse_errors_are_file_scoped() {
    let src = social_app().with_file("app/data/broken.json", "{ not json");
    let result = load_app_manifest(&src, "", None).await;
    assert!(result.manifest.is_none());

    let issue = result.errors()[0];
    assert_eq!(issue.kind, IssueKind::Parse);
    assert_eq!(issue.location.as_ref().unwrap().file, "app/data/broken.json");
}

#[tokio::test]
async fn test_incompatible_fragment_major_version_fails() {
    let src = social_app().with_file("app/routes/old.json", r#"{"schema_version": "2.0.0", "routes": []}"#);
    let result = load_app_manifest(&src, "", None).await;
    assert!(result.manifest.is_none());
    assert_eq!(result.errors()[0].kind, IssueKind::Version);
}

#[tokio::test]
async fn test_minor_drift_is_only_a_warning() {
    let src = social_app().with_file("app/routes/new.json", r#"{"schema_version": "1.4.0", "routes": []}"#);
    let result = load_app_manifest(&src, "", None).await;
    assert!(result.manifest.is_some());
    assert_eq!(result.warnings().len(), 1);
    assert_eq!(result.warnings()[0].severity, Severity::Warning);
}

#[tokio::test]
async fn test_layout_overrides_move_section_dirs() {
    let src = app_manifest::manifest::MemoryFragmentSource::new()
        .with_file(
            "manifest.json",
            r#"{"schema_version": "1.0.0", "layout": {"base_dir": "fragments", "routes": "api"}}"#,
        )
        .with_file("fragments/api/a.json", common::ROUTES);
    let result = load_app_manifest(&src, "", None).await;
    assert_eq!(result.manifest.unwrap().routes.len(), 3);
}

#[tokio::test]
async fn test_loading_from_the_file_system() {
    let root = std::env::temp_dir().join(format!("app-manifest-{}", uuid::Uuid::new_v4()));
    for dir in ["app/routes", "app/views"] {
        tokio::fs::create_dir_all(root.join(dir)).await.unwrap();
    }
    tokio::fs::write(root.join("manifest.json"), common::DESCRIPTOR).await.unwrap();
    tokio::fs::write(root.join("app/routes/core.json"), common::ROUTES).await.unwrap();
    tokio::fs::write(root.join("app/views/screens.json"), common::SCREENS).await.unwrap();
    tokio::fs::write(root.join("app/views/notes.txt"), "ignored").await.unwrap();

    let result = ManifestLoader::new(&root).with_handlers(HANDLERS).load().await;
    let _ = tokio::fs::remove_dir_all(&root).await;

    assert!(!result.has_errors(), "{:#?}", result.issues);
    let manifest = result.manifest.unwrap();
    assert_eq!(manifest.routes.len(), 3);
    assert_eq!(manifest.views.screens.len(), 4);
}

#[tokio::test]
async fn test_missing_root_directory_is_a_source_error() {
    let result = ManifestLoader::new("/definitely/not/here").load().await;
    assert!(result.manifest.is_none());
    assert_eq!(result.errors()[0].kind, IssueKind::Source);
}

#[tokio::test]
async fn test_registry_keeps_last_good_manifest_on_rejected_reload() {
    let source = Arc::new(social_app());
    let loader = ManifestLoader::with_source(source.clone(), "");
    let (registry, first) = ManifestRegistry::load(loader).await;
    assert!(matches!(first, ReloadOutcome::Updated { .. }));
    let before = registry.current().unwrap().fingerprint.clone();

    assert!(matches!(registry.reload().await, ReloadOutcome::Unchanged));

    source.insert("app/views/99-broken.json", "{");
    match registry.reload().await {
        ReloadOutcome::Rejected { issues } => assert_eq!(issues[0].kind, IssueKind::Parse),
        other => panic!("expected rejection, got {:?}", other),
    }
    assert_eq!(registry.current().unwrap().fingerprint, before);

    source.remove("app/views/99-broken.json");
    source.remove("app/storage/media.json");
    assert!(matches!(registry.reload().await, ReloadOutcome::Updated { .. }));
    assert!(registry.manifest().unwrap().storage.buckets.is_empty());

    let router = registry.router().unwrap();
    let hit = router.resolve("/dm/42").unwrap();
    assert_eq!(hit.screen_id, "screen.dm_thread");
    assert_eq!(hit.params["thread"], "42");
}
