//! Shared fragment fixtures for integration tests

#![allow(dead_code)]

use app_manifest::manifest::MemoryFragmentSource;

pub const DESCRIPTOR: &str = r#"{"schema_version": "1.0.0", "version": "7"}"#;

pub const ROUTES: &str = r#"{
  "schema_version": "1.0.0",
  "routes": [
    {"id": "feed.list", "method": "GET", "path": "/api/feed", "handler": "feed.list"},
    {"id": "post.create", "method": "POST", "path": "/api/posts", "handler": "post.create", "auth": true},
    {"id": "dm.send", "method": "POST", "path": "/api/dm/:thread", "handler": "dm.send", "auth": true}
  ]
}"#;

pub const SCREENS: &str = r#"{
  "screens": [
    {
      "id": "screen.home",
      "layout": {"type": "Column", "children": [
        {"type": "Button", "props": {"label": "Write", "action": "open_composer"}},
        {"type": "Button", "props": {"label": "Inbox", "action": "action.open_notifications"}},
        {"type": "Slot", "props": {"name": "footer"}}
      ]}
    },
    {
      "id": "screen.profile",
      "layout": {"type": "Button", "props": {"action": "edit_profile"}}
    },
    {
      "id": "screen.dm_list",
      "route": "/dm",
      "layout": {"type": "List", "props": {"action": "open_dm_thread"}}
    },
    {
      "id": "screen.dm_thread",
      "route": "/dm/:thread",
      "state": {"draft": {"type": "string"}},
      "layout": {"type": "Composer", "props": {"action": "send_dm"}}
    }
  ]
}"#;

pub const INSERTS: &str = r#"{
  "insert": [
    {"screen": "screen.home", "position": "footer", "order": 20, "node": {"type": "Text", "props": {"text": "b"}}},
    {"screen": "screen.home", "position": "footer", "order": 10, "node": {"type": "Text", "props": {"text": "a"}}},
    {"screen": "screen.home", "position": "footer", "node": {"type": "Button", "props": {"action": "send_post"}}}
  ]
}"#;

pub const AP: &str = r#"{"handlers": [{"id": "ap.inbox", "handler": "ap.inbox", "match": {"type": "Create"}}]}"#;

pub const DATA: &str = r#"{"collections": {"posts": {"schema": {"title": "string"}, "primary_key": "id"}}}"#;

pub const STORAGE: &str = r#"{"buckets": {"media": {"base_path": "media/", "allowed_mime": ["image/*"], "max_size_mb": 5}}}"#;

pub const HANDLERS: [&str; 4] = ["feed.list", "post.create", "dm.send", "ap.inbox"];

/// Fragments of a small, valid social app.
pub fn social_app() -> MemoryFragmentSource {
    MemoryFragmentSource::new()
        .with_file("manifest.json", DESCRIPTOR)
        .with_file("app/routes/core.json", ROUTES)
        .with_file("app/views/10-screens.json", SCREENS)
        .with_file("app/views/20-inserts.json", INSERTS)
        .with_file("app/ap/inbox.json", AP)
        .with_file("app/data/posts.json", DATA)
        .with_file("app/storage/media.json", STORAGE)
}
