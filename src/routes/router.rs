//! Request-time screen resolution.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::core_routes::find_core_route_owner;
use super::pattern::RoutePattern;
use crate::manifest::AppManifest;

/// A resolved navigation target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenMatch {
    pub screen_id: String,
    pub pattern: String,
    pub params: BTreeMap<String, String>,
    /// `true` when the path is owned by a built-in screen.
    pub core: bool,
}

/// Resolves request paths to screens. Core screens always win; app screens
/// are tried in declaration order with literal routes before parameterized
/// ones.
pub struct ScreenRouter {
    manifest: Arc<AppManifest>,
    routes: Vec<(String, RoutePattern)>,
}

impl ScreenRouter {
    pub fn from_manifest(manifest: Arc<AppManifest>) -> Self {
        let mut literal = Vec::new();
        let mut parameterized = Vec::new();

        for screen in &manifest.views.screens {
            let Some(route) = screen.route.as_deref() else {
                continue;
            };
            match RoutePattern::compile(route) {
                Ok(pattern) if pattern.is_parameterized() => {
                    parameterized.push((screen.id.clone(), pattern))
                }
                Ok(pattern) => literal.push((screen.id.clone(), pattern)),
                Err(e) => {
                    tracing::warn!(screen = %screen.id, route = %route, error = %e, "skipping unroutable screen");
                }
            }
        }

        literal.extend(parameterized);
        Self {
            manifest,
            routes: literal,
        }
    }

    pub fn manifest(&self) -> &Arc<AppManifest> {
        &self.manifest
    }

    pub fn resolve(&self, path: &str) -> Option<ScreenMatch> {
        let path = path.split(['?', '#']).next().unwrap_or(path);

        if let Some(owner) = find_core_route_owner(path) {
            let params = RoutePattern::compile(owner.path)
                .ok()
                .and_then(|p| p.captures(path))
                .unwrap_or_default();
            return Some(ScreenMatch {
                screen_id: owner.screen_id.to_string(),
                pattern: owner.path.to_string(),
                params,
                core: true,
            });
        }

        self.routes.iter().find_map(|(screen_id, pattern)| {
            pattern.captures(path).map(|params| ScreenMatch {
                screen_id: screen_id.clone(),
                pattern: pattern.as_str().to_string(),
                params,
                core: false,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{ScreenDefinition, UiNode};

    fn screen(id: &str, route: &str) -> ScreenDefinition {
        ScreenDefinition {
            id: id.to_string(),
            route: Some(route.to_string()),
            title: None,
            layout: UiNode::new("Column"),
            state: Default::default(),
            source: Default::default(),
        }
    }

    #[test]
    fn core_routes_win_and_app_routes_capture_params() {
        let mut manifest = AppManifest::empty("1.0.0");
        manifest.views.screens.push(screen("screen.dm_thread", "/dm/:thread_id"));
        manifest.views.screens.push(screen("screen.dm_new", "/dm/new"));
        let router = ScreenRouter::from_manifest(Arc::new(manifest));

        let home = router.resolve("/").unwrap();
        assert!(home.core);
        assert_eq!(home.screen_id, "screen.home");

        let user = router.resolve("/@bob?tab=posts").unwrap();
        assert_eq!(user.params.get("handle").unwrap(), "bob");

        assert_eq!(router.resolve("/dm/new").unwrap().screen_id, "screen.dm_new");
        let thread = router.resolve("/dm/42").unwrap();
        assert_eq!(thread.screen_id, "screen.dm_thread");
        assert_eq!(thread.params.get("thread_id").unwrap(), "42");

        assert!(router.resolve("/nowhere").is_none());
    }
}
