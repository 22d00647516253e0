//! Core route registry.
//!
//! Built-in screens own fixed, immutable navigation paths. The table is used
//! at validation time (an app may not redefine these paths) and at routing
//! time (a path owned by a core screen always resolves to it).

use once_cell::sync::Lazy;
use serde::Serialize;

use super::pattern::RoutePattern;

/// Built-in screen ids and their canonical route patterns.
pub const CORE_SCREEN_ROUTES: &[(&str, &str)] = &[
    ("screen.home", "/"),
    ("screen.onboarding", "/onboarding"),
    ("screen.profile", "/profile"),
    ("screen.profile_edit", "/profile/edit"),
    ("screen.settings", "/settings"),
    ("screen.notifications", "/notifications"),
    ("screen.user_profile", "/@:handle"),
];

/// Path prefixes owned by the host. `/-/*` style entries cover the prefix
/// itself and everything below it; plain entries are exact paths plus their
/// sub-paths.
pub const RESERVED_PREFIXES: &[&str] = &["/login", "/logout", "/-/*", "/auth/*", "/.well-known/*"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoreRouteOwner {
    pub screen_id: &'static str,
    pub path: &'static str,
}

struct CoreRoute {
    screen_id: &'static str,
    path: &'static str,
    pattern: RoutePattern,
}

static CORE_ROUTES: Lazy<Vec<CoreRoute>> = Lazy::new(|| {
    CORE_SCREEN_ROUTES
        .iter()
        .filter_map(|&(screen_id, path)| match RoutePattern::compile(path) {
            Ok(pattern) => Some(CoreRoute {
                screen_id,
                path,
                pattern,
            }),
            Err(e) => {
                tracing::error!(screen = %screen_id, error = %e, "core route pattern failed to compile");
                None
            }
        })
        .collect()
});

/// Which core screen (if any) owns `path`.
///
/// Literal core routes win over parameterized ones, so `/profile` resolves
/// to `screen.profile` even though `/@:handle` is also registered.
pub fn find_core_route_owner(path: &str) -> Option<CoreRouteOwner> {
    let owner = CORE_ROUTES
        .iter()
        .filter(|r| !r.pattern.is_parameterized())
        .chain(CORE_ROUTES.iter().filter(|r| r.pattern.is_parameterized()))
        .find(|r| r.pattern.is_match(path))?;

    Some(CoreRouteOwner {
        screen_id: owner.screen_id,
        path: owner.path,
    })
}

/// The fixed route of a core screen id.
pub fn core_route_for_screen(screen_id: &str) -> Option<&'static str> {
    CORE_SCREEN_ROUTES
        .iter()
        .find(|(id, _)| *id == screen_id)
        .map(|(_, path)| *path)
}

pub fn is_core_screen(screen_id: &str) -> bool {
    core_route_for_screen(screen_id).is_some()
}

/// The reserved prefix `path` falls under, if any.
pub fn reserved_prefix_for(path: &str) -> Option<&'static str> {
    RESERVED_PREFIXES.iter().copied().find(|reserved| {
        let base = reserved.trim_end_matches("/*");
        path == base || path.starts_with(&format!("{}/", base))
    })
}
