//! Route layer: the immutable core screen table, reserved prefixes, route
//! pattern compilation and request-time screen resolution.
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`core_routes`] | Built-in screen routes and reserved prefixes |
//! | [`pattern`] | `:param` / `*` route pattern compilation |
//! | [`router`] | Path to screen resolution over a validated manifest |

pub mod core_routes;
pub mod pattern;
pub mod router;

pub use core_routes::{
    core_route_for_screen, find_core_route_owner, is_core_screen, reserved_prefix_for,
    CoreRouteOwner, CORE_SCREEN_ROUTES, RESERVED_PREFIXES,
};
pub use pattern::RoutePattern;
pub use router::{ScreenMatch, ScreenRouter};
