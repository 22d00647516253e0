//! # app-manifest
//!
//! Declarative App Manifest runtime.
//!
//! ## Overview
//!
//! An app is described by JSON fragments instead of code: HTTP routes, UI
//! screens built from node trees, view inserts into existing screens, action
//! processor handlers, data collections and storage buckets. This library
//! loads those fragments, validates and merges them into one immutable
//! manifest, and interprets the screens at runtime.
//!
//! ## Core Philosophy
//!
//! - **Fail Closed**: any error-level issue suppresses the whole manifest for that load cycle
//! - **Diagnostics, Not Exceptions**: content problems are returned as [`manifest::Issue`] lists
//! - **Reserved Namespaces**: core screens own fixed routes; apps cannot shadow them
//! - **Contained Side Effects**: runtime action failures never unmount a screen
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use app_manifest::manifest::ManifestLoader;
//! use app_manifest::runtime::ScreenRuntime;
//!
//! #[tokio::main]
//! async fn main() -> app_manifest::Result<()> {
//!     let result = ManifestLoader::new("./my-app").load().await;
//!     for issue in &result.issues {
//!         eprintln!("{}", issue);
//!     }
//!     let Some(manifest) = result.manifest else {
//!         return Ok(());
//!     };
//!
//!     let screen = ScreenRuntime::builder(Arc::new(manifest), "screen.home").build()?;
//!     screen.initialize()?;
//!     let tree = screen.render()?;
//!     println!("{:?}", tree);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`manifest`] | Fragment loading, validation, merge and the published handle |
//! | [`routes`] | Core route registry and screen router |
//! | [`revision`] | Section-by-section diff of manifest snapshots |
//! | [`contract`] | UI reachability contract validation |
//! | [`runtime`] | Screen lifecycle, rendering and action interpreter |
//! | `transport` | reqwest client for the `api` action (feature `http-client`) |
//! | [`utils`] | JSON path helpers |

pub mod contract;
pub mod manifest;
pub mod revision;
pub mod routes;
pub mod runtime;
pub mod utils;

#[cfg(feature = "http-client")]
pub mod transport;

// Re-export main types for convenience
pub use contract::validate_ui_contract_against_manifest;
pub use manifest::{
    load_app_manifest, AppManifest, Issue, IssueKind, LoadResult, ManifestLoader, ManifestRegistry,
    Severity,
};
pub use revision::{diff_app_revision_manifests, RevisionDiff, RevisionSnapshot};
pub use routes::{core_route_for_screen, find_core_route_owner, ScreenRouter};
pub use runtime::{Handler, ScreenPhase, ScreenRuntime};

#[cfg(feature = "http-client")]
pub use transport::ReqwestApiClient;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
