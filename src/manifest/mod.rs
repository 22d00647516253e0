//! App manifest layer: loading, validating and publishing the merged manifest.
//!
//! # App Manifest Layer
//!
//! An app describes itself through small JSON fragments spread over five
//! section directories (routes, views, ap, data, storage) plus a root
//! descriptor. This module reads those fragments, validates every entry,
//! merges them into one [`AppManifest`] and enforces the cross-fragment
//! invariants (unique ids, reserved namespaces, core-route ownership,
//! resolvable insert targets and handlers).
//!
//! ## Module Structure
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | Root descriptor and section directory layout |
//! | [`error`] | Fragment source errors |
//! | [`issue`] | Diagnostics with file provenance |
//! | [`loader`] | Load cycle: read, validate, merge, fail closed |
//! | [`model`] | Merged manifest data model |
//! | [`registry`] | Hot-reloadable published manifest |
//! | [`schema`] | Schema version gate |
//! | [`sections`] | Per-fragment structural validators |
//! | [`source`] | File system and in-memory fragment sources |
//!
//! ## Example
//!
//! ```rust,no_run
//! use app_manifest::manifest::ManifestLoader;
//!
//! #[tokio::main]
//! async fn main() {
//!     let result = ManifestLoader::new(".")
//!         .with_handlers(["feed.list", "post.create"])
//!         .load()
//!         .await;
//!     for issue in &result.issues {
//!         eprintln!("{}", issue);
//!     }
//!     if let Some(manifest) = result.manifest {
//!         println!("{} routes, {} screens", manifest.routes.len(), manifest.views.screens.len());
//!     }
//! }
//! ```

pub mod config;
pub mod error;
pub mod issue;
pub mod loader;
pub mod model;
pub mod registry;
pub mod schema;
pub mod sections;
pub mod source;

pub use config::{AppLayout, LayoutOverrides, RootDescriptor, Section};
pub use error::ManifestError;
pub use issue::{Issue, IssueKind, IssueList, Provenance, Severity};
pub use loader::{load_app_manifest, LoadResult, ManifestLoader};
pub use model::*;
pub use registry::{ManifestHandle, ManifestRegistry, ReloadOutcome};
pub use schema::{
    check_compatibility, Compatibility, SchemaVersion, APP_MANIFEST_SCHEMA_VERSION,
    UI_CONTRACT_SCHEMA_VERSION,
};
pub use sections::FragmentChecker;
pub use source::{FragmentSource, FsFragmentSource, MemoryFragmentSource};
