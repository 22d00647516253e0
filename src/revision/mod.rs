//! Revision history comparison.
//!
//! Published manifests are stored as immutable snapshots. This module diffs
//! two snapshots section by section (routes, screens, ap handlers, data
//! collections, storage buckets) and reports script and version changes.

pub mod diff;

pub use diff::{diff_app_revision_manifests, ManifestSnapshot, RevisionDiff, RevisionSnapshot, SectionDiff};
