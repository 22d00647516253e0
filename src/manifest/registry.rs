//! Hot-reloadable manifest registry.
//!
//! Readers always see a complete, validated manifest. A reload that fails
//! validation leaves the previous handle in place.

use arc_swap::ArcSwapOption;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::SystemTime;

use super::issue::{Issue, IssueList};
use super::loader::{LoadResult, ManifestLoader};
use super::model::AppManifest;
use crate::routes::ScreenRouter;
use crate::{Error, ErrorContext};

/// An immutable, validated manifest together with its load metadata.
#[derive(Debug)]
pub struct ManifestHandle {
    pub manifest: Arc<AppManifest>,
    /// Hex SHA-256 of the canonical JSON form of the manifest.
    pub fingerprint: String,
    pub loaded_at: SystemTime,
    /// Warnings from the load cycle that produced this handle.
    pub warnings: Vec<Issue>,
}

/// Result of [`ManifestRegistry::reload`].
#[derive(Debug, Clone)]
pub enum ReloadOutcome {
    /// A new manifest was published.
    Updated { fingerprint: String },
    /// The fragments produced the manifest that is already published.
    Unchanged,
    /// Validation failed; the previous manifest (if any) stays active.
    Rejected { issues: Vec<Issue> },
}

pub struct ManifestRegistry {
    current: ArcSwapOption<ManifestHandle>,
    loader: ManifestLoader,
}

impl ManifestRegistry {
    pub fn new(loader: ManifestLoader) -> Self {
        Self {
            current: ArcSwapOption::empty(),
            loader,
        }
    }

    /// Create a registry and perform the first load.
    pub async fn load(loader: ManifestLoader) -> (Self, ReloadOutcome) {
        let registry = Self::new(loader);
        let outcome = registry.reload().await;
        (registry, outcome)
    }

    /// Create a registry that must start with a valid manifest. A rejected
    /// first load is reported as [`Error::Validation`] naming its first error.
    pub async fn open(loader: ManifestLoader) -> crate::Result<Self> {
        let (registry, outcome) = Self::load(loader).await;
        match outcome {
            ReloadOutcome::Rejected { issues } => Err(rejection_error(&issues)),
            ReloadOutcome::Updated { .. } | ReloadOutcome::Unchanged => Ok(registry),
        }
    }

    pub fn current(&self) -> Option<Arc<ManifestHandle>> {
        self.current.load_full()
    }

    pub fn manifest(&self) -> Option<Arc<AppManifest>> {
        self.current().map(|h| Arc::clone(&h.manifest))
    }

    /// Screen router over the currently published manifest.
    pub fn router(&self) -> Option<ScreenRouter> {
        self.manifest().map(ScreenRouter::from_manifest)
    }

    /// Run a load cycle and publish the result if it validates.
    pub async fn reload(&self) -> ReloadOutcome {
        let LoadResult {
            manifest, issues, ..
        } = self.loader.load().await;

        let Some(manifest) = manifest else {
            tracing::warn!(
                errors = issues.errors().len(),
                "manifest reload rejected, keeping previous manifest"
            );
            return ReloadOutcome::Rejected { issues };
        };

        let fingerprint = fingerprint(&manifest);
        if let Some(current) = self.current.load().as_ref() {
            if current.fingerprint == fingerprint {
                tracing::debug!(fingerprint = %fingerprint, "manifest unchanged");
                return ReloadOutcome::Unchanged;
            }
        }

        let warnings = issues.into_iter().filter(|i| !i.is_error()).collect();
        self.current.store(Some(Arc::new(ManifestHandle {
            manifest: Arc::new(manifest),
            fingerprint: fingerprint.clone(),
            loaded_at: SystemTime::now(),
            warnings,
        })));
        tracing::info!(fingerprint = %fingerprint, "published app manifest");
        ReloadOutcome::Updated { fingerprint }
    }
}

fn rejection_error(issues: &[Issue]) -> Error {
    let errors = issues.errors();
    let mut context = ErrorContext::new().with_source("manifest_loader");
    let message = match errors.first() {
        Some(first) => {
            if let Some(at) = &first.location {
                context = context
                    .with_field_path(at.path.clone())
                    .with_details(format!("in {}", at.file));
            }
            format!("manifest rejected with {} error(s): {}", errors.len(), first.message)
        }
        None => "manifest rejected".to_string(),
    };
    Error::validation_with_context(message, context)
}

/// Content fingerprint of a manifest. Provenance is not serialized, so moving
/// an entry between fragment files does not change it.
pub fn fingerprint(manifest: &AppManifest) -> String {
    let bytes = serde_json::to_vec(manifest).unwrap_or_default();
    Sha256::digest(&bytes)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}
