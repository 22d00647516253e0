//! Manifest source error types

/// Errors raised by a [`crate::manifest::FragmentSource`].
///
/// These never escape the public load API: the loader turns them into
/// [`crate::manifest::Issue`] values.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("Failed to read {path}: {reason}{}", .hint.as_ref().map(|h| format!("\n Hint: {}", h)).unwrap_or_default())]
    LoadError {
        path: String,
        reason: String,
        hint: Option<String>,
    },

    #[error("Not found: {path}")]
    NotFound { path: String },

    #[error("Invalid UTF-8 in {path}")]
    InvalidEncoding { path: String },

    #[error("Internal manifest error: {0}")]
    Internal(String),
}

impl ManifestError {
    /// Attach an actionable hint to the error
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        if let ManifestError::LoadError { hint: ref mut slot, .. } = self {
            *slot = Some(hint.into());
        }
        self
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ManifestError::NotFound { .. })
    }
}
