//! Diagnostics produced by loading, diffing and contract validation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where an entry (or a problem) came from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Provenance {
    /// Fragment file, relative to the manifest root.
    pub file: String,
    /// JSON path inside the file (e.g. `routes[2].path`).
    pub path: String,
}

impl Provenance {
    pub fn new(file: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            path: path.into(),
        }
    }

    /// Provenance of a child path (`routes[0]` + `path` -> `routes[0].path`).
    pub fn child(&self, segment: impl AsRef<str>) -> Self {
        let segment = segment.as_ref();
        let path = if self.path.is_empty() {
            segment.to_string()
        } else if segment.starts_with('[') {
            format!("{}{}", self.path, segment)
        } else {
            format!("{}.{}", self.path, segment)
        };
        Self {
            file: self.file.clone(),
            path,
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.file)
        } else {
            write!(f, "{}#{}", self.file, self.path)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

/// Issue taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// A fragment source could not be read.
    Source,
    /// Invalid JSON, file-scoped.
    Parse,
    /// Schema version missing, malformed or incompatible.
    Version,
    /// Field/type/enum failure, path-scoped.
    Structural,
    /// Duplicate id/route/key, dangling insert target, unresolved handler.
    Conflict,
    /// App path collides with a reserved prefix or a core screen route.
    ReservedNamespace,
    /// Reachability contract finding. Always advisory.
    Contract,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub severity: Severity,
    pub kind: IssueKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Provenance>,
    /// Second occurrence for conflicts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related: Option<Provenance>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl Issue {
    pub fn error(kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            kind,
            message: message.into(),
            location: None,
            related: None,
            hint: None,
        }
    }

    pub fn warning(kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(kind, message)
        }
    }

    pub fn at(mut self, location: Provenance) -> Self {
        self.location = Some(location);
        self
    }

    pub fn related_to(mut self, related: Provenance) -> Self {
        self.related = Some(related);
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {}", level, self.message)?;
        if let Some(ref loc) = self.location {
            write!(f, " [{}]", loc)?;
        }
        if let Some(ref related) = self.related {
            write!(f, " (also at {})", related)?;
        }
        if let Some(ref hint) = self.hint {
            write!(f, "\n Hint: {}", hint)?;
        }
        Ok(())
    }
}

/// Convenience accessors over a list of issues.
pub trait IssueList {
    fn has_errors(&self) -> bool;
    fn errors(&self) -> Vec<&Issue>;
    fn warnings(&self) -> Vec<&Issue>;
}

impl IssueList for [Issue] {
    fn has_errors(&self) -> bool {
        self.iter().any(Issue::is_error)
    }

    fn errors(&self) -> Vec<&Issue> {
        self.iter().filter(|i| i.is_error()).collect()
    }

    fn warnings(&self) -> Vec<&Issue> {
        self.iter().filter(|i| !i.is_error()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_paths_join_keys_and_indices() {
        let root = Provenance::new("routes/a.json", "routes");
        assert_eq!(root.child("[0]").path, "routes[0]");
        assert_eq!(root.child("[0]").child("path").path, "routes[0].path");
        assert_eq!(Provenance::new("x.json", "").child("id").path, "id");
    }

    #[test]
    fn display_includes_both_occurrences() {
        let issue = Issue::error(IssueKind::Conflict, "duplicate route id 'feed'")
            .at(Provenance::new("routes/b.json", "routes[0]"))
            .related_to(Provenance::new("routes/a.json", "routes[1]"));
        let text = issue.to_string();
        assert!(text.starts_with("error: duplicate route id 'feed'"));
        assert!(text.contains("routes/b.json#routes[0]"));
        assert!(text.contains("also at routes/a.json#routes[1]"));
    }
}
