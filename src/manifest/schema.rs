//! Schema versioning for manifest fragments.

use std::fmt;

/// Schema version compiled into this runtime.
pub const APP_MANIFEST_SCHEMA_VERSION: &str = "1.0.0";

/// Schema version of the UI reachability contract document.
pub const UI_CONTRACT_SCHEMA_VERSION: &str = "1.0";

/// A `major.minor.patch` version. Missing minor/patch parts default to 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SchemaVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl SchemaVersion {
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let raw = raw.strip_prefix('v').unwrap_or(raw);
        // Pre-release / build metadata do not take part in compatibility.
        let core = raw.split(['-', '+']).next().unwrap_or_default();
        let mut parts = core.split('.');

        let major = parts.next()?.parse().ok()?;
        let minor = match parts.next() {
            Some(p) => p.parse().ok()?,
            None => 0,
        };
        let patch = match parts.next() {
            Some(p) => p.parse().ok()?,
            None => 0,
        };
        if parts.next().is_some() {
            return None;
        }
        Some(Self {
            major,
            minor,
            patch,
        })
    }

    pub fn runtime() -> Self {
        Self::parse(APP_MANIFEST_SCHEMA_VERSION).unwrap_or(Self {
            major: 1,
            minor: 0,
            patch: 0,
        })
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Outcome of the version compatibility gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compatibility {
    Compatible,
    /// Same major, different minor/patch.
    Drift { declared: SchemaVersion },
    /// Different major.
    Incompatible { declared: SchemaVersion },
    /// Could not parse the declared version.
    Malformed,
}

/// Check a declared `schema_version` against the compiled-in one.
pub fn check_compatibility(declared: &str) -> Compatibility {
    check_against(declared, SchemaVersion::runtime())
}

pub fn check_against(declared: &str, runtime: SchemaVersion) -> Compatibility {
    let Some(declared) = SchemaVersion::parse(declared) else {
        return Compatibility::Malformed;
    };
    if declared.major != runtime.major {
        Compatibility::Incompatible { declared }
    } else if declared != runtime {
        Compatibility::Drift { declared }
    } else {
        Compatibility::Compatible
    }
}
