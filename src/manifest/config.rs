//! Root descriptor and directory layout configuration.

use serde::{Deserialize, Serialize};

/// File name of the root descriptor, relative to the manifest root.
pub const ROOT_DESCRIPTOR_FILE: &str = "manifest.json";

pub const DEFAULT_BASE_DIR: &str = "app";

/// The five fragment sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Routes,
    Views,
    Ap,
    Data,
    Storage,
}

impl Section {
    pub const ALL: [Section; 5] = [
        Section::Routes,
        Section::Views,
        Section::Ap,
        Section::Data,
        Section::Storage,
    ];

    pub fn default_dir(&self) -> &'static str {
        match self {
            Section::Routes => "routes",
            Section::Views => "views",
            Section::Ap => "ap",
            Section::Data => "data",
            Section::Storage => "storage",
        }
    }

    /// Only routes and views fragments carry their own `schema_version`.
    pub fn is_versioned(&self) -> bool {
        matches!(self, Section::Routes | Section::Views)
    }
}

/// Optional layout overrides declared in the root descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutOverrides {
    #[serde(default)]
    pub base_dir: Option<String>,
    #[serde(default)]
    pub routes: Option<String>,
    #[serde(default)]
    pub views: Option<String>,
    #[serde(default)]
    pub ap: Option<String>,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub storage: Option<String>,
}

/// `manifest.json`: `{schema_version, version?, layout?}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootDescriptor {
    pub schema_version: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub layout: LayoutOverrides,
}

/// Resolved section directories, relative to the manifest root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppLayout {
    pub base_dir: String,
    pub routes: String,
    pub views: String,
    pub ap: String,
    pub data: String,
    pub storage: String,
}

impl Default for AppLayout {
    fn default() -> Self {
        Self::resolve(&LayoutOverrides::default())
    }
}

impl AppLayout {
    pub fn resolve(overrides: &LayoutOverrides) -> Self {
        let base_dir = overrides
            .base_dir
            .as_deref()
            .map(normalize_dir)
            .unwrap_or_else(|| DEFAULT_BASE_DIR.to_string());

        let dir = |custom: &Option<String>, section: Section| {
            let name = custom
                .as_deref()
                .map(normalize_dir)
                .unwrap_or_else(|| section.default_dir().to_string());
            join(&base_dir, &name)
        };

        Self {
            routes: dir(&overrides.routes, Section::Routes),
            views: dir(&overrides.views, Section::Views),
            ap: dir(&overrides.ap, Section::Ap),
            data: dir(&overrides.data, Section::Data),
            storage: dir(&overrides.storage, Section::Storage),
            base_dir,
        }
    }

    pub fn dir_for(&self, section: Section) -> &str {
        match section {
            Section::Routes => &self.routes,
            Section::Views => &self.views,
            Section::Ap => &self.ap,
            Section::Data => &self.data,
            Section::Storage => &self.storage,
        }
    }
}

fn normalize_dir(raw: &str) -> String {
    let trimmed = raw.trim().trim_start_matches("./").trim_matches('/');
    if trimmed.is_empty() {
        ".".to_string()
    } else {
        trimmed.to_string()
    }
}

fn join(base: &str, name: &str) -> String {
    match (base, name) {
        (".", n) => n.to_string(),
        (b, ".") => b.to_string(),
        (b, n) => format!("{}/{}", b, n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_nests_sections_under_app() {
        let layout = AppLayout::default();
        assert_eq!(layout.routes, "app/routes");
        assert_eq!(layout.storage, "app/storage");
    }

    #[test]
    fn overrides_replace_base_and_individual_dirs() {
        let layout = AppLayout::resolve(&LayoutOverrides {
            base_dir: Some("./".into()),
            views: Some("screens/".into()),
            ..Default::default()
        });
        assert_eq!(layout.base_dir, ".");
        assert_eq!(layout.views, "screens");
        assert_eq!(layout.routes, "routes");
    }
}
