//! Fragment sources: where manifest JSON files are read from.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use super::error::ManifestError;

/// Abstract file access used by the loader. Paths are `/`-separated and
/// relative to the source root.
#[async_trait]
pub trait FragmentSource: Send + Sync {
    async fn read_file(&self, path: &str) -> Result<String, ManifestError>;

    /// File names (not paths) directly inside `dir`. A missing directory
    /// yields `ManifestError::NotFound`.
    async fn list_files(&self, dir: &str) -> Result<Vec<String>, ManifestError>;
}

/// Reads fragments from the local file system.
#[derive(Debug, Clone)]
pub struct FsFragmentSource {
    root: PathBuf,
}

impl FsFragmentSource {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, rel: &str) -> PathBuf {
        rel.split('/')
            .filter(|p| !p.is_empty() && *p != ".")
            .fold(self.root.clone(), |acc, part| acc.join(part))
    }
}

#[async_trait]
impl FragmentSource for FsFragmentSource {
    async fn read_file(&self, path: &str) -> Result<String, ManifestError> {
        let full = self.resolve(path);
        let bytes = tokio::fs::read(&full).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ManifestError::NotFound {
                    path: path.to_string(),
                }
            } else {
                ManifestError::LoadError {
                    path: full.to_string_lossy().to_string(),
                    reason: e.to_string(),
                    hint: Some("Check file permissions.".to_string()),
                }
            }
        })?;

        // Tolerate a UTF-8 BOM written by some editors.
        let bytes = match bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
            Some(rest) => rest.to_vec(),
            None => bytes,
        };
        String::from_utf8(bytes).map_err(|_| ManifestError::InvalidEncoding {
            path: path.to_string(),
        })
    }

    async fn list_files(&self, dir: &str) -> Result<Vec<String>, ManifestError> {
        let full = self.resolve(dir);
        let mut rd = match tokio::fs::read_dir(&full).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ManifestError::NotFound {
                    path: dir.to_string(),
                })
            }
            Err(e) => {
                return Err(ManifestError::LoadError {
                    path: full.to_string_lossy().to_string(),
                    reason: e.to_string(),
                    hint: None,
                })
            }
        };

        let mut names = Vec::new();
        loop {
            let entry = match rd.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    return Err(ManifestError::LoadError {
                        path: full.to_string_lossy().to_string(),
                        reason: e.to_string(),
                        hint: None,
                    })
                }
            };
            let is_file = entry
                .file_type()
                .await
                .map(|t| t.is_file())
                .unwrap_or(false);
            if is_file {
                names.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        Ok(names)
    }
}

/// In-memory source, keyed by relative path. Useful for tests and for hosts
/// that bundle fragments.
#[derive(Debug, Default)]
pub struct MemoryFragmentSource {
    files: RwLock<BTreeMap<String, String>>,
}

impl MemoryFragmentSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, path: impl Into<String>, content: impl Into<String>) -> Self {
        self.insert(path, content);
        self
    }

    pub fn insert(&self, path: impl Into<String>, content: impl Into<String>) {
        if let Ok(mut files) = self.files.write() {
            files.insert(normalize(&path.into()), content.into());
        }
    }

    pub fn remove(&self, path: &str) -> bool {
        self.files
            .write()
            .map(|mut files| files.remove(&normalize(path)).is_some())
            .unwrap_or(false)
    }
}

fn normalize(path: &str) -> String {
    path.split('/')
        .filter(|p| !p.is_empty() && *p != ".")
        .collect::<Vec<_>>()
        .join("/")
}

#[async_trait]
impl FragmentSource for MemoryFragmentSource {
    async fn read_file(&self, path: &str) -> Result<String, ManifestError> {
        let files = self
            .files
            .read()
            .map_err(|e| ManifestError::Internal(format!("source lock poisoned: {}", e)))?;
        files
            .get(&normalize(path))
            .cloned()
            .ok_or_else(|| ManifestError::NotFound {
                path: path.to_string(),
            })
    }

    async fn list_files(&self, dir: &str) -> Result<Vec<String>, ManifestError> {
        let files = self
            .files
            .read()
            .map_err(|e| ManifestError::Internal(format!("source lock poisoned: {}", e)))?;
        let dir = normalize(dir);
        let prefix = if dir.is_empty() {
            String::new()
        } else {
            format!("{}/", dir)
        };

        let names: Vec<String> = files
            .keys()
            .filter_map(|k| k.strip_prefix(&prefix))
            .filter(|rest| !rest.contains('/'))
            .map(str::to_string)
            .collect();

        let dir_exists = !names.is_empty() || files.keys().any(|k| k.starts_with(&prefix));
        if !dir_exists {
            return Err(ManifestError::NotFound { path: dir });
        }
        Ok(names)
    }
}
