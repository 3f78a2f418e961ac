//! Descriptor discovery and loading
//!
//! Read, interpolate, and deserialize compose descriptors, and find them
//! by their well-known file names.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::application::{ApplicationError, ApplicationResult};
use crate::config::Settings;
use crate::domain::{interpolate_document, ComposeFile, DomainError};
use crate::infrastructure::traits::{EnvSource, FileSystem};

/// A descriptor loaded from disk, plus what interpolation had to leave empty.
#[derive(Debug)]
pub struct LoadedDescriptor {
    pub path: PathBuf,
    pub file: ComposeFile,
    /// Variables referenced without a default and unset at load time.
    pub missing_vars: Vec<String>,
}

/// Service for finding and loading compose descriptors.
pub struct LoaderService {
    fs: Arc<dyn FileSystem>,
    env: Arc<dyn EnvSource>,
    file_names: Vec<String>,
}

impl LoaderService {
    pub fn new(fs: Arc<dyn FileSystem>, env: Arc<dyn EnvSource>, settings: &Settings) -> Self {
        Self {
            fs,
            env,
            file_names: settings.file_names.clone(),
        }
    }

    /// Load one descriptor: read, interpolate, deserialize.
    pub fn load(&self, path: &Path) -> ApplicationResult<LoadedDescriptor> {
        debug!("load: path={}", path.display());
        let content =
            self.fs
                .read_to_string(path)
                .map_err(|e| ApplicationError::OperationFailed {
                    context: format!("read descriptor {}", path.display()),
                    source: Box::new(e),
                })?;

        if content.trim().is_empty() {
            return Err(DomainError::EmptyDescriptor.into());
        }

        let value: serde_yaml::Value =
            serde_yaml::from_str(&content).map_err(|e| DomainError::Syntax {
                message: format!("{}: {}", path.display(), e),
            })?;

        let env = Arc::clone(&self.env);
        let lookup = move |name: &str| env.var(name);
        let interpolated = interpolate_document(value, &lookup)?;
        if !interpolated.missing.is_empty() {
            debug!(
                "load: {} unset variable(s): {}",
                interpolated.missing.len(),
                interpolated.missing.join(", ")
            );
        }

        let file = ComposeFile::from_value(interpolated.value)?;
        Ok(LoadedDescriptor {
            path: path.to_path_buf(),
            file,
            missing_vars: interpolated.missing,
        })
    }

    /// Find all descriptor files below `dir`, sorted by path.
    pub fn discover(&self, dir: &Path) -> ApplicationResult<Vec<PathBuf>> {
        debug!("discover: dir={}", dir.display());
        let mut found = Vec::new();
        for entry in walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let is_descriptor = entry
                .path()
                .file_name()
                .map(|n| self.file_names.iter().any(|f| n == f.as_str()))
                .unwrap_or(false);
            if is_descriptor {
                found.push(entry.path().to_path_buf());
            }
        }
        found.sort();
        debug!("discover: found {} descriptor(s)", found.len());
        Ok(found)
    }

    /// Find the descriptor directly in `dir`, honoring name precedence.
    pub fn find_default(&self, dir: &Path) -> Option<PathBuf> {
        self.file_names
            .iter()
            .map(|name| dir.join(name))
            .find(|candidate| self.fs.is_file(candidate))
    }

    /// Load the highest-precedence descriptor in `dir`.
    pub fn load_default(&self, dir: &Path) -> ApplicationResult<LoadedDescriptor> {
        let path = self
            .find_default(dir)
            .ok_or_else(|| ApplicationError::NoDescriptor(dir.to_path_buf()))?;
        self.load(&path)
    }
}
