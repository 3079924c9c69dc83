//! Persistent store of known module manifests.
//!
//! One JSON file per manifest in the config directory. A bulk `load`
//! tolerates individual malformed files: each is reported through the
//! [`Notifier`] and skipped, so one bad document never hides the rest.

use std::path::PathBuf;

use tracing::warn;

use super::error::Result;
use super::manifest::ModuleManifest;
use super::workspace::{is_safe_name, Workspace};
use crate::module::error::ModuleError;

/// Sink for non-fatal warnings surfaced to the host.
pub trait Notifier: Send + Sync {
    /// Report a non-fatal condition.
    fn notify(&self, message: &str);
}

/// Notifier that forwards warnings to the tracing subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, message: &str) {
        warn!("{message}");
    }
}

/// File-backed store of module manifests.
#[derive(Debug, Clone)]
pub struct ManifestStore {
    dir: PathBuf,
}

impl ManifestStore {
    /// Create a store over the workspace config directory.
    pub fn new(workspace: &Workspace) -> Self {
        Self {
            dir: workspace.config_dir(),
        }
    }

    /// Load every manifest file, in file-name order.
    ///
    /// A file that fails to parse is reported through `notifier` and
    /// excluded; all other files still load.
    ///
    /// # Errors
    ///
    /// Returns an error only if the directory itself cannot be read.
    pub fn load(&self, notifier: &dyn Notifier) -> Result<Vec<ModuleManifest>> {
        let mut paths: Vec<PathBuf> = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut manifests = Vec::with_capacity(paths.len());
        for path in paths {
            let context = path.display().to_string();
            let parsed = std::fs::read_to_string(&path)
                .map_err(ModuleError::from)
                .and_then(|json| ModuleManifest::parse(&json, &context));
            match parsed {
                Ok(manifest) => manifests.push(manifest),
                Err(e) => notifier.notify(&format!("Skipping manifest {context}: {e}")),
            }
        }
        Ok(manifests)
    }

    /// Write or overwrite the manifest's file.
    ///
    /// Any prior file for the same name is removed first.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is not filesystem-safe, serialization
    /// fails, or the write fails.
    pub fn save(&self, manifest: &ModuleManifest) -> Result<PathBuf> {
        let path = self.manifest_path(&manifest.name)?;
        let json = manifest.to_json()?;
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(&path, json)?;
        Ok(path)
    }

    /// Delete the manifest file for `name`.
    ///
    /// # Returns
    ///
    /// `true` if the file did not exist or was deleted successfully.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is not filesystem-safe or deletion
    /// fails for a reason other than absence.
    pub fn remove(&self, name: &str) -> Result<bool> {
        let path = self.manifest_path(name)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(true),
            Err(e) => Err(e.into()),
        }
    }

    fn manifest_path(&self, name: &str) -> Result<PathBuf> {
        if !is_safe_name(name) {
            return Err(ModuleError::InvalidName {
                name: name.to_string(),
            });
        }
        Ok(self.dir.join(format!("{name}.json")))
    }
}
