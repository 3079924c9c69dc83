//! Cache of raw downloaded artifacts.
//!
//! Entries are files named `<descriptor name>.jar` in the artifact
//! directory. Writes stream chunk by chunk and drive the supplied
//! progress callback; garbage collection deletes every entry not
//! referenced by any known manifest.

use std::collections::HashSet;
use std::io::Write;
use std::path::PathBuf;

use tracing::debug;

use super::callback::Callback;
use super::error::{ModuleError, Result};
use super::manifest::{Descriptor, ModuleManifest};
use super::transport::ByteStream;
use super::workspace::{is_safe_name, Workspace};

/// The set of cache keys referenced by the given manifests: the union of
/// every manifest's own descriptor and all dependency descriptors.
pub fn live_keys(manifests: &[ModuleManifest]) -> HashSet<String> {
    let mut live = HashSet::new();
    for manifest in manifests {
        live.insert(manifest.descriptor().artifact_file_name());
        for dependency in &manifest.dependencies {
            live.insert(dependency.artifact_file_name());
        }
    }
    live
}

/// Directory of raw downloaded archives, keyed by descriptor name.
#[derive(Debug, Clone)]
pub struct ArtifactCache {
    dir: PathBuf,
}

impl ArtifactCache {
    /// Create a cache over the workspace artifact directory.
    pub fn new(workspace: &Workspace) -> Self {
        Self {
            dir: workspace.artifact_dir(),
        }
    }

    /// Path of the cache entry for `descriptor`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidName` if the descriptor name is not filesystem-safe.
    pub fn entry_path(&self, descriptor: &Descriptor) -> Result<PathBuf> {
        if !is_safe_name(&descriptor.name) {
            return Err(ModuleError::InvalidName {
                name: descriptor.name.clone(),
            });
        }
        Ok(self.dir.join(descriptor.artifact_file_name()))
    }

    /// Whether an entry exists for `descriptor`.
    pub fn has(&self, descriptor: &Descriptor) -> bool {
        self.entry_path(descriptor)
            .map(|path| path.is_file())
            .unwrap_or(false)
    }

    /// Stream an artifact into the cache, replacing any existing entry.
    ///
    /// The callback sees `on_start`, then a completion percentage per chunk
    /// when the stream's total length is known, then `on_finish`. When the
    /// length is unknown only `on_start` and `on_finish` fire.
    ///
    /// # Errors
    ///
    /// Returns an error on any read or write failure; a partial entry is
    /// removed before the error is returned.
    pub async fn put(
        &self,
        descriptor: &Descriptor,
        mut stream: ByteStream,
        callback: &mut dyn Callback,
    ) -> Result<PathBuf> {
        let path = self.entry_path(descriptor)?;
        std::fs::create_dir_all(&self.dir)?;

        callback.on_start();
        let result = Self::write_stream(&path, &mut stream, callback).await;
        if let Err(e) = result {
            if path.exists() {
                let _ = std::fs::remove_file(&path);
            }
            return Err(e);
        }
        callback.on_finish();
        debug!(entry = %path.display(), "cached artifact");
        Ok(path)
    }

    async fn write_stream(
        path: &PathBuf,
        stream: &mut ByteStream,
        callback: &mut dyn Callback,
    ) -> Result<()> {
        let total = stream.total_len();
        let mut file = std::fs::File::create(path)?;
        let mut written: u64 = 0;
        while let Some(chunk) = stream.next_chunk().await {
            let chunk = chunk.map_err(ModuleError::from)?;
            file.write_all(&chunk)?;
            written += chunk.len() as u64;
            if let Some(total) = total {
                if total > 0 {
                    callback.on_progress(((written * 100) / total) as u32);
                }
            }
        }
        file.flush()?;
        Ok(())
    }

    /// Cache entry file names, in name order.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read.
    pub fn entries(&self) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "jar") {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }

    /// Delete every cached entry whose key is not in `live`.
    ///
    /// # Returns
    ///
    /// The keys of the removed entries.
    ///
    /// # Errors
    ///
    /// Returns an error if enumeration or deletion fails.
    pub fn garbage_collect(&self, live: &HashSet<String>) -> Result<Vec<String>> {
        let mut removed = Vec::new();
        for path in self.entries()? {
            let key = match path.file_name().and_then(|n| n.to_str()) {
                Some(name) => name.to_string(),
                None => continue,
            };
            if !live.contains(&key) {
                std::fs::remove_file(&path)?;
                debug!(entry = %key, "garbage-collected artifact");
                removed.push(key);
            }
        }
        Ok(removed)
    }
}
