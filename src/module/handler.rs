//! The refresh orchestrator: acquire, rebuild, remove, resolve.
//!
//! `ModuleHandler` owns all pipeline state — the known manifest set, the
//! artifact cache, the staging tree, the loadable unit, and the current
//! loader — and sequences the stages for a single module (`acquire`) and
//! for the full known set (`refresh_all`), with dependency-download
//! deduplication, staged progress aggregation, and backup/rollback around
//! destructive steps.
//!
//! Every mutating operation takes `&mut self`: callers that want to run
//! operations from several tasks must serialize them, and the borrow
//! checker enforces that contract at compile time.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};

use super::cache::{live_keys, ArtifactCache};
use super::callback::{NoopCallback, StageSlice, StagedCallback};
use super::error::{ModuleError, Result};
use super::linker::{staging_entries, unpack_artifact, BundleLinker, Linker};
use super::loader::{EntryRegistry, ModuleEntry, UnitLoader};
use super::manifest::{Descriptor, ModuleManifest};
use super::store::{ManifestStore, Notifier, TracingNotifier};
use super::transport::Transport;
use super::workspace::Workspace;

/// Orchestrates the module acquisition, build, and load pipeline.
pub struct ModuleHandler<T: Transport> {
    workspace: Workspace,
    transport: T,
    store: ManifestStore,
    cache: ArtifactCache,
    linker: Box<dyn Linker>,
    registry: Arc<EntryRegistry>,
    notifier: Box<dyn Notifier>,
    builtin: Vec<ModuleManifest>,
    manifests: Vec<ModuleManifest>,
    loader: Option<UnitLoader>,
    ready: bool,
}

impl<T: Transport> ModuleHandler<T> {
    /// Create a handler over the given workspace and collaborators.
    ///
    /// The handler is not usable until [`setup`](Self::setup) has run.
    pub fn new(workspace: Workspace, transport: T, registry: Arc<EntryRegistry>) -> Self {
        let store = ManifestStore::new(&workspace);
        let cache = ArtifactCache::new(&workspace);
        Self {
            workspace,
            transport,
            store,
            cache,
            linker: Box::new(BundleLinker),
            registry,
            notifier: Box::new(TracingNotifier),
            builtin: Vec::new(),
            manifests: Vec::new(),
            loader: None,
            ready: false,
        }
    }

    /// Replace the build step.
    pub fn with_linker(mut self, linker: Box<dyn Linker>) -> Self {
        self.linker = linker;
        self
    }

    /// Replace the warning sink.
    pub fn with_notifier(mut self, notifier: Box<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Add built-in manifests that are always part of the known set.
    ///
    /// Used for local testing of modules that have no hosted manifest. A
    /// built-in is skipped when a stored manifest already has its name.
    pub fn with_builtin_manifests(mut self, manifests: Vec<ModuleManifest>) -> Self {
        self.builtin = manifests;
        self
    }

    /// Initialize directories, load the known manifest set, and rebuild
    /// the loadable unit from whatever artifacts are already cached.
    ///
    /// # Errors
    ///
    /// Returns an error if directory creation, the manifest reload, or the
    /// rebuild fails.
    pub fn setup(&mut self) -> Result<()> {
        self.workspace.init()?;
        self.refresh_configs()?;
        self.refresh_bundle(&mut NoopCallback)?;
        self.ready = true;
        info!(root = %self.workspace.root().display(), "module handler ready");
        Ok(())
    }

    /// Drop all in-memory state. The handler must be set up again before
    /// further use; on-disk state is untouched.
    pub fn destroy(&mut self) {
        self.manifests.clear();
        self.loader = None;
        self.ready = false;
    }

    /// Whether [`setup`](Self::setup) has completed.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// The known manifest set as of the last reload.
    pub fn configs(&self) -> &[ModuleManifest] {
        &self.manifests
    }

    /// The transport collaborator.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Whether a loadable unit is currently bound.
    pub fn has_loadable_unit(&self) -> bool {
        self.loader.is_some()
    }

    /// Fetch and parse a module manifest from `url`.
    ///
    /// Unlike the store's bulk load, a parse failure here is fatal to the
    /// call.
    ///
    /// # Errors
    ///
    /// Returns transport errors and `ManifestParse` for malformed JSON.
    pub async fn fetch_manifest(&self, url: &str) -> Result<ModuleManifest> {
        let json = self.transport.fetch_text(url).await?;
        debug!(url, "downloaded manifest");
        ModuleManifest::parse(&json, url)
    }

    /// Rebuild the known manifest set from the store and built-ins.
    ///
    /// # Errors
    ///
    /// Returns an error if the config directory cannot be read; individual
    /// malformed files are reported through the notifier and skipped.
    pub fn refresh_configs(&mut self) -> Result<()> {
        let mut manifests = self.store.load(self.notifier.as_ref())?;
        for builtin in &self.builtin {
            if !manifests.iter().any(|m| m.name == builtin.name) {
                manifests.push(builtin.clone());
            }
        }
        self.manifests = manifests;
        Ok(())
    }

    /// Acquire one module: persist its manifest and download its artifacts.
    ///
    /// # Arguments
    ///
    /// * `manifest` - The module to acquire
    /// * `already_downloaded` - Artifact URLs fetched earlier in the same
    ///   run; matching artifacts are skipped with a synthesized 0→100%
    ///   report, and every URL fetched here is added on success
    /// * `do_link` - Whether to run the link pipeline as a final stage
    /// * `callback` - Staged progress consumer
    ///
    /// # Process
    ///
    /// 1. Persist the manifest
    /// 2. Publish one stage per artifact (module + dependencies), plus a
    ///    final build stage when `do_link` is set
    /// 3. Download each artifact into the cache, in manifest order
    /// 4. Reload the known manifest set
    /// 5. When `do_link` is set, run the link pipeline rescaled into the
    ///    final stage
    ///
    /// # Errors
    ///
    /// Any failure aborts the call; every file this call wrote (manifest
    /// plus artifacts fetched so far) is deleted before the error is
    /// returned. Artifacts that existed before the call, or that were
    /// skipped via `already_downloaded`, are left untouched.
    pub async fn acquire(
        &mut self,
        manifest: &ModuleManifest,
        already_downloaded: &mut HashSet<String>,
        do_link: bool,
        callback: &mut dyn StagedCallback,
    ) -> Result<()> {
        let mut written: Vec<PathBuf> = Vec::new();
        match self
            .acquire_inner(manifest, already_downloaded, do_link, callback, &mut written)
            .await
        {
            Ok(()) => {
                info!(module = %manifest.name, "acquired module");
                Ok(())
            }
            Err(e) => {
                for path in written.iter().rev() {
                    if path.exists() {
                        let _ = std::fs::remove_file(path);
                    }
                }
                Err(e)
            }
        }
    }

    async fn acquire_inner(
        &mut self,
        manifest: &ModuleManifest,
        already_downloaded: &mut HashSet<String>,
        do_link: bool,
        callback: &mut dyn StagedCallback,
        written: &mut Vec<PathBuf>,
    ) -> Result<()> {
        written.push(self.store.save(manifest)?);

        let dependency_total = manifest.dependencies.len();
        let mut stages = Vec::with_capacity(dependency_total + 2);
        stages.push(format!("Getting main jar ({})...", manifest.name));
        for (index, dependency) in manifest.dependencies.iter().enumerate() {
            stages.push(format!(
                "Getting dependency {} ({}/{})...",
                dependency.name,
                index + 1,
                dependency_total
            ));
        }
        if do_link {
            stages.push("Building module bundle...".to_string());
        }
        callback.set_stages(&stages);

        self.fetch_artifact(&manifest.descriptor(), already_downloaded, callback, written)
            .await?;
        for dependency in &manifest.dependencies {
            self.fetch_artifact(dependency, already_downloaded, callback, written)
                .await?;
        }

        self.refresh_configs()?;

        if do_link {
            callback.on_start();
            let mut slice = StageSlice::new(callback);
            self.refresh_bundle(&mut slice)?;
            callback.on_finish();
        }
        Ok(())
    }

    async fn fetch_artifact(
        &self,
        descriptor: &Descriptor,
        already_downloaded: &mut HashSet<String>,
        callback: &mut dyn StagedCallback,
        written: &mut Vec<PathBuf>,
    ) -> Result<()> {
        if already_downloaded.contains(&descriptor.artifact_url) {
            // Fetched earlier in this run; report the stage as instantly done.
            callback.on_start();
            callback.on_progress(0);
            callback.on_progress(100);
            callback.on_finish();
            debug!(url = %descriptor.artifact_url, "artifact already downloaded in this run");
            return Ok(());
        }

        let stream = self.transport.fetch(&descriptor.artifact_url).await?;
        let path = self.cache.put(descriptor, stream, callback).await?;
        written.push(path);
        already_downloaded.insert(descriptor.artifact_url.clone());
        Ok(())
    }

    /// Rebuild the staging tree and the loadable unit from the cache.
    ///
    /// Deletes the existing unit, garbage-collects artifacts not
    /// referenced by any known manifest, unpacks every cached artifact's
    /// class entries into the staging tree, and runs the build step. An
    /// empty staging tree completes as a no-op with the loader left unset.
    ///
    /// # Errors
    ///
    /// Returns archive, I/O, and build failures. On failure the previous
    /// loader binding is kept, so earlier resolutions keep working.
    pub fn refresh_bundle(&mut self, callback: &mut dyn StagedCallback) -> Result<()> {
        let unit = self.workspace.bundle_path();
        if unit.exists() {
            std::fs::remove_file(&unit)?;
        }

        let removed = self.cache.garbage_collect(&live_keys(&self.manifests))?;
        if !removed.is_empty() {
            debug!(count = removed.len(), "garbage-collected unreferenced artifacts");
        }

        let staging = self.workspace.staging_dir();
        std::fs::create_dir_all(&staging)?;

        let artifacts = self.cache.entries()?;
        let mut stages: Vec<String> = artifacts
            .iter()
            .map(|path| {
                let name = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("artifact");
                format!("Unpacking {name}...")
            })
            .collect();
        stages.push("Linking module bundle...".to_string());
        callback.set_stages(&stages);

        for path in &artifacts {
            callback.on_start();
            unpack_artifact(path, &staging)?;
            callback.on_progress(100);
            callback.on_finish();
        }

        callback.on_start();
        if staging_entries(&staging)?.is_empty() {
            self.loader = None;
            callback.on_progress(100);
            callback.on_finish();
            info!("staging tree is empty; no loadable unit built");
            return Ok(());
        }

        self.linker
            .link(&staging, &unit, &self.workspace.scratch_dir())?;
        self.loader = Some(UnitLoader::open(&unit, Arc::clone(&self.registry))?);
        callback.on_progress(100);
        callback.on_finish();
        info!(unit = %unit.display(), "loadable unit rebuilt");
        Ok(())
    }

    /// Re-acquire every known module and rebuild the loadable unit.
    ///
    /// The staging tree is renamed aside as a backup before the rebuild
    /// (a stale backup from an earlier crashed run is deleted first). One
    /// stage is published per known manifest plus a final build stage;
    /// dependency downloads are deduplicated across modules within this
    /// run.
    ///
    /// # Errors
    ///
    /// On any failure the fresh staging tree is discarded and the backup
    /// is renamed back into place before the error is returned. On success
    /// the backup is deleted.
    pub async fn refresh_all(&mut self, callback: &mut dyn StagedCallback) -> Result<()> {
        self.refresh_configs()?;

        let staging = self.workspace.staging_dir();
        let backup = self.workspace.staging_backup_dir();
        if backup.exists() {
            std::fs::remove_dir_all(&backup)?;
        }
        if staging.exists() {
            std::fs::rename(&staging, &backup)?;
        } else {
            std::fs::create_dir_all(&backup)?;
        }
        std::fs::create_dir_all(&staging)?;

        match self.refresh_all_inner(callback).await {
            Ok(()) => {
                if backup.exists() {
                    let _ = std::fs::remove_dir_all(&backup);
                }
                info!(modules = self.manifests.len(), "full refresh complete");
                Ok(())
            }
            Err(e) => {
                let _ = std::fs::remove_dir_all(&staging);
                let _ = std::fs::rename(&backup, &staging);
                Err(e)
            }
        }
    }

    async fn refresh_all_inner(&mut self, callback: &mut dyn StagedCallback) -> Result<()> {
        let manifests = self.manifests.clone();
        let mut stages: Vec<String> = manifests
            .iter()
            .map(|m| format!("Getting module {}", m.name))
            .collect();
        stages.push("Building module bundle...".to_string());
        callback.set_stages(&stages);

        let mut already_downloaded = HashSet::new();
        for manifest in &manifests {
            callback.on_start();
            let mut slice = StageSlice::new(callback);
            self.acquire(manifest, &mut already_downloaded, false, &mut slice)
                .await?;
            callback.on_finish();
        }

        callback.on_start();
        let mut slice = StageSlice::new(callback);
        self.refresh_bundle(&mut slice)?;
        callback.on_finish();
        Ok(())
    }

    /// Remove a module and rebuild the remaining set.
    ///
    /// Deletes the module's manifest file (tolerating absence), then runs
    /// [`refresh_all`](Self::refresh_all) so the artifact cache and
    /// loadable unit no longer include it.
    ///
    /// # Returns
    ///
    /// `true` iff the manifest file deletion and the refresh both
    /// succeeded.
    ///
    /// # Errors
    ///
    /// Returns deletion and refresh failures.
    pub async fn remove(
        &mut self,
        manifest: &ModuleManifest,
        callback: &mut dyn StagedCallback,
    ) -> Result<bool> {
        let removed = self.store.remove(&manifest.name)?;
        self.refresh_all(callback).await?;
        info!(module = %manifest.name, "removed module");
        Ok(removed)
    }

    /// Resolve and instantiate the class named `qualified_name` from the
    /// current loadable unit.
    ///
    /// # Errors
    ///
    /// Returns `NotReady` if no link has ever succeeded, otherwise the
    /// loader's distinct resolution errors.
    pub fn resolve(&self, qualified_name: &str) -> Result<Box<dyn ModuleEntry>> {
        match &self.loader {
            Some(loader) => loader.resolve(qualified_name),
            None => Err(ModuleError::NotReady),
        }
    }

    /// Resolve and instantiate a module's entry class.
    ///
    /// # Errors
    ///
    /// Same as [`resolve`](Self::resolve).
    pub fn load_module(&self, manifest: &ModuleManifest) -> Result<Box<dyn ModuleEntry>> {
        self.resolve(&manifest.entry_class)
    }
}

impl<T: Transport> std::fmt::Debug for ModuleHandler<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleHandler")
            .field("root", &self.workspace.root())
            .field("manifests", &self.manifests.len())
            .field("ready", &self.ready)
            .finish_non_exhaustive()
    }
}
