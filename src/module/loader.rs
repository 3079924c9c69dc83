//! Class resolution against the current loadable unit.
//!
//! Rust has no runtime reflection, so instantiation goes through an
//! [`EntryRegistry`]: the host registers a no-argument constructor per
//! fully-qualified class name it is prepared to load. Resolution is still
//! gated on the loadable unit — a name resolves only when the merged unit
//! actually contains its class entry, so a constructor registration alone
//! never masks a missing module.

use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use zip::ZipArchive;

use super::error::{ModuleError, Result};

/// Surface of an instantiated module entry.
pub trait ModuleEntry: Send {
    /// Prepare the entry for use. Returns false if setup failed.
    fn setup(&mut self) -> bool;

    /// Whether the entry is ready for use.
    fn is_ready(&self) -> bool;

    /// Tear the entry down. Returns false if teardown failed.
    fn destroy(&mut self) -> bool;
}

/// No-argument constructor for a module entry.
///
/// Returning `None` marks the class as not instantiable.
pub type EntryConstructor = fn() -> Option<Box<dyn ModuleEntry>>;

/// Host-registered constructors keyed by fully-qualified class name.
#[derive(Default)]
pub struct EntryRegistry {
    constructors: HashMap<String, EntryConstructor>,
}

impl EntryRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the constructor for a fully-qualified class name,
    /// replacing any previous registration.
    pub fn register(&mut self, qualified_name: &str, constructor: EntryConstructor) {
        self.constructors
            .insert(qualified_name.to_string(), constructor);
    }

    /// Look up the constructor for a fully-qualified class name.
    pub fn constructor(&self, qualified_name: &str) -> Option<EntryConstructor> {
        self.constructors.get(qualified_name).copied()
    }
}

impl std::fmt::Debug for EntryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryRegistry")
            .field("registered", &self.constructors.len())
            .finish()
    }
}

/// The archive entry name for a fully-qualified class name.
fn class_entry(qualified_name: &str) -> String {
    format!("{}.class", qualified_name.replace('.', "/"))
}

/// Loader bound to one loadable unit.
///
/// Rebuilt whenever the unit is replaced; the entry index is read once at
/// open time, so a loader stays usable even after the unit file itself is
/// replaced on disk.
pub struct UnitLoader {
    unit_path: PathBuf,
    entries: HashSet<String>,
    registry: Arc<EntryRegistry>,
}

impl UnitLoader {
    /// Open the loadable unit at `unit_path` and index its entries.
    ///
    /// # Errors
    ///
    /// Returns `Archive` if the unit cannot be read as an archive.
    pub fn open(unit_path: &Path, registry: Arc<EntryRegistry>) -> Result<Self> {
        let file = std::fs::File::open(unit_path)?;
        let mut archive = ZipArchive::new(file).map_err(|e| ModuleError::Archive {
            path: unit_path.display().to_string(),
            source: Box::new(e),
        })?;

        let mut entries = HashSet::with_capacity(archive.len());
        for index in 0..archive.len() {
            let entry = archive.by_index(index).map_err(|e| ModuleError::Archive {
                path: unit_path.display().to_string(),
                source: Box::new(e),
            })?;
            if !entry.is_dir() {
                entries.insert(entry.name().to_string());
            }
        }

        Ok(Self {
            unit_path: unit_path.to_path_buf(),
            entries,
            registry,
        })
    }

    /// Path of the unit this loader is bound to.
    pub fn unit_path(&self) -> &Path {
        &self.unit_path
    }

    /// Whether the unit contains the class for `qualified_name`.
    pub fn contains(&self, qualified_name: &str) -> bool {
        self.entries.contains(&class_entry(qualified_name))
    }

    /// Read the raw bytes of the class entry for `qualified_name`.
    ///
    /// # Errors
    ///
    /// Returns `ClassNotFound` if the unit has no such entry, and
    /// `Archive` if the unit can no longer be read.
    pub fn class_bytes(&self, qualified_name: &str) -> Result<Vec<u8>> {
        let entry_name = class_entry(qualified_name);
        if !self.entries.contains(&entry_name) {
            return Err(ModuleError::ClassNotFound {
                name: qualified_name.to_string(),
            });
        }
        let file = std::fs::File::open(&self.unit_path)?;
        let mut archive = ZipArchive::new(file).map_err(|e| ModuleError::Archive {
            path: self.unit_path.display().to_string(),
            source: Box::new(e),
        })?;
        let mut entry = archive
            .by_name(&entry_name)
            .map_err(|e| ModuleError::Archive {
                path: self.unit_path.display().to_string(),
                source: Box::new(e),
            })?;
        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut bytes)?;
        Ok(bytes)
    }

    /// Resolve and instantiate the class named `qualified_name`.
    ///
    /// # Errors
    ///
    /// * `ClassNotFound` - the unit contains no class entry for the name
    /// * `NotAccessible` - the class is present but no constructor is
    ///   registered for it
    /// * `NotInstantiable` - the registered constructor refused to produce
    ///   an instance
    pub fn resolve(&self, qualified_name: &str) -> Result<Box<dyn ModuleEntry>> {
        if !self.contains(qualified_name) {
            return Err(ModuleError::ClassNotFound {
                name: qualified_name.to_string(),
            });
        }
        let constructor =
            self.registry
                .constructor(qualified_name)
                .ok_or_else(|| ModuleError::NotAccessible {
                    name: qualified_name.to_string(),
                })?;
        constructor().ok_or_else(|| ModuleError::NotInstantiable {
            name: qualified_name.to_string(),
        })
    }
}

impl std::fmt::Debug for UnitLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitLoader")
            .field("unit_path", &self.unit_path)
            .field("entries", &self.entries.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Trivial entry used by loader and handler tests.
    #[derive(Debug, Default)]
    pub(crate) struct StubEntry {
        ready: bool,
    }

    impl ModuleEntry for StubEntry {
        fn setup(&mut self) -> bool {
            self.ready = true;
            true
        }

        fn is_ready(&self) -> bool {
            self.ready
        }

        fn destroy(&mut self) -> bool {
            self.ready = false;
            true
        }
    }

    pub(crate) fn stub_constructor() -> Option<Box<dyn ModuleEntry>> {
        Some(Box::new(StubEntry::default()))
    }

    pub(crate) fn refusing_constructor() -> Option<Box<dyn ModuleEntry>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{refusing_constructor, stub_constructor};
    use super::*;
    use crate::module::linker::testing::make_archive;
    use tempfile::TempDir;

    fn unit_with_entries(entries: &[(&str, &[u8])]) -> (TempDir, PathBuf) {
        let temp = match TempDir::new() {
            Ok(dir) => dir,
            Err(e) => panic!("Failed to create temp dir: {e}"),
        };
        let path = temp.path().join("bundle.jar");
        if let Err(e) = std::fs::write(&path, make_archive(entries)) {
            panic!("write failed: {e}");
        }
        (temp, path)
    }

    fn registry_with(name: &str, constructor: EntryConstructor) -> Arc<EntryRegistry> {
        let mut registry = EntryRegistry::new();
        registry.register(name, constructor);
        Arc::new(registry)
    }

    #[test]
    fn test_class_entry_mapping() {
        assert_eq!(class_entry("com.x.Entry"), "com/x/Entry.class");
        assert_eq!(class_entry("Entry"), "Entry.class");
    }

    #[test]
    fn test_resolve_registered_class() {
        let (_temp, unit) = unit_with_entries(&[("com/x/Entry.class", b"bytes".as_slice())]);
        let registry = registry_with("com.x.Entry", stub_constructor);
        let loader = match UnitLoader::open(&unit, registry) {
            Ok(loader) => loader,
            Err(e) => panic!("open failed: {e}"),
        };

        match loader.resolve("com.x.Entry") {
            Ok(mut entry) => {
                assert!(!entry.is_ready());
                assert!(entry.setup());
                assert!(entry.is_ready());
                assert!(entry.destroy());
            }
            Err(e) => panic!("resolve failed: {e}"),
        }
    }

    #[test]
    fn test_resolve_missing_class() {
        let (_temp, unit) = unit_with_entries(&[("com/x/Entry.class", b"bytes".as_slice())]);
        let registry = registry_with("com.x.Other", stub_constructor);
        let loader = match UnitLoader::open(&unit, registry) {
            Ok(loader) => loader,
            Err(e) => panic!("open failed: {e}"),
        };

        match loader.resolve("com.x.Other") {
            Err(ModuleError::ClassNotFound { name }) => assert_eq!(name, "com.x.Other"),
            Err(e) => panic!("Expected ClassNotFound, got: {e}"),
            Ok(_) => panic!("Should not resolve a class missing from the unit"),
        }
    }

    #[test]
    fn test_resolve_unregistered_class_is_not_accessible() {
        let (_temp, unit) = unit_with_entries(&[("com/x/Entry.class", b"bytes".as_slice())]);
        let loader = match UnitLoader::open(&unit, Arc::new(EntryRegistry::new())) {
            Ok(loader) => loader,
            Err(e) => panic!("open failed: {e}"),
        };

        match loader.resolve("com.x.Entry") {
            Err(ModuleError::NotAccessible { name }) => assert_eq!(name, "com.x.Entry"),
            Err(e) => panic!("Expected NotAccessible, got: {e}"),
            Ok(_) => panic!("Should not resolve without a registered constructor"),
        }
    }

    #[test]
    fn test_resolve_refusing_constructor_is_not_instantiable() {
        let (_temp, unit) = unit_with_entries(&[("com/x/Entry.class", b"bytes".as_slice())]);
        let registry = registry_with("com.x.Entry", refusing_constructor);
        let loader = match UnitLoader::open(&unit, registry) {
            Ok(loader) => loader,
            Err(e) => panic!("open failed: {e}"),
        };

        match loader.resolve("com.x.Entry") {
            Err(ModuleError::NotInstantiable { name }) => assert_eq!(name, "com.x.Entry"),
            Err(e) => panic!("Expected NotInstantiable, got: {e}"),
            Ok(_) => panic!("Should not instantiate when the constructor refuses"),
        }
    }

    #[test]
    fn test_class_bytes_round_trip() {
        let (_temp, unit) = unit_with_entries(&[("com/x/Entry.class", b"classdata".as_slice())]);
        let loader = match UnitLoader::open(&unit, Arc::new(EntryRegistry::new())) {
            Ok(loader) => loader,
            Err(e) => panic!("open failed: {e}"),
        };

        match loader.class_bytes("com.x.Entry") {
            Ok(bytes) => assert_eq!(bytes, b"classdata"),
            Err(e) => panic!("class_bytes failed: {e}"),
        }
        assert!(matches!(
            loader.class_bytes("com.x.Missing"),
            Err(ModuleError::ClassNotFound { .. })
        ));
    }

    #[test]
    fn test_open_rejects_non_archive() {
        let temp = match TempDir::new() {
            Ok(dir) => dir,
            Err(e) => panic!("Failed to create temp dir: {e}"),
        };
        let path = temp.path().join("bundle.jar");
        if let Err(e) = std::fs::write(&path, b"not an archive") {
            panic!("write failed: {e}");
        }

        match UnitLoader::open(&path, Arc::new(EntryRegistry::new())) {
            Err(ModuleError::Archive { .. }) => {}
            Err(e) => panic!("Expected Archive error, got: {e}"),
            Ok(_) => panic!("Should reject a corrupt unit"),
        }
    }
}
