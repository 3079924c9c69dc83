//! Per-purpose directory layout for the module pipeline.
//!
//! All pipeline state lives under one root:
//!
//! ```text
//! <root>/config/          one JSON manifest file per known module
//! <root>/artifacts/       raw downloaded archives, keyed by name
//! <root>/staging/         merged class-bearing content awaiting a build
//! <root>/staging_backup/  pre-rebuild copy of the staging tree
//! <root>/bundle/          the loadable unit (bundle.jar)
//! <root>/scratch/         auxiliary directory required by the loader
//! ```
//!
//! Path segments are validated before they touch the filesystem; any
//! segment containing a separator or control character is rejected.

use std::path::{Path, PathBuf};

use super::error::{ModuleError, Result};

/// Characters that may not appear in a path segment.
const ILLEGAL_CHARACTERS: &[char] = &[
    '/', '\\', '\n', '\r', '\t', '\0', '\u{c}', '`', '?', '*', '<', '>', '|', '"', ':',
];

/// Returns true if `name` is usable as a single filesystem token.
pub(crate) fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && !name.chars().any(|c| ILLEGAL_CHARACTERS.contains(&c) || c.is_control())
}

/// Handle to the pipeline's directory layout.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Create a workspace rooted at the platform data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform directories cannot be determined.
    pub fn new() -> Result<Self> {
        let proj_dirs = directories::ProjectDirs::from("dev", "modhost", "modhost")
            .ok_or_else(|| ModuleError::Io {
                source: std::io::Error::other("could not determine project directories"),
            })?;
        Ok(Self {
            root: proj_dirs.data_dir().join("modules"),
        })
    }

    /// Create a workspace rooted at an explicit path.
    pub fn at_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The workspace root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create every namespace directory that does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error if directory creation fails.
    pub fn init(&self) -> Result<()> {
        std::fs::create_dir_all(self.config_dir())?;
        std::fs::create_dir_all(self.artifact_dir())?;
        std::fs::create_dir_all(self.staging_dir())?;
        std::fs::create_dir_all(self.bundle_dir())?;
        std::fs::create_dir_all(self.scratch_dir())?;
        Ok(())
    }

    /// Directory of manifest files.
    pub fn config_dir(&self) -> PathBuf {
        self.root.join("config")
    }

    /// Directory of raw downloaded archives.
    pub fn artifact_dir(&self) -> PathBuf {
        self.root.join("artifacts")
    }

    /// The staging tree of merged class-bearing content.
    pub fn staging_dir(&self) -> PathBuf {
        self.root.join("staging")
    }

    /// Backup location for the staging tree during a full refresh.
    pub fn staging_backup_dir(&self) -> PathBuf {
        self.root.join("staging_backup")
    }

    /// Directory holding the loadable unit.
    pub fn bundle_dir(&self) -> PathBuf {
        self.root.join("bundle")
    }

    /// Path of the loadable unit produced by the build step.
    pub fn bundle_path(&self) -> PathBuf {
        self.bundle_dir().join("bundle.jar")
    }

    /// Scratch directory required by the loader.
    pub fn scratch_dir(&self) -> PathBuf {
        self.root.join("scratch")
    }

    /// Resolve a file path inside a namespace.
    ///
    /// # Arguments
    ///
    /// * `namespace` - Top-level directory name under the root
    /// * `segments` - Path segments below the namespace
    ///
    /// # Errors
    ///
    /// Returns `InvalidName` if the namespace or any segment is empty or
    /// contains a path separator or control character, or if no segments
    /// are given.
    pub fn resolve(&self, namespace: &str, segments: &[&str]) -> Result<PathBuf> {
        if !is_safe_name(namespace) {
            return Err(ModuleError::InvalidName {
                name: namespace.to_string(),
            });
        }
        if segments.is_empty() {
            return Err(ModuleError::InvalidName {
                name: String::new(),
            });
        }
        let mut path = self.root.join(namespace);
        for segment in segments {
            if !is_safe_name(segment) {
                return Err(ModuleError::InvalidName {
                    name: (*segment).to_string(),
                });
            }
            path.push(segment);
        }
        Ok(path)
    }
}
