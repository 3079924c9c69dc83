//! Unpack/merge staging and the build step over it.
//!
//! Every cached artifact is opened as a zip archive and its class-bearing
//! entries are copied into the staging tree under their archive-relative
//! paths. The [`Linker`] build step then consumes the full staging tree
//! and produces one loadable unit plus the scratch directory the loader
//! requires. [`BundleLinker`] is the default build step: it merges the
//! staging tree into a single archive.

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use super::error::{ModuleError, Result};

/// Suffix of class-bearing archive entries.
const CLASS_SUFFIX: &str = ".class";

/// The build step: consumes the staging tree, produces the loadable unit.
pub trait Linker: Send + Sync {
    /// Build one loadable unit at `unit` from the staging tree, recreating
    /// the companion `scratch` directory.
    ///
    /// # Errors
    ///
    /// Any error is a build failure; callers treat it as fatal to the link
    /// stage.
    fn link(&self, staging: &Path, unit: &Path, scratch: &Path) -> Result<()>;
}

/// Default build step: merges the staging tree into a single archive.
#[derive(Debug, Default, Clone, Copy)]
pub struct BundleLinker;

impl Linker for BundleLinker {
    fn link(&self, staging: &Path, unit: &Path, scratch: &Path) -> Result<()> {
        if scratch.exists() {
            std::fs::remove_dir_all(scratch)?;
        }
        std::fs::create_dir_all(scratch)?;
        if let Some(parent) = unit.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let entries = staging_entries(staging)?;
        if entries.is_empty() {
            return Err(ModuleError::Build {
                message: "staging tree is empty".to_string(),
            });
        }

        let file = std::fs::File::create(unit)?;
        let mut writer = ZipWriter::new(file);
        let options = SimpleFileOptions::default();
        for (entry_name, path) in &entries {
            writer
                .start_file(entry_name.as_str(), options)
                .map_err(|e| ModuleError::Archive {
                    path: unit.display().to_string(),
                    source: Box::new(e),
                })?;
            let mut input = std::fs::File::open(path)?;
            std::io::copy(&mut input, &mut writer)?;
        }
        writer.finish().map_err(|e| ModuleError::Archive {
            path: unit.display().to_string(),
            source: Box::new(e),
        })?;
        debug!(unit = %unit.display(), entries = entries.len(), "linked module bundle");
        Ok(())
    }
}

/// Copy every class-bearing entry of `archive_path` into the staging tree,
/// overwriting same-path entries and creating parent directories.
///
/// Non-class entries (resources, metadata) are skipped. Entries whose
/// paths would escape the staging root are rejected.
///
/// # Returns
///
/// The number of entries copied.
///
/// # Errors
///
/// Returns `Archive` if the file cannot be read as a zip archive or an
/// entry path is unusable, and I/O errors from the copies.
pub(crate) fn unpack_artifact(archive_path: &Path, staging: &Path) -> Result<usize> {
    let file = std::fs::File::open(archive_path)?;
    let mut archive = ZipArchive::new(file).map_err(|e| ModuleError::Archive {
        path: archive_path.display().to_string(),
        source: Box::new(e),
    })?;

    let mut copied = 0;
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(|e| ModuleError::Archive {
            path: archive_path.display().to_string(),
            source: Box::new(e),
        })?;
        if entry.is_dir() || !entry.name().ends_with(CLASS_SUFFIX) {
            continue;
        }
        let relative = entry.enclosed_name().ok_or_else(|| ModuleError::Archive {
            path: archive_path.display().to_string(),
            source: std::io::Error::other(format!(
                "entry '{}' escapes the staging root",
                entry.name()
            ))
            .into(),
        })?;

        let target = staging.join(relative);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut buffer = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut buffer)?;
        let mut output = std::fs::File::create(&target)?;
        output.write_all(&buffer)?;
        copied += 1;
    }
    debug!(
        archive = %archive_path.display(),
        entries = copied,
        "unpacked class entries into staging"
    );
    Ok(copied)
}

/// Entry names and file paths of the staging tree, keyed by the
/// '/'-separated entry name in sorted order.
///
/// # Errors
///
/// Returns an error if the tree cannot be walked.
pub(crate) fn staging_entries(staging: &Path) -> Result<BTreeMap<String, PathBuf>> {
    let mut entries = BTreeMap::new();
    if staging.is_dir() {
        collect_files(staging, String::new(), &mut entries)?;
    }
    Ok(entries)
}

fn collect_files(
    dir: &Path,
    prefix: String,
    out: &mut BTreeMap<String, PathBuf>,
) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        let entry_name = if prefix.is_empty() {
            name
        } else {
            format!("{prefix}/{name}")
        };
        if path.is_dir() {
            collect_files(&path, entry_name, out)?;
        } else {
            out.insert(entry_name, path);
        }
    }
    Ok(())
}
