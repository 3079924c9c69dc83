//! Module manifests and the descriptors they are built from.
//!
//! A manifest is a small JSON document fetched over the network or read
//! from the manifest store:
//!
//! ```json
//! {
//!   "name": "demo",
//!   "version": "1.0.0",
//!   "manifestUrl": "http://x/demo.json",
//!   "artifactUrl": "http://x/demo.jar",
//!   "entryClass": "com.x.DemoEntry",
//!   "dependencies": [
//!     {"name": "common", "artifactUrl": "http://x/common.jar"}
//!   ]
//! }
//! ```
//!
//! Absent fields default to the empty string / empty array, matching the
//! documents produced by older hosts.

use serde::{Deserialize, Serialize};

use super::error::{ModuleError, Result};

/// Identifies one downloadable unit: a module or one of its dependencies.
///
/// `name` doubles as the cache key and staging filename stem, so it must
/// be a filesystem-safe token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Descriptor {
    /// Name attributed to this item.
    pub name: String,

    /// URL of the code artifact for this item.
    pub artifact_url: String,
}

impl Descriptor {
    /// The cache entry filename for this descriptor.
    pub fn artifact_file_name(&self) -> String {
        format!("{}.jar", self.name)
    }
}

/// Declarative description of one module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ModuleManifest {
    /// Name attributed to this module.
    pub name: String,

    /// URL of the module's own code artifact.
    pub artifact_url: String,

    /// Version of this module.
    pub version: String,

    /// URL this manifest was (or can be) fetched from.
    pub manifest_url: String,

    /// Fully-qualified name of the entry class to instantiate.
    pub entry_class: String,

    /// Descriptors of the module's dependency artifacts.
    pub dependencies: Vec<Descriptor>,
}

impl ModuleManifest {
    /// Parse a manifest from a JSON document.
    ///
    /// # Arguments
    ///
    /// * `json` - The JSON text
    /// * `context` - Where the document came from, for error reporting
    ///
    /// # Errors
    ///
    /// Returns `ManifestParse` if the document is malformed.
    pub fn parse(json: &str, context: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| ModuleError::ManifestParse {
            context: context.to_string(),
            source: e,
        })
    }

    /// Serialize this manifest to its JSON document form.
    ///
    /// # Errors
    ///
    /// Returns `ManifestSerialize` if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| ModuleError::ManifestSerialize {
            name: self.name.clone(),
            source: e,
        })
    }

    /// The descriptor for the module's own artifact.
    pub fn descriptor(&self) -> Descriptor {
        Descriptor {
            name: self.name.clone(),
            artifact_url: self.artifact_url.clone(),
        }
    }
}
