//! Configuration loading and management for the module host.
//!
//! The configuration is stored in TOML format and defines:
//! - Workspace settings (root directory override)
//! - Transport settings (connect and read timeouts)
//! - Built-in manifest files always joined to the known set

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    ValidationError(String),

    #[error("Path does not exist: {0}")]
    PathNotFound(PathBuf),
}

/// Workspace configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Root directory for all pipeline state. Use "auto" for the
    /// platform data directory.
    #[serde(default = "default_workspace_root")]
    pub root: String,
}

fn default_workspace_root() -> String {
    "auto".to_string()
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: default_workspace_root(),
        }
    }
}

/// Transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Connect timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Read timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub read_timeout_secs: u64,
}

const fn default_timeout_secs() -> u64 {
    3
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_timeout_secs(),
            read_timeout_secs: default_timeout_secs(),
        }
    }
}

impl TransportConfig {
    /// Connect timeout as a [`Duration`].
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Read timeout as a [`Duration`].
    #[must_use]
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

/// Top-level module host configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModhostConfig {
    /// Workspace settings.
    #[serde(default)]
    pub workspace: WorkspaceConfig,

    /// Transport settings.
    #[serde(default)]
    pub transport: TransportConfig,

    /// Local manifest files always joined to the known set, for modules
    /// that have no hosted manifest.
    #[serde(default)]
    pub builtin_manifests: Vec<PathBuf>,
}

impl ModhostConfig {
    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: ModhostConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: ModhostConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// Checks that timeouts are non-zero and that every built-in manifest
    /// file exists.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.transport.connect_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "transport.connect_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.transport.read_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "transport.read_timeout_secs must be greater than zero".to_string(),
            ));
        }
        for path in &self.builtin_manifests {
            if !path.is_file() {
                return Err(ConfigError::PathNotFound(path.clone()));
            }
        }
        Ok(())
    }

    /// Resolve the workspace root (pure function).
    ///
    /// If `workspace.root` is "auto", returns `None` and the caller falls
    /// back to the platform data directory. Otherwise returns the
    /// configured path.
    #[must_use]
    pub fn workspace_root(&self) -> Option<PathBuf> {
        if self.workspace.root == "auto" {
            None
        } else {
            Some(PathBuf::from(&self.workspace.root))
        }
    }
}
