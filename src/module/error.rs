//! Error types for module pipeline operations.

use std::fmt;

/// Errors that can occur while acquiring, building, or loading modules.
#[derive(Debug)]
pub enum ModuleError {
    /// Error performing I/O operations
    Io { source: std::io::Error },

    /// Error downloading from a URL
    Download {
        url: String,
        source: reqwest::Error,
    },

    /// Non-success HTTP status while downloading
    Http { url: String, status: u16 },

    /// Error parsing a module manifest
    ManifestParse {
        context: String,
        source: serde_json::Error,
    },

    /// Error serializing a module manifest
    ManifestSerialize {
        name: String,
        source: serde_json::Error,
    },

    /// A name is not usable as a filesystem token
    InvalidName { name: String },

    /// A cached artifact could not be read as an archive
    Archive {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The build step over the staging tree failed
    Build { message: String },

    /// Resolution attempted before any successful link
    NotReady,

    /// The named class is not present in the loadable unit
    ClassNotFound { name: String },

    /// The named class has no registered constructor
    NotAccessible { name: String },

    /// The registered constructor refused to produce an instance
    NotInstantiable { name: String },
}

impl fmt::Display for ModuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { source } => write!(f, "I/O error: {source}"),
            Self::Download { url, source } => write!(f, "Failed to download {url}: {source}"),
            Self::Http { url, status } => {
                write!(f, "HTTP {status} when downloading {url}")
            }
            Self::ManifestParse { context, source } => {
                write!(f, "Failed to parse manifest from {context}: {source}")
            }
            Self::ManifestSerialize { name, source } => {
                write!(f, "Failed to serialize manifest '{name}': {source}")
            }
            Self::InvalidName { name } => {
                write!(f, "Name '{name}' is not a valid filesystem token")
            }
            Self::Archive { path, source } => {
                write!(f, "Failed to read archive at {path}: {source}")
            }
            Self::Build { message } => write!(f, "Build step failed: {message}"),
            Self::NotReady => write!(f, "No loadable unit exists; no link has succeeded yet"),
            Self::ClassNotFound { name } => {
                write!(f, "Class '{name}' not found in the loadable unit")
            }
            Self::NotAccessible { name } => {
                write!(f, "Class '{name}' has no registered constructor")
            }
            Self::NotInstantiable { name } => {
                write!(f, "Class '{name}' could not be instantiated")
            }
        }
    }
}

impl std::error::Error for ModuleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source } => Some(source),
            Self::Download { source, .. } => Some(source),
            Self::ManifestParse { source, .. } => Some(source),
            Self::ManifestSerialize { source, .. } => Some(source),
            Self::Archive { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ModuleError {
    fn from(source: std::io::Error) -> Self {
        Self::Io { source }
    }
}

impl From<reqwest::Error> for ModuleError {
    fn from(source: reqwest::Error) -> Self {
        Self::Download {
            url: "<unknown>".to_string(),
            source,
        }
    }
}

impl From<serde_json::Error> for ModuleError {
    fn from(source: serde_json::Error) -> Self {
        Self::ManifestParse {
            context: "<unknown>".to_string(),
            source,
        }
    }
}

/// Result type for module pipeline operations.
pub type Result<T> = std::result::Result<T, ModuleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ModuleError::ClassNotFound {
            name: "com.x.Entry".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Class 'com.x.Entry' not found in the loadable unit"
        );

        let err = ModuleError::Http {
            url: "http://x/demo.jar".to_string(),
            status: 404,
        };
        assert_eq!(err.to_string(), "HTTP 404 when downloading http://x/demo.jar");

        let err = ModuleError::InvalidName {
            name: "../evil".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Name '../evil' is not a valid filesystem token"
        );

        let err = ModuleError::NotReady;
        assert_eq!(
            err.to_string(),
            "No loadable unit exists; no link has succeeded yet"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ModuleError = io_err.into();
        assert!(matches!(err, ModuleError::Io { .. }));
    }

    #[test]
    fn test_error_from_json() {
        if let Err(json_err) = serde_json::from_str::<serde_json::Value>("invalid json {{{") {
            let err: ModuleError = json_err.into();
            assert!(matches!(err, ModuleError::ManifestParse { .. }));
        } else {
            panic!("Should fail to parse invalid JSON");
        }
    }

    #[test]
    fn test_resolution_errors_are_distinct() {
        let not_found = ModuleError::ClassNotFound {
            name: "a".to_string(),
        };
        let not_accessible = ModuleError::NotAccessible {
            name: "a".to_string(),
        };
        let not_instantiable = ModuleError::NotInstantiable {
            name: "a".to_string(),
        };
        assert_ne!(not_found.to_string(), not_accessible.to_string());
        assert_ne!(not_accessible.to_string(), not_instantiable.to_string());
        assert_ne!(not_found.to_string(), not_instantiable.to_string());
    }
}
