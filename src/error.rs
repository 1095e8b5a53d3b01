//! Error types for tfmodcache.
//!
//! This module defines the error hierarchy using `thiserror`. Every variant
//! records the source location where it was raised, which makes debug logs
//! from a multi-project run much easier to follow.
//!
//! # Error Categories
//!
//! - **Resolution errors**: a cached or manifested module no longer matches
//!   the module call (`NotCached`, `SourceChanged`, `VersionMismatch`)
//! - **Version errors**: malformed constraints or recorded versions
//! - **Source errors**: sub-directory traversal, bad source-map rules
//! - **Manifest errors**: unreadable or corrupt `modules.json`
//! - **Config errors**: invalid configuration files
//!
//! # Example
//!
//! ```rust
//! use tfmodcache::error::{TfModCacheError, Result};
//!
//! fn read(path: &str) -> Result<String> {
//!     std::fs::read_to_string(path)
//!         .map_err(|e| TfModCacheError::io(path, e, file!(), line!()))
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Macro to create errors with automatic source location tracking.
///
/// Usage:
/// ```ignore
/// return Err(err!(NotCached { key: "vpc".to_string() }));
/// ```
#[macro_export]
macro_rules! err {
    ($variant:ident { $($field:ident: $value:expr),* $(,)? }) => {
        $crate::error::TfModCacheError::$variant {
            $($field: $value,)*
            src_path: file!(),
            src_line: line!(),
        }
    };
}

/// A specialized Result type for tfmodcache operations.
pub type Result<T> = std::result::Result<T, TfModCacheError>;

/// The main error type for tfmodcache.
#[derive(Error, Debug)]
pub enum TfModCacheError {
    // =========================================================================
    // I/O Errors
    // =========================================================================
    /// I/O error with path context.
    #[error("I/O error at '{path}' ({src_path}:{src_line}): {source}")]
    Io {
        /// The path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    // =========================================================================
    // Module Resolution Errors
    // =========================================================================
    /// The module key has not been resolved during this run.
    #[error("Module '{key}' is not in cache ({src_path}:{src_line})")]
    NotCached {
        /// Module key
        key: String,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    /// The module key now points at a different source.
    #[error("Source of module '{key}' has changed from '{cached}' to '{requested}' ({src_path}:{src_line})")]
    SourceChanged {
        /// Module key
        key: String,
        /// Source recorded for the key
        cached: String,
        /// Source requested by the module call
        requested: String,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    /// The recorded version does not satisfy the requested constraint.
    #[error("Version '{version}' of module '{key}' doesn't match constraint '{constraint}' ({src_path}:{src_line})")]
    VersionMismatch {
        /// Module key
        key: String,
        /// Requested constraint
        constraint: String,
        /// Recorded version
        version: String,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    /// Invalid constraint syntax.
    #[error("Invalid version constraint '{constraint}' ({src_path}:{src_line}): {message}")]
    InvalidConstraint {
        /// The constraint string that failed to parse
        constraint: String,
        /// Error message
        message: String,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    /// Version parsing error.
    #[error("Invalid version '{version}' ({src_path}:{src_line}): {source}")]
    InvalidVersion {
        /// The version string that failed to parse
        version: String,
        /// The underlying semver error
        #[source]
        source: semver::Error,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    /// A module sub-directory escapes the module root.
    #[error("Invalid submodule path '{path}' in '{module_source}' ({src_path}:{src_line})")]
    InvalidSubmodulePath {
        /// The full module source
        module_source: String,
        /// The offending sub-directory
        path: String,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    /// A source map regex failed to compile.
    #[error("Invalid source map regex '{pattern}' ({src_path}:{src_line}): {source}")]
    SourceMapRegex {
        /// The pattern that failed to compile
        pattern: String,
        /// The underlying regex error
        #[source]
        source: regex::Error,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    // =========================================================================
    // Manifest Errors
    // =========================================================================
    /// The manifest file could not be read.
    #[error("Failed to read module manifest '{path}' ({src_path}:{src_line}): {source}")]
    ManifestRead {
        /// Manifest path
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    /// The manifest file is not valid JSON for the manifest schema.
    #[error("Failed to unmarshal module manifest '{path}' ({src_path}:{src_line}): {source}")]
    ManifestParse {
        /// Manifest path
        path: PathBuf,
        /// The underlying JSON error
        #[source]
        source: serde_json::Error,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Configuration parsing error.
    #[error("Failed to parse configuration ({src_path}:{src_line}): {message}")]
    ConfigParse {
        /// Error message
        message: String,
        /// The underlying error (if any)
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    /// Invalid configuration value.
    #[error("Invalid configuration value for '{key}' ({src_path}:{src_line}): {message}")]
    ConfigValue {
        /// The configuration key
        key: String,
        /// Error message
        message: String,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    // =========================================================================
    // Generic Errors
    // =========================================================================
    /// Internal error (should not happen in normal operation).
    #[error("Internal error ({src_path}:{src_line}): {message}")]
    Internal {
        /// Error message
        message: String,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    /// Multiple errors occurred.
    #[error("Multiple errors occurred ({count} total)")]
    Multiple {
        /// Number of errors
        count: usize,
        /// The individual errors
        errors: Vec<TfModCacheError>,
    },
}

impl TfModCacheError {
    /// Creates an `Io` error.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error, src_path: &'static str, src_line: u32) -> Self {
        Self::Io { path: path.into(), source, src_path, src_line }
    }

    /// Creates a `ConfigParse` error.
    #[must_use]
    pub fn config_parse(message: String, source: Option<Box<dyn std::error::Error + Send + Sync>>, src_path: &'static str, src_line: u32) -> Self {
        Self::ConfigParse { message, source, src_path, src_line }
    }

    /// Returns true if the error means a cached or manifested module is
    /// stale for the current module call and must be resolved again.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        matches!(
            self,
            Self::NotCached { .. } | Self::SourceChanged { .. } | Self::VersionMismatch { .. }
        )
    }

    /// Determines if the error is recoverable (the affected module can be
    /// skipped while the rest of the project is resolved).
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::NotCached { .. }
            | Self::SourceChanged { .. }
            | Self::VersionMismatch { .. }
            | Self::InvalidConstraint { .. }
            | Self::InvalidVersion { .. }
            | Self::InvalidSubmodulePath { .. }
            | Self::SourceMapRegex { .. }
            | Self::ManifestRead { .. }
            | Self::ManifestParse { .. } => true,
            Self::Multiple { errors, .. } => errors.iter().all(Self::is_recoverable),
            _ => false,
        }
    }

    /// Returns the appropriate exit code for the error.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Io { source, .. } if source.kind() == std::io::ErrorKind::PermissionDenied => 13,
            Self::Io { .. } => 14,
            Self::ConfigParse { .. } => 18,
            Self::ConfigValue { .. } | Self::SourceMapRegex { .. } => 19,
            Self::Multiple { .. } => 21,
            _ => 1,
        }
    }

    /// Consolidates multiple errors into a single `TfModCacheError::Multiple` if there's more than one.
    /// Otherwise, returns the single error or `Ok(())` if no errors.
    pub fn collect(errors: Vec<Self>) -> Result<()> {
        let mut errors = errors;
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            count => Err(Self::Multiple { count, errors }),
        }
    }
}

impl From<std::io::Error> for TfModCacheError {
    fn from(source: std::io::Error) -> Self {
        // Prefer TfModCacheError::io(path, ...) when the path is known
        Self::Io {
            path: PathBuf::new(),
            source,
            src_path: file!(),
            src_line: line!(),
        }
    }
}

impl From<serde_json::Error> for TfModCacheError {
    fn from(source: serde_json::Error) -> Self {
        Self::Internal {
            message: format!("JSON serialization/deserialization error: {source}"),
            src_path: file!(),
            src_line: line!(),
        }
    }
}

/// A utility for collecting multiple errors while resolving a project.
#[derive(Debug, Default)]
pub struct ErrorCollector {
    errors: Vec<TfModCacheError>,
}

impl ErrorCollector {
    /// Create a new error collector.
    #[must_use]
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    /// Add an error to the collection.
    pub fn add(&mut self, error: TfModCacheError) {
        self.errors.push(error);
    }

    /// Get the number of collected errors.
    #[must_use]
    pub fn count(&self) -> usize {
        self.errors.len()
    }

    /// Check if there are any errors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Convert to a Result, returning Multiple error if there are any errors.
    pub fn into_result(self) -> Result<()> {
        TfModCacheError::collect(self.errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stale_errors() {
        assert!(crate::err!(NotCached { key: "a".to_string() }).is_stale());
        assert!(crate::err!(VersionMismatch {
            key: "a".to_string(),
            constraint: ">= 2.0.0".to_string(),
            version: "1.9.0".to_string(),
        })
        .is_stale());
        assert!(!crate::err!(InvalidConstraint {
            constraint: "~>".to_string(),
            message: "empty".to_string(),
        })
        .is_stale());
    }

    #[test]
    fn test_error_collector() {
        let mut collector = ErrorCollector::new();
        assert!(collector.is_empty());
        collector.add(crate::err!(NotCached { key: "a".to_string() }));
        collector.add(crate::err!(NotCached { key: "b".to_string() }));
        assert_eq!(collector.count(), 2);

        match collector.into_result() {
            Err(TfModCacheError::Multiple { count, .. }) => assert_eq!(count, 2),
            other => panic!("Expected Multiple error, got {other:?}"),
        }
    }

    #[test]
    fn test_collect_single_error() {
        let result = TfModCacheError::collect(vec![crate::err!(Internal {
            message: "boom".to_string(),
        })]);
        assert!(matches!(result, Err(TfModCacheError::Internal { .. })));
        assert!(TfModCacheError::collect(Vec::new()).is_ok());
    }

    #[test]
    fn test_message_contains_location() {
        let e = crate::err!(InvalidSubmodulePath {
            module_source: "github.com/x/y//../z".to_string(),
            path: "../z".to_string(),
        });
        let message = e.to_string();
        assert!(message.contains("Invalid submodule path '../z'"));
        assert!(message.contains("error.rs"));
    }

    #[test]
    fn test_recoverable_and_exit_codes() {
        let bad_constraint = crate::err!(InvalidConstraint {
            constraint: ">= 1.0,".to_string(),
            message: "empty constraint".to_string(),
        });
        assert!(bad_constraint.is_recoverable());
        assert_eq!(bad_constraint.exit_code(), 1);

        let internal = crate::err!(Internal {
            message: "boom".to_string(),
        });
        assert!(!internal.is_recoverable());

        let missing = TfModCacheError::io(
            "nope",
            std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
            file!(),
            line!(),
        );
        assert_eq!(missing.exit_code(), 14);
        assert_eq!(
            TfModCacheError::config_parse("bad yaml".to_string(), None, file!(), line!()).exit_code(),
            18
        );

        let mixed = TfModCacheError::collect(vec![bad_constraint, internal]).unwrap_err();
        assert!(!mixed.is_recoverable());
        assert_eq!(mixed.exit_code(), 21);
    }
}
