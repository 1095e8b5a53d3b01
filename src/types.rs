//! Core data types used throughout tfmodcache.
//!
//! This module defines the fundamental data structures for representing:
//! - Module calls found in Terraform/OpenTofu configuration
//! - Structured module sources
//! - Version constraints and ranges
//! - Report formats

use serde::{Deserialize, Serialize};

/// A module call as written in configuration.
///
/// Module calls are produced by whatever walks the module tree (the HCL
/// evaluator, or [`crate::parser::module_calls`] for root modules) and are
/// immutable for a given parse pass.
///
/// # Example HCL
///
/// ```hcl
/// module "vpc" {
///   source  = "terraform-aws-modules/vpc/aws"
///   version = "~> 5.0"
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModuleCall {
    /// Unique dotted path within the module tree (e.g. "child.grandchild")
    pub key: String,

    /// Raw source address
    pub source: String,

    /// Version constraint, empty when none was given
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
}

impl ModuleCall {
    /// Create a module call.
    #[must_use]
    pub fn new(key: impl Into<String>, source: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            source: source.into(),
            version: version.into(),
        }
    }

    /// Returns true if the call carries a version constraint.
    #[must_use]
    pub fn has_version(&self) -> bool {
        !self.version.trim().is_empty()
    }
}

/// Represents the source of a Terraform module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum ModuleSource {
    /// Terraform Registry module (e.g., "hashicorp/consul/aws")
    Registry {
        /// Registry hostname (default: registry.terraform.io)
        hostname: String,
        /// Namespace (e.g., "hashicorp")
        namespace: String,
        /// Module name (e.g., "consul")
        name: String,
        /// Provider (e.g., "aws")
        provider: String,
    },

    /// Git repository source
    Git {
        /// Repository URL
        url: String,
        /// Git ref (branch, tag, or commit)
        ref_: Option<String>,
        /// Subdirectory within the repository
        subdir: Option<String>,
    },

    /// Local relative path
    Local {
        /// Path to the module
        path: String,
    },

    /// HTTP/HTTPS URL
    Http {
        /// URL to the module archive
        url: String,
    },

    /// S3 bucket source
    S3 {
        /// Bucket name
        bucket: String,
        /// Object key
        key: String,
        /// AWS region
        region: Option<String>,
    },

    /// GCS bucket source
    Gcs {
        /// Bucket name
        bucket: String,
        /// Object path
        path: String,
    },

    /// Unknown or unparseable source
    Unknown(String),
}

impl ModuleSource {
    /// Returns a canonical identifier for this source.
    #[must_use]
    pub fn canonical_id(&self) -> String {
        match self {
            Self::Registry {
                hostname,
                namespace,
                name,
                provider,
            } => format!("{hostname}/{namespace}/{name}/{provider}"),
            Self::Git { url, ref_, subdir } => {
                let mut id = url.clone();
                if let Some(r) = ref_ {
                    id.push_str(&format!("?ref={r}"));
                }
                if let Some(s) = subdir.as_deref().filter(|s| !s.is_empty()) {
                    id.push_str(&format!("//{s}"));
                }
                id
            }
            Self::Local { path } => format!("local://{path}"),
            Self::Http { url } => url.clone(),
            Self::S3 { bucket, key, .. } => format!("s3://{bucket}/{key}"),
            Self::Gcs { bucket, path } => format!("gcs://{bucket}/{path}"),
            Self::Unknown(s) => s.clone(),
        }
    }

    /// Returns true if this is a local module source.
    #[must_use]
    pub const fn is_local(&self) -> bool {
        matches!(self, Self::Local { .. })
    }

    /// Returns true if this is a registry module source.
    #[must_use]
    pub const fn is_registry(&self) -> bool {
        matches!(self, Self::Registry { .. })
    }

    /// Short kind label used in reports.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Registry { .. } => "registry",
            Self::Git { .. } => "git",
            Self::Local { .. } => "local",
            Self::Http { .. } => "http",
            Self::S3 { .. } => "s3",
            Self::Gcs { .. } => "gcs",
            Self::Unknown(_) => "unknown",
        }
    }
}

/// Represents a version constraint expression.
///
/// Supports Terraform's constraint syntax:
/// - `= 1.0.0` - Exact version
/// - `!= 1.0.0` - Not equal
/// - `> 1.0.0`, `>= 1.0.0` - Greater than
/// - `< 1.0.0`, `<= 1.0.0` - Less than
/// - `~> 1.0` - Pessimistic constraint (allows rightmost version component to increment)
/// - `>= 1.0, < 2.0` - Multiple constraints (AND)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraint {
    /// The raw constraint string as written in HCL
    pub raw: String,

    /// Parsed version ranges
    pub ranges: Vec<VersionRange>,
}

impl Constraint {
    /// Parse a constraint string into a `Constraint`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConstraint` if the string holds no constraint or any
    /// part of it is malformed.
    pub fn parse(s: &str) -> crate::Result<Self> {
        let ranges = parse_constraint_string(s)?;
        if ranges.is_empty() {
            return Err(crate::err!(InvalidConstraint {
                constraint: s.to_string(),
                message: "no constraint given".to_string(),
            }));
        }
        Ok(Self {
            raw: s.to_string(),
            ranges,
        })
    }

    /// Check if this constraint is satisfied by a given version.
    #[must_use]
    pub fn is_satisfied_by(&self, version: &semver::Version) -> bool {
        self.ranges.iter().all(|range| range.contains(version))
    }
}

impl std::fmt::Display for Constraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// Represents a single version range component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VersionRange {
    /// Exact version match: `= X.Y.Z`
    Exact(semver::Version),
    /// Greater than: `> X.Y.Z`
    GreaterThan(semver::Version),
    /// Greater than or equal: `>= X.Y.Z`
    GreaterThanOrEqual(semver::Version),
    /// Less than: `< X.Y.Z`
    LessThan(semver::Version),
    /// Less than or equal: `<= X.Y.Z`
    LessThanOrEqual(semver::Version),
    /// Not equal: `!= X.Y.Z`
    NotEqual(semver::Version),
    /// Pessimistic constraint: `~> X.Y`
    Pessimistic {
        /// The version specified in the constraint
        version: semver::Version,
        /// Number of version components specified (1=X, 2=X.Y, 3=X.Y.Z)
        parts: usize,
    },
}

impl VersionRange {
    /// The version this range is anchored on.
    #[must_use]
    pub fn anchor(&self) -> &semver::Version {
        match self {
            Self::Exact(v)
            | Self::GreaterThan(v)
            | Self::GreaterThanOrEqual(v)
            | Self::LessThan(v)
            | Self::LessThanOrEqual(v)
            | Self::NotEqual(v)
            | Self::Pessimistic { version: v, .. } => v,
        }
    }

    /// Check if a version satisfies this range.
    #[must_use]
    pub fn contains(&self, version: &semver::Version) -> bool {
        // A pre-release only matches a range anchored on a pre-release of
        // the same major.minor.patch
        if !version.pre.is_empty() {
            let anchor = self.anchor();
            let same_core = anchor.major == version.major
                && anchor.minor == version.minor
                && anchor.patch == version.patch;
            if anchor.pre.is_empty() || !same_core {
                return false;
            }
        }

        match self {
            Self::Exact(v) => version == v,
            Self::GreaterThan(v) => version > v,
            Self::GreaterThanOrEqual(v) => version >= v,
            Self::LessThan(v) => version < v,
            Self::LessThanOrEqual(v) => version <= v,
            Self::NotEqual(v) => version != v,
            Self::Pessimistic { version: v, parts } => {
                // A pre-release anchor only admits pre-releases
                if !v.pre.is_empty() && version.pre.is_empty() {
                    return false;
                }
                // ~> X.Y.Z allows >= X.Y.Z and < X.(Y+1).0
                // ~> X.Y allows >= X.Y.0 and < (X+1).0.0
                let upper = pessimistic_upper_bound(v, *parts);
                version >= v && upper.map_or(true, |upper| version < &upper)
            }
        }
    }
}

/// Parse a constraint string into version ranges.
fn parse_constraint_string(s: &str) -> crate::Result<Vec<VersionRange>> {
    let mut ranges = Vec::new();
    if s.trim().is_empty() {
        return Ok(ranges);
    }

    // Split on comma for multiple constraints
    for part in s.split(',') {
        let part = part.trim();
        if part.is_empty() {
            return Err(crate::err!(InvalidConstraint {
                constraint: s.to_string(),
                message: "empty constraint between commas".to_string(),
            }));
        }

        let range = parse_single_constraint(part).map_err(|e| {
            crate::err!(InvalidConstraint {
                constraint: s.to_string(),
                message: e.to_string(),
            })
        })?;
        ranges.push(range);
    }

    Ok(ranges)
}

/// Parse a single constraint expression.
fn parse_single_constraint(s: &str) -> crate::Result<VersionRange> {
    let s = s.trim();

    // Pessimistic constraint
    if let Some(version_str) = s.strip_prefix("~>") {
        let version_str = version_str.trim();
        let version = parse_version(version_str)?;
        let parts = core_part(version_str.trim_start_matches('v')).matches('.').count() + 1;
        return Ok(VersionRange::Pessimistic { version, parts });
    }

    // Not equal
    if let Some(version_str) = s.strip_prefix("!=") {
        let version = parse_version(version_str.trim())?;
        return Ok(VersionRange::NotEqual(version));
    }

    // Greater than or equal
    if let Some(version_str) = s.strip_prefix(">=") {
        let version = parse_version(version_str.trim())?;
        return Ok(VersionRange::GreaterThanOrEqual(version));
    }

    // Less than or equal
    if let Some(version_str) = s.strip_prefix("<=") {
        let version = parse_version(version_str.trim())?;
        return Ok(VersionRange::LessThanOrEqual(version));
    }

    // Greater than
    if let Some(version_str) = s.strip_prefix('>') {
        let version = parse_version(version_str.trim())?;
        return Ok(VersionRange::GreaterThan(version));
    }

    // Less than
    if let Some(version_str) = s.strip_prefix('<') {
        let version = parse_version(version_str.trim())?;
        return Ok(VersionRange::LessThan(version));
    }

    // Exact (with or without = prefix)
    let version_str = s.strip_prefix('=').unwrap_or(s).trim();
    let version = parse_version(version_str)?;
    Ok(VersionRange::Exact(version))
}

/// The `major[.minor[.patch]]` part of a version string.
fn core_part(s: &str) -> &str {
    s.find(['-', '+']).map_or(s, |idx| &s[..idx])
}

/// Parse a version string, handling incomplete versions and a `v` prefix.
///
/// # Errors
///
/// Returns `InvalidVersion` if the string is not a version.
pub fn parse_version(s: &str) -> crate::Result<semver::Version> {
    let trimmed = s.trim();
    let unprefixed = trimmed.strip_prefix('v').unwrap_or(trimmed);
    let core = core_part(unprefixed);
    let suffix = &unprefixed[core.len()..];

    // Handle versions like "1.0" by appending ".0"
    let normalized = match core.matches('.').count() {
        0 => format!("{core}.0.0{suffix}"),
        1 => format!("{core}.0{suffix}"),
        _ => unprefixed.to_string(),
    };

    semver::Version::parse(&normalized).map_err(|e| {
        crate::err!(InvalidVersion {
            version: s.to_string(),
            source: e,
        })
    })
}

/// Calculate the upper bound for a pessimistic constraint. `None` means
/// the constraint has no upper bound (`~> X`).
fn pessimistic_upper_bound(v: &semver::Version, parts: usize) -> Option<semver::Version> {
    match parts {
        3 => Some(semver::Version::new(v.major, v.minor + 1, 0)),
        2 => Some(semver::Version::new(v.major + 1, 0, 0)),
        _ => None,
    }
}

/// Report output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
pub enum ReportFormat {
    /// Plain text table
    #[default]
    Text,
    /// JSON format
    Json,
}
