//! Module source classification.
//!
//! Pure functions over module source strings:
//!
//! - [`is_local_module`]: does the source point at a relative path?
//! - [`split_module_sub_dir`]: split `base//sub/dir` the way go-getter does
//! - [`has_opentofu_extension`]: `.tofu` / `.tofu.json` detection
//! - [`classify_module_source`]: structured [`ModuleSource`]
//!
//! # Supported Source Types
//!
//! - **Registry**: `namespace/name/provider` or `hostname/namespace/name/provider`
//! - **Git**: `git::https://...`, `git@github.com:...` or `github.com/org/repo`
//! - **HTTP**: `https://...` (archive downloads)
//! - **S3**: `s3::https://...` or `s3://bucket/key`
//! - **GCS**: `gcs::https://...`
//! - **Local**: `./path`, `../path`, `.\path`, `..\path`

use crate::error::Result;
use crate::types::ModuleSource;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

/// Default Terraform registry hostname.
pub const DEFAULT_REGISTRY: &str = "registry.terraform.io";

/// Prefixes that mark a module source as a local relative path.
const LOCAL_PREFIXES: &[&str] = &["./", "../", ".\\", "..\\"];

/// Forced-getter prefixes stripped when computing a download identity.
pub const GETTER_PREFIXES: &[&str] = &["git::", "gcs::", "s3::"];

static REGISTRY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    // namespace/name/provider or hostname/namespace/name/provider
    Regex::new(r"^(?:([a-zA-Z0-9.-]+\.[a-zA-Z0-9.-]+(?::[0-9]+)?)/)?([a-zA-Z0-9_-]+)/([a-zA-Z0-9_-]+)/([a-zA-Z0-9_-]+)$")
        .expect("Invalid regex")
});

static GIT_SSH_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    // git@host:path, optionally behind git::
    Regex::new(r"^(?:git::)?git@([^:]+):(.+?)(?:\.git)?$").expect("Invalid regex")
});

static GITHUB_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    // github.com/org/repo shorthand
    Regex::new(r"^(?:https?://)?github\.com/([^/]+)/([^/?]+?)(?:\.git)?$").expect("Invalid regex")
});

static S3_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^s3::https://s3(?:[.-]([a-z0-9-]+))?\.amazonaws\.com/([^/]+)/(.+)$|^s3://([^/]+)/(.+)$")
        .expect("Invalid regex")
});

static GCS_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^gcs::https://(?:www\.)?googleapis\.com/storage/v1/([^/]+)/(.+)$")
        .expect("Invalid regex")
});

/// Checks if the module is a local module by checking if the module source
/// starts with any known local prefix. No filesystem access.
///
/// ```rust
/// use tfmodcache::parser::is_local_module;
///
/// assert!(is_local_module("./modules/vpc"));
/// assert!(!is_local_module("terraform-aws-modules/vpc/aws"));
/// ```
#[must_use]
pub fn is_local_module(source: &str) -> bool {
    LOCAL_PREFIXES.iter().any(|prefix| source.starts_with(prefix))
}

/// Returns true if the file name carries an OpenTofu extension.
#[must_use]
pub fn has_opentofu_extension(name: &str) -> bool {
    Path::new(name).extension().is_some_and(|ext| ext == "tofu") || name.ends_with(".tofu.json")
}

/// Split a module source into its base address and sub-directory.
///
/// A `//` after the scheme separator and before any query string marks the
/// sub-directory. A query string written after the sub-directory is moved
/// back onto the base address.
///
/// # Errors
///
/// Returns `InvalidSubmodulePath` if the sub-directory contains a `..`
/// component, which would let it escape the module root.
pub fn split_module_sub_dir(source: &str) -> Result<(String, String)> {
    let (base, sub_dir) = source_dir_subdir(source);

    if sub_dir.split(['/', '\\']).any(|component| component == "..") {
        return Err(crate::err!(InvalidSubmodulePath {
            module_source: source.to_string(),
            path: sub_dir,
        }));
    }

    Ok((base, sub_dir))
}

fn source_dir_subdir(source: &str) -> (String, String) {
    let stop = source.find('?').unwrap_or(source.len());

    // Skip the scheme so "https://" isn't taken as the separator
    let offset = source[..stop].find("://").map_or(0, |idx| idx + 3);

    let Some(idx) = source[offset..stop].find("//") else {
        return (source.to_string(), String::new());
    };
    let idx = idx + offset;

    let mut base = source[..idx].to_string();
    let mut sub_dir = source[idx + 2..].to_string();

    if let Some(query_idx) = sub_dir.find('?') {
        base.push_str(&sub_dir[query_idx..]);
        sub_dir.truncate(query_idx);
    }

    (base, sub_dir)
}

/// Strip a forced-getter prefix (`git::`, `gcs::`, `s3::`) from a source.
#[must_use]
pub fn strip_getter_prefix(source: &str) -> &str {
    GETTER_PREFIXES
        .iter()
        .find_map(|prefix| source.strip_prefix(prefix))
        .unwrap_or(source)
}

/// Parse a module source string into a structured `ModuleSource`.
///
/// # Examples
///
/// ```rust
/// use tfmodcache::parser::classify_module_source;
/// use tfmodcache::types::ModuleSource;
///
/// let source = classify_module_source("hashicorp/consul/aws");
/// assert!(matches!(source, ModuleSource::Registry { .. }));
///
/// let source = classify_module_source("git::https://github.com/example/module.git");
/// assert!(matches!(source, ModuleSource::Git { .. }));
///
/// let source = classify_module_source("../modules/vpc");
/// assert!(matches!(source, ModuleSource::Local { .. }));
/// ```
#[must_use]
pub fn classify_module_source(source: &str) -> ModuleSource {
    let source = source.trim();

    if is_local_module(source) {
        return ModuleSource::Local {
            path: source.to_string(),
        };
    }

    let (base, sub_dir) = source_dir_subdir(source);
    let subdir = Some(sub_dir).filter(|s| !s.is_empty());
    let (address, query) = match base.split_once('?') {
        Some((address, query)) => (address.to_string(), Some(query.to_string())),
        None => (base.clone(), None),
    };
    let ref_ = query.as_deref().and_then(query_ref);

    if let Some(git_source) = try_classify_git(&address, ref_.clone(), subdir.clone()) {
        return git_source;
    }

    if let Some(s3_source) = try_classify_s3(&address) {
        return s3_source;
    }

    if let Some(gcs_source) = try_classify_gcs(&address) {
        return gcs_source;
    }

    if address.starts_with("http://") || address.starts_with("https://") {
        return ModuleSource::Http {
            url: source.to_string(),
        };
    }

    if let Some(registry_source) = try_classify_registry(&address) {
        return registry_source;
    }

    tracing::debug!(source = %source, "Unknown module source format");
    ModuleSource::Unknown(source.to_string())
}

/// Extract the `ref` parameter from a query string.
fn query_ref(query: &str) -> Option<String> {
    query
        .split('&')
        .find_map(|pair| pair.strip_prefix("ref="))
        .map(String::from)
}

fn try_classify_git(address: &str, ref_: Option<String>, subdir: Option<String>) -> Option<ModuleSource> {
    if let Some(caps) = GIT_SSH_PATTERN.captures(address) {
        let host = caps.get(1)?.as_str();
        let path = caps.get(2)?.as_str();
        return Some(ModuleSource::Git {
            url: format!("ssh://git@{host}/{path}.git"),
            ref_,
            subdir,
        });
    }

    if let Some(url) = address.strip_prefix("git::") {
        return Some(ModuleSource::Git {
            url: url.to_string(),
            ref_,
            subdir,
        });
    }

    if let Some(caps) = GITHUB_PATTERN.captures(address) {
        let owner = caps.get(1)?.as_str();
        let repo = caps.get(2)?.as_str();
        return Some(ModuleSource::Git {
            url: format!("https://github.com/{owner}/{repo}.git"),
            ref_,
            subdir,
        });
    }

    None
}

fn try_classify_s3(address: &str) -> Option<ModuleSource> {
    let caps = S3_PATTERN.captures(address)?;
    if let (Some(bucket), Some(key)) = (caps.get(2), caps.get(3)) {
        return Some(ModuleSource::S3 {
            bucket: bucket.as_str().to_string(),
            key: key.as_str().to_string(),
            region: caps.get(1).map(|m| m.as_str().to_string()),
        });
    }
    if let (Some(bucket), Some(key)) = (caps.get(4), caps.get(5)) {
        return Some(ModuleSource::S3 {
            bucket: bucket.as_str().to_string(),
            key: key.as_str().to_string(),
            region: None,
        });
    }
    None
}

fn try_classify_gcs(address: &str) -> Option<ModuleSource> {
    let caps = GCS_PATTERN.captures(address)?;
    Some(ModuleSource::Gcs {
        bucket: caps.get(1)?.as_str().to_string(),
        path: caps.get(2)?.as_str().to_string(),
    })
}

fn try_classify_registry(address: &str) -> Option<ModuleSource> {
    let caps = REGISTRY_PATTERN.captures(address)?;
    let hostname = caps
        .get(1)
        .map_or(DEFAULT_REGISTRY, |m| m.as_str())
        .to_lowercase();

    Some(ModuleSource::Registry {
        hostname,
        namespace: caps.get(2)?.as_str().to_string(),
        name: caps.get(3)?.as_str().to_string(),
        provider: caps.get(4)?.as_str().to_string(),
    })
}

/// Returns true if two sources refer to the same module.
///
/// Sources are the same when the strings are equal, or when both are
/// registry addresses with the same canonical id. `terraform init` records
/// registry sources with their hostname, so `hashicorp/consul/aws` in
/// configuration matches `registry.terraform.io/hashicorp/consul/aws` in
/// the manifest.
#[must_use]
pub fn same_module_source(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    let (a, b) = (classify_module_source(a), classify_module_source(b));
    a.is_registry() && b.is_registry() && a.canonical_id() == b.canonical_id()
}
