//! The module manifest written by `terraform init` / `tofu init`.
//!
//! The manifest lives at `.terraform/modules/modules.json` and records which
//! module calls were installed into which directories:
//!
//! ```json
//! {
//!   "Modules": [
//!     { "Key": "", "Source": "", "Dir": "." },
//!     { "Key": "vpc", "Source": "registry.terraform.io/terraform-aws-modules/vpc/aws",
//!       "Version": "5.1.0", "Dir": ".terraform/modules/vpc" }
//!   ]
//! }
//! ```

use crate::error::{Result, TfModCacheError};
use crate::modules::paths::clean_path;
use crate::parser::{is_local_module, split_module_sub_dir, strip_getter_prefix};

use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};

/// Where a loaded manifest came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestOrigin {
    /// Read from the project's manifest file
    #[default]
    Disk,
    /// No manifest file; root module only
    Missing,
    /// The manifest file exists but could not be read or decoded
    Corrupt,
}

/// Module manifest of a project.
///
/// Uses the same format as `.terraform/modules/modules.json`. Unknown fields
/// are ignored and missing ones take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Root path recorded in the manifest
    #[serde(rename = "Path", default)]
    pub path: PathBuf,

    /// Manifest format version
    #[serde(rename = "Version", default)]
    pub version: String,

    /// Installed modules
    #[serde(rename = "Modules", default, deserialize_with = "null_as_empty")]
    pub modules: Vec<ManifestModule>,

    #[serde(skip)]
    pub(crate) cache_path: PathBuf,

    #[serde(skip)]
    pub(crate) project_path: PathBuf,

    #[serde(skip)]
    pub(crate) origin: ManifestOrigin,
}

impl Manifest {
    /// The root-module-only manifest used when a project has no usable
    /// manifest file.
    #[must_use]
    pub fn root_only(project_path: &Path, origin: ManifestOrigin) -> Self {
        Self {
            path: project_path.to_path_buf(),
            version: "2".to_string(),
            modules: Vec::new(),
            cache_path: PathBuf::new(),
            project_path: project_path.to_path_buf(),
            origin,
        }
    }

    /// Read a manifest file.
    ///
    /// # Errors
    ///
    /// Returns `ManifestRead` if the file can't be read and `ManifestParse`
    /// if it isn't a manifest.
    pub fn read(path: &Path) -> Result<Self> {
        let data = std::fs::read(path).map_err(|e| {
            crate::err!(ManifestRead {
                path: path.to_path_buf(),
                source: e,
            })
        })?;

        serde_json::from_slice(&data).map_err(|e| {
            crate::err!(ManifestParse {
                path: path.to_path_buf(),
                source: e,
            })
        })
    }

    /// Look up a module by key.
    ///
    /// Returns a copy whose `dir` is joined onto the cache path, never a
    /// reference into the manifest.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<ManifestModule> {
        self.modules.iter().find(|m| m.key == key).map(|module| ManifestModule {
            dir: clean_path(&self.cache_path.join(&module.dir)),
            ..module.clone()
        })
    }

    /// Cache root the module directories are relative to. Empty when the
    /// loader has no cache root.
    #[must_use]
    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    /// Project the manifest was loaded for.
    #[must_use]
    pub fn project_path(&self) -> &Path {
        &self.project_path
    }

    /// Where the manifest came from.
    #[must_use]
    pub fn origin(&self) -> ManifestOrigin {
        self.origin
    }
}

/// A single module in the manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestModule {
    /// Module key, e.g. "vpc" or "vpc.subnets"
    #[serde(rename = "Key", default)]
    pub key: String,

    /// Source address
    #[serde(rename = "Source", default)]
    pub source: String,

    /// Installed version, empty when unknown
    #[serde(rename = "Version", default, skip_serializing_if = "String::is_empty")]
    pub version: String,

    /// Directory the module was installed to
    #[serde(rename = "Dir", default)]
    pub dir: PathBuf,

    /// Address the module was actually downloaded from, when it differs
    /// from the source
    #[serde(rename = "DownloadURL", default, skip_serializing_if = "String::is_empty")]
    pub download_url: String,

    /// Set when the source was rewritten by a source map
    #[serde(skip)]
    pub is_source_mapped: bool,
}

impl ManifestModule {
    /// Canonical download identity of the module.
    ///
    /// Strips the sub-directory, the `git::`/`gcs::`/`s3::` prefix and the
    /// query string, so modules fetched from the same place compare equal.
    /// Local modules have no URL.
    #[must_use]
    pub fn url(&self) -> Option<String> {
        if is_local_module(&self.source) {
            return None;
        }

        let remote = if self.download_url.is_empty() {
            self.source.as_str()
        } else {
            self.download_url.as_str()
        };

        Some(download_identity(remote))
    }
}

/// Canonical download identity of a remote source address.
#[must_use]
pub fn download_identity(remote: &str) -> String {
    let base = split_module_sub_dir(remote).map_or_else(|_| remote.to_string(), |(base, _)| base);
    let base = strip_getter_prefix(&base);

    match url::Url::parse(base) {
        Ok(mut url) => {
            url.set_query(None);
            url.to_string()
        }
        Err(_) => base.to_string(),
    }
}

fn null_as_empty<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<Vec<T>>::deserialize(deserializer).map(Option::unwrap_or_default)
}

impl TryFrom<&str> for Manifest {
    type Error = TfModCacheError;

    fn try_from(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn module(key: &str, source: &str, dir: &str) -> ManifestModule {
        ManifestModule {
            key: key.to_string(),
            source: source.to_string(),
            dir: PathBuf::from(dir),
            ..ManifestModule::default()
        }
    }

    #[test]
    fn test_decode_terraform_manifest() {
        let manifest = Manifest::try_from(
            r#"{
              "Modules": [
                {"Key": "", "Source": "", "Dir": "."},
                {"Key": "vpc", "Source": "registry.terraform.io/terraform-aws-modules/vpc/aws",
                 "Version": "5.1.0", "Dir": ".terraform/modules/vpc", "Extra": true}
              ]
            }"#,
        )
        .unwrap();

        assert_eq!(manifest.version, "");
        assert_eq!(manifest.modules.len(), 2);
        assert_eq!(manifest.modules[1].version, "5.1.0");
        assert!(!manifest.modules[1].is_source_mapped);
    }

    #[test]
    fn test_decode_null_modules() {
        let manifest = Manifest::try_from(r#"{"Path": "/p", "Version": "2", "Modules": null}"#).unwrap();
        assert!(manifest.modules.is_empty());
        assert_eq!(manifest.path, PathBuf::from("/p"));
    }

    #[test]
    fn test_decode_invalid() {
        assert!(Manifest::try_from("{\"Modules\": 3}").is_err());
        assert!(Manifest::try_from("not json").is_err());
    }

    #[test]
    fn test_get_without_cache_path_keeps_dir() {
        let manifest = Manifest {
            modules: vec![module("child", "./child", "sub/path")],
            ..Manifest::default()
        };
        assert_eq!(manifest.get("child").unwrap().dir, PathBuf::from("sub/path"));
        assert!(manifest.get("missing").is_none());
    }

    #[test]
    fn test_get_joins_cache_path() {
        let manifest = Manifest {
            modules: vec![module("child", "./child", "proj/./child")],
            cache_path: PathBuf::from("/root"),
            ..Manifest::default()
        };
        assert_eq!(manifest.get("child").unwrap().dir, PathBuf::from("/root/proj/child"));
    }

    #[test]
    fn test_get_returns_copy() {
        let manifest = Manifest {
            modules: vec![module("child", "./child", "child")],
            cache_path: PathBuf::from("/cache"),
            ..Manifest::default()
        };
        let mut copy = manifest.get("child").unwrap();
        copy.source = "changed".to_string();
        assert_eq!(manifest.modules[0].source, "./child");
        assert_eq!(manifest.modules[0].dir, PathBuf::from("child"));
    }

    #[test]
    fn test_serialize_skips_transient_fields() {
        let mut m = module("vpc", "hashicorp/consul/aws", "d");
        m.is_source_mapped = true;
        let json = serde_json::to_string(&m).unwrap();
        assert_eq!(json, r#"{"Key":"vpc","Source":"hashicorp/consul/aws","Dir":"d"}"#);
    }

    #[test]
    fn test_url() {
        assert_eq!(module("a", "./local", "a").url(), None);
        assert_eq!(
            module("a", "git::https://example.com/org/repo.git//modules/x?ref=v1.2.0", "a").url(),
            Some("https://example.com/org/repo.git".to_string())
        );
        assert_eq!(
            module("a", "terraform-aws-modules/vpc/aws", "a").url(),
            Some("terraform-aws-modules/vpc/aws".to_string())
        );
        assert_eq!(
            module("a", "s3::https://s3-eu-west-1.amazonaws.com/bucket/vpc.zip", "a").url(),
            Some("https://s3-eu-west-1.amazonaws.com/bucket/vpc.zip".to_string())
        );
    }

    #[test]
    fn test_url_prefers_download_url() {
        let mut m = module("a", "terraform-aws-modules/vpc/aws", "a");
        m.download_url = "gcs::https://www.googleapis.com/storage/v1/mirror/vpc.zip?sig=abc".to_string();
        assert_eq!(
            m.url(),
            Some("https://www.googleapis.com/storage/v1/mirror/vpc.zip".to_string())
        );
    }
}
