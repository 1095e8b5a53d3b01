//! Configuration module for tfmodcache.
//!
//! This module handles loading and validating configuration from:
//! - YAML configuration files (`tfmodcache.yaml`)
//! - Environment variables
//! - CLI arguments
//!
//! # Configuration File Format
//!
//! ```yaml
//! # tfmodcache.yaml
//!
//! # Module resolution options
//! modules:
//!   cache_path: ${HOME}/.tfmodcache   # Environment variable expansion
//!   source_map:
//!     "terraform-aws-modules/vpc/aws": "git::https://mirror.internal/vpc.git?ref=v5.1.0"
//!   source_map_regex:
//!     - pattern: "^github.com/acme/(.*)$"
//!       replacement: "git::https://git.internal/acme/$1"
//!
//! # Output options
//! output:
//!   colored: true
//!   pretty: true
//! ```

use crate::error::{ErrorCollector, Result, TfModCacheError};
use crate::modules::{ModuleLoaderOptions, SourceMap, SourceMapRegex};
use crate::parser::SharedHclParser;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

/// Environment variable overriding `modules.cache_path`.
pub const CACHE_PATH_ENV: &str = "TFMODCACHE_CACHE_PATH";

/// Configuration files looked up in the working directory, in order.
pub const DEFAULT_CONFIG_FILES: &[&str] = &["tfmodcache.yaml", "tfmodcache.yml", ".tfmodcache.yaml"];

static BRACED_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("Invalid regex"));

static BARE_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$([A-Za-z_][A-Za-z0-9_]*)").expect("Invalid regex"));

/// Module resolution options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModulesOptions {
    /// Shared download root. When unset, each project uses its own
    /// `.terraform/modules`.
    pub cache_path: Option<PathBuf>,

    /// Exact and prefix source rewrites.
    pub source_map: SourceMap,

    /// Regex source rewrites, applied in order.
    pub source_map_regex: SourceMapRegex,
}

/// Output options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputOptions {
    /// Use colored output.
    pub colored: bool,

    /// Pretty-print JSON output.
    pub pretty: bool,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            colored: true,
            pretty: true,
        }
    }
}

/// Main configuration structure with nested sections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Module resolution options
    pub modules: ModulesOptions,

    /// Output options
    pub output: OutputOptions,
}

impl Config {
    /// Load configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn from_yaml(content: &str) -> Result<Self> {
        tracing::debug!("Parsing configuration from YAML");
        let expanded = expand_env_vars(content);

        let config: Self = serde_yaml::from_str(&expanded).map_err(|e| {
            TfModCacheError::config_parse(e.to_string(), Some(Box::new(e)), file!(), line!())
        })?;

        tracing::debug!(
            cache_path = ?config.modules.cache_path,
            source_map = config.modules.source_map.0.len(),
            source_map_regex = config.modules.source_map_regex.0.len(),
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file can't be read, or any error of
    /// [`Config::from_yaml`].
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TfModCacheError::io(path, e, file!(), line!()))?;
        Self::from_yaml(&content)
    }

    /// Check values that deserialize fine but can't be used.
    ///
    /// Every problem is collected; more than one comes back as `Multiple`.
    ///
    /// # Errors
    ///
    /// - `SourceMapRegex` for a pattern that doesn't compile
    /// - `ConfigValue` for an empty source map key or an empty cache path
    pub fn validate(&self) -> Result<()> {
        let mut errors = ErrorCollector::new();

        if self
            .modules
            .cache_path
            .as_ref()
            .is_some_and(|p| p.as_os_str().is_empty())
        {
            errors.add(crate::err!(ConfigValue {
                key: "modules.cache_path".to_string(),
                message: "must not be empty".to_string(),
            }));
        }

        if self.modules.source_map.0.keys().any(String::is_empty) {
            errors.add(crate::err!(ConfigValue {
                key: "modules.source_map".to_string(),
                message: "source keys must not be empty".to_string(),
            }));
        }

        for rule in &self.modules.source_map_regex.0 {
            if let Err(e) = SourceMapRegex(vec![rule.clone()]).compile() {
                errors.add(e);
            }
        }

        errors.into_result()
    }

    /// Apply environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Some(cache_path) = std::env::var_os(CACHE_PATH_ENV).filter(|v| !v.is_empty()) {
            tracing::debug!(env_var = CACHE_PATH_ENV, "Using cache path from environment variable");
            self.modules.cache_path = Some(PathBuf::from(cache_path));
        }
    }

    /// Merge CLI arguments into the configuration.
    pub fn merge_cli_args(&mut self, cache_path: Option<&Path>, no_color: bool) {
        if let Some(cache_path) = cache_path {
            self.modules.cache_path = Some(cache_path.to_path_buf());
        }
        if no_color {
            self.output.colored = false;
        }
    }

    /// Build loader options sharing the given parser.
    #[must_use]
    pub fn loader_options(&self, hcl_parser: Arc<SharedHclParser>) -> ModuleLoaderOptions {
        ModuleLoaderOptions {
            cache_path: self.modules.cache_path.clone().unwrap_or_default(),
            hcl_parser,
            source_map: self.modules.source_map.clone(),
            source_map_regex: self.modules.source_map_regex.clone(),
        }
    }

    /// Generate an example YAML configuration.
    #[must_use]
    pub fn example_yaml() -> String {
        r#"# tfmodcache configuration file

# Module resolution options
modules:
  # Shared download root for every project (default: each project's
  # own .terraform/modules). Can be overridden with TFMODCACHE_CACHE_PATH.
  # cache_path: ${HOME}/.tfmodcache

  # Rewrite module sources before resolving them. Keys match a whole source
  # or a path prefix of it; the longest prefix wins.
  source_map: {}
  #   "terraform-aws-modules/vpc/aws": "git::https://mirror.internal/vpc.git?ref=v5.1.0"
  #   "github.com/acme": "git::https://git.internal/acme"

  # Regex rewrites, tried in order when no source_map entry matches.
  # Replacements may use $1 or ${name} captures.
  source_map_regex: []
  #   - pattern: "^github.com/acme/(.*)$"
  #     replacement: "git::https://git.internal/acme/$1"

# Output options
output:
  # Use colored output in terminal
  colored: true

  # Pretty-print JSON output
  pretty: true
"#
        .to_string()
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax. Unset variables are left as is.
fn expand_env_vars(content: &str) -> String {
    let braced = BRACED_VAR.replace_all(content, |caps: &regex::Captures<'_>| {
        std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
    });

    BARE_VAR
        .replace_all(&braced, |caps: &regex::Captures<'_>| {
            std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::SourceMapRegexRule;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.modules.cache_path.is_none());
        assert!(config.modules.source_map.is_empty());
        assert!(config.output.colored);
        assert!(config.output.pretty);
    }

    #[test]
    fn test_config_from_yaml() {
        let yaml = r#"
modules:
  cache_path: /work/.tfmodcache
  source_map:
    "terraform-aws-modules/vpc/aws": "git::https://mirror.internal/vpc.git?ref=v5.1.0"
  source_map_regex:
    - pattern: "^github.com/acme/(.*)$"
      replacement: "git::https://git.internal/acme/$1"
output:
  colored: false
"#;

        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.modules.cache_path, Some(PathBuf::from("/work/.tfmodcache")));
        assert_eq!(
            config.modules.source_map.0.get("terraform-aws-modules/vpc/aws"),
            Some(&"git::https://mirror.internal/vpc.git?ref=v5.1.0".to_string())
        );
        assert_eq!(
            config.modules.source_map_regex.0,
            vec![SourceMapRegexRule {
                pattern: "^github.com/acme/(.*)$".to_string(),
                replacement: "git::https://git.internal/acme/$1".to_string(),
            }]
        );
        assert!(!config.output.colored);
        assert!(config.output.pretty);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_invalid_yaml() {
        let err = Config::from_yaml("modules: [not, a, map]").unwrap_err();
        assert!(matches!(err, TfModCacheError::ConfigParse { .. }));
    }

    #[test]
    fn test_validate_rejects_bad_regex() {
        let config = Config::from_yaml(
            r#"
modules:
  source_map_regex:
    - pattern: "([unclosed"
      replacement: "x"
"#,
        )
        .unwrap();
        assert!(matches!(config.validate(), Err(TfModCacheError::SourceMapRegex { .. })));
    }

    #[test]
    fn test_validate_collects_every_problem() {
        let config = Config::from_yaml(
            r#"
modules:
  source_map:
    "": "x/y/z"
  source_map_regex:
    - pattern: "("
      replacement: "a"
    - pattern: "^ok$"
      replacement: "b"
    - pattern: "["
      replacement: "c"
"#,
        )
        .unwrap();
        match config.validate() {
            Err(TfModCacheError::Multiple { count, .. }) => assert_eq!(count, 3),
            other => panic!("Expected Multiple error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_rejects_empty_source_key() {
        let config = Config::from_yaml("modules:\n  source_map:\n    \"\": \"x/y/z\"\n").unwrap();
        assert!(matches!(config.validate(), Err(TfModCacheError::ConfigValue { .. })));
    }

    #[test]
    fn test_env_var_expansion_leaves_unset_vars() {
        let content = "cache_path: ${TFMODCACHE_TEST_SURELY_UNSET}/x and $TFMODCACHE_TEST_ALSO_UNSET";
        assert_eq!(expand_env_vars(content), content);
        assert_eq!(expand_env_vars("no vars here"), "no vars here");
    }

    #[test]
    fn test_env_var_expansion_uses_path() {
        // PATH is set in any test environment
        let path = std::env::var("PATH").unwrap();
        assert_eq!(expand_env_vars("p: ${PATH}"), format!("p: {path}"));
        assert_eq!(expand_env_vars("p: $PATH"), format!("p: {path}"));
    }

    #[test]
    fn test_merge_cli_args() {
        let mut config = Config::default();
        config.merge_cli_args(Some(Path::new("/cache")), true);
        assert_eq!(config.modules.cache_path, Some(PathBuf::from("/cache")));
        assert!(!config.output.colored);

        config.merge_cli_args(None, false);
        assert_eq!(config.modules.cache_path, Some(PathBuf::from("/cache")));
    }

    #[test]
    fn test_loader_options() {
        let config = Config::from_yaml("modules:\n  cache_path: /work\n").unwrap();
        let options = config.loader_options(Arc::new(SharedHclParser::new()));
        assert_eq!(options.cache_path, PathBuf::from("/work"));

        let options = Config::default().loader_options(Arc::new(SharedHclParser::new()));
        assert!(options.cache_path.as_os_str().is_empty());
    }

    #[test]
    fn test_example_yaml_is_valid() {
        let config = Config::from_yaml(&Config::example_yaml()).unwrap();
        assert_eq!(config, Config::default());
        assert!(config.validate().is_ok());
    }
}
