//! Source remapping rules.
//!
//! Users can redirect module sources, e.g. to an internal mirror:
//!
//! ```yaml
//! modules:
//!   source_map:
//!     "terraform-aws-modules/vpc/aws": "git::https://mirror.internal/vpc.git?ref=v5.1.0"
//!   source_map_regex:
//!     - pattern: "^github.com/acme/(.*)$"
//!       replacement: "git::https://git.internal/acme/$1"
//! ```
//!
//! Exact matches win over path-prefix matches, which win over regex rules.
//! The first matching regex rule applies.

use crate::error::Result;
use crate::parser::{is_local_module, split_module_sub_dir};

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Exact and path-prefix source rewrites.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceMap(pub HashMap<String, String>);

impl SourceMap {
    /// Returns true if there are no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Destination for an address, by exact match or else by the longest
    /// prefix that ends on a path boundary.
    fn lookup(&self, address: &str) -> Option<String> {
        if let Some(dest) = self.0.get(address) {
            return Some(dest.clone());
        }

        self.0
            .iter()
            .filter(|(prefix, _)| is_path_prefix(prefix, address))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(prefix, dest)| {
                let rest = &address[prefix.len()..];
                if dest.ends_with('/') || rest.starts_with('/') || rest.is_empty() {
                    format!("{dest}{rest}")
                } else {
                    format!("{dest}/{rest}")
                }
            })
    }
}

fn is_path_prefix(prefix: &str, address: &str) -> bool {
    !prefix.is_empty()
        && address.starts_with(prefix)
        && (prefix.ends_with('/') || address[prefix.len()..].starts_with('/'))
}

/// A single regex rewrite rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMapRegexRule {
    /// Regex matched against the whole source
    pub pattern: String,
    /// Replacement, may reference captures as `$1` or `${name}`
    pub replacement: String,
}

/// Ordered regex rewrite rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceMapRegex(pub Vec<SourceMapRegexRule>);

impl SourceMapRegex {
    /// Compile every rule.
    ///
    /// # Errors
    ///
    /// Returns `SourceMapRegex` for the first pattern that fails to compile.
    pub fn compile(&self) -> Result<CompiledSourceMapRegex> {
        let rules = self
            .0
            .iter()
            .map(|rule| {
                Regex::new(&rule.pattern)
                    .map(|regex| (regex, rule.replacement.clone()))
                    .map_err(|e| {
                        crate::err!(SourceMapRegex {
                            pattern: rule.pattern.clone(),
                            source: e,
                        })
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(CompiledSourceMapRegex { rules })
    }
}

/// Compiled regex rules, ready to apply.
#[derive(Debug, Clone, Default)]
pub struct CompiledSourceMapRegex {
    rules: Vec<(Regex, String)>,
}

impl CompiledSourceMapRegex {
    /// Number of compiled rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true if there are no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    fn apply(&self, source: &str) -> Option<String> {
        self.rules
            .iter()
            .find(|(regex, _)| regex.is_match(source))
            .map(|(regex, replacement)| regex.replace(source, replacement.as_str()).into_owned())
    }
}

/// Outcome of mapping a module source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMapResult {
    /// Source to resolve
    pub source: String,
    /// Version constraint to apply; cleared when the destination pins a ref
    pub version: String,
    /// Query string of the resulting source, without the `?`
    pub raw_query: String,
    /// Whether any rule applied
    pub mapped: bool,
}

/// Applies a [`SourceMap`] and compiled [`SourceMapRegex`] rules.
#[derive(Debug, Clone, Default)]
pub struct SourceMapper {
    exact: SourceMap,
    regex: CompiledSourceMapRegex,
}

impl SourceMapper {
    /// Create a mapper from exact rules and compiled regex rules.
    #[must_use]
    pub fn new(exact: SourceMap, regex: CompiledSourceMapRegex) -> Self {
        Self { exact, regex }
    }

    /// Map a module source.
    ///
    /// Local sources, and sources with an invalid sub-directory, are never
    /// mapped.
    #[must_use]
    pub fn map(&self, source: &str, version: &str) -> SourceMapResult {
        let unmapped = || SourceMapResult {
            source: source.to_string(),
            version: version.to_string(),
            raw_query: query_of(source),
            mapped: false,
        };

        if is_local_module(source) || (self.exact.is_empty() && self.regex.is_empty()) {
            return unmapped();
        }

        let Ok((base, sub_dir)) = split_module_sub_dir(source) else {
            return unmapped();
        };
        let (address, query) = base.split_once('?').unwrap_or((base.as_str(), ""));

        let mapped = if let Some(dest) = self.exact.0.get(source) {
            Some(dest.clone())
        } else if let Some(dest) = self.exact.lookup(address) {
            Some(reassemble(&dest, &sub_dir, query))
        } else {
            self.regex.apply(source)
        };

        let Some(mapped) = mapped else {
            return unmapped();
        };

        let raw_query = query_of(&mapped);
        let pins_ref = raw_query.split('&').any(|pair| pair.starts_with("ref="));
        tracing::debug!(from = %source, to = %mapped, "Mapped module source");

        SourceMapResult {
            version: if pins_ref { String::new() } else { version.to_string() },
            source: mapped,
            raw_query,
            mapped: true,
        }
    }
}

/// Rebuild `dest//sub_dir?query`, keeping the destination's own query if it
/// has one.
fn reassemble(dest: &str, sub_dir: &str, query: &str) -> String {
    let (dest_address, dest_query) = dest.split_once('?').unwrap_or((dest, ""));
    let query = if dest_query.is_empty() { query } else { dest_query };

    let mut out = dest_address.to_string();
    if !sub_dir.is_empty() {
        out.push_str("//");
        out.push_str(sub_dir);
    }
    if !query.is_empty() {
        out.push('?');
        out.push_str(query);
    }
    out
}

fn query_of(source: &str) -> String {
    split_module_sub_dir(source)
        .ok()
        .and_then(|(base, _)| base.split_once('?').map(|(_, q)| q.to_string()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn mapper(exact: &[(&str, &str)], regex: &[(&str, &str)]) -> SourceMapper {
        let exact = SourceMap(
            exact
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        );
        let regex = SourceMapRegex(
            regex
                .iter()
                .map(|(p, r)| SourceMapRegexRule {
                    pattern: (*p).to_string(),
                    replacement: (*r).to_string(),
                })
                .collect(),
        );
        SourceMapper::new(exact, regex.compile().unwrap())
    }

    #[test]
    fn test_no_rules_leaves_source() {
        let result = SourceMapper::default().map("hashicorp/consul/aws", "~> 1.0");
        assert_eq!(
            result,
            SourceMapResult {
                source: "hashicorp/consul/aws".to_string(),
                version: "~> 1.0".to_string(),
                raw_query: String::new(),
                mapped: false,
            }
        );
    }

    #[test]
    fn test_exact_match_pins_ref() {
        let m = mapper(
            &[("terraform-aws-modules/vpc/aws", "git::https://mirror.internal/vpc.git?ref=v5.1.0")],
            &[],
        );
        let result = m.map("terraform-aws-modules/vpc/aws", "~> 5.0");
        assert!(result.mapped);
        assert_eq!(result.source, "git::https://mirror.internal/vpc.git?ref=v5.1.0");
        assert_eq!(result.version, "");
        assert_eq!(result.raw_query, "ref=v5.1.0");
    }

    #[test]
    fn test_prefix_match_keeps_sub_dir_and_query() {
        let m = mapper(&[("git::https://github.com/acme", "git::https://git.internal/acme")], &[]);
        let result = m.map("git::https://github.com/acme/network.git//vpc?ref=v2", "");
        assert_eq!(result.source, "git::https://git.internal/acme/network.git//vpc?ref=v2");
        assert_eq!(result.raw_query, "ref=v2");
    }

    #[test]
    fn test_prefix_must_end_on_path_boundary() {
        let m = mapper(&[("github.com/acme", "github.com/mirror")], &[]);
        assert!(!m.map("github.com/acme-corp/vpc", "").mapped);
        assert!(m.map("github.com/acme/vpc", "").mapped);
    }

    #[test]
    fn test_longest_prefix_wins() {
        let m = mapper(
            &[("github.com/acme", "github.com/a"), ("github.com/acme/net", "github.com/b")],
            &[],
        );
        assert_eq!(m.map("github.com/acme/net/vpc", "").source, "github.com/b/vpc");
    }

    #[test]
    fn test_regex_rule_with_captures() {
        let m = mapper(&[], &[("^github.com/acme/(.*)$", "git::https://git.internal/acme/$1")]);
        let result = m.map("github.com/acme/vpc", "1.0.0");
        assert_eq!(result.source, "git::https://git.internal/acme/vpc");
        assert_eq!(result.version, "1.0.0");
    }

    #[test]
    fn test_exact_beats_regex() {
        let m = mapper(&[("github.com/acme/vpc", "exact/vpc/aws")], &[("acme", "regex")]);
        assert_eq!(m.map("github.com/acme/vpc", "").source, "exact/vpc/aws");
    }

    #[test]
    fn test_local_sources_are_never_mapped() {
        let m = mapper(&[("./child", "github.com/x/y")], &[(".*", "anything")]);
        assert!(!m.map("./child", "").mapped);
    }

    #[test]
    fn test_invalid_regex_fails_to_compile() {
        let regex = SourceMapRegex(vec![SourceMapRegexRule {
            pattern: "([unclosed".to_string(),
            replacement: String::new(),
        }]);
        assert!(matches!(
            regex.compile(),
            Err(crate::TfModCacheError::SourceMapRegex { .. })
        ));
    }
}
