//! Report generation module.
//!
//! This module renders the outcome of resolving a project's module calls:
//! - JSON: Machine-readable structured output
//! - Text: Human-readable CLI output
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use tfmodcache::modules::ModuleLoader;
//! use tfmodcache::reporter::{Reporter, ResolutionReport};
//! use tfmodcache::{Config, ReportFormat};
//!
//! let config = Config::default();
//! let loader = ModuleLoader::new(config.loader_options(Default::default()));
//! let manifest = loader.load(Path::new("./infra"));
//! let (calls, diagnostics) = loader.module_calls(Path::new("./infra"), "");
//! let results = loader.resolve_all(&manifest, &calls);
//!
//! let report = ResolutionReport::new(&manifest, calls, results, &diagnostics);
//! let text = Reporter::new(&config).generate(&report, ReportFormat::Text)?;
//! # Ok::<(), tfmodcache::TfModCacheError>(())
//! ```

mod json;
mod text;

use crate::config::Config;
use crate::error::Result;
use crate::modules::{Manifest, ManifestOrigin, Resolution};
use crate::parser::Diagnostics;
use crate::types::{ModuleCall, ReportFormat};

use std::path::PathBuf;

pub use json::JsonReporter;
pub use text::TextReporter;

/// Outcome of resolving one module call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryOutcome {
    /// The call was resolved
    Resolved(Resolution),
    /// The call failed with a hard error
    Failed(String),
}

/// One module call and its outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEntry {
    /// The module call as written in configuration
    pub call: ModuleCall,
    /// What happened to it
    pub outcome: EntryOutcome,
}

/// Everything a report shows about one project.
#[derive(Debug, Clone, Default)]
pub struct ResolutionReport {
    /// Project directory
    pub project: PathBuf,
    /// Where the manifest came from
    pub manifest_origin: ManifestOrigin,
    /// Shared download root, empty if none
    pub cache_path: PathBuf,
    /// One entry per module call, in call order
    pub entries: Vec<ReportEntry>,
    /// Parse diagnostics, one line each
    pub diagnostics: Vec<String>,
}

impl ResolutionReport {
    /// Build a report from module calls and their resolution results.
    ///
    /// `results` must be in the order of `calls`.
    #[must_use]
    pub fn new(
        manifest: &Manifest,
        calls: Vec<ModuleCall>,
        results: Vec<Result<Resolution>>,
        diagnostics: &Diagnostics,
    ) -> Self {
        let entries = calls
            .into_iter()
            .zip(results)
            .map(|(call, result)| ReportEntry {
                call,
                outcome: match result {
                    Ok(resolution) => EntryOutcome::Resolved(resolution),
                    Err(e) => EntryOutcome::Failed(e.to_string()),
                },
            })
            .collect();

        Self {
            project: manifest.project_path().to_path_buf(),
            manifest_origin: manifest.origin(),
            cache_path: manifest.cache_path().to_path_buf(),
            entries,
            diagnostics: diagnostics
                .iter()
                .map(|d| format!("{}: {}; {}", d.file.display(), d.summary, d.detail))
                .collect(),
        }
    }

    /// Returns true if any module call failed.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.entries
            .iter()
            .any(|e| matches!(e.outcome, EntryOutcome::Failed(_)))
    }

    /// Number of entries with the given status, as shown in reports.
    #[must_use]
    pub fn count(&self, status: &str) -> usize {
        self.entries.iter().filter(|e| e.status() == status).count()
    }
}

impl ReportEntry {
    /// Status label: the resolution kind, or "failed".
    #[must_use]
    pub fn status(&self) -> &'static str {
        match &self.outcome {
            EntryOutcome::Resolved(resolution) => resolution.kind(),
            EntryOutcome::Failed(_) => "failed",
        }
    }
}

/// Statuses in the order reports list them.
pub const STATUSES: &[&str] = &["local", "cached", "manifest", "fetch", "failed"];

/// Report generator that supports multiple output formats.
pub struct Reporter {
    config: Config,
}

impl Reporter {
    /// Create a new reporter with the given configuration.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Generate a report in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if report generation fails.
    pub fn generate(&self, report: &ResolutionReport, format: ReportFormat) -> Result<String> {
        match format {
            ReportFormat::Json => JsonReporter::new(&self.config).generate(report),
            ReportFormat::Text => TextReporter::new(&self.config).generate(report),
        }
    }
}

/// Trait for report generators.
pub trait ReportGenerator {
    /// Generate a report from resolution results.
    ///
    /// # Errors
    ///
    /// Returns an error if generation fails.
    fn generate(&self, report: &ResolutionReport) -> Result<String>;
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::modules::ManifestModule;

    pub(crate) fn sample_report() -> ResolutionReport {
        let cached = ManifestModule {
            key: "vpc".to_string(),
            source: "terraform-aws-modules/vpc/aws".to_string(),
            version: "5.1.0".to_string(),
            dir: PathBuf::from(".terraform/modules/vpc"),
            ..ManifestModule::default()
        };

        ResolutionReport {
            project: PathBuf::from("/work/infra"),
            manifest_origin: ManifestOrigin::Disk,
            cache_path: PathBuf::new(),
            entries: vec![
                ReportEntry {
                    call: ModuleCall::new("net", "./modules/net", ""),
                    outcome: EntryOutcome::Resolved(Resolution::Local {
                        key: "net".to_string(),
                        source: "./modules/net".to_string(),
                    }),
                },
                ReportEntry {
                    call: ModuleCall::new("vpc", "terraform-aws-modules/vpc/aws", "~> 5.0"),
                    outcome: EntryOutcome::Resolved(Resolution::Manifest(cached)),
                },
                ReportEntry {
                    call: ModuleCall::new("dns", "git::https://example.com/dns.git?ref=v1", ""),
                    outcome: EntryOutcome::Resolved(Resolution::Fetch {
                        key: "dns".to_string(),
                        source: "git::https://example.com/dns.git?ref=v1".to_string(),
                        version: String::new(),
                        url: "https://example.com/dns.git".to_string(),
                        is_source_mapped: false,
                    }),
                },
                ReportEntry {
                    call: ModuleCall::new("bad", "hashicorp/consul/aws", ">= two"),
                    outcome: EntryOutcome::Failed("invalid constraint".to_string()),
                },
            ],
            diagnostics: vec!["/work/infra/broken.tf: Invalid syntax; unexpected EOF".to_string()],
        }
    }

    #[test]
    fn test_report_counts() {
        let report = sample_report();
        assert!(report.has_errors());
        assert_eq!(report.count("local"), 1);
        assert_eq!(report.count("manifest"), 1);
        assert_eq!(report.count("fetch"), 1);
        assert_eq!(report.count("failed"), 1);
        assert_eq!(report.count("cached"), 0);
    }

    #[test]
    fn test_report_from_results() {
        let manifest = Manifest::root_only(std::path::Path::new("/p"), ManifestOrigin::Missing);
        let calls = vec![ModuleCall::new("a", "x/y/z", ">= nope")];
        let results = vec![Err(crate::err!(InvalidConstraint {
            constraint: ">= nope".to_string(),
            message: "bad".to_string(),
        }))];

        let report = ResolutionReport::new(&manifest, calls, results, &Diagnostics::default());
        assert_eq!(report.project, PathBuf::from("/p"));
        assert_eq!(report.manifest_origin, ManifestOrigin::Missing);
        assert_eq!(report.entries[0].status(), "failed");
    }
}
