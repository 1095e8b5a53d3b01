//! JSON report generator.

use crate::config::Config;
use crate::error::Result;
use crate::modules::{ManifestOrigin, Resolution};
use crate::reporter::{EntryOutcome, ReportEntry, ReportGenerator, ResolutionReport, STATUSES};
use serde::Serialize;
use std::collections::BTreeMap;

/// JSON report generator.
pub struct JsonReporter {
    /// Whether to pretty-print the output
    pretty: bool,
}

impl JsonReporter {
    /// Create a new JSON reporter.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            pretty: config.output.pretty,
        }
    }
}

impl ReportGenerator for JsonReporter {
    fn generate(&self, report: &ResolutionReport) -> Result<String> {
        let report = JsonReport::from(report);

        let json = if self.pretty {
            serde_json::to_string_pretty(&report)
        } else {
            serde_json::to_string(&report)
        };

        json.map_err(|e| {
            crate::err!(Internal {
                message: format!("Failed to serialize JSON report: {e}"),
            })
        })
    }
}

/// JSON report structure.
#[derive(Debug, Serialize)]
pub struct JsonReport {
    /// Report metadata
    pub metadata: ReportMetadata,
    /// Summary statistics
    pub summary: ReportSummary,
    /// One entry per module call
    pub modules: Vec<JsonModule>,
    /// Parse diagnostics
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<String>,
}

impl From<&ResolutionReport> for JsonReport {
    fn from(report: &ResolutionReport) -> Self {
        Self {
            metadata: ReportMetadata {
                version: env!("CARGO_PKG_VERSION").to_string(),
                project: report.project.to_string_lossy().to_string(),
                manifest: report.manifest_origin,
                cache_path: (!report.cache_path.as_os_str().is_empty())
                    .then(|| report.cache_path.to_string_lossy().to_string()),
            },
            summary: ReportSummary {
                total_modules: report.entries.len(),
                by_status: STATUSES
                    .iter()
                    .map(|status| ((*status).to_string(), report.count(status)))
                    .collect(),
                has_errors: report.has_errors(),
            },
            modules: report.entries.iter().map(JsonModule::from).collect(),
            diagnostics: report.diagnostics.clone(),
        }
    }
}

/// Report metadata.
#[derive(Debug, Serialize)]
pub struct ReportMetadata {
    /// tfmodcache version
    pub version: String,
    /// Project directory
    pub project: String,
    /// Where the manifest came from
    pub manifest: ManifestOrigin,
    /// Shared download root
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_path: Option<String>,
}

/// Report summary.
#[derive(Debug, Serialize)]
pub struct ReportSummary {
    /// Number of module calls
    pub total_modules: usize,
    /// Module calls per status
    pub by_status: BTreeMap<String, usize>,
    /// Whether any module call failed
    pub has_errors: bool,
}

/// JSON representation of a module call and its outcome.
#[derive(Debug, Serialize)]
pub struct JsonModule {
    /// Module key
    pub key: String,
    /// Source as written in configuration
    pub source: String,
    /// Requested version constraint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_constraint: Option<String>,
    /// Status: local, cached, manifest, fetch or failed
    pub status: &'static str,
    /// Installed directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
    /// Installed version
    #[serde(skip_serializing_if = "Option::is_none")]
    pub installed_version: Option<String>,
    /// Source to fetch, after source mapping
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetch_source: Option<String>,
    /// Canonical download identity
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Whether a source map rewrote the source
    pub source_mapped: bool,
    /// Error message for failed calls
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&ReportEntry> for JsonModule {
    fn from(entry: &ReportEntry) -> Self {
        let mut module = Self {
            key: entry.call.key.clone(),
            source: entry.call.source.clone(),
            version_constraint: (!entry.call.version.is_empty()).then(|| entry.call.version.clone()),
            status: entry.status(),
            dir: None,
            installed_version: None,
            fetch_source: None,
            url: None,
            source_mapped: false,
            error: None,
        };

        match &entry.outcome {
            EntryOutcome::Resolved(Resolution::Local { .. }) => {}
            EntryOutcome::Resolved(Resolution::Cached(m) | Resolution::Manifest(m)) => {
                module.dir = Some(m.dir.to_string_lossy().to_string());
                module.installed_version = (!m.version.is_empty()).then(|| m.version.clone());
                module.url = m.url();
                module.source_mapped = m.is_source_mapped;
            }
            EntryOutcome::Resolved(Resolution::Fetch {
                source,
                url,
                is_source_mapped,
                ..
            }) => {
                module.fetch_source = Some(source.clone());
                module.url = Some(url.clone());
                module.source_mapped = *is_source_mapped;
            }
            EntryOutcome::Failed(message) => module.error = Some(message.clone()),
        }

        module
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::tests::sample_report;

    #[test]
    fn test_json_report_generation() {
        let reporter = JsonReporter::new(&Config::default());
        let json = reporter.generate(&sample_report()).unwrap();

        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert!(parsed["metadata"]["version"].is_string());
        assert_eq!(parsed["metadata"]["manifest"], "disk");
        assert!(parsed["metadata"].get("cache_path").is_none());
        assert_eq!(parsed["summary"]["total_modules"], 4);
        assert_eq!(parsed["summary"]["by_status"]["fetch"], 1);
        assert_eq!(parsed["summary"]["has_errors"], true);

        let modules = parsed["modules"].as_array().unwrap();
        assert_eq!(modules[1]["status"], "manifest");
        assert_eq!(modules[1]["dir"], ".terraform/modules/vpc");
        assert_eq!(modules[1]["installed_version"], "5.1.0");
        assert_eq!(modules[2]["url"], "https://example.com/dns.git");
        assert_eq!(modules[3]["error"], "invalid constraint");
        assert_eq!(parsed["diagnostics"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_json_report_compact() {
        let mut config = Config::default();
        config.output.pretty = false;

        let json = JsonReporter::new(&config).generate(&sample_report()).unwrap();
        assert!(!json.contains('\n'));
    }
}
