//! Plain text report generator.

use crate::config::Config;
use crate::error::Result;
use crate::modules::{ManifestOrigin, Resolution};
use crate::reporter::{EntryOutcome, ReportEntry, ReportGenerator, ResolutionReport, STATUSES};
use colored::Colorize;
use comfy_table::{Cell, Color, ContentArrangement, Table};

/// Text report generator for CLI output.
pub struct TextReporter {
    /// Whether to use colors
    use_colors: bool,
}

impl TextReporter {
    /// Create a new text reporter.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            use_colors: config.output.colored,
        }
    }
}

impl ReportGenerator for TextReporter {
    fn generate(&self, report: &ResolutionReport) -> Result<String> {
        let mut output = String::new();

        output.push_str(&self.format_header());
        output.push('\n');

        output.push_str(&self.format_summary(report));
        output.push('\n');

        if !report.entries.is_empty() {
            output.push_str(&self.format_modules(report));
            output.push('\n');
        }

        if !report.diagnostics.is_empty() {
            output.push_str(&self.format_diagnostics(report));
            output.push('\n');
        }

        output.push_str(&self.format_footer(report));

        Ok(output)
    }
}

impl TextReporter {
    fn section_title(&self, title: &str) -> String {
        let title = if self.use_colors {
            title.bright_cyan().bold().to_string()
        } else {
            title.to_string()
        };
        format!("\n{title}\n{}\n", "-".repeat(80))
    }

    fn format_header(&self) -> String {
        let title = "tfmodcache Module Resolution";
        let version = format!("v{}", env!("CARGO_PKG_VERSION"));

        if self.use_colors {
            format!(
                "\n{} {}\n{}\n",
                title.bright_white().bold(),
                version.dimmed(),
                "=".repeat(80).bright_blue(),
            )
        } else {
            format!("\n{title} {version}\n{}\n", "=".repeat(80))
        }
    }

    fn format_summary(&self, report: &ResolutionReport) -> String {
        let mut output = self.section_title("Summary");

        let origin = match report.manifest_origin {
            ManifestOrigin::Disk => "loaded",
            ManifestOrigin::Missing => "missing (root module only)",
            ManifestOrigin::Corrupt => "unreadable (root module only)",
        };
        let origin = if self.use_colors && report.manifest_origin == ManifestOrigin::Corrupt {
            origin.yellow().to_string()
        } else {
            origin.to_string()
        };

        output.push_str(&format!("  Project:     {}\n", report.project.display()));
        output.push_str(&format!("  Manifest:    {origin}\n"));
        if !report.cache_path.as_os_str().is_empty() {
            output.push_str(&format!("  Cache root:  {}\n", report.cache_path.display()));
        }

        let counts: Vec<String> = STATUSES
            .iter()
            .map(|status| {
                let n = report.count(status).to_string();
                let n = if self.use_colors {
                    colorize(status, &n)
                } else {
                    n
                };
                format!("{n} {status}")
            })
            .collect();
        output.push_str(&format!("  {} modules: {}\n", report.entries.len(), counts.join(" | ")));

        output
    }

    fn format_modules(&self, report: &ResolutionReport) -> String {
        let mut output = self.section_title("Modules");

        let mut table = Table::new();
        table
            .load_preset(comfy_table::presets::UTF8_BORDERS_ONLY)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec!["Key", "Source", "Version", "Status", "Location"]);

        for entry in &report.entries {
            self.add_module_row(&mut table, entry);
        }

        output.push_str(&table.to_string());
        output.push('\n');
        output
    }

    fn add_module_row(&self, table: &mut Table, entry: &ReportEntry) {
        let status = entry.status();
        let status_cell = if self.use_colors {
            Cell::new(status).fg(status_color(status))
        } else {
            Cell::new(status)
        };

        let location = match &entry.outcome {
            EntryOutcome::Resolved(Resolution::Local { source, .. }) => source.clone(),
            EntryOutcome::Resolved(Resolution::Cached(m) | Resolution::Manifest(m)) => {
                if m.version.is_empty() {
                    m.dir.display().to_string()
                } else {
                    format!("{} ({})", m.dir.display(), m.version)
                }
            }
            EntryOutcome::Resolved(Resolution::Fetch {
                url, is_source_mapped, ..
            }) => {
                if *is_source_mapped {
                    format!("{url} (mapped)")
                } else {
                    url.clone()
                }
            }
            EntryOutcome::Failed(message) => message.clone(),
        };

        let version = if entry.call.version.is_empty() {
            "-"
        } else {
            entry.call.version.as_str()
        };

        table.add_row(vec![
            Cell::new(&entry.call.key),
            Cell::new(truncate(&entry.call.source, 50)),
            Cell::new(version),
            status_cell,
            Cell::new(location),
        ]);
    }

    fn format_diagnostics(&self, report: &ResolutionReport) -> String {
        let mut output = self.section_title("Diagnostics");
        for line in &report.diagnostics {
            if self.use_colors {
                output.push_str(&format!("  {}\n", line.yellow()));
            } else {
                output.push_str(&format!("  {line}\n"));
            }
        }
        output
    }

    fn format_footer(&self, report: &ResolutionReport) -> String {
        let fetches = report.count("fetch");
        let status = if report.has_errors() {
            let failed = format!("FAILED - {} module(s) could not be resolved", report.count("failed"));
            if self.use_colors {
                failed.red().bold().to_string()
            } else {
                failed
            }
        } else if fetches > 0 {
            let pending = format!("OK - {fetches} module(s) need to be fetched");
            if self.use_colors {
                pending.yellow().to_string()
            } else {
                pending
            }
        } else {
            "OK - All modules are available locally".to_string()
        };

        format!("\n{status}\n\n")
    }
}

fn status_color(status: &str) -> Color {
    match status {
        "cached" | "manifest" => Color::Green,
        "fetch" => Color::Yellow,
        "failed" => Color::Red,
        _ => Color::Reset,
    }
}

fn colorize(status: &str, text: &str) -> String {
    match status {
        "cached" | "manifest" => text.green().bold().to_string(),
        "fetch" => text.yellow().bold().to_string(),
        "failed" => text.red().bold().to_string(),
        _ => text.to_string(),
    }
}

/// Truncate a string to a maximum number of characters.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{head}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::tests::sample_report;

    fn plain() -> TextReporter {
        let mut config = Config::default();
        config.output.colored = false;
        TextReporter::new(&config)
    }

    #[test]
    fn test_text_report_generation() {
        let text = plain().generate(&sample_report()).unwrap();

        assert!(text.contains("tfmodcache Module Resolution"));
        assert!(text.contains("Summary"));
        assert!(text.contains("/work/infra"));
        assert!(text.contains("4 modules: 1 local | 0 cached | 1 manifest | 1 fetch | 1 failed"));
        assert!(text.contains(".terraform/modules/vpc (5.1.0)"));
        assert!(text.contains("https://example.com/dns.git"));
        assert!(text.contains("invalid constraint"));
        assert!(text.contains("Diagnostics"));
        assert!(text.contains("FAILED - 1 module(s) could not be resolved"));
    }

    #[test]
    fn test_text_report_all_local() {
        let mut report = sample_report();
        report.entries.truncate(2);
        report.diagnostics.clear();

        let text = plain().generate(&report).unwrap();
        assert!(text.contains("OK - All modules are available locally"));
        assert!(!text.contains("Diagnostics"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world", 8), "hello...");
        assert_eq!(truncate("ééééé", 4), "é...");
    }
}
