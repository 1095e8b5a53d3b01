//! HCL and JSON file parser with a per-instance parse cache.
//!
//! Native syntax is parsed with `hcl-rs`, JSON syntax with `serde_json`.
//! Parsing never fails with an `Err`: read and syntax problems come back as
//! [`Diagnostics`] next to an optional file.

use crate::parser::{is_json_file, TERRAFORM_EXTENSIONS};
use crate::types::ModuleCall;

use hcl::{Body, Expression};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

/// Severity of a parse diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticSeverity {
    /// The file could not be used
    Error,
    /// The file was parsed but something looked off
    Warning,
}

/// A single parse diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Severity
    pub severity: DiagnosticSeverity,
    /// Short summary
    pub summary: String,
    /// Detail message
    pub detail: String,
    /// File the diagnostic refers to
    pub file: PathBuf,
}

/// Diagnostics returned next to a parsed file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    fn error(file: &Path, summary: &str, detail: String) -> Self {
        Self(vec![Diagnostic {
            severity: DiagnosticSeverity::Error,
            summary: summary.to_string(),
            detail,
            file: file.to_path_buf(),
        }])
    }

    /// Returns true if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.0.iter().any(|d| d.severity == DiagnosticSeverity::Error)
    }

    /// Returns true if there are no diagnostics.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the diagnostics.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter()
    }

    /// Append diagnostics from another set.
    pub fn extend(&mut self, other: Self) {
        self.0.extend(other.0);
    }
}

impl std::fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, d) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}: {}; {}", d.file.display(), d.summary, d.detail)?;
        }
        Ok(())
    }
}

/// Parsed body of a configuration file.
#[derive(Debug, Clone)]
pub enum FileBody {
    /// Native HCL syntax
    Hcl(Body),
    /// JSON syntax
    Json(serde_json::Value),
}

/// A parsed configuration file.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Path the file was read from
    pub path: PathBuf,
    /// Parsed body
    pub body: FileBody,
}

/// File parser that remembers every file it has parsed.
///
/// Not synchronized; share it through [`crate::parser::SharedHclParser`].
#[derive(Debug, Default)]
pub struct HclFileParser {
    files: HashMap<PathBuf, Arc<SourceFile>>,
}

impl HclFileParser {
    /// Create an empty parser.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of files held in the parse cache.
    #[must_use]
    pub fn cached_files(&self) -> usize {
        self.files.len()
    }

    /// Parse a file in native HCL syntax.
    pub fn parse_hcl_file(&mut self, path: &Path) -> (Option<Arc<SourceFile>>, Diagnostics) {
        self.parse_with(path, |content| {
            hcl::parse(content).map(FileBody::Hcl).map_err(|e| e.to_string())
        })
    }

    /// Parse a file in JSON syntax.
    pub fn parse_json_file(&mut self, path: &Path) -> (Option<Arc<SourceFile>>, Diagnostics) {
        self.parse_with(path, |content| {
            serde_json::from_str(content)
                .map(FileBody::Json)
                .map_err(|e| e.to_string())
        })
    }

    fn parse_with<F>(&mut self, path: &Path, parse: F) -> (Option<Arc<SourceFile>>, Diagnostics)
    where
        F: FnOnce(&str) -> std::result::Result<FileBody, String>,
    {
        if let Some(file) = self.files.get(path) {
            tracing::trace!(file = %path.display(), "Parse cache hit");
            return (Some(Arc::clone(file)), Diagnostics::default());
        }

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                return (
                    None,
                    Diagnostics::error(path, "Failed to read file", e.to_string()),
                );
            }
        };

        tracing::debug!(file = %path.display(), "Parsing file");

        match parse(&content) {
            Ok(body) => {
                let file = Arc::new(SourceFile {
                    path: path.to_path_buf(),
                    body,
                });
                self.files.insert(path.to_path_buf(), Arc::clone(&file));
                (Some(file), Diagnostics::default())
            }
            Err(message) => (None, Diagnostics::error(path, "Invalid syntax", message)),
        }
    }
}

/// List the Terraform/OpenTofu files directly inside a module directory,
/// sorted by path.
#[must_use]
pub fn terraform_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(e) => Some(e),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read directory entry");
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|p| is_terraform_file(p))
        .collect();
    files.sort();
    files
}

/// Check if a file is a Terraform/OpenTofu configuration file.
#[must_use]
pub fn is_terraform_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    !name.starts_with('.') && TERRAFORM_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
}

/// Extract the module calls declared in a parsed file.
///
/// Keys are `parent_key.label`, or just the label for the root module.
/// Calls whose `source` is missing or not a literal string are skipped.
#[must_use]
pub fn module_calls(file: &SourceFile, parent_key: &str) -> Vec<ModuleCall> {
    let mut calls = match &file.body {
        FileBody::Hcl(body) => hcl_module_calls(body, &file.path),
        FileBody::Json(value) => json_module_calls(value, &file.path),
    };

    for call in &mut calls {
        if !parent_key.is_empty() {
            call.key = format!("{parent_key}.{}", call.key);
        }
    }
    calls
}

fn hcl_module_calls(body: &Body, file_path: &Path) -> Vec<ModuleCall> {
    body.blocks()
        .filter(|block| block.identifier.as_str() == "module")
        .filter_map(|block| {
            let Some(name) = block.labels.first().map(|l| l.as_str().to_string()) else {
                tracing::warn!(file = %file_path.display(), "Module block without a label");
                return None;
            };
            let Some(source) = get_string_attribute(&block.body, "source") else {
                tracing::warn!(
                    module = %name,
                    file = %file_path.display(),
                    "Module block missing a literal source attribute"
                );
                return None;
            };
            let version = get_string_attribute(&block.body, "version").unwrap_or_default();
            Some(ModuleCall::new(name, source, version))
        })
        .collect()
}

fn json_module_calls(value: &serde_json::Value, file_path: &Path) -> Vec<ModuleCall> {
    // "module" may be an object, or an array of objects when split up
    let module_objects: Vec<&serde_json::Map<String, serde_json::Value>> = match value.get("module") {
        Some(serde_json::Value::Object(obj)) => vec![obj],
        Some(serde_json::Value::Array(items)) => items.iter().filter_map(|i| i.as_object()).collect(),
        _ => Vec::new(),
    };

    let mut calls = Vec::new();
    for obj in module_objects {
        for (name, block) in obj {
            let block = match block {
                serde_json::Value::Array(items) => items.first(),
                other => Some(other),
            };
            let source = block
                .and_then(|b| b.get("source"))
                .and_then(serde_json::Value::as_str);
            let Some(source) = source else {
                tracing::warn!(
                    module = %name,
                    file = %file_path.display(),
                    "Module block missing a literal source attribute"
                );
                continue;
            };
            let version = block
                .and_then(|b| b.get("version"))
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default();
            calls.push(ModuleCall::new(name.clone(), source, version));
        }
    }
    calls
}

/// Get a literal string attribute from a body.
fn get_string_attribute(body: &Body, key: &str) -> Option<String> {
    body.attributes()
        .find(|attr| attr.key.as_str() == key)
        .and_then(|attr| match &attr.expr {
            Expression::String(s) => Some(s.clone()),
            _ => None,
        })
}

/// Pick the parse entry point for a file by its name.
pub(crate) fn parse_by_extension(
    parser: &mut HclFileParser,
    path: &Path,
) -> (Option<Arc<SourceFile>>, Diagnostics) {
    if is_json_file(path) {
        parser.parse_json_file(path)
    } else {
        parser.parse_hcl_file(path)
    }
}
