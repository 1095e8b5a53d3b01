//! Parsing module for Terraform/OpenTofu files and module sources.
//!
//! - [`SharedHclParser`]: one file parser and its parse cache, shared by every
//!   module loader and worker thread of a run
//! - source functions: classify and split module source addresses
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use tfmodcache::parser::{module_calls, SharedHclParser};
//!
//! let parser = Arc::new(SharedHclParser::new());
//! let (file, diags) = parser.parse_hcl_file(Path::new("main.tf"));
//! if let Some(file) = file {
//!     println!("{} module calls", module_calls(&file, "").len());
//! }
//! assert!(!diags.has_errors());
//! ```

mod files;
mod source;

pub use files::{
    is_terraform_file, module_calls, terraform_files, Diagnostic, DiagnosticSeverity,
    Diagnostics, FileBody, HclFileParser, SourceFile,
};
pub use source::{
    classify_module_source, has_opentofu_extension, is_local_module, same_module_source,
    split_module_sub_dir, strip_getter_prefix, DEFAULT_REGISTRY,
};

use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;

/// File extensions of Terraform/OpenTofu configuration files.
pub const TERRAFORM_EXTENSIONS: &[&str] = &[".tf", ".tf.json", ".tofu", ".tofu.json"];

/// Returns true if the file uses the JSON configuration syntax.
#[must_use]
pub fn is_json_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| name.ends_with(".tf.json") || name.ends_with(".tofu.json"))
}

/// A file parser shared between module loaders.
///
/// Every call takes the lock for the whole parse, so concurrent callers never
/// race on the parse cache and a file is read at most once per run. No
/// ordering is promised between callers.
#[derive(Debug, Default)]
pub struct SharedHclParser {
    parser: Mutex<HclFileParser>,
}

impl SharedHclParser {
    /// Create a shared parser around a fresh file parser.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a file in native HCL syntax.
    pub fn parse_hcl_file(&self, path: &Path) -> (Option<Arc<SourceFile>>, Diagnostics) {
        self.parser.lock().parse_hcl_file(path)
    }

    /// Parse a file in JSON syntax.
    pub fn parse_json_file(&self, path: &Path) -> (Option<Arc<SourceFile>>, Diagnostics) {
        self.parser.lock().parse_json_file(path)
    }

    /// Parse a file, picking the entry point from its extension.
    pub fn parse_file(&self, path: &Path) -> (Option<Arc<SourceFile>>, Diagnostics) {
        files::parse_by_extension(&mut self.parser.lock(), path)
    }

    /// Number of files held in the parse cache.
    #[must_use]
    pub fn cached_files(&self) -> usize {
        self.parser.lock().cached_files()
    }
}
