//! # tfmodcache
//!
//! Terraform/OpenTofu module resolution and caching.
//!
//! tfmodcache reads the module manifest that `terraform init` / `tofu init`
//! leaves in `.terraform/modules/modules.json`, extracts the module calls of
//! a configuration, and decides for each call whether an installed copy can
//! be reused or the module must be fetched.
//!
//! ## Features
//!
//! - **Manifest loading**: tolerant of missing or corrupt manifests, with
//!   directories rewritten relative to a shared download root
//! - **Module cache**: modules resolved once per run are reused, with the
//!   source and version constraint re-checked on every lookup
//! - **Version constraints**: Terraform constraint syntax (`~>`, `>=`, ...)
//! - **Source maps**: exact, prefix and regex rewrites of module sources
//! - **Multiple output formats**: JSON and plain text reports
//!
//! ## Example
//!
//! ```rust,no_run
//! use tfmodcache::{Config, ReportFormat, Resolver};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     let resolver = Resolver::new(config.clone());
//!
//!     let report = resolver.resolve_path("./infra").await?;
//!     let text = tfmodcache::reporter::Reporter::new(&config).generate(&report, ReportFormat::Text)?;
//!     println!("{text}");
//!
//!     Ok(())
//! }
//! ```

#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

pub mod cli;
pub mod config;
pub mod error;
pub mod modules;
pub mod parser;
pub mod reporter;
pub mod types;

pub use config::Config;
pub use error::{Result, TfModCacheError};
pub use modules::{Manifest, ManifestModule, ModuleCache, ModuleLoader, Resolution};
pub use parser::SharedHclParser;
pub use types::{Constraint, ModuleCall, ModuleSource, ReportFormat, VersionRange};

use parser::{module_calls, terraform_files, Diagnostics};
use reporter::ResolutionReport;
use std::path::Path;
use std::sync::Arc;

/// Resolves the module calls of projects.
///
/// The `Resolver` is the primary entry point for using tfmodcache as a
/// library. It handles:
/// - Loading the project's module manifest
/// - Parsing the root module files on blocking tasks
/// - Resolving every module call against the cache and the manifest, then
///   the calls of the modules found on disk
///
/// Projects resolved by one `Resolver` share its file parser. Each project
/// gets its own [`ModuleLoader`] and with it its own module cache, since
/// module keys are only unique within a project.
pub struct Resolver {
    config: Config,
    hcl_parser: Arc<SharedHclParser>,
}

impl Resolver {
    /// Create a new resolver with the given configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            hcl_parser: Arc::new(SharedHclParser::new()),
        }
    }

    /// The file parser shared by every project this resolver handles.
    #[must_use]
    pub fn hcl_parser(&self) -> &Arc<SharedHclParser> {
        &self.hcl_parser
    }

    /// Resolve the module calls of a project directory.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The path doesn't exist or isn't a directory
    /// - A worker task panics
    /// - Resolving a module call fails with an unrecoverable error
    ///
    /// Recoverable failures of individual module calls are recorded in the
    /// report.
    pub async fn resolve_path<P: AsRef<Path>>(&self, path: P) -> Result<ResolutionReport> {
        use futures::future::try_join_all;

        let path = path.as_ref().to_path_buf();
        if !path.is_dir() {
            return Err(TfModCacheError::io(
                &path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
                file!(),
                line!(),
            ));
        }
        tracing::info!(path = %path.display(), "Resolving project");

        let loader = ModuleLoader::new(self.config.loader_options(Arc::clone(&self.hcl_parser)));
        let manifest = loader.load(&path);

        let parses = terraform_files(&path).into_iter().map(|file| {
            let hcl_parser = Arc::clone(&self.hcl_parser);
            tokio::task::spawn_blocking(move || hcl_parser.parse_file(&file))
        });
        let parsed = try_join_all(parses).await.map_err(|e| {
            crate::err!(Internal {
                message: format!("Parse task failed: {e}"),
            })
        })?;

        let mut calls = Vec::new();
        let mut diagnostics = Diagnostics::default();
        for (file, diags) in parsed {
            diagnostics.extend(diags);
            if let Some(file) = file {
                calls.extend(module_calls(&file, ""));
            }
        }
        tracing::debug!(calls = calls.len(), "Extracted root module calls");

        let (manifest, calls, results, nested_diagnostics) = tokio::task::spawn_blocking(move || {
            let (calls, results, diagnostics) = loader.resolve_tree(&manifest, &path, calls);
            (manifest, calls, results, diagnostics)
        })
        .await
        .map_err(|e| {
            crate::err!(Internal {
                message: format!("Resolve task failed: {e}"),
            })
        })?;
        diagnostics.extend(nested_diagnostics);

        let results = results
            .into_iter()
            .map(|result| match result {
                Err(e) if !e.is_recoverable() => Err(e),
                other => Ok(other),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ResolutionReport::new(&manifest, calls, results, &diagnostics))
    }
}
