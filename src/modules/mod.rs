//! Module resolution and caching.
//!
//! - [`ModuleLoader`]: loads a project's module manifest and resolves module
//!   calls against the in-memory cache and the manifest
//! - [`ModuleCache`]: modules already resolved during this run
//! - [`Manifest`]: the `.terraform/modules/modules.json` model
//! - [`check_version`]: version constraint matching
//! - [`SourceMapper`]: user-supplied source rewrites

mod cache;
mod loader;
mod manifest;
mod paths;
mod source_map;
mod version;

pub use cache::ModuleCache;
pub use loader::{ModuleLoader, ModuleLoaderOptions, Resolution, MANIFEST_DIR, MANIFEST_FILE};
pub use manifest::{download_identity, Manifest, ManifestModule, ManifestOrigin};
pub use paths::{clean_path, relative_path};
pub use source_map::{
    CompiledSourceMapRegex, SourceMap, SourceMapRegex, SourceMapRegexRule, SourceMapResult,
    SourceMapper,
};
pub use version::check_version;
