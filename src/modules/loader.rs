//! Module loader: reads the project manifest and decides, per module call,
//! whether an installed copy can be reused or a fetch is required.

use crate::error::Result;
use crate::modules::paths::{clean_path, relative_path};
use crate::modules::{
    check_version, download_identity, CompiledSourceMapRegex, Manifest, ManifestModule,
    ManifestOrigin, ModuleCache, SourceMap, SourceMapRegex, SourceMapper,
};
use crate::parser::{
    is_local_module, module_calls, same_module_source, split_module_sub_dir, terraform_files,
    Diagnostics, SharedHclParser,
};
use crate::types::ModuleCall;

use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Directory of the module manifest, relative to a project.
pub const MANIFEST_DIR: &str = ".terraform/modules";

/// File name of the module manifest.
pub const MANIFEST_FILE: &str = "modules.json";

/// Options for [`ModuleLoader::new`].
#[derive(Debug, Clone, Default)]
pub struct ModuleLoaderOptions {
    /// Shared download root. Empty when each project keeps its own
    /// `.terraform/modules`.
    pub cache_path: PathBuf,
    /// Parser shared with the evaluator and other loaders
    pub hcl_parser: Arc<SharedHclParser>,
    /// Exact and prefix source rewrites
    pub source_map: SourceMap,
    /// Regex source rewrites
    pub source_map_regex: SourceMapRegex,
}

/// How a module call was resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A local path; nothing to fetch or cache
    Local {
        /// Module key
        key: String,
        /// Relative source path
        source: String,
    },
    /// Already resolved earlier in this run
    Cached(ManifestModule),
    /// Installed by a previous `init` and still valid
    Manifest(ManifestModule),
    /// Must be downloaded
    Fetch {
        /// Module key
        key: String,
        /// Source to download, after source mapping
        source: String,
        /// Version constraint to resolve, after source mapping
        version: String,
        /// Canonical download identity
        url: String,
        /// Whether the source was rewritten by a source map
        is_source_mapped: bool,
    },
}

impl Resolution {
    /// Module key.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Local { key, .. } | Self::Fetch { key, .. } => key,
            Self::Cached(m) | Self::Manifest(m) => &m.key,
        }
    }

    /// Installed directory, when the module is already on disk.
    #[must_use]
    pub fn dir(&self) -> Option<&Path> {
        match self {
            Self::Cached(m) | Self::Manifest(m) => Some(&m.dir),
            Self::Local { .. } | Self::Fetch { .. } => None,
        }
    }

    /// Short name of the variant.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Local { .. } => "local",
            Self::Cached(_) => "cached",
            Self::Manifest(_) => "manifest",
            Self::Fetch { .. } => "fetch",
        }
    }

    /// Returns true if the module has to be downloaded.
    #[must_use]
    pub const fn needs_fetch(&self) -> bool {
        matches!(self, Self::Fetch { .. })
    }
}

/// Loads module manifests and resolves module calls against them.
///
/// One loader is meant to serve one run. It owns the in-memory module cache,
/// so a module resolved once is not looked up in the manifest again.
///
/// # Example
///
/// ```rust,no_run
/// use std::path::Path;
/// use tfmodcache::modules::{ModuleLoader, ModuleLoaderOptions};
/// use tfmodcache::types::ModuleCall;
///
/// let loader = ModuleLoader::new(ModuleLoaderOptions::default());
/// let manifest = loader.load(Path::new("./infra"));
/// let call = ModuleCall::new("vpc", "terraform-aws-modules/vpc/aws", "~> 5.0");
/// let resolution = loader.resolve(&manifest, &call)?;
/// println!("{}: {}", resolution.key(), resolution.kind());
/// # Ok::<(), tfmodcache::TfModCacheError>(())
/// ```
#[derive(Debug)]
pub struct ModuleLoader {
    cache_path: PathBuf,
    cache: ModuleCache,
    hcl_parser: Arc<SharedHclParser>,
    source_mapper: SourceMapper,
}

impl ModuleLoader {
    /// Create a loader.
    ///
    /// The regex source map is compiled here. If a pattern is invalid the
    /// error is logged and the loader runs without regex rules.
    #[must_use]
    pub fn new(options: ModuleLoaderOptions) -> Self {
        let regex = options.source_map_regex.compile().unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to compile source map regex, ignoring regex rules");
            CompiledSourceMapRegex::default()
        });

        Self {
            cache_path: options.cache_path,
            cache: ModuleCache::new(),
            hcl_parser: options.hcl_parser,
            source_mapper: SourceMapper::new(options.source_map, regex),
        }
    }

    /// Path of the manifest file of a project.
    #[must_use]
    pub fn manifest_path(project_path: &Path) -> PathBuf {
        project_path.join(MANIFEST_DIR).join(MANIFEST_FILE)
    }

    /// The shared download root, empty if none.
    #[must_use]
    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    /// The in-memory module cache.
    #[must_use]
    pub const fn cache(&self) -> &ModuleCache {
        &self.cache
    }

    /// The shared file parser.
    #[must_use]
    pub fn hcl_parser(&self) -> &Arc<SharedHclParser> {
        &self.hcl_parser
    }

    /// Load the manifest of a project.
    ///
    /// Never fails. A missing manifest gives a root-only manifest with origin
    /// [`ManifestOrigin::Missing`]; an unreadable or malformed one gives the
    /// same with origin [`ManifestOrigin::Corrupt`].
    pub fn load(&self, project_path: &Path) -> Manifest {
        let manifest_path = Self::manifest_path(project_path);

        let mut manifest = if manifest_path.exists() {
            match Manifest::read(&manifest_path) {
                Ok(mut manifest) => {
                    self.rewrite_dirs(&mut manifest, project_path);
                    manifest.origin = ManifestOrigin::Disk;
                    manifest
                }
                Err(e) => {
                    tracing::debug!(
                        path = %manifest_path.display(),
                        error = %e,
                        "Failed to load module manifest, using root module only"
                    );
                    Manifest::root_only(project_path, ManifestOrigin::Corrupt)
                }
            }
        } else {
            tracing::debug!(path = %manifest_path.display(), "No module manifest found");
            Manifest::root_only(project_path, ManifestOrigin::Missing)
        };

        manifest.cache_path.clone_from(&self.cache_path);
        manifest.project_path = project_path.to_path_buf();

        tracing::debug!(
            project = %project_path.display(),
            modules = manifest.modules.len(),
            origin = ?manifest.origin,
            "Loaded module manifest"
        );
        manifest
    }

    /// Make every module directory relative to the shared cache root.
    fn rewrite_dirs(&self, manifest: &mut Manifest, project_path: &Path) {
        if self.cache_path.as_os_str().is_empty() {
            return;
        }

        let (Ok(cache_abs), Ok(project_abs)) =
            (std::path::absolute(&self.cache_path), std::path::absolute(project_path))
        else {
            tracing::debug!(project = %project_path.display(), "Failed to make paths absolute");
            return;
        };

        let Some(rel) = relative_path(&cache_abs, &project_abs) else {
            tracing::debug!(
                cache = %cache_abs.display(),
                project = %project_abs.display(),
                "Project is not reachable from the cache root, keeping recorded dirs"
            );
            return;
        };

        for module in &mut manifest.modules {
            module.dir = rel.join(&module.dir);
        }
    }

    /// Resolve a module call.
    ///
    /// Order: local sources, source mapping, the in-memory cache, then the
    /// manifest. Anything left needs a fetch.
    ///
    /// # Errors
    ///
    /// - `InvalidSubmodulePath` if the source's sub-directory escapes the
    ///   module
    /// - `InvalidConstraint` if the call's version constraint is malformed
    /// - `InvalidVersion` if an installed module records a malformed version
    pub fn resolve(&self, manifest: &Manifest, module_call: &ModuleCall) -> Result<Resolution> {
        if is_local_module(&module_call.source) {
            return Ok(Resolution::Local {
                key: module_call.key.clone(),
                source: module_call.source.clone(),
            });
        }

        let mapped = self.source_mapper.map(&module_call.source, &module_call.version);
        let call = ModuleCall::new(module_call.key.clone(), mapped.source, mapped.version);
        split_module_sub_dir(&call.source)?;

        match self.cache.lookup(&call.key, &call) {
            Ok(module) => {
                tracing::trace!(key = %call.key, "Module found in cache");
                return Ok(Resolution::Cached(module));
            }
            Err(e) if e.is_stale() => {
                tracing::trace!(key = %call.key, reason = %e, "Cache miss");
            }
            Err(e) => return Err(e),
        }

        if let Some(module) = self.from_manifest(manifest, &call, mapped.mapped)? {
            self.cache.store(&call.key, module.clone());
            return Ok(Resolution::Manifest(module));
        }

        tracing::debug!(key = %call.key, source = %call.source, "Module needs to be fetched");
        Ok(Resolution::Fetch {
            url: download_identity(&call.source),
            key: call.key,
            source: call.source,
            version: call.version,
            is_source_mapped: mapped.mapped,
        })
    }

    fn from_manifest(
        &self,
        manifest: &Manifest,
        call: &ModuleCall,
        is_source_mapped: bool,
    ) -> Result<Option<ManifestModule>> {
        let Some(installed) = manifest.get(&call.key) else {
            return Ok(None);
        };

        if !same_module_source(&installed.source, &call.source) {
            let stale = crate::err!(SourceChanged {
                key: call.key.clone(),
                cached: installed.source,
                requested: call.source.clone(),
            });
            tracing::debug!(reason = %stale, "Installed module is stale");
            return Ok(None);
        }

        match check_version(call, &installed) {
            Ok(module) => Ok(Some(ManifestModule {
                dir: anchored_dir(manifest, &module.dir),
                source: call.source.clone(),
                is_source_mapped,
                ..module
            })),
            Err(e) if e.is_stale() => {
                tracing::debug!(reason = %e, "Installed module is stale");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Resolve a batch of module calls in parallel.
    ///
    /// Results are returned in the order of `calls`.
    pub fn resolve_all(&self, manifest: &Manifest, calls: &[ModuleCall]) -> Vec<Result<Resolution>> {
        calls
            .par_iter()
            .map(|call| self.resolve(manifest, call))
            .collect()
    }

    /// Directory a module is installed in.
    ///
    /// Without a shared cache root, directories are relative to the project.
    #[must_use]
    pub fn resolve_module_dir(&self, manifest: &Manifest, key: &str) -> Option<PathBuf> {
        manifest.get(key).map(|module| anchored_dir(manifest, &module.dir))
    }

    /// Resolve module calls and then, level by level, the calls made by every
    /// resolved module whose directory is on disk.
    ///
    /// `root_dir` is the directory the root calls were read from. Nested calls
    /// are keyed `parent.child`. Calls and results are returned in the same
    /// order, root calls first; parse problems of nested modules end up in the
    /// returned diagnostics.
    pub fn resolve_tree(
        &self,
        manifest: &Manifest,
        root_dir: &Path,
        calls: Vec<ModuleCall>,
    ) -> (Vec<ModuleCall>, Vec<Result<Resolution>>, Diagnostics) {
        let mut resolved_calls = Vec::new();
        let mut results = Vec::new();
        let mut diagnostics = Diagnostics::default();

        // Each pending call carries the directories of the modules above it
        let mut level: Vec<(ModuleCall, Vec<PathBuf>)> = calls
            .into_iter()
            .map(|call| (call, vec![root_dir.to_path_buf()]))
            .collect();

        while !level.is_empty() {
            let batch: Vec<ModuleCall> = level.iter().map(|(call, _)| call.clone()).collect();
            let batch_results = self.resolve_all(manifest, &batch);

            let mut next = Vec::new();
            for ((call, ancestors), result) in level.into_iter().zip(batch_results) {
                let dir = match (&result, ancestors.last()) {
                    (Ok(resolution), Some(parent)) => module_dir(resolution, parent),
                    _ => None,
                };

                if let Some(dir) = dir.filter(|dir| dir.is_dir()) {
                    if ancestors.contains(&dir) {
                        tracing::warn!(key = %call.key, dir = %dir.display(), "Module calls itself, not descending");
                    } else {
                        let (children, diags) = self.module_calls(&dir, &call.key);
                        diagnostics.extend(diags);
                        tracing::trace!(key = %call.key, children = children.len(), "Walking module");

                        let mut chain = ancestors;
                        chain.push(dir);
                        next.extend(children.into_iter().map(|child| (child, chain.clone())));
                    }
                }

                resolved_calls.push(call);
                results.push(result);
            }
            level = next;
        }

        (resolved_calls, results, diagnostics)
    }

    /// Record a module fetched outside the loader.
    pub fn store(&self, module: ManifestModule) {
        let key = module.key.clone();
        self.cache.store(&key, module);
    }

    /// Extract the module calls of the module in `dir`.
    ///
    /// Files that fail to parse are reported in the returned diagnostics and
    /// contribute no calls.
    pub fn module_calls(&self, dir: &Path, parent_key: &str) -> (Vec<ModuleCall>, Diagnostics) {
        let mut calls = Vec::new();
        let mut diagnostics = Diagnostics::default();

        for path in terraform_files(dir) {
            let (file, diags) = self.hcl_parser.parse_file(&path);
            diagnostics.extend(diags);
            if let Some(file) = file {
                calls.extend(module_calls(&file, parent_key));
            }
        }

        (calls, diagnostics)
    }
}

/// Directory of an installed module, usable from the working directory.
///
/// Without a shared cache root, manifest directories are relative to the
/// project.
fn anchored_dir(manifest: &Manifest, dir: &Path) -> PathBuf {
    if manifest.cache_path().as_os_str().is_empty() {
        clean_path(&manifest.project_path().join(dir))
    } else {
        dir.to_path_buf()
    }
}

/// Directory holding the configuration of a resolved module.
fn module_dir(resolution: &Resolution, parent_dir: &Path) -> Option<PathBuf> {
    match resolution {
        Resolution::Local { source, .. } => Some(clean_path(&parent_dir.join(source))),
        Resolution::Cached(module) | Resolution::Manifest(module) => Some(module.dir.clone()),
        Resolution::Fetch { .. } => None,
    }
}
