//! In-memory cache of modules resolved during one run.

use crate::error::Result;
use crate::modules::{check_version, ManifestModule};
use crate::types::ModuleCall;

use dashmap::DashMap;

/// Cache of modules that have already been resolved during this run.
///
/// Entries are keyed by module key only. A module used twice under different
/// keys is cached twice. Nothing is persisted; the on-disk manifest is the
/// cross-run cache.
#[derive(Debug, Default)]
pub struct ModuleCache {
    modules: DashMap<String, ManifestModule>,
}

impl ModuleCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a module and check that it still matches the module call.
    ///
    /// # Errors
    ///
    /// - `NotCached` if nothing is stored under the key
    /// - `SourceChanged` if the stored source differs from the call's
    /// - any error of [`check_version`]
    pub fn lookup(&self, key: &str, module_call: &ModuleCall) -> Result<ManifestModule> {
        // Clone out of the map so no shard lock is held while checking
        let cached = self
            .modules
            .get(key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| crate::err!(NotCached { key: key.to_string() }))?;

        if cached.source != module_call.source {
            return Err(crate::err!(SourceChanged {
                key: key.to_string(),
                cached: cached.source,
                requested: module_call.source.clone(),
            }));
        }

        check_version(module_call, &cached)
    }

    /// Store a resolved module, replacing any previous entry for the key.
    pub fn store(&self, key: &str, module: ManifestModule) {
        tracing::trace!(key = %key, source = %module.source, "Caching module");
        self.modules.insert(key.to_string(), module);
    }

    /// Number of cached modules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Returns true if nothing has been cached yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.modules.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TfModCacheError;
    use std::sync::Arc;

    fn module(source: &str, version: &str) -> ManifestModule {
        ManifestModule {
            key: "child".to_string(),
            source: source.to_string(),
            version: version.to_string(),
            dir: "modules/child".into(),
            ..ManifestModule::default()
        }
    }

    #[test]
    fn test_lookup_not_cached() {
        let cache = ModuleCache::new();
        let err = cache
            .lookup("child", &ModuleCall::new("child", "./child", ""))
            .unwrap_err();
        assert!(matches!(err, TfModCacheError::NotCached { .. }));
    }

    #[test]
    fn test_lookup_unconstrained_entry_satisfies_any_request() {
        let cache = ModuleCache::new();
        cache.store("child", module("hashicorp/consul/aws", ""));

        for constraint in ["~> 1.0", ">= 99.0.0", "= 0.0.1"] {
            let call = ModuleCall::new("child", "hashicorp/consul/aws", constraint);
            assert!(cache.lookup("child", &call).is_ok(), "{constraint}");
        }
    }

    #[test]
    fn test_lookup_source_changed_regardless_of_version() {
        let cache = ModuleCache::new();
        cache.store("child", module("hashicorp/consul/aws", "1.0.0"));

        for constraint in ["", "1.0.0", "not a constraint"] {
            let call = ModuleCall::new("child", "hashicorp/vault/aws", constraint);
            let err = cache.lookup("child", &call).unwrap_err();
            assert!(matches!(err, TfModCacheError::SourceChanged { .. }), "{constraint}");
        }
    }

    #[test]
    fn test_lookup_version_mismatch_keeps_entry() {
        let cache = ModuleCache::new();
        cache.store("child", module("hashicorp/consul/aws", "1.9.0"));

        let newer = ModuleCall::new("child", "hashicorp/consul/aws", ">= 2.0.0");
        assert!(matches!(
            cache.lookup("child", &newer),
            Err(TfModCacheError::VersionMismatch { .. })
        ));

        let any = ModuleCall::new("child", "hashicorp/consul/aws", "");
        assert_eq!(cache.lookup("child", &any).unwrap().version, "1.9.0");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_store_overwrites_and_clear() {
        let cache = ModuleCache::new();
        cache.store("child", module("a/b/c", "1.0.0"));
        cache.store("child", module("a/b/c", "2.0.0"));
        assert_eq!(cache.len(), 1);

        let call = ModuleCall::new("child", "a/b/c", "~> 2.0");
        assert_eq!(cache.lookup("child", &call).unwrap().version, "2.0.0");

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_concurrent_store_and_lookup() {
        let cache = Arc::new(ModuleCache::new());
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    let key = format!("m{i}");
                    let source = format!("org/m{i}/aws");
                    cache.store(&key, module(&source, "1.0.0"));
                    let call = ModuleCall::new(key.clone(), source, ">= 1.0.0");
                    cache.lookup(&key, &call).is_ok()
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap());
        }
        assert_eq!(cache.len(), 16);
    }
}
