//! Version matching between module calls and installed modules.

use crate::error::Result;
use crate::modules::ManifestModule;
use crate::types::{parse_version, Constraint, ModuleCall};

/// Check that an installed module satisfies the version constraint of a
/// module call.
///
/// An empty constraint on the call, or an empty version on the module, is
/// treated as unconstrained and always matches.
///
/// # Errors
///
/// - `InvalidConstraint` if the call's constraint can't be parsed
/// - `InvalidVersion` if the recorded version can't be parsed
/// - `VersionMismatch` if the version doesn't satisfy the constraint
pub fn check_version(module_call: &ModuleCall, manifest_module: &ManifestModule) -> Result<ManifestModule> {
    if !module_call.has_version() || manifest_module.version.trim().is_empty() {
        return Ok(manifest_module.clone());
    }

    let constraint = Constraint::parse(&module_call.version)?;
    let version = parse_version(&manifest_module.version)?;

    if !constraint.is_satisfied_by(&version) {
        return Err(crate::err!(VersionMismatch {
            key: manifest_module.key.clone(),
            constraint: constraint.raw,
            version: manifest_module.version.clone(),
        }));
    }

    Ok(manifest_module.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TfModCacheError;
    use test_case::test_case;

    fn installed(version: &str) -> ManifestModule {
        ManifestModule {
            key: "vpc".to_string(),
            source: "terraform-aws-modules/vpc/aws".to_string(),
            version: version.to_string(),
            ..ManifestModule::default()
        }
    }

    fn call(version: &str) -> ModuleCall {
        ModuleCall::new("vpc", "terraform-aws-modules/vpc/aws", version)
    }

    #[test_case("", "1.9.0" ; "no constraint")]
    #[test_case(">= 2.0.0", "" ; "no recorded version")]
    #[test_case("~> 5.0", "5.1.0" ; "pessimistic")]
    #[test_case(">= 1.0, < 2.0", "1.9.0" ; "range")]
    #[test_case("1.9.0", "v1.9.0" ; "exact with prefix")]
    fn test_check_version_matches(constraint: &str, version: &str) {
        let module = check_version(&call(constraint), &installed(version)).unwrap();
        assert_eq!(module, installed(version));
    }

    #[test]
    fn test_check_version_mismatch() {
        let err = check_version(&call(">= 2.0.0"), &installed("1.9.0")).unwrap_err();
        assert!(matches!(err, TfModCacheError::VersionMismatch { .. }));
        assert!(err.is_stale());
    }

    #[test]
    fn test_check_version_invalid_constraint() {
        let err = check_version(&call(">= two"), &installed("1.9.0")).unwrap_err();
        assert!(matches!(err, TfModCacheError::InvalidConstraint { .. }));
        assert!(!err.is_stale());
    }

    #[test]
    fn test_check_version_invalid_recorded_version() {
        let err = check_version(&call(">= 1.0.0"), &installed("main")).unwrap_err();
        assert!(matches!(err, TfModCacheError::InvalidVersion { .. }));
    }

    #[test]
    fn test_check_version_is_idempotent() {
        for _ in 0..3 {
            assert!(check_version(&call("~> 1.2.0"), &installed("1.2.7")).is_ok());
            assert!(check_version(&call("~> 1.2.0"), &installed("1.3.0")).is_err());
        }
    }
}
