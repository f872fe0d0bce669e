//! Module resolution using oxc_resolver
//!
//! Resolves the import specifiers of bundled modules:
//! - relative and absolute paths, trying the configured extensions
//! - bare specifiers through node_modules and package.json exports
//!
//! Specifiers that cannot be resolved are reported to the caller, which
//! decides whether they stay external.

use oxc_resolver::{ResolveOptions, Resolver};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during module resolution
#[derive(Error, Debug)]
pub enum ResolverError {
    #[error("Failed to resolve module '{0}': {1}")]
    ResolutionFailed(String, String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type for module resolution operations
pub type ResolverResult<T> = Result<T, ResolverError>;

/// Whether `specifier` names a package rather than a path
pub fn is_bare(specifier: &str) -> bool {
    !(specifier.starts_with("./")
        || specifier.starts_with("../")
        || specifier == "."
        || specifier == ".."
        || Path::new(specifier).is_absolute())
}

/// ESM resolver for bundled modules
pub struct ModuleResolver {
    resolver: Resolver,
    base_path: PathBuf,
}

impl ModuleResolver {
    /// Create a resolver trying `extensions` in order
    pub fn new(base_path: impl AsRef<Path>, extensions: &[String]) -> Self {
        let mut extensions: Vec<String> = extensions.to_vec();
        if !extensions.iter().any(|e| e == ".json") {
            extensions.push(".json".to_string());
        }

        let options = ResolveOptions {
            // bundles are ES modules, so prefer the "import" condition
            condition_names: vec!["import".into(), "module".into(), "default".into()],
            extensions,
            main_fields: vec!["module".into(), "main".into()],
            exports_fields: vec![vec!["exports".into()]],
            imports_fields: vec![vec!["imports".into()]],
            ..ResolveOptions::default()
        };

        Self {
            resolver: Resolver::new(options),
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Resolve `specifier` as imported from `referrer`
    pub fn resolve(&self, specifier: &str, referrer: &Path) -> ResolverResult<PathBuf> {
        let context = referrer.parent().unwrap_or(&self.base_path);

        match self.resolver.resolve(context, specifier) {
            Ok(resolution) => Ok(resolution.path().to_path_buf()),
            Err(error) => Err(ResolverError::ResolutionFailed(
                specifier.to_string(),
                error.to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn js_extensions() -> Vec<String> {
        vec![".js".to_string(), ".mjs".to_string()]
    }

    #[test]
    fn test_bare_specifiers() {
        assert!(is_bare("react"));
        assert!(is_bare("@scope/pkg/sub"));
        assert!(!is_bare("./a"));
        assert!(!is_bare("../a"));
    }

    #[test]
    fn test_relative_resolution_tries_extensions() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("util.mjs"), "export const x = 1;").unwrap();

        let resolver = ModuleResolver::new(dir.path(), &js_extensions());
        let resolved = resolver
            .resolve("./util", &dir.path().join("index.js"))
            .unwrap();
        assert_eq!(resolved.file_name().unwrap(), "util.mjs");
    }

    #[test]
    fn test_missing_module_fails() {
        let dir = tempdir().unwrap();
        let resolver = ModuleResolver::new(dir.path(), &js_extensions());
        let err = resolver
            .resolve("./missing", &dir.path().join("index.js"))
            .unwrap_err();
        assert!(matches!(err, ResolverError::ResolutionFailed(ref s, _) if s == "./missing"));
    }
}
