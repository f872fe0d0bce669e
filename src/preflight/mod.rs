//! Preflight verification of compiler configurations
//!
//! Before the first real compile of a file, a fixed probe is compiled with the
//! file's resolved configuration. Its output tells whether the configuration
//! keeps ES module syntax and how the compiler emits helpers. Results are cached
//! per configuration filename for the lifetime of the plugin.

pub mod signatures;

use log::{debug, trace};
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::compiler::{
    ClassSite, CompileResult, Compiler, CompilerOptions, CompilerPlugin, PluginItem, TransformFile,
};
use crate::error::{PluginError, PluginResult};

/// Source compiled to observe a configuration
pub const PROBE_SOURCE: &str = "class Foo extends Bar {};\nexport default Foo;";

/// Name of the forced class transform used when classes survive the probe
pub const FALLBACK_CLASS_TRANSFORM: &str = "fallback-class-transform";

/// How a configuration emits runtime helpers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelperStrategy {
    /// Imports from a runtime helpers package
    Runtime,
    /// Full helper definitions in every file
    Inline,
    /// References to a global helpers namespace
    External,
}

/// Replaces every class declaration with a reference to the `inherits` helper
#[derive(Debug, Default)]
pub struct FallbackClassTransform;

impl CompilerPlugin for FallbackClassTransform {
    fn name(&self) -> &str {
        FALLBACK_CLASS_TRANSFORM
    }

    fn class_declaration(
        &self,
        file: &mut TransformFile,
        _site: &ClassSite,
    ) -> CompileResult<Option<String>> {
        let reference = file.add_helper("inherits")?;
        Ok(Some(format!("{};", reference)))
    }
}

/// Classification results keyed by configuration filename
#[derive(Debug, Default)]
pub struct PreflightCache {
    results: RwLock<HashMap<String, HelperStrategy>>,
}

impl PreflightCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, options: &CompilerOptions) -> Option<HelperStrategy> {
        self.results.read().get(&cache_key(options)).copied()
    }

    pub fn len(&self) -> usize {
        self.results.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Classify `options`, probing the compiler only on the first call per filename
    ///
    /// No lock is held while probing; two concurrent first calls for the same
    /// filename both probe and store the same value.
    pub fn classify(
        &self,
        compiler: &dyn Compiler,
        options: &CompilerOptions,
    ) -> PluginResult<HelperStrategy> {
        let key = cache_key(options);
        if let Some(strategy) = self.results.read().get(&key) {
            trace!("preflight cache hit for {:?}: {:?}", key, strategy);
            return Ok(*strategy);
        }

        let strategy = probe(compiler, options)?;
        debug!(
            "preflight classified {:?} as {:?} (signatures v{})",
            key,
            strategy,
            signatures::SIGNATURES_VERSION
        );
        self.results.write().insert(key, strategy);
        Ok(strategy)
    }
}

fn cache_key(options: &CompilerOptions) -> String {
    options
        .filename
        .as_ref()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Compile the probe with `options` and classify the output
pub fn probe(compiler: &dyn Compiler, options: &CompilerOptions) -> PluginResult<HelperStrategy> {
    let unit = options.unit_name();
    let mut check = compiler
        .transform_sync(PROBE_SOURCE, options)
        .map_err(|e| PluginError::compile(&unit, e))?
        .code;

    if signatures::has_class_declaration(&check) {
        let forced = options.with_plugin(PluginItem::instance(FallbackClassTransform));
        check = compiler
            .transform_sync(PROBE_SOURCE, &forced)
            .map_err(|e| PluginError::compile(&unit, e))?
            .code;
    }

    if !signatures::keeps_default_export(&check) {
        return Err(PluginError::ModuleSyntaxStripped);
    }

    signatures::match_strategy(&check).ok_or(PluginError::UnexpectedHelperStrategy)
}
