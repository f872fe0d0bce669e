//! Helper injection through a shared virtual module
//!
//! Instead of letting the compiler inline a copy of every helper into every
//! file, [`ImportHelpersPlugin`] hands the compiler a helper generator that
//! imports the helper from [`HELPERS_ID`]. The bundler resolves that id once,
//! so each helper ends up in the bundle a single time.

use log::trace;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use crate::compiler::{CompilerPlugin, HelperGenerator, HelperHost, TransformFile};

/// Id of the shared helper module
///
/// The leading NUL keeps user code from resolving it and tells other plugins
/// not to touch it.
pub const HELPERS_ID: &str = "\0viperTransformHelpers.js";

/// Import references generated for one file, by helper name
#[derive(Debug, Default)]
pub struct HelperInjectionCache {
    references: HashMap<String, String>,
}

impl HelperInjectionCache {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.references.get(name).map(|r| r.as_str())
    }

    pub fn insert(&mut self, name: &str, reference: String) {
        self.references.insert(name.to_string(), reference);
    }

    pub fn len(&self) -> usize {
        self.references.len()
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }
}

/// Resolves helper requests of one file to imports from the shared module
#[derive(Debug)]
pub struct HelperImporter {
    module_id: String,
    cache: Mutex<HelperInjectionCache>,
}

impl HelperImporter {
    pub fn new(module_id: impl Into<String>) -> Self {
        Self {
            module_id: module_id.into(),
            cache: Mutex::new(HelperInjectionCache::default()),
        }
    }

    /// Reference for helper `name`, importing it on first request
    ///
    /// `None` when the compiler does not ship the helper, so it falls back to
    /// its own handling.
    pub fn resolve(&self, host: &mut dyn HelperHost, name: &str) -> Option<String> {
        if !host.available_helper(name) {
            return None;
        }

        let mut cache = self.cache.lock();
        if let Some(reference) = cache.get(name) {
            return Some(reference.to_string());
        }

        let reference = host.add_named_import(name, &self.module_id);
        trace!("imported helper {} as {}", name, reference);
        cache.insert(name, reference.clone());
        Some(reference)
    }

    pub fn cached(&self) -> usize {
        self.cache.lock().len()
    }
}

impl HelperGenerator for HelperImporter {
    fn generate(&self, host: &mut dyn HelperHost, name: &str) -> Option<String> {
        self.resolve(host, name)
    }
}

/// Compiler plugin installing a fresh [`HelperImporter`] on every file
#[derive(Debug, Clone)]
pub struct ImportHelpersPlugin {
    module_id: String,
}

impl ImportHelpersPlugin {
    pub fn new() -> Self {
        Self::with_module_id(HELPERS_ID)
    }

    pub fn with_module_id(module_id: impl Into<String>) -> Self {
        Self {
            module_id: module_id.into(),
        }
    }
}

impl Default for ImportHelpersPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl CompilerPlugin for ImportHelpersPlugin {
    fn name(&self) -> &str {
        "import-helpers"
    }

    fn pre(&self, file: &mut TransformFile) {
        file.set_helper_generator(Arc::new(HelperImporter::new(self.module_id.clone())));
    }
}
