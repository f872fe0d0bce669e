//! Compiler interface consumed by the plugins
//!
//! The plugins never look inside a compiler. They resolve a partial
//! configuration, run transforms (synchronously for preflight probes,
//! asynchronously for real units) and ask for the external helpers bundle.
//! Everything a compiler needs to know about helper deduplication reaches it
//! through [`CompilerPlugin`] hooks on a per-file [`TransformFile`].

pub mod builtin;
pub mod config_file;
pub mod file;
pub mod helpers;

#[cfg(test)]
pub(crate) mod testing;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

pub use file::{
    ClassSite, HelperGenerator, HelperHost, HelperMode, InjectedImport, MemberCallSite,
    ModuleFormat, TransformFile,
};
pub use helpers::HelpersOutput;

/// Errors raised by a compiler while resolving configuration or compiling
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("Failed to parse: {0}")]
    Parse(String),

    #[error("Failed to transform: {0}")]
    Transform(String),

    #[error("Unknown plugin or preset: {0}")]
    UnknownPlugin(String),

    #[error("Unknown helper: {0}")]
    UnknownHelper(String),

    #[error("Invalid configuration file {path}: {message}")]
    InvalidConfigFile { path: PathBuf, message: String },

    #[error("Invalid option: {0}")]
    InvalidOption(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type for compiler operations
pub type CompileResult<T> = Result<T, CompileError>;

/// Whether a unit is parsed as an ES module or as a classic script
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Module,
    Script,
}

/// Identity and capabilities of the tool invoking the compiler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallerDescriptor {
    pub name: String,
    #[serde(rename = "supportsStaticESM")]
    pub supports_static_esm: bool,
    pub supports_dynamic_import: bool,
    pub supports_top_level_await: bool,
}

impl Default for CallerDescriptor {
    fn default() -> Self {
        Self {
            name: "unknown".to_string(),
            supports_static_esm: false,
            supports_dynamic_import: false,
            supports_top_level_await: false,
        }
    }
}

/// A plugin reference as written in a JSON configuration:
/// `"name"` or `["name", { ...options }]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PluginSpec {
    Name(String),
    WithOptions(String, serde_json::Value),
}

impl PluginSpec {
    pub fn name(&self) -> &str {
        match self {
            PluginSpec::Name(name) | PluginSpec::WithOptions(name, _) => name,
        }
    }

    pub fn options(&self) -> Option<&serde_json::Value> {
        match self {
            PluginSpec::Name(_) => None,
            PluginSpec::WithOptions(_, options) => Some(options),
        }
    }
}

/// An entry of the plugin list: either a name still to be resolved by the
/// compiler, or a live plugin instance
#[derive(Clone, Deserialize)]
#[serde(from = "PluginSpec")]
pub enum PluginItem {
    Named(PluginSpec),
    Instance(Arc<dyn CompilerPlugin>),
}

impl PluginItem {
    pub fn instance(plugin: impl CompilerPlugin + 'static) -> Self {
        PluginItem::Instance(Arc::new(plugin))
    }

    pub fn name(&self) -> &str {
        match self {
            PluginItem::Named(spec) => spec.name(),
            PluginItem::Instance(plugin) => plugin.name(),
        }
    }
}

impl From<PluginSpec> for PluginItem {
    fn from(spec: PluginSpec) -> Self {
        PluginItem::Named(spec)
    }
}

impl From<&str> for PluginItem {
    fn from(name: &str) -> Self {
        PluginItem::Named(PluginSpec::Name(name.to_string()))
    }
}

impl fmt::Debug for PluginItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginItem::Named(spec) => f.debug_tuple("Named").field(spec).finish(),
            PluginItem::Instance(plugin) => f.debug_tuple("Instance").field(&plugin.name()).finish(),
        }
    }
}

/// A compiler plugin
///
/// `pre` runs once per file before any code is visited. The visitor hooks
/// return replacement source text for the visited site, or `None` to leave it.
pub trait CompilerPlugin: Send + Sync {
    fn name(&self) -> &str;

    fn pre(&self, _file: &mut TransformFile) {}

    fn class_declaration(
        &self,
        _file: &mut TransformFile,
        _site: &ClassSite,
    ) -> CompileResult<Option<String>> {
        Ok(None)
    }

    fn member_call(
        &self,
        _file: &mut TransformFile,
        _site: &MemberCallSite,
    ) -> CompileResult<Option<String>> {
        Ok(None)
    }
}

/// The fully resolved options of one compile invocation
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompilerOptions {
    pub filename: Option<PathBuf>,
    /// Directory where local config file discovery stops
    pub root: Option<PathBuf>,
    /// `None` means "look for a local config file"
    pub config_file: Option<bool>,
    pub source_type: Option<SourceKind>,
    #[serde(skip)]
    pub source_maps: bool,
    pub plugins: Vec<PluginItem>,
    pub presets: Vec<PluginItem>,
    pub only: Vec<String>,
    pub ignore: Vec<String>,
    pub minify: bool,
    #[serde(skip)]
    pub caller: CallerDescriptor,
}

impl CompilerOptions {
    /// Copy of these options with one more plugin appended
    pub fn with_plugin(&self, plugin: PluginItem) -> Self {
        let mut options = self.clone();
        options.plugins.push(plugin);
        options
    }

    /// Name used when reporting errors for this unit
    pub fn unit_name(&self) -> String {
        self.filename
            .as_ref()
            .map(|f| f.display().to_string())
            .unwrap_or_else(|| "<chunk>".to_string())
    }
}

/// Configuration resolved by the compiler for one file
#[derive(Debug, Clone)]
pub struct PartialConfig {
    /// Options with local config merged and all plugins resolved
    pub options: CompilerOptions,
    /// Local configuration file that contributed to `options`, if any
    pub config_file: Option<PathBuf>,
}

/// Output of a single compile
#[derive(Debug, Clone, PartialEq)]
pub struct CompileOutput {
    pub code: String,
    /// Source map as JSON
    pub map: Option<String>,
}

/// A source-to-source compiler
pub trait Compiler: Send + Sync {
    /// Resolve local configuration for the given options; `None` when the file
    /// is excluded by the compiler's own `only`/`ignore` rules
    fn load_partial_config(&self, options: &CompilerOptions) -> CompileResult<Option<PartialConfig>>;

    fn transform_sync(&self, code: &str, options: &CompilerOptions) -> CompileResult<CompileOutput>;

    fn transform<'a>(
        &'a self,
        code: &'a str,
        options: &'a CompilerOptions,
    ) -> BoxFuture<'a, CompileResult<CompileOutput>>;

    /// Render the helper definitions as a standalone unit
    fn build_external_helpers(&self, whitelist: Option<&[String]>, output: HelpersOutput) -> String;

    /// File extensions this compiler handles by default
    fn default_extensions(&self) -> Vec<String> {
        [".js", ".jsx", ".es6", ".es", ".mjs"]
            .iter()
            .map(|e| e.to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plugin_spec_from_json() {
        let items: Vec<PluginItem> =
            serde_json::from_str(r#"["modules-commonjs", ["transform-runtime", {"useESModules": true}]]"#)
                .unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name(), "modules-commonjs");
        match &items[1] {
            PluginItem::Named(spec) => {
                assert_eq!(spec.name(), "transform-runtime");
                assert_eq!(spec.options().unwrap()["useESModules"], true);
            }
            other => panic!("unexpected item {:?}", other),
        }
    }

    #[test]
    fn test_with_plugin_does_not_touch_original() {
        let options = CompilerOptions::default();
        let extended = options.with_plugin("external-helpers".into());
        assert!(options.plugins.is_empty());
        assert_eq!(extended.plugins.len(), 1);
    }

    #[test]
    fn test_unit_name_for_chunks() {
        assert_eq!(CompilerOptions::default().unit_name(), "<chunk>");
    }
}
