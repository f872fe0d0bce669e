//! Plugin compiling individual modules

use log::debug;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

use super::hooks::{apply_options_hook, PluginOverrides};
use super::transform::transform_code;
use super::{PluginContext, TransformOutput, PLUGIN_NAME};
use crate::compiler::{Compiler, CompilerOptions, HelpersOutput, PluginItem};
use crate::config::{normalize_input, InputConfig, ModuleFilter, PluginOptions};
use crate::error::{PluginError, PluginResult};
use crate::inject::{ImportHelpersPlugin, HELPERS_ID};
use crate::preflight::{HelperStrategy, PreflightCache};
use crate::warn::WarningSet;

/// Warning for configurations still using the external helpers plugin
pub const EXTERNAL_HELPERS_DEPRECATED: &str = "Using \"external-helpers\" plugin with viper-transform is deprecated, \
     as it now automatically deduplicates your helpers.";

/// Input plugin: compiles modules as the bundler loads them
pub struct InputPlugin {
    compiler: Arc<dyn Compiler>,
    overrides: Arc<PluginOverrides>,
    custom_options: Option<Value>,
    config: InputConfig,
    filter: ModuleFilter,
    preflight: PreflightCache,
    warnings: Arc<WarningSet>,
}

impl InputPlugin {
    pub fn new(
        compiler: Arc<dyn Compiler>,
        options: PluginOptions,
        overrides: Arc<PluginOverrides>,
        warnings: Arc<WarningSet>,
    ) -> PluginResult<Self> {
        let (custom_options, options) = apply_options_hook(options, &overrides)?;
        let config = normalize_input(&options, compiler.default_extensions());
        let filter = ModuleFilter::new(&config.extensions, &config.include, &config.exclude)?;

        Ok(Self {
            compiler,
            overrides,
            custom_options,
            config,
            filter,
            preflight: PreflightCache::new(),
            warnings,
        })
    }

    pub fn name(&self) -> &'static str {
        PLUGIN_NAME
    }

    pub fn config(&self) -> &InputConfig {
        &self.config
    }

    pub fn preflight(&self) -> &PreflightCache {
        &self.preflight
    }

    /// Claims the shared helper module id
    pub fn resolve_id(&self, id: &str) -> Option<String> {
        (id == HELPERS_ID).then(|| id.to_string())
    }

    /// Contents of the shared helper module
    pub fn load(&self, id: &str) -> Option<String> {
        if id != HELPERS_ID {
            return None;
        }
        let whitelist = self.config.external_helpers_whitelist.as_deref();
        Some(self.compiler.build_external_helpers(whitelist, HelpersOutput::Module))
    }

    /// Classify the configuration `id` would be compiled with
    ///
    /// `None` when the compiler's configuration excludes the file.
    pub fn check(&self, id: &str) -> PluginResult<Option<HelperStrategy>> {
        let mut options = self.config.compiler.clone();
        options.filename = Some(PathBuf::from(id));
        let Some(config) = self
            .compiler
            .load_partial_config(&options)
            .map_err(|e| PluginError::compile(id, e))?
        else {
            return Ok(None);
        };
        self.preflight.classify(&*self.compiler, &config.options).map(Some)
    }

    /// Compile one module; `None` when the module is not ours to compile
    pub async fn transform(
        &self,
        ctx: &dyn PluginContext,
        code: &str,
        id: &str,
    ) -> PluginResult<Option<TransformOutput>> {
        if id == HELPERS_ID || !self.filter.matches(id) {
            return Ok(None);
        }

        let mut options = self.config.compiler.clone();
        options.filename = Some(PathBuf::from(id));

        let finalize = |transform_options: CompilerOptions| self.finalize(ctx, transform_options);
        transform_code(
            &*self.compiler,
            id,
            code,
            options,
            &self.overrides,
            self.custom_options.as_ref(),
            Some(&finalize),
        )
        .await
    }

    /// Verify the configuration and install helper deduplication
    fn finalize(
        &self,
        ctx: &dyn PluginContext,
        options: CompilerOptions,
    ) -> PluginResult<CompilerOptions> {
        let helpers = self.preflight.classify(&*self.compiler, &options)?;

        match helpers {
            HelperStrategy::External if !self.config.external_helpers => {
                self.warnings.warn_once(ctx, EXTERNAL_HELPERS_DEPRECATED);
            }
            HelperStrategy::Runtime if !self.config.runtime_helpers => {
                return Err(PluginError::RuntimeHelpersNotEnabled);
            }
            _ => {}
        }

        if helpers != HelperStrategy::Runtime && !self.config.external_helpers {
            debug!("deduplicating helpers of {}", options.unit_name());
            return Ok(options.with_plugin(PluginItem::instance(ImportHelpersPlugin::new())));
        }
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::testing::ScriptedCompiler;
    use crate::plugin::RecordingContext;

    fn plugin(compiler: Arc<ScriptedCompiler>, options: PluginOptions) -> InputPlugin {
        InputPlugin::new(
            compiler,
            options,
            Arc::new(PluginOverrides::new()),
            Arc::new(WarningSet::new()),
        )
        .unwrap()
    }

    #[test]
    fn test_helper_module_resolution() {
        let p = plugin(Arc::new(ScriptedCompiler::inline()), PluginOptions::default());
        assert_eq!(p.resolve_id(HELPERS_ID).as_deref(), Some(HELPERS_ID));
        assert!(p.resolve_id("./a.js").is_none());
        assert!(p.load("./a.js").is_none());
        assert!(p.load(HELPERS_ID).unwrap().contains("function _extends("));
    }

    #[test]
    fn test_whitelist_limits_helper_module() {
        let options = PluginOptions {
            external_helpers_whitelist: Some(vec!["classCallCheck".to_string()]),
            ..Default::default()
        };
        let p = plugin(Arc::new(ScriptedCompiler::inline()), options);
        let code = p.load(HELPERS_ID).unwrap();
        assert!(code.contains("_classCallCheck as classCallCheck"));
        assert!(!code.contains("_extends"));
    }

    #[test]
    fn test_check_classifies_without_compiling() {
        let compiler = Arc::new(ScriptedCompiler::inline());
        let p = plugin(compiler.clone(), PluginOptions::default());

        assert_eq!(p.check("a.js").unwrap(), Some(HelperStrategy::Inline));
        assert_eq!(p.check("a.js").unwrap(), Some(HelperStrategy::Inline));
        assert_eq!(compiler.probe_count(), 1);
        assert_eq!(compiler.async_calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_filtered_ids_are_skipped() {
        let compiler = Arc::new(ScriptedCompiler::inline());
        let p = plugin(compiler.clone(), PluginOptions::default());
        let ctx = RecordingContext::new();

        assert!(p.transform(&ctx, "x", "style.css").await.unwrap().is_none());
        assert!(p.transform(&ctx, "x", HELPERS_ID).await.unwrap().is_none());
        assert_eq!(compiler.probe_count(), 0);
    }

    #[tokio::test]
    async fn test_inline_strategy_installs_import_helpers() {
        let mut compiler = ScriptedCompiler::inline();
        compiler.helper_requests = vec!["extends".to_string(), "extends".to_string()];
        let compiler = Arc::new(compiler);
        let p = plugin(compiler.clone(), PluginOptions::default());
        let ctx = RecordingContext::new();

        let out = p.transform(&ctx, "run();", "a.js").await.unwrap().unwrap();
        assert!(compiler.last_plugins.lock().contains(&"import-helpers".to_string()));
        assert_eq!(out.code.matches("import { extends as _extends }").count(), 1);
        assert!(!out.code.contains("function _extends"));
    }

    #[tokio::test]
    async fn test_external_strategy_warns_once_and_still_deduplicates() {
        let compiler = Arc::new(ScriptedCompiler::new("babelHelpers.inherits;\nexport default Foo;"));
        let p = plugin(compiler.clone(), PluginOptions::default());
        let ctx = RecordingContext::new();

        for id in ["a.js", "b.js", "c.js"] {
            p.transform(&ctx, "x", id).await.unwrap();
        }
        assert_eq!(ctx.warnings(), vec![EXTERNAL_HELPERS_DEPRECATED.to_string()]);
        assert!(compiler.last_plugins.lock().contains(&"import-helpers".to_string()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_transforms_share_one_classification_per_file() {
        let compiler = Arc::new(ScriptedCompiler::new("babelHelpers.inherits;\nexport default Foo;"));
        let p = Arc::new(plugin(compiler.clone(), PluginOptions::default()));
        let ctx = Arc::new(RecordingContext::new());

        let tasks = (0..32).map(|i| {
            let p = p.clone();
            let ctx = ctx.clone();
            tokio::spawn(async move {
                let id = format!("src/file{}.js", i % 4);
                p.transform(&*ctx, "x", &id).await
            })
        });
        for result in futures_util::future::join_all(tasks).await {
            assert!(result.unwrap().unwrap().is_some());
        }

        assert_eq!(p.preflight().len(), 4);
        for i in 0..4 {
            let id = format!("src/file{}.js", i);
            assert_eq!(p.check(&id).unwrap(), Some(HelperStrategy::External));
        }
        let probes = compiler.probe_count();
        assert!((4..=32).contains(&probes), "unexpected probe count {}", probes);
        assert_eq!(ctx.warnings(), vec![EXTERNAL_HELPERS_DEPRECATED.to_string()]);
        assert_eq!(compiler.async_calls.load(std::sync::atomic::Ordering::SeqCst), 32);
    }

    #[tokio::test]
    async fn test_external_helpers_option_disables_injection_and_warning() {
        let compiler = Arc::new(ScriptedCompiler::new("babelHelpers.inherits;\nexport default Foo;"));
        let options = PluginOptions {
            external_helpers: true,
            ..Default::default()
        };
        let p = plugin(compiler.clone(), options);
        let ctx = RecordingContext::new();

        p.transform(&ctx, "x", "a.js").await.unwrap();
        assert!(ctx.warnings().is_empty());
        assert!(compiler.last_plugins.lock().is_empty());
    }

    #[tokio::test]
    async fn test_runtime_strategy_requires_opt_in() {
        let probe = "import _inherits from \"@babel/runtime/helpers/esm/inherits\";\nexport default Foo;";
        let compiler = Arc::new(ScriptedCompiler::new(probe));
        let ctx = RecordingContext::new();

        let p = plugin(compiler.clone(), PluginOptions::default());
        let err = p.transform(&ctx, "x", "a.js").await.unwrap_err();
        assert!(matches!(err, PluginError::RuntimeHelpersNotEnabled));
        assert_eq!(compiler.async_calls.load(std::sync::atomic::Ordering::SeqCst), 0);

        let options = PluginOptions {
            runtime_helpers: true,
            ..Default::default()
        };
        let p = plugin(compiler.clone(), options);
        p.transform(&ctx, "x", "a.js").await.unwrap();
        assert!(compiler.last_plugins.lock().is_empty());
    }
}
