//! Scripted compiler for unit tests

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::file::TransformFile;
use super::{
    helpers, CompileError, CompileOutput, CompileResult, Compiler, CompilerOptions, HelpersOutput,
    PartialConfig, PluginItem,
};

/// Compiler whose probe output is fixed up front
pub(crate) struct ScriptedCompiler {
    /// Output of a probe compile without the forced class transform
    pub probe_output: String,
    /// Output of a probe compile with the forced class transform
    pub fallback_output: String,
    /// Helpers every real compile asks for
    pub helper_requests: Vec<String>,
    pub excluded: bool,
    pub fail_with: Option<String>,
    pub sync_calls: AtomicUsize,
    pub async_calls: AtomicUsize,
    pub last_plugins: Mutex<Vec<String>>,
}

impl ScriptedCompiler {
    pub fn new(probe_output: &str) -> Self {
        Self {
            probe_output: probe_output.to_string(),
            fallback_output: probe_output.to_string(),
            helper_requests: Vec::new(),
            excluded: false,
            fail_with: None,
            sync_calls: AtomicUsize::new(0),
            async_calls: AtomicUsize::new(0),
            last_plugins: Mutex::new(Vec::new()),
        }
    }

    pub fn inline() -> Self {
        Self::new("function _inherits(a, b) {}\nvar Foo = _inherits;\nexport default Foo;")
    }

    pub fn probe_count(&self) -> usize {
        self.sync_calls.load(Ordering::SeqCst)
    }

    fn instances(options: &CompilerOptions) -> Vec<std::sync::Arc<dyn super::CompilerPlugin>> {
        options
            .plugins
            .iter()
            .filter_map(|p| match p {
                PluginItem::Instance(plugin) => Some(plugin.clone()),
                PluginItem::Named(_) => None,
            })
            .collect()
    }
}

impl Compiler for ScriptedCompiler {
    fn load_partial_config(&self, options: &CompilerOptions) -> CompileResult<Option<PartialConfig>> {
        if self.excluded {
            return Ok(None);
        }
        Ok(Some(PartialConfig {
            options: options.clone(),
            config_file: None,
        }))
    }

    fn transform_sync(&self, _code: &str, options: &CompilerOptions) -> CompileResult<CompileOutput> {
        self.sync_calls.fetch_add(1, Ordering::SeqCst);
        let forced = options
            .plugins
            .iter()
            .any(|p| p.name() == crate::preflight::FALLBACK_CLASS_TRANSFORM);
        Ok(CompileOutput {
            code: if forced {
                self.fallback_output.clone()
            } else {
                self.probe_output.clone()
            },
            map: None,
        })
    }

    fn transform<'a>(
        &'a self,
        code: &'a str,
        options: &'a CompilerOptions,
    ) -> BoxFuture<'a, CompileResult<CompileOutput>> {
        Box::pin(async move {
            self.async_calls.fetch_add(1, Ordering::SeqCst);
            *self.last_plugins.lock() = options.plugins.iter().map(|p| p.name().to_string()).collect();
            if let Some(message) = &self.fail_with {
                return Err(CompileError::Transform(message.clone()));
            }

            let mut file = TransformFile::new(options.filename.clone(), options.caller.clone());
            file.set_code(code);
            for plugin in Self::instances(options) {
                plugin.pre(&mut file);
            }
            let mut body = code.to_string();
            for name in &self.helper_requests {
                let reference = file.add_helper(name)?;
                body.push_str(&format!("\n{}();", reference));
            }

            let mut out = String::new();
            for import in file.imports() {
                out.push_str(&import.render(file.module_format()));
                out.push('\n');
            }
            for helper in file.inline_helpers() {
                out.push_str(helper);
                out.push('\n');
            }
            out.push_str(&body);
            Ok(CompileOutput { code: out, map: None })
        })
    }

    fn build_external_helpers(&self, whitelist: Option<&[String]>, output: HelpersOutput) -> String {
        helpers::build(whitelist, output)
    }
}
