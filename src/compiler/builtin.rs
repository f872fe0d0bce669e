//! Built-in compiler plugins and presets, resolvable by name

use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use super::file::{HelperMode, MemberCallSite, ModuleFormat, TransformFile};
use super::{CallerDescriptor, CompileError, CompileResult, CompilerPlugin, PluginItem, PluginSpec};

/// Default package runtime helpers are imported from
pub const DEFAULT_RUNTIME_MODULE: &str = "@babel/runtime";

/// Rewrites `Object.assign(...)` into the `extends` helper
#[derive(Debug, Default)]
pub struct ObjectAssignPlugin;

impl CompilerPlugin for ObjectAssignPlugin {
    fn name(&self) -> &str {
        "transform-object-assign"
    }

    fn member_call(
        &self,
        file: &mut TransformFile,
        site: &MemberCallSite,
    ) -> CompileResult<Option<String>> {
        if site.object == "Object" && site.property == "assign" {
            return file.add_helper("extends").map(Some);
        }
        Ok(None)
    }
}

/// Rewrites ES module syntax into CommonJS
#[derive(Debug, Default)]
pub struct CommonJsModulesPlugin;

impl CompilerPlugin for CommonJsModulesPlugin {
    fn name(&self) -> &str {
        "modules-commonjs"
    }

    fn pre(&self, file: &mut TransformFile) {
        file.set_module_format(ModuleFormat::CommonJs);
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RuntimeOptions {
    module_name: Option<String>,
    #[serde(rename = "useESModules")]
    use_es_modules: Option<bool>,
}

/// Imports helpers from a runtime package instead of emitting them
#[derive(Debug, Default)]
pub struct RuntimeHelpersPlugin {
    module_name: Option<String>,
    use_es_modules: Option<bool>,
}

impl RuntimeHelpersPlugin {
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            module_name: Some(module_name.into()),
            use_es_modules: None,
        }
    }
}

impl CompilerPlugin for RuntimeHelpersPlugin {
    fn name(&self) -> &str {
        "transform-runtime"
    }

    fn pre(&self, file: &mut TransformFile) {
        let use_es_modules = self
            .use_es_modules
            .unwrap_or(file.caller().supports_static_esm);
        file.set_helper_mode(HelperMode::Runtime {
            module_name: self
                .module_name
                .clone()
                .unwrap_or_else(|| DEFAULT_RUNTIME_MODULE.to_string()),
            use_es_modules,
        });
    }
}

/// References helpers on the global helpers namespace
#[derive(Debug, Default)]
pub struct ExternalHelpersPlugin;

impl CompilerPlugin for ExternalHelpersPlugin {
    fn name(&self) -> &str {
        "external-helpers"
    }

    fn pre(&self, file: &mut TransformFile) {
        file.set_helper_mode(HelperMode::External);
    }
}

fn parse_options<T: for<'de> Deserialize<'de> + Default>(spec: &PluginSpec) -> CompileResult<T> {
    match spec.options() {
        None | Some(Value::Null) => Ok(T::default()),
        Some(options) => serde_json::from_value(options.clone())
            .map_err(|e| CompileError::InvalidOption(format!("{}: {}", spec.name(), e))),
    }
}

fn strip_prefix(name: &str) -> &str {
    name.strip_prefix("plugin-")
        .or_else(|| name.strip_prefix("preset-"))
        .unwrap_or(name)
}

/// Resolve a plugin by name
pub fn resolve_plugin(spec: &PluginSpec) -> CompileResult<Arc<dyn CompilerPlugin>> {
    let plugin: Arc<dyn CompilerPlugin> = match strip_prefix(spec.name()) {
        "transform-object-assign" => Arc::new(ObjectAssignPlugin),
        "modules-commonjs" | "transform-modules-commonjs" => Arc::new(CommonJsModulesPlugin),
        "transform-runtime" => {
            let options: RuntimeOptions = parse_options(spec)?;
            Arc::new(RuntimeHelpersPlugin {
                module_name: options.module_name,
                use_es_modules: options.use_es_modules,
            })
        }
        "external-helpers" => Arc::new(ExternalHelpersPlugin),
        other => return Err(CompileError::UnknownPlugin(other.to_string())),
    };
    Ok(plugin)
}

/// `modules` option of the `env` preset
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
enum EnvModules {
    Flag(bool),
    Named(String),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EnvOptions {
    modules: Option<EnvModules>,
}

/// Expand a preset into the plugins it stands for
pub fn expand_preset(spec: &PluginSpec, caller: &CallerDescriptor) -> CompileResult<Vec<PluginItem>> {
    match strip_prefix(spec.name()) {
        "env" => {
            let options: EnvOptions = parse_options(spec)?;
            let commonjs = match options.modules {
                Some(EnvModules::Flag(false)) => false,
                None | Some(EnvModules::Flag(true)) => !caller.supports_static_esm,
                Some(EnvModules::Named(name)) => match name.as_str() {
                    "auto" => !caller.supports_static_esm,
                    "commonjs" | "cjs" => true,
                    other => {
                        return Err(CompileError::InvalidOption(format!(
                            "env: unsupported modules value \"{}\"",
                            other
                        )))
                    }
                },
            };

            let mut plugins = vec![PluginItem::instance(ObjectAssignPlugin)];
            if commonjs {
                plugins.push(PluginItem::instance(CommonJsModulesPlugin));
            }
            Ok(plugins)
        }
        other => Err(CompileError::UnknownPlugin(other.to_string())),
    }
}

/// Turn presets and plugin names into plugin instances
///
/// Preset plugins run after the explicitly listed plugins.
pub fn resolve_all(
    plugins: &[PluginItem],
    presets: &[PluginItem],
    caller: &CallerDescriptor,
) -> CompileResult<Vec<PluginItem>> {
    let mut resolved = Vec::with_capacity(plugins.len());
    for item in plugins {
        resolved.push(match item {
            PluginItem::Named(spec) => PluginItem::Instance(resolve_plugin(spec)?),
            PluginItem::Instance(_) => item.clone(),
        });
    }
    for preset in presets {
        match preset {
            PluginItem::Named(spec) => resolved.extend(expand_preset(spec, caller)?),
            PluginItem::Instance(_) => resolved.push(preset.clone()),
        }
    }
    Ok(resolved)
}
