//! Reference compiler built on OXC
//!
//! Compiling runs in two passes:
//! - OXC parses the source, strips TypeScript and JSX, and generates plain
//!   JavaScript (with a source map when requested)
//! - the generated code is parsed again so that compiler plugins can rewrite
//!   class declarations and member calls, request helpers, and switch the
//!   module format
//!
//! Injected imports and inline helper definitions are prepended last.

pub mod sites;

use futures_util::future::BoxFuture;
use log::{debug, trace};
use oxc_allocator::Allocator;
use oxc_codegen::{Codegen, CodegenOptions};
use oxc_parser::Parser;
use oxc_semantic::SemanticBuilder;
use oxc_span::SourceType;
use oxc_transformer::{JsxOptions, JsxRuntime, TransformOptions, Transformer};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::compiler::{
    builtin, config_file, helpers, CompileError, CompileOutput, CompileResult, Compiler,
    CompilerOptions, CompilerPlugin, HelpersOutput, ModuleFormat, PartialConfig, PluginItem,
    SourceKind, TransformFile,
};
use sites::{Edit, Site};

/// JSX runtime mode
#[derive(Debug, Clone, Default)]
pub enum JsxRuntimeMode {
    /// Classic mode: `React.createElement` calls
    Classic,
    /// Automatic mode: automatic JSX runtime (React 17+)
    #[default]
    Automatic,
}

/// JSX settings of the first pass
#[derive(Debug, Clone, Default)]
pub struct OxcCompilerConfig {
    pub jsx_runtime: JsxRuntimeMode,
    /// Pragma for classic runtime (e.g., "React.createElement" or "h")
    pub jsx_pragma: Option<String>,
    /// Fragment pragma for classic runtime (e.g., "React.Fragment")
    pub jsx_pragma_frag: Option<String>,
    /// Import source for automatic runtime (e.g., "react" or "preact")
    pub jsx_import_source: Option<String>,
}

/// Compiler backed by the OXC toolchain
#[derive(Debug, Default)]
pub struct OxcCompiler {
    config: OxcCompilerConfig,
}

fn errors_to_string<E: std::fmt::Display>(errors: &[E]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

fn source_type_for(filename: Option<&Path>, kind: Option<SourceKind>) -> SourceType {
    let base = filename
        .and_then(|f| SourceType::from_path(f).ok())
        .unwrap_or_else(SourceType::mjs);
    match kind {
        Some(SourceKind::Module) => base.with_module(true),
        Some(SourceKind::Script) => base.with_module(false),
        None => base,
    }
}

/// Move every mapping down by `lines` generated lines
fn shift_source_map(map: String, lines: usize) -> CompileResult<String> {
    if lines == 0 {
        return Ok(map);
    }
    let mut value: Value =
        serde_json::from_str(&map).map_err(|e| CompileError::Transform(e.to_string()))?;
    if let Some(Value::String(mappings)) = value.get_mut("mappings") {
        *mappings = format!("{}{}", ";".repeat(lines), mappings);
    }
    Ok(value.to_string())
}

fn instances(options: &CompilerOptions) -> CompileResult<Vec<Arc<dyn CompilerPlugin>>> {
    let resolved = builtin::resolve_all(&options.plugins, &options.presets, &options.caller)?;
    Ok(resolved
        .into_iter()
        .filter_map(|item| match item {
            PluginItem::Instance(plugin) => Some(plugin),
            PluginItem::Named(_) => None,
        })
        .collect())
}

impl OxcCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: OxcCompilerConfig) -> Self {
        Self { config }
    }

    fn build_jsx_options(&self) -> JsxOptions {
        let mut jsx_options = JsxOptions::default();
        jsx_options.jsx_plugin = true;
        jsx_options.runtime = match self.config.jsx_runtime {
            JsxRuntimeMode::Classic => JsxRuntime::Classic,
            JsxRuntimeMode::Automatic => JsxRuntime::Automatic,
        };
        if let Some(ref pragma) = self.config.jsx_pragma {
            jsx_options.pragma = Some(pragma.clone().into());
        }
        if let Some(ref pragma_frag) = self.config.jsx_pragma_frag {
            jsx_options.pragma_frag = Some(pragma_frag.clone().into());
        }
        if let Some(ref import_source) = self.config.jsx_import_source {
            jsx_options.import_source = Some(import_source.clone().into());
        }
        jsx_options
    }

    /// First pass: plain JavaScript plus an optional source map
    fn strip(&self, code: &str, options: &CompilerOptions) -> CompileResult<(String, Option<String>)> {
        let allocator = Allocator::default();
        let path = options
            .filename
            .clone()
            .unwrap_or_else(|| PathBuf::from("<chunk>.js"));
        let source_type = source_type_for(options.filename.as_deref(), options.source_type);

        let parser_return = Parser::new(&allocator, code, source_type).parse();
        if !parser_return.errors.is_empty() {
            return Err(CompileError::Parse(errors_to_string(&parser_return.errors)));
        }
        let mut program = parser_return.program;

        let semantic_ret = SemanticBuilder::new().build(&program);
        for error in &semantic_ret.errors {
            debug!("{}: {}", path.display(), error);
        }
        let scoping = semantic_ret.semantic.into_scoping();

        let mut transform_options = TransformOptions::default();
        transform_options.jsx = self.build_jsx_options();
        let transformer_return = Transformer::new(&allocator, &path, &transform_options)
            .build_with_scoping(scoping, &mut program);
        if !transformer_return.errors.is_empty() {
            return Err(CompileError::Transform(errors_to_string(&transformer_return.errors)));
        }

        let codegen_options = CodegenOptions {
            minify: options.minify,
            source_map_path: options.source_maps.then(|| path.clone()),
            ..Default::default()
        };
        let codegen_return = Codegen::new().with_options(codegen_options).build(&program);
        Ok((
            codegen_return.code,
            codegen_return.map.map(|map| map.to_json_string()),
        ))
    }

    /// Second pass over the generated JavaScript
    fn rewrite(
        &self,
        file: &mut TransformFile,
        plugins: &[Arc<dyn CompilerPlugin>],
        code: &str,
        module: bool,
    ) -> CompileResult<(String, bool)> {
        let allocator = Allocator::default();
        let source_type = SourceType::mjs().with_module(module);
        let parser_return = Parser::new(&allocator, code, source_type).parse();
        if !parser_return.errors.is_empty() {
            return Err(CompileError::Parse(errors_to_string(&parser_return.errors)));
        }
        let program = parser_return.program;

        let mut edits = Vec::new();
        for site in sites::collect(code, &program) {
            match site {
                Site::Class { start, end, site } => {
                    for plugin in plugins {
                        if let Some(text) = plugin.class_declaration(file, &site)? {
                            trace!("{} rewrote class {:?}", plugin.name(), site.name);
                            edits.push(Edit::new(start, end, text));
                            break;
                        }
                    }
                }
                Site::MemberCall { start, end, site } => {
                    for plugin in plugins {
                        if let Some(text) = plugin.member_call(file, &site)? {
                            edits.push(Edit::new(start, end, text));
                            break;
                        }
                    }
                }
            }
        }

        let has_exports = match file.module_format() {
            ModuleFormat::CommonJs => sites::commonjs_edits(&program, &mut edits)?,
            ModuleFormat::Esm => false,
        };
        Ok((sites::apply_edits(code, edits), has_exports))
    }

    fn compile(&self, code: &str, options: &CompilerOptions) -> CompileResult<CompileOutput> {
        let plugins = instances(options)?;
        let mut file = TransformFile::new(options.filename.clone(), options.caller.clone());
        file.set_code(code);
        for plugin in &plugins {
            plugin.pre(&mut file);
        }

        let (generated, map) = self.strip(code, options)?;
        let module = options.source_type != Some(SourceKind::Script);
        let (body, has_exports) = self.rewrite(&mut file, &plugins, &generated, module)?;

        let mut preamble = String::new();
        if file.module_format() == ModuleFormat::CommonJs {
            preamble.push_str("\"use strict\";\n");
            if has_exports {
                preamble.push_str("Object.defineProperty(exports, \"__esModule\", { value: true });\n");
            }
        }
        for import in file.imports() {
            preamble.push_str(&import.render(file.module_format()));
            preamble.push('\n');
        }
        for helper in file.inline_helpers() {
            preamble.push_str(helper);
            preamble.push('\n');
        }

        let map = match map {
            Some(map) => Some(shift_source_map(map, preamble.matches('\n').count())?),
            None => None,
        };
        Ok(CompileOutput {
            code: preamble + &body,
            map,
        })
    }
}

impl Compiler for OxcCompiler {
    fn load_partial_config(&self, options: &CompilerOptions) -> CompileResult<Option<PartialConfig>> {
        let mut resolved = options.clone();
        let mut found = None;

        if options.config_file != Some(false) {
            if let Some(filename) = &options.filename {
                if let Some(path) = config_file::find_config_file(filename, options.root.as_deref()) {
                    debug!("{} uses {}", filename.display(), path.display());
                    let local = config_file::LocalConfig::from_file(&path)?;
                    resolved = config_file::merge(local, &resolved);
                    found = Some(path);
                }
            }
        }

        if let Some(filename) = &resolved.filename {
            if config_file::is_excluded(filename, &resolved.only, &resolved.ignore)? {
                return Ok(None);
            }
        }

        resolved.plugins = builtin::resolve_all(&resolved.plugins, &resolved.presets, &resolved.caller)?;
        resolved.presets.clear();
        Ok(Some(PartialConfig {
            options: resolved,
            config_file: found,
        }))
    }

    fn transform_sync(&self, code: &str, options: &CompilerOptions) -> CompileResult<CompileOutput> {
        self.compile(code, options)
    }

    fn transform<'a>(
        &'a self,
        code: &'a str,
        options: &'a CompilerOptions,
    ) -> BoxFuture<'a, CompileResult<CompileOutput>> {
        Box::pin(async move { self.compile(code, options) })
    }

    fn build_external_helpers(&self, whitelist: Option<&[String]>, output: HelpersOutput) -> String {
        helpers::build(whitelist, output)
    }

    fn default_extensions(&self) -> Vec<String> {
        [".js", ".jsx", ".es6", ".es", ".mjs", ".ts", ".tsx"]
            .iter()
            .map(|e| e.to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::builtin::RuntimeHelpersPlugin;
    use crate::compiler::CallerDescriptor;
    use crate::preflight::{HelperStrategy, PreflightCache};
    use crate::PluginError;
    use serde_json::json;

    fn options(plugins: Vec<PluginItem>, presets: Vec<PluginItem>) -> CompilerOptions {
        CompilerOptions {
            filename: Some(PathBuf::from("input.js")),
            config_file: Some(false),
            plugins,
            presets,
            caller: CallerDescriptor {
                name: "test".to_string(),
                supports_static_esm: true,
                supports_dynamic_import: true,
                supports_top_level_await: true,
            },
            ..Default::default()
        }
    }

    fn env(modules: serde_json::Value) -> PluginItem {
        serde_json::from_value(json!(["env", { "modules": modules }])).unwrap()
    }

    #[test]
    fn test_typescript_is_stripped() {
        let compiler = OxcCompiler::new();
        let mut opts = options(vec![], vec![]);
        opts.filename = Some(PathBuf::from("input.ts"));
        let out = compiler
            .transform_sync("const message: string = \"hi\";\ninterface A { b: number }", &opts)
            .unwrap();
        assert!(!out.code.contains(": string"));
        assert!(!out.code.contains("interface"));
        assert!(out.code.contains("hi"));
    }

    #[test]
    fn test_jsx_classic_mode() {
        let compiler = OxcCompiler::with_config(OxcCompilerConfig {
            jsx_runtime: JsxRuntimeMode::Classic,
            jsx_pragma: Some("h".to_string()),
            jsx_pragma_frag: Some("Fragment".to_string()),
            ..Default::default()
        });
        let mut opts = options(vec![], vec![]);
        opts.filename = Some(PathBuf::from("input.jsx"));
        let out = compiler.transform_sync("const el = <div>Hello</div>;", &opts).unwrap();
        assert!(out.code.contains("h("));
    }

    #[test]
    fn test_object_assign_uses_inline_helper() {
        let compiler = OxcCompiler::new();
        let opts = options(vec!["transform-object-assign".into()], vec![]);
        let out = compiler
            .transform_sync("export const a = Object.assign({}, b);\nexport const c = Object.assign({}, d);", &opts)
            .unwrap();
        assert_eq!(out.code.matches("function _extends(").count(), 1);
        assert_eq!(out.code.matches("_extends({}").count(), 2);
        assert!(!out.code.contains("Object.assign({}"));
    }

    #[test]
    fn test_inline_helper_does_not_shadow_user_function() {
        let compiler = OxcCompiler::new();
        let opts = options(vec!["transform-object-assign".into()], vec![]);
        let out = compiler
            .transform_sync(
                "function _extends() { return 1; }\nexport const a = Object.assign({}, b);\nexport { _extends };",
                &opts,
            )
            .unwrap();
        assert_eq!(out.code.matches("function _extends(").count(), 1);
        assert_eq!(out.code.matches("function _extends2(").count(), 1);
        assert!(out.code.contains("_extends2({}, b)"));
    }

    #[test]
    fn test_env_commonjs_rewrites_modules() {
        let compiler = OxcCompiler::new();
        let opts = options(vec![], vec![env(json!("commonjs"))]);
        let config = compiler.load_partial_config(&opts).unwrap().unwrap();
        let out = compiler
            .transform_sync("import a from \"./a\";\nexport default a;", &config.options)
            .unwrap();
        assert!(out.code.starts_with("\"use strict\";"));
        assert!(out.code.contains("__esModule"));
        assert!(out.code.contains("exports.default = a"));
        assert!(out.code.contains("require(\"./a\")"));
    }

    #[test]
    fn test_probe_classification_per_configuration() {
        let compiler = OxcCompiler::new();
        let classify = |opts: CompilerOptions| {
            let config = compiler.load_partial_config(&opts).unwrap().unwrap();
            PreflightCache::new().classify(&compiler, &config.options)
        };

        assert_eq!(
            classify(options(vec![], vec![env(json!(false))])).unwrap(),
            HelperStrategy::Inline
        );
        assert_eq!(
            classify(options(vec!["external-helpers".into()], vec![])).unwrap(),
            HelperStrategy::External
        );
        assert_eq!(
            classify(options(vec!["transform-runtime".into()], vec![])).unwrap(),
            HelperStrategy::Runtime
        );
        assert!(matches!(
            classify(options(vec![], vec![env(json!("commonjs"))])),
            Err(PluginError::ModuleSyntaxStripped)
        ));
    }

    #[test]
    fn test_runtime_helpers_import_from_package() {
        let compiler = OxcCompiler::new();
        let opts = options(
            vec![
                PluginItem::instance(RuntimeHelpersPlugin::new("my-runtime")),
                "transform-object-assign".into(),
            ],
            vec![],
        );
        let out = compiler.transform_sync("var x = Object.assign({}, y);", &opts).unwrap();
        assert!(out
            .code
            .contains("import _extends from \"my-runtime/helpers/esm/extends\";"));
    }

    #[test]
    fn test_only_and_ignore_exclude_files() {
        let compiler = OxcCompiler::new();
        let mut opts = options(vec![], vec![]);
        opts.ignore = vec!["input\\.js$".to_string()];
        assert!(compiler.load_partial_config(&opts).unwrap().is_none());

        let mut opts = options(vec![], vec![]);
        opts.only = vec!["^src/".to_string()];
        assert!(compiler.load_partial_config(&opts).unwrap().is_none());
    }

    #[test]
    fn test_unknown_plugin_fails_config() {
        let compiler = OxcCompiler::new();
        let opts = options(vec!["transform-nonexistent".into()], vec![]);
        assert!(matches!(
            compiler.load_partial_config(&opts),
            Err(CompileError::UnknownPlugin(_))
        ));
    }

    #[test]
    fn test_source_map_is_shifted_past_preamble() {
        let compiler = OxcCompiler::new();
        let mut opts = options(vec!["transform-object-assign".into()], vec![]);
        opts.source_maps = true;
        let out = compiler.transform_sync("var x = Object.assign({}, y);", &opts).unwrap();
        let map: Value = serde_json::from_str(out.map.as_deref().unwrap()).unwrap();
        let preamble_lines = out.code.split("var x").next().unwrap().matches('\n').count();
        let mappings = map["mappings"].as_str().unwrap();
        assert!(mappings.starts_with(&";".repeat(preamble_lines)));
    }

    #[test]
    fn test_parse_error() {
        let compiler = OxcCompiler::new();
        assert!(matches!(
            compiler.transform_sync("let = ;", &options(vec![], vec![])),
            Err(CompileError::Parse(_))
        ));
    }
}
