//! Minimal host bundler driving the plugin hooks
//!
//! Starting from the entries, every reachable module is loaded (through the
//! input plugin for virtual ids), compiled by the input plugin and linked by
//! concatenation: internal imports become plain bindings, export syntax is
//! removed, and the entries' exports are re-created for the output format.
//! The finished chunk then goes through the output plugin.
//!
//! Modules share one top-level scope, so two modules declaring the same
//! top-level name are rejected. The shared helper module is linked last and
//! its bindings are renamed away from names the user modules declare.

pub mod link;

use futures_util::future::BoxFuture;
use log::{debug, info};
use miette::Diagnostic;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::compiler::helpers::rename_identifiers;
use crate::config::{OutputFormat, OutputOptions};
use crate::error::PluginError;
use crate::inject::HELPERS_ID;
use crate::plugin::{ChunkInfo, InputPlugin, OutputPlugin, PluginContext};
use crate::resolver::{is_bare, ModuleResolver, ResolverError};
use crate::transpiler::sites::{apply_edits, quote, Edit};
use link::{ImportBinding, ImportRecord, ModuleSyntax};

/// Errors that can occur during bundling
#[derive(Error, Diagnostic, Debug)]
pub enum BundleError {
    #[error("No entry points provided")]
    #[diagnostic(code(viper_transform::bundle::no_entries))]
    NoEntries,

    #[error(transparent)]
    #[diagnostic(transparent)]
    Plugin(#[from] PluginError),

    #[error("Could not resolve '{specifier}' from {importer}")]
    #[diagnostic(code(viper_transform::bundle::unresolved))]
    UnresolvedImport {
        specifier: String,
        importer: String,
        #[source]
        source: ResolverError,
    },

    #[error("'{name}' is not exported by {module}")]
    #[diagnostic(code(viper_transform::bundle::missing_export))]
    MissingExport { module: String, name: String },

    #[error("Top-level name '{name}' is declared by both {first} and {second}")]
    #[diagnostic(
        code(viper_transform::bundle::name_conflict),
        help("Modules are concatenated into one scope; rename one of the bindings.")
    )]
    NameConflict {
        name: String,
        first: String,
        second: String,
    },

    #[error("Circular import of {module} from {importer}")]
    #[diagnostic(code(viper_transform::bundle::circular))]
    CircularImport { module: String, importer: String },

    #[error("Failed to parse {module}: {message}")]
    #[diagnostic(code(viper_transform::bundle::parse))]
    Parse { module: String, message: String },

    #[error("{module} uses {what}, which the bundler does not support")]
    #[diagnostic(code(viper_transform::bundle::unsupported))]
    UnsupportedSyntax { module: String, what: String },

    #[error("External import '{specifier}' cannot be kept in the \"{format}\" format")]
    #[diagnostic(
        code(viper_transform::bundle::external),
        help("Use the \"es\" format or make the import resolvable.")
    )]
    ExternalImport { specifier: String, format: OutputFormat },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type for bundler operations
pub type BundleResult<T> = Result<T, BundleError>;

/// Configuration for the bundler
#[derive(Debug, Clone)]
pub struct BundleConfig {
    /// Entry point(s) for the bundle
    pub entries: Vec<PathBuf>,
    /// Directory relative imports of virtual modules resolve against
    pub base_path: PathBuf,
    pub format: OutputFormat,
    /// Global name for `iife` and `umd` bundles
    pub name: Option<String>,
    /// Chunk name handed to the output plugin
    pub file_name: String,
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            base_path: PathBuf::from("."),
            format: OutputFormat::Es,
            name: None,
            file_name: "bundle.js".to_string(),
        }
    }
}

/// A finished chunk
#[derive(Debug, Clone)]
pub struct BundleOutput {
    pub code: String,
    pub map: Option<String>,
    /// Module ids in emission order
    pub modules: Vec<String>,
}

struct LinkedModule {
    code: String,
    exports: HashMap<String, String>,
}

/// A module waiting for the helper module before its imports can be linked
struct Deferred {
    source: String,
    edits: Vec<Edit>,
    helper_imports: Vec<ImportRecord>,
}

enum Target {
    Internal(String),
    External,
}

struct Graph<'a> {
    ctx: &'a dyn PluginContext,
    input: &'a InputPlugin,
    resolver: ModuleResolver,
    order: Vec<String>,
    modules: HashMap<String, LinkedModule>,
    visiting: HashSet<String>,
    owners: HashMap<String, String>,
    externals: Vec<(String, String)>,
    deferred: HashMap<String, Deferred>,
}

impl<'a> Graph<'a> {
    fn resolve(&self, specifier: &str, importer: &str) -> BundleResult<Target> {
        if let Some(id) = self.input.resolve_id(specifier) {
            return Ok(Target::Internal(id));
        }
        let referrer = if importer.starts_with('\0') {
            self.resolver.base_path().join("<virtual>")
        } else {
            PathBuf::from(importer)
        };
        match self.resolver.resolve(specifier, &referrer) {
            Ok(path) => Ok(Target::Internal(path.to_string_lossy().into_owned())),
            Err(_) if is_bare(specifier) => Ok(Target::External),
            Err(source) => Err(BundleError::UnresolvedImport {
                specifier: specifier.to_string(),
                importer: importer.to_string(),
                source,
            }),
        }
    }

    async fn load(&self, id: &str) -> BundleResult<String> {
        let code = match self.input.load(id) {
            Some(code) => code,
            None => tokio::fs::read_to_string(id).await?,
        };
        match self.input.transform(self.ctx, &code, id).await? {
            Some(output) => Ok(output.code),
            None => Ok(code),
        }
    }

    fn declare(&mut self, id: &str, names: &[String]) -> BundleResult<()> {
        for name in names {
            if let Some(first) = self.owners.get(name) {
                if first != id {
                    return Err(BundleError::NameConflict {
                        name: name.clone(),
                        first: first.clone(),
                        second: id.to_string(),
                    });
                }
            }
            self.owners.insert(name.clone(), id.to_string());
        }
        Ok(())
    }

    fn visit<'g>(&'g mut self, id: String) -> BoxFuture<'g, BundleResult<()>> {
        Box::pin(async move {
            if self.modules.contains_key(&id) {
                return Ok(());
            }
            self.visiting.insert(id.clone());
            debug!("bundling {}", id.escape_default());

            let code = self.load(&id).await?;
            let default_local = format!("_default{}", self.order.len() + self.visiting.len());
            let ModuleSyntax {
                imports,
                exports,
                mut edits,
                mut declared,
            } = link::analyze(&id, &code, &default_local)?;

            let mut helper_imports = Vec::new();
            for import in imports {
                let target = self.resolve(&import.source, &id)?;
                let dep = match target {
                    Target::External => {
                        edits.push(Edit::new(import.start, import.end, ""));
                        self.externals.push((import.source.clone(), import.text.clone()));
                        continue;
                    }
                    Target::Internal(dep) if dep == HELPERS_ID => {
                        helper_imports.push(import);
                        continue;
                    }
                    Target::Internal(dep) => dep,
                };

                if self.visiting.contains(&dep) {
                    return Err(BundleError::CircularImport {
                        module: dep,
                        importer: id.clone(),
                    });
                }
                self.visit(dep.clone()).await?;

                let lines = import_lines(&self.modules[&dep], &dep, &import, &mut declared)?;
                edits.push(Edit::new(import.start, import.end, lines));
            }

            self.declare(&id, &declared)?;
            self.visiting.remove(&id);
            let linked = if helper_imports.is_empty() {
                apply_edits(&code, edits)
            } else {
                self.deferred.insert(
                    id.clone(),
                    Deferred {
                        source: code,
                        edits,
                        helper_imports,
                    },
                );
                String::new()
            };
            self.modules.insert(
                id.clone(),
                LinkedModule {
                    code: linked,
                    exports: exports.into_iter().collect(),
                },
            );
            self.order.push(id);
            Ok(())
        })
    }

    /// Fresh names for helper bindings that user modules already declare
    fn helper_renames(&self, declared: &[String]) -> HashMap<String, String> {
        let mut taken: HashSet<String> = self.owners.keys().cloned().collect();
        taken.extend(declared.iter().cloned());

        let mut renames = HashMap::new();
        for name in declared.iter().filter(|name| self.owners.contains_key(*name)) {
            let mut i = 2;
            let mut candidate = format!("{}{}", name, i);
            while taken.contains(&candidate) {
                i += 1;
                candidate = format!("{}{}", name, i);
            }
            taken.insert(candidate.clone());
            renames.insert(name.clone(), candidate);
        }
        renames
    }

    /// Link the shared helper module and the modules importing from it
    fn link_helpers(&mut self) -> BundleResult<()> {
        if self.deferred.is_empty() {
            return Ok(());
        }

        let mut code = self.input.load(HELPERS_ID).unwrap_or_default();
        let mut syntax = link::analyze(HELPERS_ID, &code, "_helpersDefault")?;
        let renames = self.helper_renames(&syntax.declared);
        if !renames.is_empty() {
            debug!("renaming helper bindings {:?}", renames);
            code = rename_identifiers(&code, &renames);
            syntax = link::analyze(HELPERS_ID, &code, "_helpersDefault")?;
        }

        self.declare(HELPERS_ID, &syntax.declared)?;
        self.modules.insert(
            HELPERS_ID.to_string(),
            LinkedModule {
                code: apply_edits(&code, syntax.edits),
                exports: syntax.exports.into_iter().collect(),
            },
        );
        self.order.insert(0, HELPERS_ID.to_string());

        let mut deferred = std::mem::take(&mut self.deferred);
        for id in self.order.clone() {
            let Some(Deferred {
                source,
                mut edits,
                helper_imports,
            }) = deferred.remove(&id)
            else {
                continue;
            };

            let mut declared = Vec::new();
            for import in &helper_imports {
                let lines = import_lines(&self.modules[HELPERS_ID], HELPERS_ID, import, &mut declared)?;
                edits.push(Edit::new(import.start, import.end, lines));
            }
            self.declare(&id, &declared)?;
            if let Some(module) = self.modules.get_mut(&id) {
                module.code = apply_edits(&source, edits);
            }
        }
        Ok(())
    }
}

/// Replacement for an import of `dep`: one `var` per binding that needs an alias
fn import_lines(
    linked: &LinkedModule,
    dep: &str,
    import: &ImportRecord,
    declared: &mut Vec<String>,
) -> BundleResult<String> {
    let mut lines = Vec::new();
    for binding in &import.bindings {
        let value = match binding {
            ImportBinding::Named { imported, .. } => export_local(linked, dep, imported)?.to_string(),
            ImportBinding::Default { .. } => export_local(linked, dep, "default")?.to_string(),
            ImportBinding::Namespace { .. } => namespace_object(linked),
        };
        if value != binding.local() {
            declared.push(binding.local().to_string());
            lines.push(format!("var {} = {};", binding.local(), value));
        }
    }
    Ok(lines.join("\n"))
}

fn export_local<'m>(module: &'m LinkedModule, id: &str, name: &str) -> BundleResult<&'m str> {
    module
        .exports
        .get(name)
        .map(|local| local.as_str())
        .ok_or_else(|| BundleError::MissingExport {
            module: id.to_string(),
            name: name.to_string(),
        })
}

fn namespace_object(module: &LinkedModule) -> String {
    let mut entries: Vec<_> = module.exports.iter().collect();
    entries.sort();
    let fields: Vec<String> = entries
        .iter()
        .map(|(exported, local)| format!("{}: {}", quote(exported), local))
        .collect();
    format!("Object.freeze({{ {} }})", fields.join(", "))
}

fn display_id(id: &str) -> String {
    id.escape_default().to_string()
}

/// Wrap the linked modules for `format`
fn render(
    config: &BundleConfig,
    body: &str,
    exports: &[(String, String)],
    externals: &[String],
) -> String {
    let name = config.name.clone().unwrap_or_else(|| "bundle".to_string());
    let assignments = |target: &str| -> String {
        exports
            .iter()
            .map(|(exported, local)| format!("{}[{}] = {};\n", target, quote(exported), local))
            .collect()
    };
    let object: String = {
        let fields: Vec<String> = exports
            .iter()
            .map(|(exported, local)| format!("{}: {}", quote(exported), local))
            .collect();
        format!("{{ {} }}", fields.join(", "))
    };

    match config.format {
        OutputFormat::Es => {
            let mut out = String::new();
            for external in externals {
                out.push_str(external);
                out.push('\n');
            }
            out.push_str(body);
            if !exports.is_empty() {
                let specifiers: Vec<String> = exports
                    .iter()
                    .map(|(exported, local)| {
                        if exported == local {
                            local.clone()
                        } else {
                            format!("{} as {}", local, exported)
                        }
                    })
                    .collect();
                out.push_str(&format!("export {{ {} }};\n", specifiers.join(", ")));
            }
            out
        }
        OutputFormat::Cjs => format!("'use strict';\n\n{}{}", body, assignments("exports")),
        OutputFormat::Iife => format!(
            "var {} = (function () {{\n'use strict';\n\n{}return {};\n}})();\n",
            name, body, object
        ),
        OutputFormat::Amd => format!(
            "define(['exports'], (function (exports) {{ 'use strict';\n\n{}{}}}));\n",
            body,
            assignments("exports")
        ),
        OutputFormat::Umd => format!(
            "(function (global, factory) {{\n  typeof exports === 'object' && typeof module !== 'undefined' ? factory(exports) :\n  typeof define === 'function' && define.amd ? define(['exports'], factory) :\n  (global = typeof globalThis !== 'undefined' ? globalThis : global || self, factory(global.{} = {{}}));\n}})(this, (function (exports) {{ 'use strict';\n\n{}{}}}));\n",
            name,
            body,
            assignments("exports")
        ),
        OutputFormat::System => format!(
            "System.register([], (function (exports) {{\n  'use strict';\n  return {{\n    execute: (function () {{\n{}{}    }})\n  }};\n}}));\n",
            body,
            exports
                .iter()
                .map(|(exported, local)| format!("exports({}, {});\n", quote(exported), local))
                .collect::<String>()
        ),
    }
}

/// Bundle the entries of `config` into one chunk
pub async fn bundle(
    config: &BundleConfig,
    ctx: &dyn PluginContext,
    input: &InputPlugin,
    output: Option<&OutputPlugin>,
) -> BundleResult<BundleOutput> {
    if config.entries.is_empty() {
        return Err(BundleError::NoEntries);
    }

    let output_options = OutputOptions {
        format: config.format,
    };
    if let Some(plugin) = output {
        plugin.render_start(ctx, &output_options)?;
    }

    let mut graph = Graph {
        ctx,
        input,
        resolver: ModuleResolver::new(&config.base_path, &input.config().extensions),
        order: Vec::new(),
        modules: HashMap::new(),
        visiting: HashSet::new(),
        owners: HashMap::new(),
        externals: Vec::new(),
        deferred: HashMap::new(),
    };

    let mut entry_ids = Vec::with_capacity(config.entries.len());
    for entry in &config.entries {
        let id = canonical_id(entry)?;
        graph.visit(id.clone()).await?;
        entry_ids.push(id);
    }
    graph.link_helpers()?;

    let mut exports: Vec<(String, String)> = Vec::new();
    let mut exported_by: HashMap<String, String> = HashMap::new();
    for id in &entry_ids {
        let mut entry_exports: Vec<_> = graph.modules[id].exports.clone().into_iter().collect();
        entry_exports.sort();
        for (exported, local) in entry_exports {
            if let Some(first) = exported_by.insert(exported.clone(), id.clone()) {
                if &first != id {
                    return Err(BundleError::NameConflict {
                        name: exported,
                        first,
                        second: id.clone(),
                    });
                }
                continue;
            }
            exports.push((exported, local));
        }
    }

    let mut externals = Vec::new();
    let mut seen = HashSet::new();
    for (specifier, text) in &graph.externals {
        if config.format != OutputFormat::Es {
            return Err(BundleError::ExternalImport {
                specifier: specifier.clone(),
                format: config.format,
            });
        }
        if seen.insert(text.clone()) {
            externals.push(text.clone());
        }
    }

    let mut body = String::new();
    for id in &graph.order {
        body.push_str(&format!("// {}\n", display_id(id)));
        body.push_str(graph.modules[id].code.trim_end());
        body.push_str("\n\n");
    }

    let mut code = render(config, &body, &exports, &externals);
    let mut map = None;

    if let Some(plugin) = output {
        let chunk = ChunkInfo {
            file_name: config.file_name.clone(),
            is_entry: true,
            modules: graph.order.clone(),
        };
        if let Some(result) = plugin.render_chunk(&code, &chunk, &output_options).await? {
            code = result.code;
            map = result.map;
        }
    }

    info!(
        "bundled {} modules into {} ({})",
        graph.order.len(),
        config.file_name,
        config.format
    );
    Ok(BundleOutput {
        code,
        map,
        modules: graph.order,
    })
}

fn canonical_id(entry: &Path) -> BundleResult<String> {
    Ok(std::fs::canonicalize(entry)?.to_string_lossy().into_owned())
}
