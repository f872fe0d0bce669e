//! Per-file compile state
//!
//! A [`TransformFile`] lives for exactly one compile. It owns the helper
//! bookkeeping (which helpers are declared, which imports were injected) and
//! the slot through which a plugin can take over helper emission.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::helpers::{self, EXTERNAL_HELPERS_NAMESPACE};
use super::{CallerDescriptor, CompileError, CompileResult};

/// How helpers are emitted when no generator claims them
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum HelperMode {
    /// Full helper definitions at the top of every file that needs them
    #[default]
    Inline,
    /// Bare member references on the global helpers namespace
    External,
    /// Default imports from a runtime helpers package
    Runtime { module_name: String, use_es_modules: bool },
}

/// Module system of the compiled output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModuleFormat {
    #[default]
    Esm,
    CommonJs,
}

/// An import added by the compiler or one of its plugins
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectedImport {
    Named {
        imported: String,
        local: String,
        source: String,
    },
    Default {
        local: String,
        source: String,
    },
}

impl InjectedImport {
    pub fn local(&self) -> &str {
        match self {
            InjectedImport::Named { local, .. } | InjectedImport::Default { local, .. } => local,
        }
    }

    pub fn source(&self) -> &str {
        match self {
            InjectedImport::Named { source, .. } | InjectedImport::Default { source, .. } => source,
        }
    }

    pub(crate) fn render(&self, format: ModuleFormat) -> String {
        match (self, format) {
            (InjectedImport::Named { imported, local, source }, ModuleFormat::Esm) => {
                format!("import {{ {} as {} }} from \"{}\";", imported, local, escape(source))
            }
            (InjectedImport::Default { local, source }, ModuleFormat::Esm) => {
                format!("import {} from \"{}\";", local, escape(source))
            }
            (InjectedImport::Named { imported, local, source }, ModuleFormat::CommonJs) => {
                format!("var {} = require(\"{}\")[\"{}\"];", local, escape(source), imported)
            }
            (InjectedImport::Default { local, source }, ModuleFormat::CommonJs) => {
                format!("var {} = require(\"{}\").default;", local, escape(source))
            }
        }
    }
}

/// Escape a module specifier for a double-quoted string literal
pub(crate) fn escape(source: &str) -> String {
    source
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\0', "\\0")
}

/// A class declaration found in the compiled code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassSite {
    pub name: Option<String>,
    /// Source text of the `extends` expression
    pub super_class: Option<String>,
}

/// A call of the form `object.property(...)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberCallSite {
    pub object: String,
    pub property: String,
}

/// The operations a helper generator needs from the file being compiled
pub trait HelperHost {
    /// Whether the active compiler ships helper `name`
    fn available_helper(&self, name: &str) -> bool;

    /// Inject `import { name as _local } from "source"` and return `_local`
    fn add_named_import(&mut self, name: &str, source: &str) -> String;
}

/// Takes over helper emission for one file
///
/// Returning `None` lets the compiler emit the helper its own way.
pub trait HelperGenerator: Send + Sync {
    fn generate(&self, host: &mut dyn HelperHost, name: &str) -> Option<String>;
}

/// Compile state for one file
pub struct TransformFile {
    filename: Option<PathBuf>,
    caller: CallerDescriptor,
    code: String,
    helper_mode: HelperMode,
    module_format: ModuleFormat,
    helper_generator: Option<Arc<dyn HelperGenerator>>,
    declared_helpers: HashMap<String, String>,
    inline_helpers: Vec<String>,
    imports: Vec<InjectedImport>,
    uids: HashSet<String>,
}

impl TransformFile {
    pub fn new(filename: Option<PathBuf>, caller: CallerDescriptor) -> Self {
        Self {
            filename,
            caller,
            code: String::new(),
            helper_mode: HelperMode::default(),
            module_format: ModuleFormat::default(),
            helper_generator: None,
            declared_helpers: HashMap::new(),
            inline_helpers: Vec::new(),
            imports: Vec::new(),
            uids: HashSet::new(),
        }
    }

    pub fn filename(&self) -> Option<&Path> {
        self.filename.as_deref()
    }

    pub fn caller(&self) -> &CallerDescriptor {
        &self.caller
    }

    /// Code being compiled, used to avoid clashing with existing bindings
    pub fn set_code(&mut self, code: impl Into<String>) {
        self.code = code.into();
    }

    pub fn helper_mode(&self) -> &HelperMode {
        &self.helper_mode
    }

    pub fn set_helper_mode(&mut self, mode: HelperMode) {
        self.helper_mode = mode;
    }

    pub fn module_format(&self) -> ModuleFormat {
        self.module_format
    }

    pub fn set_module_format(&mut self, format: ModuleFormat) {
        self.module_format = format;
    }

    pub fn set_helper_generator(&mut self, generator: Arc<dyn HelperGenerator>) {
        self.helper_generator = Some(generator);
    }

    pub fn imports(&self) -> &[InjectedImport] {
        &self.imports
    }

    /// Inline helper definitions in emission order
    pub fn inline_helpers(&self) -> &[String] {
        &self.inline_helpers
    }

    /// Reserve a fresh binding based on `name`: `_name`, `_name2`, ...
    pub fn generate_uid(&mut self, name: &str) -> String {
        let base = helpers::local_name(name);
        let mut candidate = base.clone();
        let mut i = 2;
        while self.uids.contains(&candidate) || contains_identifier(&self.code, &candidate) {
            candidate = format!("{}{}", base, i);
            i += 1;
        }
        self.uids.insert(candidate.clone());
        candidate
    }

    /// Reference to helper `name`, emitting it on first use
    pub fn add_helper(&mut self, name: &str) -> CompileResult<String> {
        if let Some(reference) = self.declared_helpers.get(name) {
            return Ok(reference.clone());
        }

        if let Some(generator) = self.helper_generator.clone() {
            if let Some(reference) = generator.generate(self, name) {
                return Ok(reference);
            }
        }

        if !self.available_helper(name) {
            return Err(CompileError::UnknownHelper(name.to_string()));
        }

        let reference = match self.helper_mode.clone() {
            HelperMode::External => format!("{}.{}", EXTERNAL_HELPERS_NAMESPACE, name),
            HelperMode::Runtime {
                module_name,
                use_es_modules,
            } => {
                let local = self.generate_uid(name);
                let esm = use_es_modules && self.module_format == ModuleFormat::Esm;
                let source = format!(
                    "{}/helpers/{}{}",
                    module_name,
                    if esm { "esm/" } else { "" },
                    name
                );
                self.imports.push(InjectedImport::Default {
                    local: local.clone(),
                    source,
                });
                local
            }
            HelperMode::Inline => {
                for def in helpers::with_dependencies([name]) {
                    if self.declared_helpers.contains_key(def.name) {
                        continue;
                    }
                    let local = self.generate_uid(def.name);
                    let mut renames = HashMap::new();
                    renames.insert(def.local_name(), local.clone());
                    for dep in def.dependencies {
                        if let Some(dep_local) = self.declared_helpers.get(*dep) {
                            renames.insert(helpers::local_name(dep), dep_local.clone());
                        }
                    }
                    self.inline_helpers
                        .push(helpers::rename_identifiers(def.body, &renames));
                    self.declared_helpers.insert(def.name.to_string(), local);
                }
                self.declared_helpers
                    .get(name)
                    .cloned()
                    .unwrap_or_else(|| helpers::local_name(name))
            }
        };

        self.declared_helpers
            .insert(name.to_string(), reference.clone());
        Ok(reference)
    }
}

impl HelperHost for TransformFile {
    fn available_helper(&self, name: &str) -> bool {
        helpers::is_available(name)
    }

    fn add_named_import(&mut self, name: &str, source: &str) -> String {
        let local = self.generate_uid(name);
        self.imports.push(InjectedImport::Named {
            imported: name.to_string(),
            local: local.clone(),
            source: source.to_string(),
        });
        local
    }
}

/// Whether `ident` occurs in `code` as a whole identifier
fn contains_identifier(code: &str, ident: &str) -> bool {
    let is_ident_char = |c: char| c.is_alphanumeric() || c == '_' || c == '$';
    code.match_indices(ident).any(|(start, _)| {
        let before = code[..start].chars().next_back();
        let after = code[start + ident.len()..].chars().next();
        !before.is_some_and(is_ident_char) && !after.is_some_and(is_ident_char)
    })
}
