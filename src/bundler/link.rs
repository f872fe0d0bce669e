//! Import and export records of one compiled module

use oxc_allocator::Allocator;
use oxc_ast::ast::{ExportDefaultDeclarationKind, ImportDeclarationSpecifier, Statement};
use oxc_parser::Parser;
use oxc_span::{GetSpan, SourceType};

use super::{BundleError, BundleResult};
use crate::transpiler::sites::{declared_names, Edit};

/// One binding created by an import declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportBinding {
    Named { imported: String, local: String },
    Default { local: String },
    Namespace { local: String },
}

impl ImportBinding {
    pub fn local(&self) -> &str {
        match self {
            ImportBinding::Named { local, .. }
            | ImportBinding::Default { local }
            | ImportBinding::Namespace { local } => local,
        }
    }
}

/// An import declaration and where it sits in the code
#[derive(Debug, Clone)]
pub struct ImportRecord {
    pub start: u32,
    pub end: u32,
    pub source: String,
    pub bindings: Vec<ImportBinding>,
    /// Original statement, kept verbatim for external imports
    pub text: String,
}

/// Everything the linker needs from a module, detached from its AST
#[derive(Debug, Default)]
pub struct ModuleSyntax {
    pub imports: Vec<ImportRecord>,
    /// Exported name and the top-level binding holding it
    pub exports: Vec<(String, String)>,
    /// Edits removing export syntax
    pub edits: Vec<Edit>,
    /// Top-level bindings the module declares
    pub declared: Vec<String>,
}

/// Read imports and exports of `code`
///
/// An anonymous default export is bound to `default_local`.
pub fn analyze(id: &str, code: &str, default_local: &str) -> BundleResult<ModuleSyntax> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, code, SourceType::mjs()).parse();
    if !ret.errors.is_empty() {
        let message = ret
            .errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("\n");
        return Err(BundleError::Parse {
            module: id.to_string(),
            message,
        });
    }

    let unsupported = |what: &str| BundleError::UnsupportedSyntax {
        module: id.to_string(),
        what: what.to_string(),
    };

    let mut syntax = ModuleSyntax::default();
    for statement in &ret.program.body {
        match statement {
            Statement::ImportDeclaration(decl) => {
                let bindings = decl
                    .specifiers
                    .iter()
                    .flatten()
                    .map(|specifier| match specifier {
                        ImportDeclarationSpecifier::ImportSpecifier(s) => ImportBinding::Named {
                            imported: s.imported.name().to_string(),
                            local: s.local.name.to_string(),
                        },
                        ImportDeclarationSpecifier::ImportDefaultSpecifier(s) => {
                            ImportBinding::Default {
                                local: s.local.name.to_string(),
                            }
                        }
                        ImportDeclarationSpecifier::ImportNamespaceSpecifier(s) => {
                            ImportBinding::Namespace {
                                local: s.local.name.to_string(),
                            }
                        }
                    })
                    .collect();
                syntax.imports.push(ImportRecord {
                    start: decl.span.start,
                    end: decl.span.end,
                    source: decl.source.value.to_string(),
                    bindings,
                    text: code[decl.span.start as usize..decl.span.end as usize].to_string(),
                });
            }
            Statement::ExportDefaultDeclaration(decl) => {
                let named = match &decl.declaration {
                    ExportDefaultDeclarationKind::FunctionDeclaration(f) => {
                        f.id.as_ref().map(|id| id.name.to_string())
                    }
                    ExportDefaultDeclarationKind::ClassDeclaration(c) => {
                        c.id.as_ref().map(|id| id.name.to_string())
                    }
                    _ => None,
                };
                let value_start = decl.declaration.span().start;
                match named {
                    Some(name) => {
                        syntax.edits.push(Edit::new(decl.span.start, value_start, ""));
                        syntax.declared.push(name.clone());
                        syntax.exports.push(("default".to_string(), name));
                    }
                    None => {
                        syntax.edits.push(Edit::new(
                            decl.span.start,
                            value_start,
                            format!("var {} = ", default_local),
                        ));
                        if !code[..decl.span.end as usize].trim_end().ends_with(';') {
                            syntax.edits.push(Edit::new(decl.span.end, decl.span.end, ";"));
                        }
                        syntax.declared.push(default_local.to_string());
                        syntax.exports.push(("default".to_string(), default_local.to_string()));
                    }
                }
            }
            Statement::ExportNamedDeclaration(decl) => {
                if decl.source.is_some() {
                    return Err(unsupported("re-exports from another module"));
                }
                match &decl.declaration {
                    Some(declaration) => {
                        let names = declared_names(declaration)
                            .ok_or_else(|| unsupported("exported destructuring patterns"))?;
                        syntax
                            .edits
                            .push(Edit::new(decl.span.start, declaration.span().start, ""));
                        for name in names {
                            syntax.declared.push(name.clone());
                            syntax.exports.push((name.clone(), name));
                        }
                    }
                    None => {
                        syntax.edits.push(Edit::new(decl.span.start, decl.span.end, ""));
                        for specifier in &decl.specifiers {
                            syntax.exports.push((
                                specifier.exported.name().to_string(),
                                specifier.local.name().to_string(),
                            ));
                        }
                    }
                }
            }
            Statement::ExportAllDeclaration(_) => return Err(unsupported("export * declarations")),
            other => {
                if let Some(names) = other.as_declaration().and_then(declared_names) {
                    syntax.declared.extend(names);
                }
            }
        }
    }
    Ok(syntax)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transpiler::sites::apply_edits;

    #[test]
    fn test_imports_and_exports() {
        let code = "import { a as b } from \"./a\";\nimport * as ns from \"pkg\";\nconst c = b;\nexport { c as d };\nexport function e() {}";
        let syntax = analyze("m.js", code, "_default").unwrap();

        assert_eq!(syntax.imports.len(), 2);
        assert_eq!(
            syntax.imports[0].bindings,
            vec![ImportBinding::Named {
                imported: "a".to_string(),
                local: "b".to_string()
            }]
        );
        assert_eq!(syntax.imports[1].text, "import * as ns from \"pkg\";");
        assert_eq!(
            syntax.exports,
            vec![
                ("d".to_string(), "c".to_string()),
                ("e".to_string(), "e".to_string())
            ]
        );
        assert!(syntax.declared.contains(&"c".to_string()));
        assert!(syntax.declared.contains(&"e".to_string()));

        let stripped = apply_edits(code, syntax.edits);
        assert!(!stripped.contains("export"));
        assert!(stripped.contains("function e() {}"));
    }

    #[test]
    fn test_anonymous_default_export_gets_binding() {
        let code = "export default 40 + 2;";
        let syntax = analyze("m.js", code, "_default3").unwrap();
        assert_eq!(syntax.exports, vec![("default".to_string(), "_default3".to_string())]);
        assert_eq!(apply_edits(code, syntax.edits), "var _default3 = 40 + 2;");
    }

    #[test]
    fn test_named_default_export_keeps_declaration() {
        let code = "export default class Foo {}";
        let syntax = analyze("m.js", code, "_default").unwrap();
        assert_eq!(syntax.exports, vec![("default".to_string(), "Foo".to_string())]);
        assert_eq!(apply_edits(code, syntax.edits), "class Foo {}");
    }

    #[test]
    fn test_reexports_are_rejected() {
        assert!(matches!(
            analyze("m.js", "export * from \"./x\";", "_default"),
            Err(BundleError::UnsupportedSyntax { .. })
        ));
    }
}
