//! Rewrite sites in generated JavaScript and text edits applied to them

use oxc_ast::ast::{
    CallExpression, Class, Declaration, Expression, ImportDeclarationSpecifier, Program, Statement,
};
use oxc_ast_visit::{walk, Visit};
use oxc_span::GetSpan;

use crate::compiler::{ClassSite, CompileError, CompileResult, MemberCallSite};

/// A place compiler plugins may rewrite
#[derive(Debug, Clone)]
pub enum Site {
    Class {
        start: u32,
        end: u32,
        site: ClassSite,
    },
    MemberCall {
        start: u32,
        end: u32,
        site: MemberCallSite,
    },
}

/// Replacement of `source[start..end]` by `text`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub start: u32,
    pub end: u32,
    pub text: String,
}

impl Edit {
    pub fn new(start: u32, end: u32, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }
}

struct SiteCollector<'s> {
    source: &'s str,
    sites: Vec<Site>,
}

impl<'s> SiteCollector<'s> {
    fn text(&self, start: u32, end: u32) -> String {
        self.source[start as usize..end as usize].to_string()
    }
}

impl<'a, 's> Visit<'a> for SiteCollector<'s> {
    fn visit_class(&mut self, class: &Class<'a>) {
        if class.is_declaration() {
            let super_class = class.super_class.as_ref().map(|e| {
                let span = e.span();
                self.text(span.start, span.end)
            });
            self.sites.push(Site::Class {
                start: class.span.start,
                end: class.span.end,
                site: ClassSite {
                    name: class.id.as_ref().map(|id| id.name.to_string()),
                    super_class,
                },
            });
        }
        walk::walk_class(self, class);
    }

    fn visit_call_expression(&mut self, call: &CallExpression<'a>) {
        if let Expression::StaticMemberExpression(member) = &call.callee {
            if let Expression::Identifier(object) = &member.object {
                self.sites.push(Site::MemberCall {
                    start: member.span.start,
                    end: member.span.end,
                    site: MemberCallSite {
                        object: object.name.to_string(),
                        property: member.property.name.to_string(),
                    },
                });
            }
        }
        walk::walk_call_expression(self, call);
    }
}

/// Class declarations and `object.property(...)` calls, in source order
pub fn collect(source: &str, program: &Program<'_>) -> Vec<Site> {
    let mut collector = SiteCollector {
        source,
        sites: Vec::new(),
    };
    collector.visit_program(program);
    collector.sites
}

pub(crate) fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Names bound by a top-level declaration; `None` for destructuring patterns
pub fn declared_names(declaration: &Declaration<'_>) -> Option<Vec<String>> {
    let names = match declaration {
        Declaration::VariableDeclaration(var) => var
            .declarations
            .iter()
            .map(|declarator| declarator.id.get_identifier_name().map(|name| name.to_string()))
            .collect::<Option<Vec<_>>>()?,
        Declaration::FunctionDeclaration(func) => func.id.iter().map(|id| id.name.to_string()).collect(),
        Declaration::ClassDeclaration(class) => class.id.iter().map(|id| id.name.to_string()).collect(),
        _ => Vec::new(),
    };
    Some(names)
}

/// Edits turning top-level ES module syntax into CommonJS
///
/// Returns whether the module exports anything.
pub fn commonjs_edits(program: &Program<'_>, edits: &mut Vec<Edit>) -> CompileResult<bool> {
    let mut has_exports = false;
    let mut namespaces = 0;

    for statement in &program.body {
        match statement {
            Statement::ImportDeclaration(decl) => {
                let source = quote(&decl.source.value);
                let mut lines = Vec::new();
                match &decl.specifiers {
                    None => lines.push(format!("require({});", source)),
                    Some(specifiers) if specifiers.is_empty() => {
                        lines.push(format!("require({});", source))
                    }
                    Some(specifiers) => {
                        for specifier in specifiers {
                            lines.push(match specifier {
                                ImportDeclarationSpecifier::ImportSpecifier(s) => format!(
                                    "var {} = require({})[{}];",
                                    s.local.name,
                                    source,
                                    quote(&s.imported.name())
                                ),
                                ImportDeclarationSpecifier::ImportDefaultSpecifier(s) => {
                                    format!("var {} = require({}).default;", s.local.name, source)
                                }
                                ImportDeclarationSpecifier::ImportNamespaceSpecifier(s) => {
                                    format!("var {} = require({});", s.local.name, source)
                                }
                            });
                        }
                    }
                }
                edits.push(Edit::new(decl.span.start, decl.span.end, lines.join("\n")));
            }
            Statement::ExportDefaultDeclaration(decl) => {
                has_exports = true;
                let value_start = decl.declaration.span().start;
                edits.push(Edit::new(decl.span.start, value_start, "exports.default = "));
            }
            Statement::ExportNamedDeclaration(decl) => {
                has_exports = true;
                if let Some(declaration) = &decl.declaration {
                    edits.push(Edit::new(decl.span.start, declaration.span().start, ""));
                    let names = declared_names(declaration).ok_or_else(|| {
                        CompileError::Transform(
                            "modules-commonjs cannot export destructured bindings".to_string(),
                        )
                    })?;
                    let assignments: Vec<String> = names
                        .iter()
                        .map(|name| format!("\nexports.{} = {};", name, name))
                        .collect();
                    edits.push(Edit::new(decl.span.end, decl.span.end, assignments.concat()));
                    continue;
                }

                let mut lines = Vec::new();
                let object = match &decl.source {
                    Some(source) => {
                        namespaces += 1;
                        let local = format!("_reexport{}", namespaces);
                        lines.push(format!("var {} = require({});", local, quote(&source.value)));
                        Some(local)
                    }
                    None => None,
                };
                for specifier in &decl.specifiers {
                    let local = specifier.local.name();
                    let value = match &object {
                        Some(object) => format!("{}[{}]", object, quote(&local)),
                        None => local.to_string(),
                    };
                    lines.push(format!("exports[{}] = {};", quote(&specifier.exported.name()), value));
                }
                edits.push(Edit::new(decl.span.start, decl.span.end, lines.join("\n")));
            }
            Statement::ExportAllDeclaration(decl) => {
                has_exports = true;
                let source = quote(&decl.source.value);
                let text = match &decl.exported {
                    Some(name) => format!("exports[{}] = require({});", quote(&name.name()), source),
                    None => format!(
                        "var _all = require({});\nfor (var _key in _all) if (_key !== \"default\") exports[_key] = _all[_key];",
                        source
                    ),
                };
                edits.push(Edit::new(decl.span.start, decl.span.end, text));
            }
            _ => {}
        }
    }
    Ok(has_exports)
}

/// Apply `edits` to `source`; an edit starting inside an earlier one is dropped
pub fn apply_edits(source: &str, mut edits: Vec<Edit>) -> String {
    edits.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));

    let mut out = String::with_capacity(source.len());
    let mut cursor = 0usize;
    for edit in edits {
        let (start, end) = (edit.start as usize, edit.end as usize);
        if start < cursor {
            continue;
        }
        out.push_str(&source[cursor..start]);
        out.push_str(&edit.text);
        cursor = end;
    }
    out.push_str(&source[cursor..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxc_allocator::Allocator;
    use oxc_parser::Parser;
    use oxc_span::SourceType;

    fn with_program<T>(source: &str, f: impl FnOnce(&Program<'_>) -> T) -> T {
        let allocator = Allocator::default();
        let ret = Parser::new(&allocator, source, SourceType::mjs()).parse();
        assert!(ret.errors.is_empty());
        f(&ret.program)
    }

    #[test]
    fn test_collects_classes_and_member_calls_in_order() {
        let source = "class A extends B {}\nconst o = Object.assign({}, x);\nvar C = class {};";
        let sites = with_program(source, |p| collect(source, p));
        assert_eq!(sites.len(), 2);
        match &sites[0] {
            Site::Class { site, .. } => {
                assert_eq!(site.name.as_deref(), Some("A"));
                assert_eq!(site.super_class.as_deref(), Some("B"));
            }
            other => panic!("unexpected site {:?}", other),
        }
        match &sites[1] {
            Site::MemberCall { start, end, site } => {
                assert_eq!(&source[*start as usize..*end as usize], "Object.assign");
                assert_eq!(site.property, "assign");
            }
            other => panic!("unexpected site {:?}", other),
        }
    }

    #[test]
    fn test_nested_edits_are_dropped() {
        let source = "abcdef";
        let out = apply_edits(
            source,
            vec![Edit::new(2, 3, "X"), Edit::new(1, 4, "[]"), Edit::new(6, 6, "!")],
        );
        assert_eq!(out, "a[]ef!");
    }

    #[test]
    fn test_commonjs_rewrite() {
        let source = "import a, { b as c } from \"./m\";\nexport const d = 1;\nexport default a;\nexport { c };";
        let (out, has_exports) = with_program(source, |p| {
            let mut edits = Vec::new();
            let has_exports = commonjs_edits(p, &mut edits).unwrap();
            (apply_edits(source, edits), has_exports)
        });
        assert!(has_exports);
        assert!(out.contains("var a = require(\"./m\").default;"));
        assert!(out.contains("var c = require(\"./m\")[\"b\"];"));
        assert!(out.contains("const d = 1;\nexports.d = d;"));
        assert!(out.contains("exports.default = a;"));
        assert!(out.contains("exports[\"c\"] = c;"));
        assert!(!out.contains("export "));
        assert!(!out.contains("import "));
    }
}
