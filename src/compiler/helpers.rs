//! Runtime helper registry
//!
//! Every helper is a standalone function declaration named `_<name>`. Helpers
//! may call other helpers by their `_<name>` binding; those are listed in
//! `dependencies` and always emitted first.

use serde::Deserialize;
use std::collections::{HashMap, HashSet};

/// Global namespace referenced by files compiled in external-helpers mode
pub const EXTERNAL_HELPERS_NAMESPACE: &str = "babelHelpers";

/// A helper definition
#[derive(Debug)]
pub struct HelperDef {
    pub name: &'static str,
    pub dependencies: &'static [&'static str],
    pub body: &'static str,
}

impl HelperDef {
    /// Binding under which the helper is declared
    pub fn local_name(&self) -> String {
        local_name(self.name)
    }
}

/// Binding under which helper `name` is declared
pub fn local_name(name: &str) -> String {
    format!("_{}", name)
}

static HELPERS: &[HelperDef] = &[
    HelperDef {
        name: "extends",
        dependencies: &[],
        body: "function _extends() {\n  _extends = Object.assign ? Object.assign.bind() : function (target) {\n    for (var i = 1; i < arguments.length; i++) {\n      var source = arguments[i];\n      for (var key in source) {\n        if (Object.prototype.hasOwnProperty.call(source, key)) {\n          target[key] = source[key];\n        }\n      }\n    }\n    return target;\n  };\n  return _extends.apply(this, arguments);\n}",
    },
    HelperDef {
        name: "setPrototypeOf",
        dependencies: &[],
        body: "function _setPrototypeOf(o, p) {\n  _setPrototypeOf = Object.setPrototypeOf ? Object.setPrototypeOf.bind() : function (o, p) {\n    o.__proto__ = p;\n    return o;\n  };\n  return _setPrototypeOf(o, p);\n}",
    },
    HelperDef {
        name: "inherits",
        dependencies: &["setPrototypeOf"],
        body: "function _inherits(subClass, superClass) {\n  if (typeof superClass !== \"function\" && superClass !== null) {\n    throw new TypeError(\"Super expression must either be null or a function\");\n  }\n  subClass.prototype = Object.create(superClass && superClass.prototype, {\n    constructor: { value: subClass, writable: true, configurable: true }\n  });\n  Object.defineProperty(subClass, \"prototype\", { writable: false });\n  if (superClass) _setPrototypeOf(subClass, superClass);\n}",
    },
    HelperDef {
        name: "classCallCheck",
        dependencies: &[],
        body: "function _classCallCheck(instance, Constructor) {\n  if (!(instance instanceof Constructor)) {\n    throw new TypeError(\"Cannot call a class as a function\");\n  }\n}",
    },
    HelperDef {
        name: "typeof",
        dependencies: &[],
        body: "function _typeof(o) {\n  return _typeof = \"function\" == typeof Symbol && \"symbol\" == typeof Symbol.iterator ? function (o) {\n    return typeof o;\n  } : function (o) {\n    return o && \"function\" == typeof Symbol && o.constructor === Symbol && o !== Symbol.prototype ? \"symbol\" : typeof o;\n  }, _typeof(o);\n}",
    },
    HelperDef {
        name: "defineProperty",
        dependencies: &[],
        body: "function _defineProperty(obj, key, value) {\n  if (key in obj) {\n    Object.defineProperty(obj, key, { value: value, enumerable: true, configurable: true, writable: true });\n  } else {\n    obj[key] = value;\n  }\n  return obj;\n}",
    },
];

/// Look up a helper by name
pub fn get(name: &str) -> Option<&'static HelperDef> {
    HELPERS.iter().find(|h| h.name == name)
}

/// Whether the registry knows `name`
pub fn is_available(name: &str) -> bool {
    get(name).is_some()
}

/// Names of every registered helper, in registry order
pub fn all_names() -> impl Iterator<Item = &'static str> {
    HELPERS.iter().map(|h| h.name)
}

/// Helper definitions needed for `names`, dependencies first, each once
pub fn with_dependencies<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<&'static HelperDef> {
    fn visit(name: &str, seen: &mut HashSet<&'static str>, out: &mut Vec<&'static HelperDef>) {
        let Some(def) = get(name) else { return };
        if !seen.insert(def.name) {
            return;
        }
        for dep in def.dependencies {
            visit(dep, seen, out);
        }
        out.push(def);
    }

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for name in names {
        visit(name, &mut seen, &mut out);
    }
    out
}

/// Replace whole identifiers of helper code according to `renames`
///
/// Property names after a `.` are left alone. Only meant for the helper
/// bodies above, which contain no string literals naming bindings.
pub fn rename_identifiers(code: &str, renames: &HashMap<String, String>) -> String {
    let is_ident_char = |c: char| c.is_alphanumeric() || c == '_' || c == '$';
    let mut out = String::with_capacity(code.len());
    let mut chars = code.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        if !is_ident_char(c) {
            out.push(c);
            continue;
        }
        let mut end = start + c.len_utf8();
        while let Some(&(i, next)) = chars.peek() {
            if !is_ident_char(next) {
                break;
            }
            end = i + next.len_utf8();
            chars.next();
        }

        let word = &code[start..end];
        match renames.get(word) {
            Some(renamed) if !code[..start].ends_with('.') => out.push_str(renamed),
            _ => out.push_str(word),
        }
    }
    out
}

/// Shape of the external helpers bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HelpersOutput {
    /// ES module with one named export per helper
    #[default]
    Module,
    /// Assigns helpers onto a global `babelHelpers` object
    Global,
    /// Declares `var babelHelpers = {...}`
    Var,
}

/// Render the helpers in `whitelist` (or all of them) with their dependencies
pub fn build(whitelist: Option<&[String]>, output: HelpersOutput) -> String {
    let defs = match whitelist {
        Some(names) => with_dependencies(names.iter().map(|n| n.as_str())),
        None => with_dependencies(all_names()),
    };
    let requested: HashSet<&str> = match whitelist {
        Some(names) => names.iter().map(|n| n.as_str()).collect(),
        None => all_names().collect(),
    };

    let mut out = String::new();
    if output != HelpersOutput::Module {
        out.push_str("(function (global) {\n");
        match output {
            HelpersOutput::Global => out.push_str(&format!(
                "var {ns} = global.{ns} = global.{ns} || {{}};\n",
                ns = EXTERNAL_HELPERS_NAMESPACE
            )),
            _ => out.push_str(&format!("var {} = {{}};\n", EXTERNAL_HELPERS_NAMESPACE)),
        }
    }

    for def in &defs {
        out.push_str(def.body);
        out.push('\n');
    }

    let exported: Vec<&&HelperDef> = defs.iter().filter(|d| requested.contains(d.name)).collect();
    match output {
        HelpersOutput::Module => {
            let specifiers: Vec<String> = exported
                .iter()
                .map(|d| format!("{} as {}", d.local_name(), d.name))
                .collect();
            out.push_str(&format!("export {{ {} }};\n", specifiers.join(", ")));
        }
        HelpersOutput::Global | HelpersOutput::Var => {
            for def in exported {
                out.push_str(&format!(
                    "{}.{} = {};\n",
                    EXTERNAL_HELPERS_NAMESPACE,
                    def.name,
                    def.local_name()
                ));
            }
            out.push_str("})(typeof globalThis !== \"undefined\" ? globalThis : this);\n");
        }
    }

    out
}
