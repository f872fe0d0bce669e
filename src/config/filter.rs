//! Which module ids the input plugin compiles

use regex::Regex;

use crate::error::{PluginError, PluginResult};

/// Extension, include and exclude rules for module ids
#[derive(Debug, Clone)]
pub struct ModuleFilter {
    extensions: Regex,
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

fn compile(patterns: &[String]) -> PluginResult<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| Regex::new(p).map_err(|e| PluginError::Config(format!("pattern {:?}: {}", p, e))))
        .collect()
}

impl ModuleFilter {
    pub fn new(extensions: &[String], include: &[String], exclude: &[String]) -> PluginResult<Self> {
        let alternatives: Vec<String> = extensions.iter().map(|e| regex::escape(e)).collect();
        let extensions = Regex::new(&format!("({})$", alternatives.join("|")))
            .map_err(|e| PluginError::Config(e.to_string()))?;

        Ok(Self {
            extensions,
            include: compile(include)?,
            exclude: compile(exclude)?,
        })
    }

    pub fn matches(&self, id: &str) -> bool {
        // virtual modules belong to whichever plugin created them
        if id.starts_with('\0') {
            return false;
        }
        if !self.extensions.is_match(id) {
            return false;
        }
        if !self.include.is_empty() && !self.include.iter().any(|re| re.is_match(id)) {
            return false;
        }
        !self.exclude.iter().any(|re| re.is_match(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_extensions_are_literal() {
        let filter = ModuleFilter::new(&strings(&[".js", ".mjs"]), &[], &[]).unwrap();
        assert!(filter.matches("src/a.js"));
        assert!(filter.matches("src/a.mjs"));
        assert!(!filter.matches("src/a.ts"));
        assert!(!filter.matches("src/ajs"));
    }

    #[test]
    fn test_include_and_exclude() {
        let filter = ModuleFilter::new(
            &strings(&[".js"]),
            &strings(&["^src/"]),
            &strings(&["node_modules", "\\.test\\.js$"]),
        )
        .unwrap();
        assert!(filter.matches("src/a.js"));
        assert!(!filter.matches("lib/a.js"));
        assert!(!filter.matches("src/node_modules/x.js"));
        assert!(!filter.matches("src/a.test.js"));
    }

    #[test]
    fn test_virtual_ids_are_skipped() {
        let filter = ModuleFilter::new(&strings(&[".js"]), &[], &[]).unwrap();
        assert!(!filter.matches("\0helpers.js"));
    }

    #[test]
    fn test_bad_pattern_is_config_error() {
        assert!(matches!(
            ModuleFilter::new(&strings(&[".js"]), &strings(&["("]), &[]),
            Err(PluginError::Config(_))
        ));
    }
}
