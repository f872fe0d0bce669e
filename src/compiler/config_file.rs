//! Local configuration files
//!
//! A `.viperrc.json` next to a source file (or in any parent directory up to
//! `root`) contributes plugins, presets and `only`/`ignore` rules for the
//! files below it. Programmatic options are applied on top.

use log::trace;
use regex::Regex;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use super::{CompileError, CompileResult, CompilerOptions, PluginItem};

/// Name of the local configuration file
pub const CONFIG_FILE_NAME: &str = ".viperrc.json";

/// Contents of a local configuration file
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct LocalConfig {
    pub plugins: Vec<PluginItem>,
    pub presets: Vec<PluginItem>,
    pub only: Vec<String>,
    pub ignore: Vec<String>,
}

impl LocalConfig {
    pub fn from_file(path: &Path) -> CompileResult<Self> {
        let data = fs::read_to_string(path)?;
        serde_json::from_str(&data).map_err(|e| CompileError::InvalidConfigFile {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

/// Find the closest config file for `filename`, not looking above `root`
pub fn find_config_file(filename: &Path, root: Option<&Path>) -> Option<PathBuf> {
    let mut dir = filename.parent();
    while let Some(current) = dir {
        let candidate = current.join(CONFIG_FILE_NAME);
        trace!("looking for local config at {}", candidate.display());
        if candidate.is_file() {
            return Some(candidate);
        }
        if root.is_some_and(|r| r == current) {
            break;
        }
        dir = current.parent();
    }
    None
}

fn compile_patterns(patterns: &[String]) -> CompileResult<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| {
            Regex::new(p).map_err(|e| CompileError::InvalidOption(format!("pattern {:?}: {}", p, e)))
        })
        .collect()
}

/// Whether `only`/`ignore` exclude `filename`
pub fn is_excluded(filename: &Path, only: &[String], ignore: &[String]) -> CompileResult<bool> {
    let name = filename.to_string_lossy();
    if compile_patterns(ignore)?.iter().any(|re| re.is_match(&name)) {
        return Ok(true);
    }
    let only = compile_patterns(only)?;
    Ok(!only.is_empty() && !only.iter().any(|re| re.is_match(&name)))
}

/// Merge a local config under programmatic options
pub fn merge(local: LocalConfig, options: &CompilerOptions) -> CompilerOptions {
    let mut merged = options.clone();
    merged.plugins = local.plugins;
    merged.plugins.extend(options.plugins.iter().cloned());
    merged.presets = local.presets;
    merged.presets.extend(options.presets.iter().cloned());
    merged.only = local.only;
    merged.only.extend(options.only.iter().cloned());
    merged.ignore = local.ignore;
    merged.ignore.extend(options.ignore.iter().cloned());
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_finds_config_in_parent_directory() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("src").join("lib");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join(CONFIG_FILE_NAME), "{}").unwrap();

        let found = find_config_file(&nested.join("a.js"), None).unwrap();
        assert_eq!(found, dir.path().join(CONFIG_FILE_NAME));
    }

    #[test]
    fn test_root_stops_discovery() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("pkg");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join(CONFIG_FILE_NAME), "{}").unwrap();

        assert!(find_config_file(&nested.join("a.js"), Some(&nested)).is_none());
    }

    #[test]
    fn test_only_and_ignore() {
        let file = Path::new("/app/src/vendor/lib.js");
        assert!(is_excluded(file, &[], &["vendor".to_string()]).unwrap());
        assert!(is_excluded(file, &["^/app/test".to_string()], &[]).unwrap());
        assert!(!is_excluded(file, &["^/app/src".to_string()], &[]).unwrap());
        assert!(is_excluded(file, &["(".to_string()], &[]).is_err());
    }

    #[test]
    fn test_local_plugins_come_first() {
        let local = LocalConfig {
            plugins: vec![PluginItem::from("modules-commonjs")],
            ..Default::default()
        };
        let options = CompilerOptions {
            plugins: vec![PluginItem::from("transform-object-assign")],
            ..Default::default()
        };
        let merged = merge(local, &options);
        let names: Vec<_> = merged.plugins.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["modules-commonjs", "transform-object-assign"]);
    }

    #[test]
    fn test_invalid_config_file_reports_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, r#"{ "plugins": 3 }"#).unwrap();
        let err = LocalConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, CompileError::InvalidConfigFile { path: p, .. } if p == path));
    }
}
