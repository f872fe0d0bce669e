//! Plugin options and their normalization into compiler options
//!
//! User options are merged with defaults derived from the environment: the
//! caller identity the compiler sees, the output format of the chunk being
//! rendered, and the four spellings of the source map flag.

pub mod filter;

use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::compiler::{CallerDescriptor, CompilerOptions, SourceKind};
use crate::error::{PluginError, PluginResult};

pub use filter::ModuleFilter;

/// Caller name reported to the compiler
pub const CALLER_NAME: &str = "viper-transform";

/// Caller fields the user may override
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CallerOverrides {
    pub name: Option<String>,
    #[serde(rename = "supportsStaticESM")]
    pub supports_static_esm: Option<bool>,
    pub supports_dynamic_import: Option<bool>,
    pub supports_top_level_await: Option<bool>,
}

impl CallerOverrides {
    fn apply(&self, mut caller: CallerDescriptor) -> CallerDescriptor {
        if let Some(name) = &self.name {
            caller.name = name.clone();
        }
        if let Some(v) = self.supports_static_esm {
            caller.supports_static_esm = v;
        }
        if let Some(v) = self.supports_dynamic_import {
            caller.supports_dynamic_import = v;
        }
        if let Some(v) = self.supports_top_level_await {
            caller.supports_top_level_await = v;
        }
        caller
    }
}

/// Options accepted by the input and output plugins
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PluginOptions {
    pub extensions: Option<Vec<String>>,
    /// Regex patterns; when given, only matching ids are compiled
    pub include: Option<Vec<String>>,
    /// Regex patterns of ids never compiled
    pub exclude: Option<Vec<String>>,
    pub external_helpers: bool,
    pub external_helpers_whitelist: Option<Vec<String>>,
    pub runtime_helpers: bool,
    pub allow_all_formats: bool,
    pub sourcemap: Option<bool>,
    pub sourcemaps: Option<bool>,
    pub source_map: Option<bool>,
    pub source_maps: Option<bool>,
    pub caller: CallerOverrides,
    #[serde(flatten)]
    pub compiler: CompilerOptions,
}

impl PluginOptions {
    pub fn from_json(json: &str) -> PluginResult<Self> {
        serde_json::from_str(json).map_err(|e| PluginError::Config(e.to_string()))
    }

    pub fn from_file(path: &Path) -> PluginResult<Self> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json(&data).map_err(|e| match e {
            PluginError::Config(msg) => PluginError::Config(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    /// Source maps stay on unless one of the spellings turns them off
    pub fn source_maps_enabled(&self) -> bool {
        [self.sourcemap, self.sourcemaps, self.source_map, self.source_maps]
            .iter()
            .all(|flag| flag.unwrap_or(true))
    }

    /// Whether options that only make sense for modules were given
    pub fn has_module_only_options(&self) -> bool {
        self.extensions.is_some() || self.include.is_some() || self.exclude.is_some()
    }
}

/// Output format of a rendered chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Es,
    Cjs,
    Amd,
    Iife,
    Umd,
    System,
}

impl OutputFormat {
    /// Module format the compiler should produce instead of wrapping chunks
    pub fn recommended_module_format(self) -> &'static str {
        match self {
            OutputFormat::Amd => "amd",
            OutputFormat::Iife | OutputFormat::Umd => "umd",
            OutputFormat::System => "systemjs",
            OutputFormat::Es | OutputFormat::Cjs => "<module format>",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OutputFormat::Es => "es",
            OutputFormat::Cjs => "cjs",
            OutputFormat::Amd => "amd",
            OutputFormat::Iife => "iife",
            OutputFormat::Umd => "umd",
            OutputFormat::System => "system",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = PluginError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "es" | "esm" | "module" => Ok(OutputFormat::Es),
            "cjs" | "commonjs" => Ok(OutputFormat::Cjs),
            "amd" => Ok(OutputFormat::Amd),
            "iife" => Ok(OutputFormat::Iife),
            "umd" => Ok(OutputFormat::Umd),
            "system" | "systemjs" => Ok(OutputFormat::System),
            other => Err(PluginError::Config(format!("unknown output format '{}'", other))),
        }
    }
}

/// Options of the output being generated
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputOptions {
    pub format: OutputFormat,
}

/// Normalized options of the input plugin
#[derive(Debug, Clone)]
pub struct InputConfig {
    pub extensions: Vec<String>,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub external_helpers: bool,
    pub external_helpers_whitelist: Option<Vec<String>>,
    pub runtime_helpers: bool,
    /// Base compiler options; the filename is filled in per module
    pub compiler: CompilerOptions,
}

/// Normalize input plugin options
pub fn normalize_input(options: &PluginOptions, default_extensions: Vec<String>) -> InputConfig {
    let caller = options.caller.apply(CallerDescriptor {
        name: CALLER_NAME.to_string(),
        supports_static_esm: true,
        supports_dynamic_import: true,
        supports_top_level_await: true,
    });

    let mut compiler = options.compiler.clone();
    compiler.source_maps = options.source_maps_enabled();
    compiler.caller = caller;

    InputConfig {
        extensions: options.extensions.clone().unwrap_or(default_extensions),
        include: options.include.clone().unwrap_or_default(),
        exclude: options.exclude.clone().unwrap_or_default(),
        external_helpers: options.external_helpers,
        external_helpers_whitelist: options.external_helpers_whitelist.clone(),
        runtime_helpers: options.runtime_helpers,
        compiler,
    }
}

/// Normalize output plugin options for one output
pub fn normalize_output(options: &PluginOptions, output: &OutputOptions) -> CompilerOptions {
    let is_es = output.format == OutputFormat::Es;
    let caller = options.caller.apply(CallerDescriptor {
        name: CALLER_NAME.to_string(),
        supports_static_esm: is_es,
        ..Default::default()
    });

    let mut compiler = options.compiler.clone();
    compiler.config_file = Some(compiler.config_file.unwrap_or(false));
    compiler.source_type = Some(compiler.source_type.unwrap_or(if is_es {
        SourceKind::Module
    } else {
        SourceKind::Script
    }));
    compiler.source_maps = options.source_maps_enabled();
    compiler.caller = caller;
    compiler
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_from_json() {
        let options = PluginOptions::from_json(
            r#"{
                "extensions": [".js", ".ts"],
                "externalHelpersWhitelist": ["extends"],
                "runtimeHelpers": true,
                "sourceMap": false,
                "caller": { "supportsStaticESM": false },
                "plugins": ["transform-object-assign"],
                "presets": [["env", { "modules": false }]],
                "configFile": false
            }"#,
        )
        .unwrap();

        assert_eq!(options.extensions.as_deref().unwrap().len(), 2);
        assert!(options.runtime_helpers);
        assert!(!options.source_maps_enabled());
        assert_eq!(options.caller.supports_static_esm, Some(false));
        assert_eq!(options.compiler.plugins.len(), 1);
        assert_eq!(options.compiler.presets.len(), 1);
        assert_eq!(options.compiler.config_file, Some(false));
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        assert!(matches!(
            PluginOptions::from_json("{ \"plugins\": 1 }"),
            Err(PluginError::Config(_))
        ));
    }

    #[test]
    fn test_input_defaults() {
        let config = normalize_input(&PluginOptions::default(), vec![".js".to_string()]);
        assert_eq!(config.extensions, vec![".js".to_string()]);
        assert!(config.compiler.source_maps);
        assert_eq!(config.compiler.caller.name, CALLER_NAME);
        assert!(config.compiler.caller.supports_static_esm);
        assert!(config.compiler.caller.supports_dynamic_import);
        assert!(config.compiler.caller.supports_top_level_await);
    }

    #[test]
    fn test_input_caller_overrides_win() {
        let options = PluginOptions {
            caller: CallerOverrides {
                name: Some("custom".to_string()),
                supports_top_level_await: Some(false),
                ..Default::default()
            },
            ..Default::default()
        };
        let config = normalize_input(&options, vec![]);
        assert_eq!(config.compiler.caller.name, "custom");
        assert!(!config.compiler.caller.supports_top_level_await);
        assert!(config.compiler.caller.supports_static_esm);
    }

    #[test]
    fn test_output_defaults_follow_format() {
        let es = normalize_output(&PluginOptions::default(), &OutputOptions { format: OutputFormat::Es });
        assert_eq!(es.config_file, Some(false));
        assert_eq!(es.source_type, Some(SourceKind::Module));
        assert!(es.caller.supports_static_esm);

        let cjs = normalize_output(&PluginOptions::default(), &OutputOptions { format: OutputFormat::Cjs });
        assert_eq!(cjs.source_type, Some(SourceKind::Script));
        assert!(!cjs.caller.supports_static_esm);
    }

    #[test]
    fn test_output_user_options_override_defaults() {
        let mut options = PluginOptions::default();
        options.compiler.config_file = Some(true);
        options.compiler.source_type = Some(SourceKind::Module);
        let cjs = normalize_output(&options, &OutputOptions { format: OutputFormat::Cjs });
        assert_eq!(cjs.config_file, Some(true));
        assert_eq!(cjs.source_type, Some(SourceKind::Module));
    }

    #[test]
    fn test_format_parsing_and_recommendation() {
        assert_eq!("esm".parse::<OutputFormat>().unwrap(), OutputFormat::Es);
        assert_eq!("commonjs".parse::<OutputFormat>().unwrap(), OutputFormat::Cjs);
        assert!("nope".parse::<OutputFormat>().is_err());
        assert_eq!(OutputFormat::Iife.recommended_module_format(), "umd");
        assert_eq!(OutputFormat::System.recommended_module_format(), "systemjs");
        assert_eq!(OutputFormat::Amd.recommended_module_format(), "amd");
    }
}
