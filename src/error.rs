//! Plugin error types
//!
//! Classification errors abort the whole build; compile errors are scoped to
//! the unit that produced them.

use miette::Diagnostic;
use thiserror::Error;

use crate::compiler::CompileError;

/// Errors surfaced by the input and output plugins
#[derive(Error, Diagnostic, Debug)]
pub enum PluginError {
    #[error(
        "The bundler requires that your compiler configuration keeps ES module syntax intact. \
         Unfortunately it looks like your configuration specifies a module transformer \
         to replace ES modules with another module format. To continue you have to disable it."
    )]
    #[diagnostic(
        code(viper_transform::module_syntax),
        help(
            "Most commonly it's a CommonJS transform added by the `env` preset - \
             in such case you should disable it by adding the `modules: false` option to that preset, \
             or remove the `modules-commonjs` plugin."
        )
    )]
    ModuleSyntaxStripped,

    #[error("An unexpected situation arose: the compiler emitted helpers in a way this plugin does not recognize.")]
    #[diagnostic(
        code(viper_transform::unexpected_helpers),
        help("Check that the compiler version is supported by this plugin and report the configuration that triggered it.")
    )]
    UnexpectedHelperStrategy,

    #[error(
        "Runtime helpers are not enabled. Either exclude the transform-runtime plugin \
         or pass the `runtimeHelpers: true` option."
    )]
    #[diagnostic(code(viper_transform::runtime_helpers))]
    RuntimeHelpersNotEnabled,

    #[error(
        "Using the compiler on the generated chunks is strongly discouraged for formats other than \"es\" or \"cjs\" \
         as it can easily break wrapper code and lead to accidentally created global variables. \
         Instead, you should set the output format to \"es\" and let the compiler transform to another format, \
         e.g. by adding \"presets: [['env', {{ modules: '{recommended}' }}]]\" to your compiler options. \
         If you still want to proceed, add \"allowAllFormats: true\" to your plugin options."
    )]
    #[diagnostic(code(viper_transform::chunk_format))]
    UnsupportedChunkFormat {
        format: String,
        recommended: &'static str,
    },

    #[error(
        ".options hook can't be asynchronous. It should return `{{ customOptions, pluginOptions }}` synchronously."
    )]
    #[diagnostic(code(viper_transform::async_options_hook))]
    AsyncOptionsHook,

    #[error("Failed to compile {unit}: {source}")]
    #[diagnostic(code(viper_transform::compile))]
    Compile {
        unit: String,
        #[source]
        source: CompileError,
    },

    #[error("Invalid plugin options: {0}")]
    #[diagnostic(code(viper_transform::config))]
    Config(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl PluginError {
    /// Wrap a compiler failure with the name of the unit being compiled
    pub fn compile(unit: impl Into<String>, source: CompileError) -> Self {
        PluginError::Compile {
            unit: unit.into(),
            source,
        }
    }
}

/// Result type for plugin operations
pub type PluginResult<T> = Result<T, PluginError>;
