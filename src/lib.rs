//! viper-transform - compile bundler modules and chunks with a source-to-source compiler
//!
//! The crate provides:
//! - input and output plugins that run a compiler on every module and chunk
//! - preflight verification that a compiler configuration keeps ES modules intact
//! - helper deduplication through one shared virtual module
//! - an OXC based reference compiler and a minimal bundler hosting the plugins

pub mod bundler;
pub mod compiler;
pub mod config;
pub mod error;
pub mod inject;
pub mod plugin;
pub mod preflight;
pub mod resolver;
pub mod transpiler;
pub mod warn;

// Re-export commonly used types
pub use bundler::{bundle, BundleConfig, BundleError, BundleOutput, BundleResult};
pub use compiler::{CompileError, CompileOutput, Compiler, CompilerOptions, HelpersOutput};
pub use config::{OutputFormat, OutputOptions, PluginOptions};
pub use error::{PluginError, PluginResult};
pub use inject::HELPERS_ID;
pub use plugin::{
    InputPlugin, OutputPlugin, PluginContext, PluginOverrides, RecordingContext, Session,
    TransformOutput,
};
pub use preflight::HelperStrategy;
pub use resolver::ModuleResolver;
pub use transpiler::{OxcCompiler, OxcCompilerConfig};
