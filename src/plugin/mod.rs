//! Bundler-facing plugins
//!
//! A [`Session`] owns one compiler and the warn-once bookkeeping. Every input
//! and output plugin built from it shares both, while each input plugin keeps
//! its own preflight cache.

pub mod hooks;
pub mod input;
pub mod output;
pub mod transform;

use log::warn;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::compiler::{CompileOutput, Compiler};
use crate::config::PluginOptions;
use crate::error::PluginResult;
use crate::warn::WarningSet;

pub use hooks::{HookOutput, OptionsOverride, PluginOverrides};
pub use input::InputPlugin;
pub use output::{ChunkInfo, OutputPlugin};

/// Name under which both plugins register with the bundler
pub const PLUGIN_NAME: &str = "viper-transform";

/// Compiled code and its optional source map
pub type TransformOutput = CompileOutput;

/// What plugins may do to the bundler that hosts them
pub trait PluginContext: Send + Sync {
    fn warn(&self, message: &str);
}

/// Context collecting warnings in memory
#[derive(Debug, Default)]
pub struct RecordingContext {
    warnings: Mutex<Vec<String>>,
}

impl RecordingContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.warnings.lock().clone()
    }
}

impl PluginContext for RecordingContext {
    fn warn(&self, message: &str) {
        warn!("{}", message);
        self.warnings.lock().push(message.to_string());
    }
}

/// Factory for plugins that share one compiler
pub struct Session {
    compiler: Arc<dyn Compiler>,
    warnings: Arc<WarningSet>,
}

impl Session {
    pub fn new(compiler: Arc<dyn Compiler>) -> Self {
        Self {
            compiler,
            warnings: Arc::new(WarningSet::new()),
        }
    }

    pub fn compiler(&self) -> &Arc<dyn Compiler> {
        &self.compiler
    }

    pub fn warnings(&self) -> &WarningSet {
        &self.warnings
    }

    pub fn input_plugin(&self, options: PluginOptions) -> PluginResult<InputPlugin> {
        self.custom_input_plugin(options, PluginOverrides::new())
    }

    pub fn custom_input_plugin(
        &self,
        options: PluginOptions,
        overrides: PluginOverrides,
    ) -> PluginResult<InputPlugin> {
        InputPlugin::new(
            self.compiler.clone(),
            options,
            Arc::new(overrides),
            self.warnings.clone(),
        )
    }

    pub fn output_plugin(&self, options: PluginOptions) -> PluginResult<OutputPlugin> {
        self.custom_output_plugin(options, PluginOverrides::new())
    }

    pub fn custom_output_plugin(
        &self,
        options: PluginOptions,
        overrides: PluginOverrides,
    ) -> PluginResult<OutputPlugin> {
        OutputPlugin::new(
            self.compiler.clone(),
            options,
            Arc::new(overrides),
            self.warnings.clone(),
        )
    }
}
