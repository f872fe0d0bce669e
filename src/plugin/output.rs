//! Plugin compiling rendered chunks

use log::debug;
use serde_json::Value;
use std::sync::Arc;

use super::hooks::{apply_options_hook, PluginOverrides};
use super::transform::transform_code;
use super::{PluginContext, TransformOutput, PLUGIN_NAME};
use crate::compiler::Compiler;
use crate::config::{normalize_output, OutputFormat, OutputOptions, PluginOptions};
use crate::error::{PluginError, PluginResult};
use crate::warn::WarningSet;

/// Warning for module-only options handed to the output plugin
pub const MODULE_ONLY_OPTIONS_IGNORED: &str =
    "The \"include\", \"exclude\" and \"extensions\" options are ignored when transforming the output.";

/// A chunk handed to `render_chunk`
#[derive(Debug, Clone, Default)]
pub struct ChunkInfo {
    pub file_name: String,
    pub is_entry: bool,
    pub modules: Vec<String>,
}

/// Output plugin: compiles each chunk after the bundler renders it
pub struct OutputPlugin {
    compiler: Arc<dyn Compiler>,
    overrides: Arc<PluginOverrides>,
    custom_options: Option<Value>,
    options: PluginOptions,
    warnings: Arc<WarningSet>,
}

impl OutputPlugin {
    pub fn new(
        compiler: Arc<dyn Compiler>,
        options: PluginOptions,
        overrides: Arc<PluginOverrides>,
        warnings: Arc<WarningSet>,
    ) -> PluginResult<Self> {
        let (custom_options, options) = apply_options_hook(options, &overrides)?;
        Ok(Self {
            compiler,
            overrides,
            custom_options,
            options,
            warnings,
        })
    }

    pub fn name(&self) -> &'static str {
        PLUGIN_NAME
    }

    /// Check the output options before any chunk is rendered
    pub fn render_start(&self, ctx: &dyn PluginContext, output: &OutputOptions) -> PluginResult<()> {
        if self.options.has_module_only_options() {
            self.warnings.warn_once(ctx, MODULE_ONLY_OPTIONS_IGNORED);
        }

        match output.format {
            OutputFormat::Es | OutputFormat::Cjs => Ok(()),
            _ if self.options.allow_all_formats => Ok(()),
            format => Err(PluginError::UnsupportedChunkFormat {
                format: format.to_string(),
                recommended: format.recommended_module_format(),
            }),
        }
    }

    /// Compile one rendered chunk
    pub async fn render_chunk(
        &self,
        code: &str,
        chunk: &ChunkInfo,
        output: &OutputOptions,
    ) -> PluginResult<Option<TransformOutput>> {
        debug!("compiling chunk {} as {}", chunk.file_name, output.format);
        let options = normalize_output(&self.options, output);
        transform_code(
            &*self.compiler,
            &chunk.file_name,
            code,
            options,
            &self.overrides,
            self.custom_options.as_ref(),
            None,
        )
        .await
    }
}
