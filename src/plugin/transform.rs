//! Compile of a single module or chunk

use log::debug;
use serde_json::Value;

use super::hooks::{ConfigHookContext, PluginOverrides, ResultHookContext};
use super::TransformOutput;
use crate::compiler::{Compiler, CompilerOptions};
use crate::error::{PluginError, PluginResult};

/// Last adjustment of the transform options before compiling
pub type Finalize<'a> = &'a (dyn Fn(CompilerOptions) -> PluginResult<CompilerOptions> + Send + Sync);

/// Compile `code` as `unit`
///
/// Returns `Ok(None)` when the compiler's own configuration excludes the unit.
pub async fn transform_code(
    compiler: &dyn Compiler,
    unit: &str,
    code: &str,
    options: CompilerOptions,
    overrides: &PluginOverrides,
    custom_options: Option<&Value>,
    finalize: Option<Finalize<'_>>,
) -> PluginResult<Option<TransformOutput>> {
    let Some(config) = compiler
        .load_partial_config(&options)
        .map_err(|e| PluginError::compile(unit, e))?
    else {
        debug!("{} excluded by compiler configuration", unit);
        return Ok(None);
    };

    let mut transform_options = match &overrides.config {
        Some(hook) => {
            let ctx = ConfigHookContext {
                code: code.to_string(),
                custom_options: custom_options.cloned(),
            };
            hook(&config, ctx).resolve().await?
        }
        None => config.options.clone(),
    };

    if let Some(finalize) = finalize {
        transform_options = finalize(transform_options)?;
    }

    let result = compiler
        .transform(code, &transform_options)
        .await
        .map_err(|e| PluginError::compile(unit, e))?;

    match &overrides.result {
        Some(hook) => {
            let ctx = ResultHookContext {
                code: code.to_string(),
                custom_options: custom_options.cloned(),
                config,
                transform_options,
            };
            hook(result, ctx).resolve().await.map(Some)
        }
        None => Ok(Some(result)),
    }
}
