//! Override hooks of custom plugins
//!
//! Hooks run in two phases. The `options` hook shapes plugin options while the
//! plugin is being built and must answer synchronously. The `config` and
//! `result` hooks run around each compile and may return a pending future.

use futures_util::future::BoxFuture;
use serde_json::Value;
use std::future::Future;

use super::TransformOutput;
use crate::compiler::{CompileOutput, CompilerOptions, PartialConfig};
use crate::config::PluginOptions;
use crate::error::{PluginError, PluginResult};

/// Value produced by a hook, either right away or later
pub enum HookOutput<T> {
    Ready(T),
    Pending(BoxFuture<'static, T>),
}

impl<T> HookOutput<T> {
    pub fn pending(future: impl Future<Output = T> + Send + 'static) -> Self {
        HookOutput::Pending(Box::pin(future))
    }

    pub async fn resolve(self) -> T {
        match self {
            HookOutput::Ready(value) => value,
            HookOutput::Pending(future) => future.await,
        }
    }
}

/// What the `options` hook returns
#[derive(Debug, Clone, Default)]
pub struct OptionsOverride {
    /// Options only the custom hooks understand
    pub custom_options: Option<Value>,
    /// Replacement plugin options; `None` keeps the originals
    pub plugin_options: Option<PluginOptions>,
}

/// Passed to the `config` hook
#[derive(Debug, Clone)]
pub struct ConfigHookContext {
    pub code: String,
    pub custom_options: Option<Value>,
}

/// Passed to the `result` hook
#[derive(Debug, Clone)]
pub struct ResultHookContext {
    pub code: String,
    pub custom_options: Option<Value>,
    pub config: PartialConfig,
    pub transform_options: CompilerOptions,
}

pub type OptionsHook = Box<dyn Fn(&PluginOptions) -> HookOutput<OptionsOverride> + Send + Sync>;

pub type ConfigHook = Box<
    dyn Fn(&PartialConfig, ConfigHookContext) -> HookOutput<PluginResult<CompilerOptions>> + Send + Sync,
>;

pub type ResultHook = Box<
    dyn Fn(CompileOutput, ResultHookContext) -> HookOutput<PluginResult<TransformOutput>> + Send + Sync,
>;

/// Hooks a custom plugin uses to adjust the default behaviour
#[derive(Default)]
pub struct PluginOverrides {
    pub options: Option<OptionsHook>,
    pub config: Option<ConfigHook>,
    pub result: Option<ResultHook>,
}

impl PluginOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(
        mut self,
        hook: impl Fn(&PluginOptions) -> HookOutput<OptionsOverride> + Send + Sync + 'static,
    ) -> Self {
        self.options = Some(Box::new(hook));
        self
    }

    pub fn with_config(
        mut self,
        hook: impl Fn(&PartialConfig, ConfigHookContext) -> HookOutput<PluginResult<CompilerOptions>>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.config = Some(Box::new(hook));
        self
    }

    pub fn with_result(
        mut self,
        hook: impl Fn(CompileOutput, ResultHookContext) -> HookOutput<PluginResult<TransformOutput>>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.result = Some(Box::new(hook));
        self
    }
}

/// Run the `options` hook, which must complete synchronously
///
/// Returns the custom options and the plugin options to use from now on.
pub fn apply_options_hook(
    options: PluginOptions,
    overrides: &PluginOverrides,
) -> PluginResult<(Option<Value>, PluginOptions)> {
    let Some(hook) = &overrides.options else {
        return Ok((None, options));
    };

    match hook(&options) {
        HookOutput::Ready(overridden) => Ok((
            overridden.custom_options,
            overridden.plugin_options.unwrap_or(options),
        )),
        HookOutput::Pending(_) => Err(PluginError::AsyncOptionsHook),
    }
}
