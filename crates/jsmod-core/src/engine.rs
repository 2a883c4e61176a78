//! Script engine configuration and instantiation.
//!
//! The [`ScriptEngine`] holds everything that outlives a single
//! configuration:
//! - Runtime configuration (deadline, main module name)
//! - The immutable built-in module registry
//! - The remote source fetcher
//!
//! Each call to [`ScriptEngine::instantiate`] builds a fresh runtime
//! instance; nothing is shared between instances.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, instrument};

use jsmod_common::{RuntimeConfig, RuntimeError, Settings};

use crate::builtin::BuiltinRegistry;
use crate::instance::{Handler, InstanceSpec, spawn};
use crate::source::{NoFetcher, SourceFetcher, VirtualTree};

/// Factory for runtime instances.
///
/// # Example
///
/// ```ignore
/// use jsmod_common::{RuntimeConfig, Settings};
/// use jsmod_core::ScriptEngine;
///
/// let engine = ScriptEngine::new(RuntimeConfig::default());
/// let handler = engine
///     .instantiate(&Settings::with_script("export default (i) => i + 1;"))
///     .await?;
/// let output = handler.invoke(Some(serde_json::json!(41))).await?;
/// ```
#[derive(Clone)]
pub struct ScriptEngine {
    config: RuntimeConfig,
    builtins: BuiltinRegistry,
    fetcher: Arc<dyn SourceFetcher>,
}

impl ScriptEngine {
    /// Create an engine with no built-ins and remote modules disabled.
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            config,
            builtins: BuiltinRegistry::empty(),
            fetcher: Arc::new(NoFetcher),
        }
    }

    /// Use `builtins` for every instance created from now on.
    #[must_use]
    pub fn with_builtins(mut self, builtins: BuiltinRegistry) -> Self {
        self.builtins = builtins;
        self
    }

    /// Use `fetcher` for remote specifiers.
    #[must_use]
    pub fn with_fetcher(mut self, fetcher: Arc<dyn SourceFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Get the runtime configuration.
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Build a runtime instance for `settings` and return its handler.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The settings are invalid (empty script, bad module names)
    /// - Any module of the graph fails to resolve, link or evaluate
    /// - The deadline passes before evaluation settles
    /// - The main module has no callable default export
    #[instrument(skip(self, settings), fields(modules = settings.modules.len()))]
    pub async fn instantiate(&self, settings: &Settings) -> Result<Handler, RuntimeError> {
        let start = Instant::now();
        let main_module = &self.config.evaluation.main_module;
        settings.validate(main_module)?;

        let tree = VirtualTree::from_settings(settings, main_module);
        debug!(
            files = tree.len(),
            builtins = self.builtins.len(),
            "Source tree built"
        );

        let handler = spawn(InstanceSpec {
            tree,
            builtins: self.builtins.clone(),
            fetcher: Arc::clone(&self.fetcher),
            main_module: main_module.clone(),
            deadline: self.config.evaluation.deadline(),
            loop_iteration_limit: self.config.evaluation.loop_iteration_limit,
        })
        .await?;

        info!(
            instance_id = %handler.instance_id(),
            duration_ms = start.elapsed().as_millis(),
            "Script instantiated"
        );

        Ok(handler)
    }
}

impl std::fmt::Debug for ScriptEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptEngine")
            .field("config", &self.config)
            .field("builtins", &self.builtins)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_instantiate_rejects_empty_script() {
        let engine = ScriptEngine::new(RuntimeConfig::default());
        let err = engine
            .instantiate(&Settings::with_script("   "))
            .await
            .unwrap_err();

        assert!(matches!(err, RuntimeError::InvalidConfig { .. }));
    }

    #[tokio::test]
    async fn test_instantiate_rejects_reserved_module_name() {
        let engine = ScriptEngine::new(RuntimeConfig::default());
        let settings = Settings::with_script("export default () => 1;")
            .with_module("main.js", "export default 2;");

        let err = engine.instantiate(&settings).await.unwrap_err();
        assert!(matches!(err, RuntimeError::InvalidConfig { .. }));
    }

    #[tokio::test]
    async fn test_instances_are_independent() {
        let engine = ScriptEngine::new(RuntimeConfig::default());
        let settings = Settings::with_script("let n = 0; export default () => ++n;");

        let first = engine.instantiate(&settings).await.unwrap();
        let second = engine.instantiate(&settings).await.unwrap();

        assert_ne!(first.instance_id(), second.instance_id());
        first.invoke(None).await.unwrap();
        first.invoke(None).await.unwrap();
        assert_eq!(second.invoke(None).await.unwrap(), serde_json::json!(1));
    }

    #[test]
    fn test_engine_debug() {
        let engine = ScriptEngine::new(RuntimeConfig::default());
        let debug = format!("{engine:?}");
        assert!(debug.contains("ScriptEngine"));
        assert_eq!(engine.config().evaluation.main_module, "main.js");
    }
}
