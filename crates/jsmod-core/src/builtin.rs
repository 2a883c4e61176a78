//! Built-in (host-provided) modules.
//!
//! A [`NativeModule`] is instantiated once per runtime instance and adapted
//! into a synthetic module whose exports are `default` plus every named
//! export. No source text is involved and nothing further is resolved.
//!
//! The set of built-ins is an immutable [`BuiltinRegistry`] handed to the
//! engine at construction; there is no process-wide table.

use std::collections::HashMap;
use std::sync::Arc;

use boa_engine::module::{Module, SyntheticModule, SyntheticModuleInitializer};
use boa_engine::{Context, JsResult, JsString, JsValue, js_string};
use boa_gc::{Finalize, Trace};
use serde_json::Value;

use jsmod_common::ResolveError;

/// Exports of a built-in module, created inside one engine context.
#[derive(Debug, Clone)]
pub struct ModuleExports {
    /// The `default` export.
    pub default: JsValue,
    /// Named exports, in declaration order.
    pub named: Vec<(String, JsValue)>,
}

impl ModuleExports {
    /// Exports with only a default value.
    pub fn with_default(default: JsValue) -> Self {
        Self {
            default,
            named: Vec::new(),
        }
    }

    /// Add a named export.
    #[must_use]
    pub fn with_named(mut self, name: impl Into<String>, value: JsValue) -> Self {
        self.named.push((name.into(), value));
        self
    }
}

/// A module implemented by the host.
pub trait NativeModule: Send + Sync {
    /// Produce this module's exports for `context`.
    ///
    /// Called at most once per runtime instance that imports the module.
    fn instantiate(&self, context: &mut Context) -> JsResult<ModuleExports>;
}

/// A built-in module made of plain JSON values.
#[derive(Debug, Clone, Default)]
pub struct ValueModule {
    default: Value,
    named: Vec<(String, Value)>,
}

impl ValueModule {
    /// Create a module whose default export is `default`.
    pub fn new(default: Value) -> Self {
        Self {
            default,
            named: Vec::new(),
        }
    }

    /// Add a named export.
    #[must_use]
    pub fn with_named(mut self, name: impl Into<String>, value: Value) -> Self {
        self.named.push((name.into(), value));
        self
    }
}

impl NativeModule for ValueModule {
    fn instantiate(&self, context: &mut Context) -> JsResult<ModuleExports> {
        let mut exports = ModuleExports::with_default(JsValue::from_json(&self.default, context)?);
        for (name, value) in &self.named {
            exports.named.push((name.clone(), JsValue::from_json(value, context)?));
        }
        Ok(exports)
    }
}

/// Immutable name -> built-in module table.
#[derive(Clone, Default)]
pub struct BuiltinRegistry {
    modules: Arc<HashMap<String, Arc<dyn NativeModule>>>,
}

impl BuiltinRegistry {
    /// A registry with no built-ins.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create a builder.
    pub fn builder() -> BuiltinRegistryBuilder {
        BuiltinRegistryBuilder::default()
    }

    /// Look up a built-in by exact name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn NativeModule>> {
        self.modules.get(name)
    }

    /// Sorted names of all built-ins.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.modules.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of built-ins.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Returns `true` if there are no built-ins.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl std::fmt::Debug for BuiltinRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuiltinRegistry")
            .field("modules", &self.names())
            .finish()
    }
}

/// Builder for [`BuiltinRegistry`].
#[derive(Default)]
pub struct BuiltinRegistryBuilder {
    modules: HashMap<String, Arc<dyn NativeModule>>,
}

impl BuiltinRegistryBuilder {
    /// Register a module under `name`, replacing any earlier registration.
    #[must_use]
    pub fn register(
        mut self,
        name: impl Into<String>,
        module: impl NativeModule + 'static,
    ) -> Self {
        self.modules.insert(name.into(), Arc::new(module));
        self
    }

    /// Finish the registry.
    pub fn build(self) -> BuiltinRegistry {
        BuiltinRegistry {
            modules: Arc::new(self.modules),
        }
    }
}

/// Export names and values captured by the synthetic module's evaluation steps.
#[derive(Trace, Finalize)]
struct ExportBindings {
    #[unsafe_ignore_trace]
    names: Vec<JsString>,
    values: Vec<JsValue>,
}

impl From<ModuleExports> for ExportBindings {
    fn from(exports: ModuleExports) -> Self {
        let mut names = vec![js_string!("default")];
        let mut values = vec![exports.default];
        for (name, value) in exports.named {
            if name == "default" {
                continue;
            }
            names.push(JsString::from(name.as_str()));
            values.push(value);
        }
        Self { names, values }
    }
}

/// Adapt a native module into a module record.
pub(crate) fn synthesize(
    specifier: &str,
    native: &dyn NativeModule,
    context: &mut Context,
) -> Result<Module, ResolveError> {
    let exports = native
        .instantiate(context)
        .map_err(|err| ResolveError::Builtin {
            specifier: specifier.to_string(),
            message: err.to_string(),
        })?;

    let bindings = ExportBindings::from(exports);
    let names = bindings.names.clone();

    Ok(Module::synthetic(
        &names,
        SyntheticModuleInitializer::from_copy_closure_with_captures(
            |module: &SyntheticModule, bindings: &ExportBindings, _context: &mut Context| {
                for (name, value) in bindings.names.iter().zip(&bindings.values) {
                    module.set_export(name, value.clone())?;
                }
                Ok(())
            },
            bindings,
        ),
        None,
        None,
        context,
    ))
}
