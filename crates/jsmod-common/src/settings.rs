//! Script settings driving a reconfiguration.
//!
//! [`Settings`] is replaced wholesale whenever it changes; nothing in it is
//! mutated in place.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::RuntimeError;

/// A named piece of ECMAScript module source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Script {
    /// File name, e.g. `utils.js`.
    pub name: String,
    /// Module source text.
    pub content: String,
}

impl Script {
    /// Create a new script.
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// The external configuration unit: main script, auxiliary modules, error routing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Route invocation errors to the error channel instead of returning them.
    #[serde(default)]
    pub enable_error_port: bool,

    /// The main script. Its default export is the request handler.
    #[serde(default)]
    pub script: Script,

    /// Auxiliary modules importable by name.
    #[serde(default)]
    pub modules: Vec<Script>,
}

impl Settings {
    /// Settings with only a main script.
    pub fn with_script(content: impl Into<String>) -> Self {
        Self {
            script: Script::new("main.js", content),
            ..Self::default()
        }
    }

    /// Add an auxiliary module.
    #[must_use]
    pub fn with_module(mut self, name: impl Into<String>, content: impl Into<String>) -> Self {
        self.modules.push(Script::new(name, content));
        self
    }

    /// Enable or disable routing of invocation errors to the error channel.
    #[must_use]
    pub fn with_error_port(mut self, enabled: bool) -> Self {
        self.enable_error_port = enabled;
        self
    }

    /// A working example that imports an auxiliary module and a CDN bundle.
    pub fn sample() -> Self {
        Self {
            enable_error_port: false,
            script: Script::new(
                "main.js",
                r#"import {lodash} from "https://cdn.jsdelivr.net/npm/@esm-bundle/lodash@4.17.21/+esm";
import {typeOf} from "utils.js";
export default function(inp) {
  return lodash.isFunction(typeOf) + typeOf(inp)
}"#,
            ),
            modules: vec![Script::new(
                "utils.js",
                "export function typeOf(input) {return typeof input}",
            )],
        }
    }

    /// Check the settings before building a runtime from them.
    ///
    /// `main_module` is the reserved name the main script is registered under.
    pub fn validate(&self, main_module: &str) -> Result<(), RuntimeError> {
        if self.script.content.trim().is_empty() {
            return Err(RuntimeError::invalid_config("empty script"));
        }

        let mut seen = HashSet::with_capacity(self.modules.len());
        for module in &self.modules {
            if module.name.is_empty() {
                return Err(RuntimeError::invalid_config("module name is empty"));
            }
            if module.name == main_module {
                return Err(RuntimeError::invalid_config(format!(
                    "module name '{main_module}' is reserved for the main script"
                )));
            }
            if !seen.insert(module.name.as_str()) {
                return Err(RuntimeError::invalid_config(format!(
                    "duplicate module name '{}'",
                    module.name
                )));
            }
        }

        Ok(())
    }
}
