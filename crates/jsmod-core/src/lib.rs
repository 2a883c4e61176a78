//! Module resolution and evaluation for jsmod.
//!
//! This crate turns a set of ECMAScript modules into a callable handler:
//! - [`ModuleResolver`]: built-in / remote / virtual resolution with a write-once cache
//! - [`BuiltinRegistry`]: host-provided modules adapted into synthetic modules
//! - [`evaluate`]: load, link and evaluate a graph under a [`Deadline`]
//! - [`Handler`]: serialized per-request invocation with promise unwrapping
//! - [`ScriptEngine`]: builds a fresh runtime instance per configuration
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                     ScriptEngine                        │
//! │  (Shared, cloneable)                                    │
//! │  - RuntimeConfig                                        │
//! │  - BuiltinRegistry, SourceFetcher                       │
//! └─────────────────────────────────────────────────────────┘
//!                            │ instantiate(settings)
//!                            ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │               Runtime instance thread                   │
//! │  (One per configuration, isolated)                      │
//! │  - boa Context + ModuleResolver (module loader)         │
//! │  - ResolutionCache of module records                    │
//! │  - default export of the main module                    │
//! └─────────────────────────────────────────────────────────┘
//!                            │ mpsc queue
//!                            ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │                       Handler                           │
//! │  (Send + Sync handle, one call at a time)               │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod builtin;
pub mod cache;
pub mod deadline;
pub mod engine;
pub mod evaluator;
pub mod instance;
pub mod resolver;
pub mod source;
pub mod value;

pub use builtin::{
    BuiltinRegistry, BuiltinRegistryBuilder, ModuleExports, NativeModule, ValueModule,
};
pub use cache::ResolutionCache;
pub use deadline::{CancelHandle, CancelSignal, Deadline};
pub use engine::ScriptEngine;
pub use evaluator::evaluate;
pub use instance::{Handler, InstanceMonitor, InstanceSpec};
pub use resolver::ModuleResolver;
pub use source::{NoFetcher, SourceFetcher, VirtualTree};
pub use value::ScriptValue;
