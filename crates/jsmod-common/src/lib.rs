//! Common types, errors, and configuration for jsmod.
//!
//! This crate provides shared functionality used across the jsmod workspace:
//! - Error types using `thiserror` for type-safe error handling
//! - Configuration structures for runtime settings
//! - Script settings and the TOML configuration file

pub mod config;
pub mod config_file;
pub mod error;
pub mod settings;

pub use config::{EvaluationConfig, FetchConfig, RuntimeConfig};
pub use config_file::{ConfigFile, ConfigFileError};
pub use error::{FetchError, ResolveError, RuntimeError};
pub use settings::{Script, Settings};
