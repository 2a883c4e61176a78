//! Error types for jsmod.
//!
//! This module defines a hierarchy of error types using `thiserror`:
//! - [`RuntimeError`]: Top-level errors for configuring and invoking a script
//! - [`ResolveError`]: Failures resolving a single module specifier
//! - [`FetchError`]: Failures fetching a remote module over HTTP(S)
//!
//! Resolution and fetch errors are `Clone` because the resolver cache hands
//! the same failure to every caller that asks for the same specifier.

use std::io;

use thiserror::Error;

/// Top-level runtime errors.
///
/// Everything except [`RuntimeError::Invocation`], [`RuntimeError::NotInitialised`]
/// and [`RuntimeError::Terminated`] is terminal for a reconfiguration attempt:
/// no handler is produced.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Invalid settings were provided (empty script, duplicate module names).
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },

    /// The main module could not be resolved.
    #[error("Failed to resolve module: {0}")]
    Resolve(#[from] ResolveError),

    /// The module graph could not be loaded or linked.
    #[error("Failed to link module graph: {reason}")]
    Link {
        /// Description of the link failure.
        reason: String,
        /// The resolution failure of a transitive import, if that was the cause.
        #[source]
        source: Option<ResolveError>,
    },

    /// Top-level evaluation rejected.
    #[error("Failed to evaluate module graph: {reason}")]
    Evaluation {
        /// The rejection value rendered as text.
        reason: String,
    },

    /// Link and evaluation did not settle before the deadline.
    #[error("Evaluation deadline exceeded after {duration_ms}ms")]
    DeadlineExceeded {
        /// The deadline in milliseconds.
        duration_ms: u64,
    },

    /// The main module has no callable `default` export.
    #[error("Failed to assert default export function")]
    NoDefaultExport,

    /// The handler threw, or the promise it returned rejected.
    #[error("{reason}")]
    Invocation {
        /// The thrown or rejection value rendered as text.
        reason: String,
    },

    /// A request arrived before any configuration succeeded.
    #[error("Handler is not initialised")]
    NotInitialised,

    /// The runtime instance thread is gone.
    #[error("Runtime instance terminated")]
    Terminated,

    /// The engine itself failed outside of script code.
    #[error("Engine error: {reason}")]
    Engine {
        /// Description of the engine failure.
        reason: String,
    },

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Errors resolving a single specifier.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// No virtual source with this name exists.
    #[error("Module not found: {specifier}")]
    NotFound {
        /// The specifier that was requested.
        specifier: String,
    },

    /// Fetching a remote module failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The module source failed to parse.
    #[error("Syntax error in {specifier}: {message}")]
    Syntax {
        /// The specifier of the module being parsed.
        specifier: String,
        /// Parser message.
        message: String,
    },

    /// A built-in module failed to produce its exports.
    #[error("Built-in module {specifier} failed: {message}")]
    Builtin {
        /// The built-in module name.
        specifier: String,
        /// Failure message.
        message: String,
    },

    /// Resolution was attempted after the evaluation deadline passed.
    #[error("Resolution of {specifier} aborted: deadline exceeded")]
    DeadlineExceeded {
        /// The specifier being resolved.
        specifier: String,
    },
}

/// Errors fetching a remote module.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The server answered 404.
    #[error("not found: {url}")]
    NotFound {
        /// The requested URL.
        url: String,
    },

    /// The server answered with a status other than 200 or 404.
    #[error("wrong status code ({status}) for: {url}")]
    WrongStatus {
        /// The HTTP status code.
        status: u16,
        /// The requested URL.
        url: String,
    },

    /// Connection, TLS or body read failure.
    #[error("{message}")]
    Transport {
        /// The requested URL.
        url: String,
        /// The underlying error message.
        message: String,
    },

    /// The fetch did not complete within the fetch timeout.
    #[error("fetch timed out after {timeout_ms}ms for: {url}")]
    Timeout {
        /// The requested URL.
        url: String,
        /// The timeout in milliseconds.
        timeout_ms: u64,
    },

    /// The caller gave up while the fetch was pending.
    #[error("fetch cancelled for: {url}")]
    Cancelled {
        /// The requested URL.
        url: String,
    },
}

impl RuntimeError {
    /// Create a new `InvalidConfig` error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create a new `Link` error without a resolution cause.
    pub fn link(reason: impl Into<String>) -> Self {
        Self::Link {
            reason: reason.into(),
            source: None,
        }
    }

    /// Create a new `Evaluation` error.
    pub fn evaluation(reason: impl Into<String>) -> Self {
        Self::Evaluation {
            reason: reason.into(),
        }
    }

    /// Create a new `Invocation` error.
    pub fn invocation(reason: impl Into<String>) -> Self {
        Self::Invocation {
            reason: reason.into(),
        }
    }

    /// Create a new `Engine` error.
    pub fn engine(reason: impl Into<String>) -> Self {
        Self::Engine {
            reason: reason.into(),
        }
    }

    /// Returns `true` if this error was raised by a request rather than by configuration.
    pub fn is_invocation(&self) -> bool {
        matches!(self, Self::Invocation { .. })
    }

    /// Returns `true` if the evaluation deadline caused this error.
    pub fn is_deadline_exceeded(&self) -> bool {
        match self {
            Self::DeadlineExceeded { .. } => true,
            _ => self
                .resolve_error()
                .is_some_and(ResolveError::is_deadline_exceeded),
        }
    }

    /// The resolution failure behind this error, if any.
    pub fn resolve_error(&self) -> Option<&ResolveError> {
        match self {
            Self::Resolve(err) => Some(err),
            Self::Link { source, .. } => source.as_ref(),
            _ => None,
        }
    }
}

impl ResolveError {
    /// Create a new `NotFound` error.
    pub fn not_found(specifier: impl Into<String>) -> Self {
        Self::NotFound {
            specifier: specifier.into(),
        }
    }

    /// Create a new `Syntax` error.
    pub fn syntax(specifier: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Syntax {
            specifier: specifier.into(),
            message: message.into(),
        }
    }

    /// Returns `true` if the module does not exist, locally or remotely.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::Fetch(FetchError::NotFound { .. })
        )
    }

    /// Returns `true` if the deadline or a cancellation interrupted resolution.
    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(
            self,
            Self::DeadlineExceeded { .. } | Self::Fetch(FetchError::Cancelled { .. })
        )
    }
}

impl FetchError {
    /// Create a new `Transport` error.
    pub fn transport(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            url: url.into(),
            message: message.into(),
        }
    }

    /// The URL this error refers to.
    pub fn url(&self) -> &str {
        match self {
            Self::NotFound { url }
            | Self::WrongStatus { url, .. }
            | Self::Transport { url, .. }
            | Self::Timeout { url, .. }
            | Self::Cancelled { url } => url,
        }
    }
}
