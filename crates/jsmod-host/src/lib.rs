//! Host-provided collaborators for jsmod.
//!
//! This crate implements the seams `jsmod-core` leaves to the host:
//!
//! - [`fetch`]: HTTP(S) source fetcher for remote module specifiers
//! - [`logging`]: the `log` built-in module, backed by `tracing`
//!
//! # Fetch Semantics
//!
//! 1. **Status**: only 200 is accepted; 404 is reported distinctly.
//! 2. **Timeout**: each fetch has a fixed timeout, independent of the
//!    evaluation deadline.
//! 3. **Cancellation**: a cancelled evaluation aborts the pending request.

pub mod fetch;
pub mod logging;

pub use fetch::HttpFetcher;
pub use logging::{LOG_MODULE, LogLevel, LogModule};
