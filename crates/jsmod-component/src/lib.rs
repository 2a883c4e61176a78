//! Eval component for jsmod.
//!
//! This crate connects the script pipeline to a message-oriented host:
//! - [`EvalComponent`]: reconfigure with settings, handle requests
//! - [`message`]: request, response and error messages plus channel names
//!
//! # Channels
//!
//! | channel    | direction | message          |
//! |------------|-----------|------------------|
//! | `request`  | in        | [`Request`]      |
//! | `settings` | in        | settings JSON    |
//! | `response` | out       | [`Response`]     |
//! | `error`    | out       | [`ErrorMessage`] (only with `enableErrorPort`) |

pub mod component;
pub mod message;

pub use component::EvalComponent;
pub use message::{
    ERROR_PORT, Emission, ErrorMessage, REQUEST_PORT, RESPONSE_PORT, Request, Response,
    SETTINGS_PORT,
};
