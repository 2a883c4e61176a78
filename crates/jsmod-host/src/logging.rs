//! The `log` built-in module.
//!
//! Scripts import it to emit structured logs through the host:
//!
//! ```js
//! import log, { info } from "log";
//! info("handling", input);
//! log.warn("slow path");
//! ```
//!
//! Arguments are rendered as strings and joined with spaces. Every event
//! carries `guest_log = true` and is recorded inside the runtime instance
//! span, so it also carries the instance id.

use boa_engine::object::{FunctionObjectBuilder, ObjectInitializer};
use boa_engine::property::Attribute;
use boa_engine::{Context, JsResult, JsString, JsValue, NativeFunction};
use tracing::{debug, error, info, warn};

use jsmod_core::value::describe;
use jsmod_core::{ModuleExports, NativeModule};

/// Name the module is registered under by default.
pub const LOG_MODULE: &str = "log";

/// Log level of a guest log event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// All levels, in the order they are exported.
    pub const ALL: [LogLevel; 4] = [
        LogLevel::Debug,
        LogLevel::Info,
        LogLevel::Warn,
        LogLevel::Error,
    ];

    /// The export name of the level.
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    fn function(self) -> NativeFunction {
        match self {
            LogLevel::Debug => NativeFunction::from_fn_ptr(log_debug),
            LogLevel::Info => NativeFunction::from_fn_ptr(log_info),
            LogLevel::Warn => NativeFunction::from_fn_ptr(log_warn),
            LogLevel::Error => NativeFunction::from_fn_ptr(log_error),
        }
    }
}

/// Host implementation of the `log` module.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogModule;

impl NativeModule for LogModule {
    fn instantiate(&self, context: &mut Context) -> JsResult<ModuleExports> {
        let functions: Vec<(LogLevel, JsValue)> = LogLevel::ALL
            .into_iter()
            .map(|level| {
                let function = FunctionObjectBuilder::new(context.realm(), level.function())
                    .name(JsString::from(level.as_str()))
                    .length(0)
                    .build();
                (level, JsValue::from(function))
            })
            .collect();

        let mut object = ObjectInitializer::new(context);
        for (level, function) in &functions {
            object.property(
                JsString::from(level.as_str()),
                function.clone(),
                Attribute::all(),
            );
        }
        let default = JsValue::from(object.build());

        Ok(functions
            .into_iter()
            .fold(ModuleExports::with_default(default), |exports, (level, function)| {
                exports.with_named(level.as_str(), function)
            }))
    }
}

/// Emit one guest log event.
pub fn emit(level: LogLevel, message: &str) {
    match level {
        LogLevel::Debug => debug!(guest_log = true, "{}", message),
        LogLevel::Info => info!(guest_log = true, "{}", message),
        LogLevel::Warn => warn!(guest_log = true, "{}", message),
        LogLevel::Error => error!(guest_log = true, "{}", message),
    }
}

fn message(args: &[JsValue], context: &mut Context) -> String {
    args.iter()
        .map(|arg| describe(arg, context))
        .collect::<Vec<_>>()
        .join(" ")
}

fn log_with(level: LogLevel, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    emit(level, &message(args, context));
    Ok(JsValue::undefined())
}

fn log_debug(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    log_with(LogLevel::Debug, args, context)
}

fn log_info(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    log_with(LogLevel::Info, args, context)
}

fn log_warn(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    log_with(LogLevel::Warn, args, context)
}

fn log_error(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    log_with(LogLevel::Error, args, context)
}
