//! Conversion between host values and engine values.
//!
//! Host payloads are `serde_json::Value`. On the engine side a value is
//! classified into a [`ScriptValue`] so promise unwrapping is an explicit
//! match rather than a chain of type checks.

use boa_engine::builtins::promise::PromiseState;
use boa_engine::object::builtins::JsPromise;
use boa_engine::{Context, JsError, JsNativeError, JsObject, JsResult, JsValue, js_string};
use serde_json::Value;

use jsmod_common::RuntimeError;

/// An engine value, tagged by what the invocation wrapper does with it.
#[derive(Debug, Clone)]
pub enum ScriptValue {
    /// A callable object.
    Callable(JsObject),
    /// A promise (settled or not).
    Promise(JsPromise),
    /// Anything else.
    Plain(JsValue),
}

impl ScriptValue {
    /// Classify `value`.
    pub fn classify(value: JsValue) -> Self {
        let Some(object) = value.as_object().map(|o| JsObject::clone(&o)) else {
            return ScriptValue::Plain(value);
        };

        if object.is_callable() {
            return ScriptValue::Callable(object);
        }

        match JsPromise::from_object(object) {
            Ok(promise) => ScriptValue::Promise(promise),
            Err(_) => ScriptValue::Plain(value),
        }
    }
}

/// Collapse a chain of promises into its terminal value.
///
/// The job queue is not drained here; a promise that is still pending is an
/// invocation error.
///
/// # Errors
///
/// Returns [`RuntimeError::Invocation`] if any promise in the chain rejected
/// or is still pending.
pub fn settle(value: JsValue, context: &mut Context) -> Result<JsValue, RuntimeError> {
    let mut current = value;
    loop {
        let ScriptValue::Promise(promise) = ScriptValue::classify(current.clone()) else {
            return Ok(current);
        };

        match promise.state() {
            PromiseState::Fulfilled(next) => current = next,
            PromiseState::Rejected(reason) => {
                return Err(RuntimeError::invocation(describe(&reason, context)));
            }
            PromiseState::Pending => {
                return Err(RuntimeError::invocation("promise did not settle"));
            }
        }
    }
}

/// Render a value as text, the way `String(value)` would.
pub fn describe(value: &JsValue, context: &mut Context) -> String {
    value
        .to_string(context)
        .map_or_else(
            |_| value.display().to_string(),
            |s| s.to_std_string_escaped(),
        )
}

/// Render a thrown error as text.
pub fn describe_error(err: &JsError, context: &mut Context) -> String {
    match err.try_native(context) {
        Ok(native) => native.to_string(),
        Err(_) => describe(&err.to_opaque(context), context),
    }
}

/// Convert a host payload into an engine value. `None` becomes `undefined`.
///
/// # Errors
///
/// Returns [`RuntimeError::Invocation`] if the payload cannot be represented.
pub fn import(input: Option<&Value>, context: &mut Context) -> Result<JsValue, RuntimeError> {
    match input {
        None => Ok(JsValue::undefined()),
        Some(value) => JsValue::from_json(value, context)
            .map_err(|err| RuntimeError::invocation(describe_error(&err, context))),
    }
}

/// Convert an engine value into a host payload.
///
/// Follows `JSON.stringify`: `undefined`, functions and symbols export as
/// `null` at the top level and inside arrays, and are left out of objects.
/// Integral numbers export as JSON integers.
///
/// # Errors
///
/// Returns [`RuntimeError::Invocation`] if the value has no JSON form
/// (cyclic objects, `BigInt`).
pub fn export(value: &JsValue, context: &mut Context) -> Result<Value, RuntimeError> {
    let text = stringify(value, context)
        .map_err(|err| RuntimeError::invocation(describe_error(&err, context)))?;

    match text {
        None => Ok(Value::Null),
        Some(text) => serde_json::from_str(&text)
            .map_err(|e| RuntimeError::invocation(format!("Invalid JSON result: {e}"))),
    }
}

fn stringify(value: &JsValue, context: &mut Context) -> JsResult<Option<String>> {
    let json = context
        .global_object()
        .get(js_string!("JSON"), context)?
        .to_object(context)?;
    let stringify = json.get(js_string!("stringify"), context)?;
    let Some(stringify) = stringify.as_callable() else {
        return Err(JsNativeError::typ()
            .with_message("JSON.stringify is not callable")
            .into());
    };

    let text = stringify.call(&JsValue::from(json), &[value.clone()], context)?;
    if text.is_undefined() {
        return Ok(None);
    }
    Ok(Some(text.to_string(context)?.to_std_string_escaped()))
}
