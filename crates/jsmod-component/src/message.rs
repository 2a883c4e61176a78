//! Messages exchanged on the component's channels.
//!
//! Payloads are opaque JSON. The correlation `context` of a request is
//! copied verbatim into whatever the request emits.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Channel receiving [`Request`] messages.
pub const REQUEST_PORT: &str = "request";
/// Channel emitting [`Response`] messages.
pub const RESPONSE_PORT: &str = "response";
/// Channel emitting [`ErrorMessage`] messages, when enabled.
pub const ERROR_PORT: &str = "error";
/// Channel receiving settings.
pub const SETTINGS_PORT: &str = "settings";

/// An invocation request.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    /// Correlation context, echoed back unchanged.
    #[serde(default)]
    pub context: Value,

    /// Argument for the handler. Absent means `undefined`, while an
    /// explicit `null` is passed as `null`.
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub input_data: Option<Value>,
}

fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl Request {
    /// Create a request.
    pub fn new(context: Value, input_data: Option<Value>) -> Self {
        Self {
            context,
            input_data,
        }
    }
}

/// A successful invocation result.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    /// Correlation context of the request.
    pub context: Value,
    /// The unwrapped handler result.
    pub output_data: Value,
}

/// A failed invocation, routed to the error channel.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ErrorMessage {
    /// Correlation context of the request.
    pub context: Value,
    /// The error rendered as text.
    pub error: String,
}

/// Exactly one message emitted per handled request.
#[derive(Debug, Clone, PartialEq)]
pub enum Emission {
    Response(Response),
    Error(ErrorMessage),
}

impl Emission {
    /// The channel this emission goes to.
    pub fn port(&self) -> &'static str {
        match self {
            Emission::Response(_) => RESPONSE_PORT,
            Emission::Error(_) => ERROR_PORT,
        }
    }

    /// The message as JSON.
    pub fn to_json(&self) -> Value {
        let result = match self {
            Emission::Response(response) => serde_json::to_value(response),
            Emission::Error(error) => serde_json::to_value(error),
        };
        // Both message types are plain JSON trees.
        result.unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_request_wire_format() {
        let request: Request =
            serde_json::from_value(json!({"context": {"id": 7}, "inputData": "hello"})).unwrap();
        assert_eq!(
            request,
            Request::new(json!({"id": 7}), Some(json!("hello")))
        );

        let request: Request = serde_json::from_value(json!({})).unwrap();
        assert_eq!(request.context, Value::Null);
        assert!(request.input_data.is_none());
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"context": null})
        );
    }

    #[test]
    fn test_explicit_null_input_is_kept() {
        let request: Request = serde_json::from_value(json!({"inputData": null})).unwrap();
        assert_eq!(request.input_data, Some(Value::Null));

        let wire = serde_json::to_value(&request).unwrap();
        assert_eq!(wire, json!({"context": null, "inputData": null}));
    }

    #[test]
    fn test_emission_routing() {
        let response = Emission::Response(Response {
            context: json!("c"),
            output_data: json!(34),
        });
        assert_eq!(response.port(), "response");
        assert_eq!(
            response.to_json(),
            json!({"context": "c", "outputData": 34})
        );

        let error = Emission::Error(ErrorMessage {
            context: json!("c"),
            error: "boom".to_string(),
        });
        assert_eq!(error.port(), "error");
        assert!(matches!(error, Emission::Error(_)));
        assert_eq!(error.to_json(), json!({"context": "c", "error": "boom"}));
    }
}
