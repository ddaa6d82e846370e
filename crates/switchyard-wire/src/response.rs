//! Response envelope serialization.

use serde::Serialize;
use serde_json::Value;

/// Structured error payload carried in a failure response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WireError {
    /// Numeric error code (see [`crate::codes`]).
    pub code: i32,
    /// Human-readable error message.
    pub message: String,
}

impl WireError {
    /// Creates an error payload.
    #[must_use]
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Response envelope returned for every dispatched request.
///
/// Exactly one of `result` and `error` is set. The `id` field is always
/// emitted, even when the request carried none (it echoes as `null`); the
/// protocol tag is echoed only when the request carried one.
#[derive(Debug, Clone, Serialize)]
pub struct WireResponse {
    /// Protocol version tag echoed from the request.
    #[serde(rename = "jsonrpc", skip_serializing_if = "Value::is_null")]
    pub protocol: Value,
    /// Correlation token echoed from the request.
    pub id: Value,
    /// Successful result value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Failure payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<WireError>,
}

impl WireResponse {
    /// Creates a success response echoing the given correlation data.
    #[must_use]
    pub fn success(protocol: Value, id: Value, result: Value) -> Self {
        Self {
            protocol,
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Creates a failure response echoing the given correlation data.
    #[must_use]
    pub fn failure(protocol: Value, id: Value, error: WireError) -> Self {
        Self {
            protocol,
            id,
            result: None,
            error: Some(error),
        }
    }

    /// Returns `true` when the response carries a result.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.result.is_some()
    }
}
