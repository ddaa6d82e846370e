//! Request envelope deserialization.

use serde::Deserialize;
use serde_json::Value;

/// Parsed request envelope handed to a dispatch service.
///
/// The `method` field is kept as an untyped [`Value`] rather than a `String`:
/// a request whose method is not a string is a well-formed envelope that
/// fails *resolution*, not a parse failure. The `id` and `protocol` fields
/// are opaque correlation data echoed back unchanged in the response.
#[derive(Debug, Clone, Deserialize)]
pub struct WireRequest {
    /// Name of the operation to invoke. Any JSON value is accepted here;
    /// non-string values are rejected during method resolution.
    #[serde(default)]
    pub method: Value,
    /// Ordered positional parameters. Defaults to an empty list.
    #[serde(default)]
    pub params: Vec<Value>,
    /// Opaque correlation token. `Null` when the caller omitted it.
    #[serde(default)]
    pub id: Value,
    /// Opaque protocol version tag (the `jsonrpc` field on the wire).
    #[serde(default, rename = "jsonrpc")]
    pub protocol: Value,
}

impl WireRequest {
    /// Builds a request for the given method and parameters with no
    /// correlation data. Primarily useful for in-process callers and tests.
    #[must_use]
    pub fn new(method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            method: Value::String(method.into()),
            params,
            id: Value::Null,
            protocol: Value::Null,
        }
    }

    /// Returns the method name when it is a string.
    #[must_use]
    pub fn method_name(&self) -> Option<&str> {
        self.method.as_str()
    }
}
