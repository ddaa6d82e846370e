//! Request-to-response mapping for transport adapters.
//!
//! Every adapter, in-process or remote, funnels through this module: a raw
//! request body is parsed (malformed bodies become parse errors before any
//! dispatch runs), dispatched against a service, and mapped into a response
//! envelope that always echoes the request's correlation data. No dispatch
//! path terminates in an unguarded fault; every outcome is a
//! [`WireResponse`].

use serde_json::Value;
use tracing::{debug, warn};

use switchyard_wire::{WireRequest, WireResponse};

use crate::errors::DispatchError;
use crate::service::Service;

/// Tracing target for the reply layer.
const REPLY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::reply");

/// Parses a raw request body into a request envelope.
///
/// Surrounding whitespace is trimmed first, so JSONL transports can hand
/// over whole lines.
///
/// # Errors
///
/// Returns [`DispatchError::Protocol`] when the body is empty, not valid
/// JSON, or not a request object.
pub fn parse_request(body: &[u8]) -> Result<WireRequest, DispatchError> {
    let trimmed = body.trim_ascii();
    if trimmed.is_empty() {
        return Err(DispatchError::protocol("empty request body"));
    }
    serde_json::from_slice(trimmed).map_err(DispatchError::from_json_error)
}

/// Dispatches a parsed request and maps the outcome onto the wire.
///
/// The request's `id` and protocol tag are echoed unchanged in both the
/// success and the failure shape.
pub async fn respond(service: &Service, request: WireRequest) -> WireResponse {
    let WireRequest {
        method,
        params,
        id,
        protocol,
    } = request;

    let outcome = match method.as_str() {
        Some(name) => {
            debug!(target: REPLY_TARGET, method = name, "dispatching request");
            service.call(name, params).await
        }
        None => Err(DispatchError::method_not_found(method.to_string())),
    };

    match outcome {
        Ok(result) => WireResponse::success(protocol, id, result),
        Err(error) => {
            warn!(target: REPLY_TARGET, %error, "dispatch failed");
            WireResponse::failure(protocol, id, error.wire_error())
        }
    }
}

/// Parses and dispatches a raw request body.
///
/// Parse failures produce a failure response with null correlation data,
/// since a body that never parsed has no `id` to echo.
pub async fn respond_bytes(service: &Service, body: &[u8]) -> WireResponse {
    match parse_request(body) {
        Ok(request) => respond(service, request).await,
        Err(error) => {
            warn!(target: REPLY_TARGET, %error, "malformed request");
            WireResponse::failure(Value::Null, Value::Null, error.wire_error())
        }
    }
}

/// Evaluates a service's liveness as a bare status signal.
///
/// Any probe fault is swallowed and reported as unhealthy; liveness
/// endpoints expose only this boolean, never a structured body.
pub async fn health_status(service: &Service) -> bool {
    service.is_healthy().await.unwrap_or_else(|fault| {
        warn!(target: REPLY_TARGET, error = %fault, "liveness probe faulted");
        false
    })
}
