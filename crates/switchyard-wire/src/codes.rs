//! Wire error codes.
//!
//! The codes follow the JSON-RPC 2.0 convention and must not change: clients
//! match on them to distinguish protocol faults from business faults.

/// The request body could not be parsed.
pub const PARSE_ERROR: i32 = -32700;

/// The requested method is unknown, disallowed, or not callable.
///
/// The four underlying causes (absent, reserved, non-string, deny-listed)
/// deliberately share one code so callers cannot probe for the existence of
/// disallowed operations.
pub const METHOD_NOT_FOUND: i32 = -32601;

/// The handler method itself raised a fault.
pub const APPLICATION_ERROR: i32 = -32000;

/// Any other internal fault during dispatch or transport.
pub const INTERNAL_ERROR: i32 = -32603;
