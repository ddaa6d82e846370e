//! JSONL socket transport for a dispatch service.
//!
//! The transport binds one TCP socket per listener, accepts connections in a
//! background task, and answers request lines through the reply layer until
//! the peer closes its connection. Binding and starting are separate steps so embedders can
//! learn the bound address before accepting traffic; starting an
//! already-started listener fails loudly rather than silently rebinding.

mod errors;
mod listener;

pub use self::errors::ListenerError;
pub use self::listener::{ListenerHandle, MAX_REQUEST_BYTES, RpcListener};

const LISTENER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");
