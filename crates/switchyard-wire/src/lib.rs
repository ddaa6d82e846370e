//! Shared wire protocol types for the switchyard dispatch layer.
//!
//! This crate defines the request and response envelopes exchanged between
//! transport adapters and a dispatch service, together with the numeric error
//! codes that must be reproduced exactly for wire compatibility. It carries
//! no dispatch logic of its own; both the core crate and external transport
//! adapters depend on these types.

pub mod codes;
mod request;
mod response;

pub use self::request::WireRequest;
pub use self::response::{WireError, WireResponse};
