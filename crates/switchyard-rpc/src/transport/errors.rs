//! Error types for transport listener operations.

use std::io;

use thiserror::Error;

/// Errors surfaced while binding or running the socket listener.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The TCP socket could not be bound.
    #[error("failed to bind listener at {addr}: {source}")]
    Bind {
        /// Address that was requested.
        addr: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The bound address could not be read back.
    #[error("failed to read bound address: {source}")]
    LocalAddr {
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// `start` was called on a listener that is already serving.
    #[error("listener is already started")]
    AlreadyStarted,

    /// The accept-loop task panicked.
    #[error("listener task panicked")]
    TaskPanic,
}
