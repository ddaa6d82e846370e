//! Error types for method registration and request dispatch.
//!
//! [`DispatchError`] is the wire-facing taxonomy: every variant maps to one
//! of the fixed numeric codes clients rely on. [`RegistryError`] covers
//! construction-time failures (method-table registration and service
//! composition) that never reach the wire.

use thiserror::Error;

use switchyard_wire::{WireError, codes};

/// Errors surfaced while dispatching a request.
///
/// The variants deliberately mirror the wire taxonomy rather than the
/// internal failure cause: a deny-listed method and a genuinely absent one
/// produce the same [`DispatchError::MethodNotFound`] so callers cannot
/// probe for disallowed operations.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The request body could not be parsed into a request envelope.
    #[error("malformed request: {message}")]
    Protocol {
        /// Description of the parse failure.
        message: String,
        /// Underlying JSON error, when parsing produced one.
        #[source]
        source: Option<serde_json::Error>,
    },

    /// The method is unknown, reserved, non-callable, or disallowed.
    #[error("method not found: {method}")]
    MethodNotFound {
        /// The method value the caller supplied, rendered for logging.
        method: String,
    },

    /// The handler method itself raised a fault.
    #[error("{message}")]
    Application {
        /// Fault message, preserved verbatim from the handler.
        message: String,
    },

    /// Any other fault inside the dispatch pipeline.
    #[error("internal dispatch error: {message}")]
    Internal {
        /// Description kept for logs; never sent on the wire.
        message: String,
    },
}

impl DispatchError {
    /// Returns the numeric wire code for this error.
    #[must_use]
    pub fn code(&self) -> i32 {
        match self {
            Self::Protocol { .. } => codes::PARSE_ERROR,
            Self::MethodNotFound { .. } => codes::METHOD_NOT_FOUND,
            Self::Application { .. } => codes::APPLICATION_ERROR,
            Self::Internal { .. } => codes::INTERNAL_ERROR,
        }
    }

    /// Builds the wire error payload for this failure.
    ///
    /// Application fault messages pass through verbatim; resolution and
    /// internal failures use generic messages so the wire leaks neither the
    /// failure cause nor pipeline detail.
    #[must_use]
    pub fn wire_error(&self) -> WireError {
        let message = match self {
            Self::Protocol { message, .. } => format!("parse error: {message}"),
            Self::MethodNotFound { .. } => "method not found".to_owned(),
            Self::Application { message } => message.clone(),
            Self::Internal { .. } => "internal error".to_owned(),
        };
        WireError::new(self.code(), message)
    }

    /// Creates a protocol error with a custom message.
    #[must_use]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a protocol error from a JSON parse failure.
    #[must_use]
    pub fn from_json_error(source: serde_json::Error) -> Self {
        Self::Protocol {
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Creates a method-not-found error.
    #[must_use]
    pub fn method_not_found(method: impl Into<String>) -> Self {
        Self::MethodNotFound {
            method: method.into(),
        }
    }

    /// Creates an application error carrying the handler's message verbatim.
    #[must_use]
    pub fn application(message: impl Into<String>) -> Self {
        Self::Application {
            message: message.into(),
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Fault raised by a handler method.
///
/// The message is forwarded to callers verbatim: many handler faults (such
/// as "duplicate entry") are expected, caller-recoverable conditions.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct MethodFault {
    message: String,
}

impl MethodFault {
    /// Creates a fault with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the fault message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<DispatchError> for MethodFault {
    /// Converts a forwarded dispatch failure into a handler fault.
    ///
    /// Application messages are preserved verbatim so they survive an
    /// aggregation hop unchanged; other failures use their display form.
    fn from(error: DispatchError) -> Self {
        match error {
            DispatchError::Application { message } => Self { message },
            other => Self {
                message: other.to_string(),
            },
        }
    }
}

/// Fault raised by a liveness probe.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct HealthFault {
    message: String,
}

impl HealthFault {
    /// Creates a fault with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the fault message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors raised while building a method table or composing services.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A method was registered with an empty name.
    #[error("method name must not be empty")]
    EmptyMethodName,

    /// A method was registered under the reserved construction name.
    #[error("method name '{name}' is reserved")]
    ReservedMethodName {
        /// The rejected name.
        name: String,
    },

    /// A method name was registered twice on the same table.
    #[error("method '{name}' is already registered")]
    DuplicateMethodName {
        /// The rejected name.
        name: String,
    },

    /// A service was composed under an empty namespace.
    #[error("namespace must not be empty")]
    EmptyNamespace,
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::protocol(DispatchError::protocol("bad body"), codes::PARSE_ERROR)]
    #[case::not_found(DispatchError::method_not_found("missing"), codes::METHOD_NOT_FOUND)]
    #[case::application(DispatchError::application("duplicate entry"), codes::APPLICATION_ERROR)]
    #[case::internal(DispatchError::internal("lock poisoned"), codes::INTERNAL_ERROR)]
    fn wire_codes_are_fixed(#[case] error: DispatchError, #[case] code: i32) {
        assert_eq!(error.code(), code);
        assert_eq!(error.wire_error().code, code);
    }

    #[test]
    fn application_message_passes_through_verbatim() {
        let error = DispatchError::application("duplicate entry");
        assert_eq!(error.wire_error().message, "duplicate entry");
    }

    #[test]
    fn internal_wire_message_is_generic() {
        let error = DispatchError::internal("converter panicked on shape {a,b}");
        assert_eq!(error.wire_error().message, "internal error");
    }

    #[test]
    fn method_not_found_wire_message_hides_cause() {
        let denied = DispatchError::method_not_found("secret_wipe");
        let absent = DispatchError::method_not_found("no_such_method");
        assert_eq!(denied.wire_error().message, absent.wire_error().message);
    }

    #[test]
    fn fault_conversion_preserves_application_message() {
        let fault = MethodFault::from(DispatchError::application("duplicate entry"));
        assert_eq!(fault.message(), "duplicate entry");
    }

    #[test]
    fn parse_failures_carry_their_source() {
        let source = serde_json::from_str::<serde_json::Value>("not json")
            .expect_err("invalid json should fail");
        let error = DispatchError::from_json_error(source);
        assert!(matches!(error, DispatchError::Protocol { source: Some(_), .. }));
    }
}
