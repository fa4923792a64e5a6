//! Error types shared by the controller, the session sources and the alert
//! layer.

use thiserror::Error;

use crate::session::SessionId;

/// Errors reported by an OS session source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Enumerating the OS sessions failed.
    #[error("session enumeration failed: {0}")]
    Enumeration(String),

    /// Subscribing to session notifications failed.
    #[error("session notification subscription failed: {0}")]
    Subscription(String),

    /// The source does not know the requested session.
    #[error("session {0} is not known to the session source")]
    UnknownSession(SessionId),
}

/// Error while reading a single session attribute.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    /// The attribute is not available for this session.
    #[error("attribute '{0}' is unavailable")]
    Unavailable(&'static str),

    /// The underlying query failed.
    #[error("failed to read '{attribute}': {message}")]
    Failed {
        /// Name of the attribute being read.
        attribute: &'static str,
        /// Description of the failure.
        message: String,
    },
}

/// Errors returned by [`Controller`](crate::controller::Controller) operations.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// The OS session source failed; monitoring was not started.
    #[error("session source error: {0}")]
    Source(#[from] SourceError),

    /// `activate()` was called outside of a tokio runtime.
    #[error("the session monitor requires a tokio runtime")]
    NoRuntime,

    /// The monitor task terminated abnormally.
    #[error("session monitor task failed: {0}")]
    Monitor(String),
}

/// Error returned by an event handler.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    /// Creates a handler error from any displayable message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<ProbeError> for HandlerError {
    fn from(err: ProbeError) -> Self {
        Self(err.to_string())
    }
}
