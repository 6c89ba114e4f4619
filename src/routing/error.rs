//! Routing error types

use hyper::Method;
use std::fmt;

/// Errors raised while registering a route
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    InvalidPattern { pattern: String, reason: String },
    Conflict { method: Method, pattern: String },
}

impl fmt::Display for RouteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPattern { pattern, reason } => {
                write!(f, "Invalid route pattern '{pattern}': {reason}")
            }
            Self::Conflict { method, pattern } => {
                write!(
                    f,
                    "Route {method} {pattern} conflicts with an already registered route"
                )
            }
        }
    }
}

impl std::error::Error for RouteError {}

/// Failure reported by a route handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handler failed: {}", self.message)
    }
}

impl std::error::Error for HandlerError {}

/// Errors raised while dispatching a request
#[derive(Debug)]
pub enum DispatchError {
    /// No registered route matches the method and path
    NotFound { method: Method, path: String },
    /// The matched handler failed
    Handler(HandlerError),
    /// The handler's reply could not be serialized
    Serialize(serde_json::Error),
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { method, path } => write!(f, "No route for {method} {path}"),
            Self::Handler(e) => write!(f, "{e}"),
            Self::Serialize(e) => write!(f, "Failed to serialize reply: {e}"),
        }
    }
}

impl std::error::Error for DispatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::NotFound { .. } => None,
            Self::Handler(e) => Some(e),
            Self::Serialize(e) => Some(e),
        }
    }
}

impl From<HandlerError> for DispatchError {
    fn from(e: HandlerError) -> Self {
        Self::Handler(e)
    }
}

impl From<serde_json::Error> for DispatchError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialize(e)
    }
}
