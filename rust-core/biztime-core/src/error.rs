//! # Error Handling
//!
//! Centralized error types for BizTime core.
//! Uses `thiserror` for ergonomic error definitions.
//!
//! Every failure a handler can produce is one of these variants. The server
//! renders them through [`ErrorEnvelope`], so a client always receives
//! `{ "error": { "message", "status" }, "message": ... }`.

use serde::Serialize;
use thiserror::Error;

/// Result type alias for BizTime operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for the BizTime runtime
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed, missing or oversized input, caught before storage access
    #[error("{message}")]
    Validation {
        /// Human-readable reason
        message: String,
    },

    /// The query returned zero rows
    #[error("{message}")]
    NotFound {
        /// Human-readable reason
        message: String,
    },

    /// A uniqueness constraint was violated
    #[error("{message}")]
    Conflict {
        /// Human-readable reason
        message: String,
    },

    /// The storage engine failed or was unreachable
    #[error("{message}")]
    Storage {
        /// Human-readable reason, prefixed with the failed operation
        message: String,
    },

    /// Database bootstrapping failed; the process must not serve traffic
    #[error("Bootstrap failed during {step}: {message}")]
    Bootstrap {
        /// Bootstrap step that failed
        step: &'static str,
        /// Error message from the engine
        message: String,
    },

    /// Server failed to bind to the specified address
    #[error("Failed to bind server to {address}: {source}")]
    BindError {
        /// The address we tried to bind to
        address: String,
        /// The underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Router failed to match the requested path
    #[error("Not Found")]
    RouteNotFound {
        /// The path that wasn't matched
        path: String,
    },

    /// Invalid route pattern provided
    #[error("Invalid route pattern: {pattern}: {reason}")]
    InvalidRoutePattern {
        /// The invalid pattern
        pattern: String,
        /// Reason for invalidity
        reason: String,
    },

    /// HTTP protocol error
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Request payload too large
    #[error("Payload too large: limit={limit} bytes, received={actual} bytes")]
    PayloadTooLarge {
        /// Max allowed size
        limit: usize,
        /// Actual size
        actual: usize,
    },
}

impl Error {
    /// Build a validation (400) error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Build a not-found (404) error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Build a conflict (400) error
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Build a storage (500) error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// HTTP status this error renders with
    #[must_use]
    pub const fn status(&self) -> u16 {
        match self {
            Self::Validation { .. } | Self::Conflict { .. } => 400,
            Self::NotFound { .. } | Self::RouteNotFound { .. } => 404,
            Self::PayloadTooLarge { .. } => 413,
            _ => ErrorEnvelope::DEFAULT_STATUS,
        }
    }

    /// Convert into the wire envelope
    #[must_use]
    pub fn envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope::new(self.to_string(), self.status())
    }
}

/// Uniform error carrier rendered as the JSON error response
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorEnvelope {
    /// Human-readable message
    pub message: String,
    /// HTTP status code
    pub status: u16,
}

impl ErrorEnvelope {
    /// Status used when nothing more specific is known
    pub const DEFAULT_STATUS: u16 = 500;

    /// Create an envelope with an explicit status
    pub fn new(message: impl Into<String>, status: u16) -> Self {
        Self {
            message: message.into(),
            status,
        }
    }

    /// JSON error body: `{ "error": <envelope>, "message": <message> }`
    #[must_use]
    pub fn to_body(&self) -> serde_json::Value {
        serde_json::json!({
            "error": self,
            "message": self.message,
        })
    }
}

impl From<&Error> for ErrorEnvelope {
    fn from(err: &Error) -> Self {
        err.envelope()
    }
}
