//! Error types for the DIM client
//!
//! This module defines all error types used throughout the workspace.
//! Every fault is surfaced once to the immediate caller; nothing here
//! retries or swallows.

use thiserror::Error;

/// Result type alias for DIM operations
pub type Result<T> = std::result::Result<T, Error>;

/// Remote error code reserved by DIM for "entity not found"
pub const NOT_FOUND_CODE: i64 = 1;

/// Network or HTTP-layer failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportFault {
    /// The caller's cancellation token fired while the request was in flight
    #[error("canceled")]
    Canceled,

    /// The request did not complete within the configured timeout
    #[error("timed out")]
    Timeout,

    /// Non-2xx HTTP response
    #[error("status: {status}, body: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Raw response body
        body: String,
    },

    /// The login response carried no `session` cookie
    #[error("could not obtain session: {0}")]
    NoSession(String),

    /// Connection, TLS or body read failure
    #[error("{0}")]
    Request(String),
}

/// Core error type for the DIM client
#[derive(Error, Debug)]
pub enum Error {
    /// Missing credentials or token; raised before any network access
    #[error("Authentication configuration error: {0}")]
    AuthConfig(String),

    /// Other configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network/HTTP-layer failure, including cancellation and non-2xx status
    #[error("could not perform DIM request {method}, {fault}")]
    Transport {
        /// Method that was called, or "login"
        method: String,
        /// What went wrong on the wire
        #[source]
        fault: TransportFault,
    },

    /// Response body did not parse as a JSON-RPC envelope
    #[error(
        "could not unmarshal DIM response to {method} (is the endpoint URL correct and the session valid?): {message}"
    )]
    Decode {
        /// Method that was called
        method: String,
        /// Parser message
        message: String,
    },

    /// The service explicitly rejected the call
    #[error("{method} error ({code}): {message}")]
    Remote {
        /// Method that was called
        method: String,
        /// Remote error code, verbatim
        code: i64,
        /// Remote error message, verbatim
        message: String,
    },

    /// Identifier string malformed
    #[error("ID is not in expected format: {0}")]
    Format(String),

    /// A tracked entity no longer corresponds to its identifier
    #[error("ID has changed, old={old}, new={new}")]
    Drifted {
        /// Identifier held by the caller
        old: String,
        /// Identifier recomputed from fetched attributes
        new: String,
    },

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A dynamically typed result did not have the expected shape
    #[error("unexpected result shape: {0}")]
    UnexpectedShape(String),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create an authentication configuration error
    pub fn auth_config(msg: impl Into<String>) -> Self {
        Self::AuthConfig(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an identifier format error
    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create an unexpected shape error
    pub fn unexpected_shape(msg: impl Into<String>) -> Self {
        Self::UnexpectedShape(msg.into())
    }

    /// Create a transport error for `method`
    pub fn transport(method: impl Into<String>, fault: TransportFault) -> Self {
        Self::Transport {
            method: method.into(),
            fault,
        }
    }

    /// Transport fault, if this is a transport error
    pub fn transport_fault(&self) -> Option<&TransportFault> {
        match self {
            Self::Transport { fault, .. } => Some(fault),
            _ => None,
        }
    }

    /// Create a decode error for `method`
    pub fn decode(method: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            method: method.into(),
            message: message.into(),
        }
    }

    /// Create a remote error
    pub fn remote(method: impl Into<String>, code: i64, message: impl Into<String>) -> Self {
        Self::Remote {
            method: method.into(),
            code,
            message: message.into(),
        }
    }

    /// Remote error code, if this is a remote fault
    pub fn remote_code(&self) -> Option<i64> {
        match self {
            Self::Remote { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Whether this is the remote "entity not found" sentinel
    pub fn is_not_found(&self) -> bool {
        self.remote_code() == Some(NOT_FOUND_CODE)
    }

    /// Whether the failure came from the caller canceling the request
    pub fn is_canceled(&self) -> bool {
        matches!(self.transport_fault(), Some(TransportFault::Canceled))
    }
}
