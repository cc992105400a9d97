//! Error type definitions.
//!
//! This module defines the closed set of failures a network operation can
//! report, the transport-level error kinds beneath them, and the errors raised
//! while constructing sessions and operations.

use log::SetLoggerError;
use reqwest::Error as ReqwestError;
use reqwest::StatusCode;
use strum_macros::EnumIter as EnumIterMacro;
use thiserror::Error;

/// Error types for initialization failures.
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)] // All variants end with "Error" by convention
pub enum InitializationError {
    /// Error initializing the logger.
    #[error("Logger initialization error: {0}")]
    LoggerError(#[from] SetLoggerError),

    /// Error initializing the HTTP client.
    #[error("HTTP client initialization error: {0}")]
    HttpClientError(#[from] ReqwestError),

    /// Error building the TLS client configuration.
    #[error("TLS configuration error: {0}")]
    TlsConfigError(#[from] rustls::Error),
}

/// Errors raised when a network operation is constructed with an invalid configuration.
///
/// An operation that fails construction never exists, so no attempt is ever started
/// and no callback is ever invoked.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OperationError {
    /// The retry budget must allow at least one retry.
    #[error("max_retries must be at least 1 (got {0})")]
    InvalidRetryBudget(u32),
}

/// Transport-level failure kinds.
///
/// Each kind carries a fixed retryability classification: transient network
/// faults are retried, deterministic failures (TLS, redirects, a closed session)
/// are not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro)]
pub enum TransportErrorKind {
    /// The request or a body read exceeded its timeout.
    TimedOut,
    /// The connection dropped mid-exchange (reset, aborted, unexpected EOF).
    ConnectionLost,
    /// A connection to the host could not be established.
    CannotConnect,
    /// The hostname could not be resolved.
    DnsFailure,
    /// The TLS handshake failed for a reason other than trust evaluation.
    TlsHandshake,
    /// The trust evaluator rejected the server's certificate chain.
    TlsTrustRejected,
    /// The redirect limit was exceeded.
    TooManyRedirects,
    /// The session no longer accepts new attempts.
    SessionInvalidated,
    /// Any transport failure not covered above.
    Unknown,
}

impl TransportErrorKind {
    /// Whether an attempt that failed with this kind may be retried.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            TransportErrorKind::TimedOut
                | TransportErrorKind::ConnectionLost
                | TransportErrorKind::CannotConnect
                | TransportErrorKind::DnsFailure
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransportErrorKind::TimedOut => "timed out",
            TransportErrorKind::ConnectionLost => "connection lost",
            TransportErrorKind::CannotConnect => "cannot connect to host",
            TransportErrorKind::DnsFailure => "DNS lookup failed",
            TransportErrorKind::TlsHandshake => "TLS handshake failed",
            TransportErrorKind::TlsTrustRejected => "TLS server trust rejected",
            TransportErrorKind::TooManyRedirects => "too many redirects",
            TransportErrorKind::SessionInvalidated => "session invalidated",
            TransportErrorKind::Unknown => "unknown transport error",
        }
    }
}

impl std::fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified transport failure together with the underlying cause.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct TransportError {
    /// Classification of the failure.
    pub kind: TransportErrorKind,
    /// Description of the underlying cause, kept for diagnostics.
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

/// Classified failure delivered in a terminal payload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    /// The transport produced something that is not a well-formed HTTP response.
    #[error("Invalid response: not a well-formed HTTP response")]
    InvalidResponse,

    /// The response body is empty but the request method requires one.
    #[error("No response data")]
    NoResponseData,

    /// The endpoint answered with a status of 400 or above.
    ///
    /// The body is captured so server-provided diagnostics can be inspected.
    #[error("Endpoint error: HTTP {status}")]
    EndpointError {
        /// Response status.
        status: StatusCode,
        /// Response body, possibly empty.
        body: Vec<u8>,
    },

    /// A transport-level failure.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The operation was cancelled before it finished.
    #[error("Operation cancelled")]
    Cancelled,

    /// Retryable transport failures persisted past the retry budget.
    #[error("Retry budget exhausted after {retries} retries (last error: {last})")]
    RetryBudgetExhausted {
        /// Number of retries spent.
        retries: u32,
        /// The transport failure of the final attempt.
        last: TransportError,
    },

    /// Any other failure, e.g. a request that could not be built.
    #[error("{0}")]
    Other(String),
}

impl NetworkError {
    /// Whether this failure may be retried automatically.
    ///
    /// Only transport errors of a retryable kind qualify; endpoint errors,
    /// malformed responses and cancellation are always terminal.
    pub fn is_retryable(&self) -> bool {
        match self {
            NetworkError::Transport(error) => error.is_retryable(),
            NetworkError::InvalidResponse
            | NetworkError::NoResponseData
            | NetworkError::EndpointError { .. }
            | NetworkError::Cancelled
            | NetworkError::RetryBudgetExhausted { .. }
            | NetworkError::Other(_) => false,
        }
    }

    /// Returns the transport error kind, if this is a transport failure.
    pub fn transport_kind(&self) -> Option<TransportErrorKind> {
        match self {
            NetworkError::Transport(error) => Some(error.kind),
            _ => None,
        }
    }

    /// Returns the HTTP status for endpoint errors.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            NetworkError::EndpointError { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Free-function form of [`NetworkError::is_retryable`].
pub fn is_retryable(error: &NetworkError) -> bool {
    error.is_retryable()
}
