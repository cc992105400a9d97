//! Error handling and retry classification.
//!
//! This module provides:
//! - The closed error taxonomy reported in terminal payloads
//! - Transport error kinds with their fixed retryability
//! - Classification of `reqwest` failures into that taxonomy
//! - The optional exponential backoff strategy between retries
//!
//! Only transport-level transient failures are retryable. Endpoint errors
//! (status >= 400), malformed responses and cancellation are terminal.

mod categorization;
mod types;

// Re-export public API
pub use categorization::{classify_reqwest_error, default_retry_strategy, get_retry_strategy};
pub use types::{
    is_retryable, InitializationError, NetworkError, OperationError, TransportError,
    TransportErrorKind,
};
