//! avenue library: retrying, cancelable HTTP request operations
//!
//! This library turns a streaming HTTP transport into single-result network
//! operations. Each [`NetworkOperation`] drives one logical request through as
//! many physical attempts as its retry budget allows, accumulates the body as
//! it streams in, classifies failures, and hands exactly one terminal
//! [`NetworkPayload`] to its callback, whether the request succeeded, failed
//! or was cancelled. Operations run on a shared [`NetworkSession`] and can be
//! scheduled under a concurrency limit with a [`WorkQueue`].
//!
//! # Example
//!
//! ```no_run
//! use avenue::{
//!     EmptyBodyPolicy, HttpRequest, NetworkOperation, NetworkSession, SessionConfig, WorkQueue,
//! };
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let session = NetworkSession::new(SessionConfig::default())?;
//! let queue = WorkQueue::new(4);
//!
//! for url in ["https://example.com/a", "https://example.com/b"] {
//!     let operation = NetworkOperation::new(
//!         HttpRequest::get(url)?,
//!         &session,
//!         3,
//!         EmptyBodyPolicy::default(),
//!         |payload| match payload.error() {
//!             None => println!("{} bytes", payload.body().map_or(0, <[u8]>::len)),
//!             Some(error) => eprintln!("failed: {error}"),
//!         },
//!     )?;
//!     queue.submit(operation);
//! }
//!
//! queue.wait_idle().await;
//! session.finish_tasks_and_invalidate().await;
//! # Ok(())
//! # }
//! ```
//!
//! # Requirements
//!
//! This library requires a Tokio runtime. Use `#[tokio::main]` in your application
//! or ensure you're calling library functions within an async context.

pub mod config;
mod error_handling;
pub mod initialization;
mod models;
mod operation;
mod payload;
mod queue;
mod session;
pub mod trust;

// Re-export public API
pub use config::{CachePolicy, CookiePolicy, LogFormat, LogLevel, SessionConfig};
pub use error_handling::{
    classify_reqwest_error, default_retry_strategy, get_retry_strategy, is_retryable,
    InitializationError, NetworkError, OperationError, TransportError, TransportErrorKind,
};
pub use models::{HttpRequest, ResponseHead};
pub use operation::{EmptyBodyPolicy, NetworkOperation, OperationHandle, OperationState};
pub use payload::NetworkPayload;
pub use queue::{Cancelable, WorkQueue, WorkUnit};
pub use session::{
    AttemptId, EventEmitter, HttpTransport, NetworkSession, Transport, TransportEvent,
};
pub use trust::{TrustEvaluator, TrustPolicy};
