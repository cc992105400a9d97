//! Configuration constants.
//!
//! This module defines the defaults used by sessions, operations, the work
//! queue and the CLI.

use std::time::Duration;

/// Retry budget used when the caller does not pick one.
/// 3 = initial attempt + up to 3 retries on transient transport failures.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Maximum number of operations a work queue runs at once.
pub const DEFAULT_QUEUE_CONCURRENCY: usize = 8;

// Network operation timeouts
/// Whole-request timeout (connect + headers + body) in seconds
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
/// TCP connection timeout in seconds
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default User-Agent string for HTTP requests.
///
/// Users can override this through `SessionConfig::user_agent` or the
/// `--user-agent` CLI flag.
pub const DEFAULT_USER_AGENT: &str = concat!("avenue/", env!("CARGO_PKG_VERSION"));

// Redirect handling
/// Maximum number of redirect hops to follow
pub const MAX_REDIRECT_HOPS: usize = 10;

// Retry backoff (only used when an operation opts into backoff)
/// Initial delay in milliseconds before first retry
pub const RETRY_INITIAL_DELAY_MS: u64 = 500;
/// Factor by which retry delay is multiplied on each attempt
pub const RETRY_FACTOR: u64 = 2;
/// Maximum delay between retries in seconds
pub const RETRY_MAX_DELAY_SECS: u64 = 15;

/// Maximum number of body characters the CLI prints for endpoint errors
pub const MAX_BODY_PREVIEW_CHARS: usize = 200;
