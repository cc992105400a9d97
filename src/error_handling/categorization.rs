//! Error categorization and retry strategy.
//!
//! This module maps `reqwest` failures onto the [`NetworkError`] taxonomy and
//! builds the optional backoff strategy used between retry attempts.

use std::error::Error as StdError;
use std::io;
use std::time::Duration;

use tokio_retry::strategy::ExponentialBackoff;

use super::types::{NetworkError, TransportError, TransportErrorKind};

/// Creates an exponential backoff retry strategy.
///
/// Delays start at `initial_delay_ms`, are multiplied by `factor`, and are
/// capped at `max_delay`. The iterator is unbounded; the operation stops
/// consuming it once its retry budget is spent.
pub fn get_retry_strategy(
    initial_delay_ms: u64,
    factor: u64,
    max_delay: Duration,
) -> impl Iterator<Item = Duration> + Send + 'static {
    ExponentialBackoff::from_millis(initial_delay_ms)
        .factor(factor)
        .max_delay(max_delay)
}

/// Creates the backoff strategy configured by the `RETRY_*` constants.
pub fn default_retry_strategy() -> impl Iterator<Item = Duration> + Send + 'static {
    get_retry_strategy(
        crate::config::RETRY_INITIAL_DELAY_MS,
        crate::config::RETRY_FACTOR,
        Duration::from_secs(crate::config::RETRY_MAX_DELAY_SECS),
    )
}

/// What a single cause in an error chain says about the failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CauseVerdict {
    Transport(TransportErrorKind),
    MalformedResponse,
}

/// Inspects one cause of an error chain.
///
/// Type checks come first (rustls errors, possibly wrapped in `io::Error`, then
/// `io::ErrorKind`); message patterns are the fallback for causes that only
/// surface as boxed strings, such as resolver failures.
fn inspect_cause(cause: &(dyn StdError + 'static)) -> Option<CauseVerdict> {
    let tls = cause.downcast_ref::<rustls::Error>().or_else(|| {
        cause
            .downcast_ref::<io::Error>()
            .and_then(|e| e.get_ref())
            .and_then(|inner| inner.downcast_ref::<rustls::Error>())
    });
    if let Some(tls) = tls {
        let kind = match tls {
            rustls::Error::InvalidCertificate(_) => TransportErrorKind::TlsTrustRejected,
            _ => TransportErrorKind::TlsHandshake,
        };
        return Some(CauseVerdict::Transport(kind));
    }

    if let Some(io_error) = cause.downcast_ref::<io::Error>() {
        match io_error.kind() {
            io::ErrorKind::TimedOut => {
                return Some(CauseVerdict::Transport(TransportErrorKind::TimedOut))
            }
            io::ErrorKind::ConnectionRefused => {
                return Some(CauseVerdict::Transport(TransportErrorKind::CannotConnect))
            }
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof => {
                return Some(CauseVerdict::Transport(TransportErrorKind::ConnectionLost))
            }
            _ => {}
        }
    }

    let msg = cause.to_string().to_lowercase();
    if msg.contains("invalid peer certificate") {
        return Some(CauseVerdict::Transport(TransportErrorKind::TlsTrustRejected));
    }
    if msg.contains("dns error")
        || msg.contains("failed to lookup address")
        || msg.contains("name or service not known")
    {
        return Some(CauseVerdict::Transport(TransportErrorKind::DnsFailure));
    }
    if msg.contains("invalid http") || msg.contains("message head is too large") {
        return Some(CauseVerdict::MalformedResponse);
    }
    None
}

/// Walks an error chain and returns the first cause that classifies it.
pub(crate) fn classify_cause_chain(error: &(dyn StdError + 'static)) -> Option<CauseVerdict> {
    let mut current = Some(error);
    while let Some(cause) = current {
        if let Some(verdict) = inspect_cause(cause) {
            return Some(verdict);
        }
        current = cause.source();
    }
    None
}

/// Renders an error and all of its causes as one line.
pub(crate) fn describe_error_chain(error: &(dyn StdError + 'static)) -> String {
    let mut parts = vec![error.to_string()];
    let mut current = error.source();
    while let Some(cause) = current {
        let text = cause.to_string();
        if !parts.iter().any(|p| p.contains(&text)) {
            parts.push(text);
        }
        current = cause.source();
    }
    parts.join(": ")
}

/// Categorizes a `reqwest::Error` into a [`NetworkError`].
///
/// The error chain is inspected first so TLS trust rejections and DNS failures
/// are recognized even though `reqwest` reports both as connect errors. The
/// `reqwest` error flags are the fallback.
pub fn classify_reqwest_error(error: &reqwest::Error) -> NetworkError {
    let message = describe_error_chain(error);

    if error.is_builder() {
        return NetworkError::Other(format!("Invalid request: {message}"));
    }

    match classify_cause_chain(error) {
        Some(CauseVerdict::Transport(kind)) => {
            return NetworkError::Transport(TransportError::new(kind, message))
        }
        Some(CauseVerdict::MalformedResponse) => return NetworkError::InvalidResponse,
        None => {}
    }

    let kind = if error.is_timeout() {
        TransportErrorKind::TimedOut
    } else if error.is_redirect() {
        TransportErrorKind::TooManyRedirects
    } else if error.is_decode() {
        return NetworkError::InvalidResponse;
    } else if error.is_connect() {
        TransportErrorKind::CannotConnect
    } else if error.is_body() || error.is_request() {
        TransportErrorKind::ConnectionLost
    } else {
        TransportErrorKind::Unknown
    };
    NetworkError::Transport(TransportError::new(kind, message))
}
