//! Transport session.
//!
//! A [`NetworkSession`] owns one HTTP client configuration and the routing
//! table that connects transport attempts to the operations that started them.
//! Sessions are cheap to clone; clones share the client, the routing table and
//! the task tracker.
//!
//! # Example
//!
//! ```no_run
//! use avenue::{NetworkSession, SessionConfig};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let session = NetworkSession::new(SessionConfig::default())?;
//! // ... run operations ...
//! session.finish_tasks_and_invalidate().await;
//! # Ok(())
//! # }
//! ```

mod client;
mod cookies;
mod registry;
#[cfg(test)]
pub(crate) mod testing;
mod transport;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use log::{debug, info};
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::task::TaskTracker;

use crate::config::SessionConfig;
use crate::error_handling::{InitializationError, NetworkError, TransportError, TransportErrorKind};
use crate::models::HttpRequest;
use crate::trust::{SessionTrust, TrustPolicy};

use registry::AttemptRegistry;
pub use transport::{AttemptId, EventEmitter, HttpTransport, Transport, TransportEvent};

struct SessionInner {
    config: SessionConfig,
    transport: Arc<dyn Transport>,
    registry: Arc<AttemptRegistry>,
    trust: SessionTrust,
    tracker: TaskTracker,
    invalidated: AtomicBool,
    next_attempt: AtomicU64,
}

/// Shared transport configuration and attempt routing for many operations.
#[derive(Clone)]
pub struct NetworkSession {
    inner: Arc<SessionInner>,
}

impl NetworkSession {
    /// Creates a session backed by an HTTP client built from `config`.
    ///
    /// # Errors
    ///
    /// Returns an `InitializationError` if the TLS configuration or the HTTP
    /// client cannot be built.
    pub fn new(config: SessionConfig) -> Result<Self, InitializationError> {
        let trust = SessionTrust::new(config.trust.clone());
        let client = client::build_client(&config, trust.clone())?;
        Ok(Self::assemble(
            config,
            trust,
            Arc::new(HttpTransport::new(client)),
        ))
    }

    /// Creates a session that runs attempts on a caller-provided transport.
    ///
    /// The trust policy in `config` is still tracked by the session, but only
    /// transports that consult it (like [`HttpTransport`] built by
    /// [`NetworkSession::new`]) honour it.
    pub fn with_transport(config: SessionConfig, transport: Arc<dyn Transport>) -> Self {
        let trust = SessionTrust::new(config.trust.clone());
        Self::assemble(config, trust, transport)
    }

    fn assemble(config: SessionConfig, trust: SessionTrust, transport: Arc<dyn Transport>) -> Self {
        debug!(
            "Session created (cookies: {:?}, cache: {:?}, trust: {:?})",
            config.cookie_policy, config.cache_policy, config.trust
        );
        Self {
            inner: Arc::new(SessionInner {
                config,
                transport,
                registry: Arc::new(AttemptRegistry::default()),
                trust,
                tracker: TaskTracker::new(),
                invalidated: AtomicBool::new(false),
                next_attempt: AtomicU64::new(1),
            }),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Replaces this session's trust policy.
    ///
    /// Takes effect on the next TLS handshake; established connections are
    /// not re-evaluated.
    pub fn set_trust_evaluator(&self, policy: TrustPolicy) {
        self.inner.trust.set(policy);
    }

    pub fn trust_policy(&self) -> TrustPolicy {
        self.inner.trust.policy()
    }

    /// Whether the session has stopped accepting new attempts.
    pub fn is_invalidated(&self) -> bool {
        self.inner.invalidated.load(Ordering::Acquire)
    }

    /// Number of attempts currently registered for event routing.
    pub fn active_attempts(&self) -> usize {
        self.inner.registry.len()
    }

    /// Starts one transport attempt and routes its events into `sink`.
    ///
    /// Must be called from within a Tokio runtime. On an invalidated session
    /// the attempt completes immediately with a `SessionInvalidated` error.
    pub(crate) fn begin_attempt(
        &self,
        request: HttpRequest,
        sink: UnboundedSender<TransportEvent>,
    ) -> AttemptId {
        let inner = &self.inner;
        let attempt = AttemptId(inner.next_attempt.fetch_add(1, Ordering::Relaxed));
        inner.registry.register(attempt, sink);
        let emitter = EventEmitter::new(attempt, Arc::clone(&inner.registry));

        if self.is_invalidated() {
            debug!("Attempt {attempt} rejected: session invalidated");
            emitter.complete(Some(NetworkError::Transport(TransportError::new(
                TransportErrorKind::SessionInvalidated,
                "session no longer accepts new attempts",
            ))));
            return attempt;
        }

        debug!("Attempt {attempt}: {} {}", request.method, request.url);
        let task = inner.tracker.spawn(inner.transport.execute(request, emitter));
        inner.registry.attach_abort(attempt, task.abort_handle());
        attempt
    }

    /// Best-effort abort of one in-flight attempt.
    ///
    /// The attempt's routing entry is removed first, so nothing it still emits
    /// reaches the operation.
    pub(crate) fn abort_attempt(&self, attempt: AttemptId) {
        debug!("Aborting attempt {attempt}");
        self.inner.registry.abort(attempt);
    }

    /// Stops accepting new attempts and waits for in-flight ones to drain.
    pub async fn finish_tasks_and_invalidate(&self) {
        self.inner.invalidated.store(true, Ordering::Release);
        self.inner.tracker.close();
        info!(
            "Session invalidated, draining {} in-flight attempt(s)",
            self.inner.tracker.len()
        );
        self.inner.tracker.wait().await;
        info!("Session drained");
    }

    /// Stops accepting new attempts and aborts every in-flight one.
    ///
    /// Operations waiting on an aborted attempt see a non-retryable
    /// `SessionInvalidated` transport error.
    pub fn invalidate_and_cancel(&self) {
        self.inner.invalidated.store(true, Ordering::Release);
        self.inner.tracker.close();
        let aborted = self
            .inner
            .registry
            .abort_all(NetworkError::Transport(TransportError::new(
                TransportErrorKind::SessionInvalidated,
                "session invalidated and cancelled",
            )));
        info!("Session invalidated, aborted {aborted} in-flight attempt(s)");
    }
}

impl std::fmt::Debug for NetworkSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkSession")
            .field("config", &self.inner.config)
            .field("invalidated", &self.is_invalidated())
            .field("active_attempts", &self.active_attempts())
            .finish()
    }
}
