//! Network operation: one logical request driven to exactly one terminal result.
//!
//! A [`NetworkOperation`] owns a [`NetworkPayload`] and a terminal callback.
//! [`NetworkOperation::start`] runs attempts on its session until the request
//! succeeds, fails terminally, exhausts its retry budget or is cancelled, then
//! invokes the callback exactly once.
//!
//! All of one operation's event handling happens inside its own `start`
//! future, so state transitions for a single operation never run
//! concurrently. Each attempt gets a fresh event channel and a fresh
//! accumulation buffer; events from an earlier or aborted attempt cannot reach
//! a later one.
//!
//! # Example
//!
//! ```no_run
//! use avenue::{EmptyBodyPolicy, HttpRequest, NetworkOperation, NetworkSession, SessionConfig};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let session = NetworkSession::new(SessionConfig::default())?;
//! let request = HttpRequest::get("https://example.com/")?;
//! let operation = NetworkOperation::new(request, &session, 3, EmptyBodyPolicy::default(), |payload| {
//!     println!("{:?} {:?}", payload.status(), payload.error());
//! })?;
//! operation.start().await;
//! # Ok(())
//! # }
//! ```

mod policy;
mod state;

use std::time::Duration;

use futures::future::BoxFuture;
use log::{debug, trace, warn};
use tokio::sync::mpsc;

use crate::error_handling::{NetworkError, OperationError, TransportError, TransportErrorKind};
use crate::models::HttpRequest;
use crate::payload::NetworkPayload;
use crate::queue::{Cancelable, WorkUnit};
use crate::session::{AttemptId, NetworkSession, TransportEvent};

pub use policy::EmptyBodyPolicy;
pub use state::{OperationHandle, OperationState};

type Callback = Box<dyn FnOnce(NetworkPayload) + Send>;
type Rewriter = Box<dyn FnMut(&mut HttpRequest, u32) + Send>;
type Backoff = Box<dyn Iterator<Item = Duration> + Send>;

/// How the attempt loop ended.
enum Conclusion {
    Finished(Option<NetworkError>),
    Cancelled,
}

/// What to do after an attempt completed.
enum Verdict {
    Retry(TransportError),
    Finish(Option<NetworkError>),
}

/// A cancelable, retrying HTTP request with a single-result callback.
pub struct NetworkOperation {
    session: NetworkSession,
    payload: NetworkPayload,
    callback: Option<Callback>,
    max_retries: u32,
    current_retries: u32,
    empty_body: EmptyBodyPolicy,
    backoff: Option<Backoff>,
    rewriter: Option<Rewriter>,
    handle: OperationHandle,
    active_attempt: Option<AttemptId>,
}

impl NetworkOperation {
    /// Creates an operation for `request` on `session`.
    ///
    /// `max_retries` is the number of attempts allowed beyond the first, for
    /// retryable transport failures only.
    ///
    /// # Errors
    ///
    /// Returns `OperationError::InvalidRetryBudget` if `max_retries` is zero.
    /// The callback is dropped without being invoked.
    pub fn new<F>(
        request: HttpRequest,
        session: &NetworkSession,
        max_retries: u32,
        empty_body: EmptyBodyPolicy,
        callback: F,
    ) -> Result<Self, OperationError>
    where
        F: FnOnce(NetworkPayload) + Send + 'static,
    {
        if max_retries < 1 {
            return Err(OperationError::InvalidRetryBudget(max_retries));
        }

        Ok(Self {
            session: session.clone(),
            payload: NetworkPayload::new(request),
            callback: Some(Box::new(callback)),
            max_retries,
            current_retries: 0,
            empty_body,
            backoff: None,
            rewriter: None,
            handle: OperationHandle::new(),
            active_attempt: None,
        })
    }

    /// Waits between retries using the delays produced by `strategy`.
    ///
    /// Without a strategy retries start immediately. A strategy that runs dry
    /// also means no further delay.
    pub fn with_backoff<I>(mut self, strategy: I) -> Self
    where
        I: IntoIterator<Item = Duration>,
        I::IntoIter: Send + 'static,
    {
        self.backoff = Some(Box::new(strategy.into_iter()));
        self
    }

    /// Rewrites the current request before every attempt.
    ///
    /// The rewriter receives the 1-based attempt number. It never runs while
    /// an attempt is in flight and never touches the original request.
    pub fn with_request_rewriter<F>(mut self, rewriter: F) -> Self
    where
        F: FnMut(&mut HttpRequest, u32) + Send + 'static,
    {
        self.rewriter = Some(Box::new(rewriter));
        self
    }

    pub fn handle(&self) -> OperationHandle {
        self.handle.clone()
    }

    pub fn state(&self) -> OperationState {
        self.handle.state()
    }

    /// Cancels the operation; see [`OperationHandle::cancel`].
    pub fn cancel(&self) -> bool {
        self.handle.cancel()
    }

    pub fn payload(&self) -> &NetworkPayload {
        &self.payload
    }

    /// Runs the operation to its terminal state and invokes the callback.
    ///
    /// Must be awaited within a Tokio runtime. An operation cancelled before
    /// `start` delivers the cancelled payload without starting any attempt.
    pub async fn start(mut self) {
        let conclusion = if self
            .handle
            .transition(OperationState::Created, OperationState::Executing)
        {
            self.drive().await
        } else {
            Conclusion::Cancelled
        };
        self.conclude(conclusion);
    }

    async fn drive(&mut self) -> Conclusion {
        let cancelled = self.handle.token().clone();

        loop {
            let attempt_number = self.current_retries.saturating_add(1);
            if let Some(rewrite) = self.rewriter.as_mut() {
                rewrite(&mut self.payload.request, attempt_number);
            }
            self.payload.begin_attempt();

            let (sink, mut events) = mpsc::unbounded_channel();
            let attempt = self
                .session
                .begin_attempt(self.payload.request.clone(), sink);
            self.active_attempt = Some(attempt);
            debug!(
                "Attempt {attempt} ({attempt_number}/{}) for {} {}",
                self.max_retries.saturating_add(1),
                self.payload.request.method,
                self.payload.request.url
            );

            let outcome = loop {
                let event = tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => return Conclusion::Cancelled,
                    event = events.recv() => event,
                };
                match event {
                    Some(TransportEvent::Response(head)) => {
                        trace!("Attempt {attempt} got status {}", head.status);
                        self.payload.response = Some(head);
                    }
                    Some(TransportEvent::Data(chunk)) => self.payload.append(&chunk),
                    Some(TransportEvent::Completed(outcome)) => break outcome,
                    None => {
                        break Some(NetworkError::Transport(TransportError::new(
                            TransportErrorKind::ConnectionLost,
                            "transport attempt ended without completing",
                        )))
                    }
                }
            };
            self.active_attempt = None;

            let error = match self.evaluate(outcome) {
                Verdict::Finish(error) => return Conclusion::Finished(error),
                Verdict::Retry(error) => error,
            };

            if !self
                .handle
                .transition(OperationState::Executing, OperationState::RetryPending)
            {
                return Conclusion::Cancelled;
            }
            self.current_retries += 1;
            warn!(
                "Retrying {} (retry {}/{}) after {error}",
                self.payload.request.url, self.current_retries, self.max_retries
            );

            if let Some(delay) = self.backoff.as_mut().and_then(Iterator::next) {
                debug!("Waiting {delay:?} before next attempt");
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => return Conclusion::Cancelled,
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            if !self
                .handle
                .transition(OperationState::RetryPending, OperationState::Executing)
            {
                return Conclusion::Cancelled;
            }
        }
    }

    fn evaluate(&self, outcome: Option<NetworkError>) -> Verdict {
        if let Some(error) = outcome {
            return match error {
                NetworkError::Transport(error) if error.is_retryable() => {
                    if self.current_retries < self.max_retries {
                        Verdict::Retry(error)
                    } else {
                        Verdict::Finish(Some(NetworkError::RetryBudgetExhausted {
                            retries: self.current_retries,
                            last: error,
                        }))
                    }
                }
                error => Verdict::Finish(Some(error)),
            };
        }

        let Some(head) = self.payload.response() else {
            return Verdict::Finish(Some(NetworkError::InvalidResponse));
        };
        if head.status.as_u16() >= 400 {
            return Verdict::Finish(Some(NetworkError::EndpointError {
                status: head.status,
                body: self.payload.body().unwrap_or_default().to_vec(),
            }));
        }
        if self.payload.body_is_empty() && !self.empty_body.allows_empty(&self.payload.request.method)
        {
            return Verdict::Finish(Some(NetworkError::NoResponseData));
        }
        Verdict::Finish(None)
    }

    /// Performs the terminal transition and hands the payload to the callback.
    ///
    /// Cancellation wins over a finish that races with it. Runs at most once.
    fn conclude(&mut self, conclusion: Conclusion) {
        let Some(callback) = self.callback.take() else {
            return;
        };
        if let Some(attempt) = self.active_attempt.take() {
            self.session.abort_attempt(attempt);
        }

        let finished = match conclusion {
            Conclusion::Finished(error) => {
                if self.handle.advance(OperationState::Finished) {
                    self.payload.finish(error);
                    true
                } else {
                    false
                }
            }
            Conclusion::Cancelled => {
                self.handle.cancel();
                false
            }
        };

        let url = self.payload.original_request().url.clone();
        if finished {
            let elapsed_ms = self
                .payload
                .elapsed()
                .map(|elapsed| elapsed.num_milliseconds())
                .unwrap_or_default();
            match self.payload.error() {
                None => debug!(
                    "{url} finished with {:?} in {elapsed_ms}ms ({} retries)",
                    self.payload.status(),
                    self.current_retries
                ),
                Some(error) => warn!("{url} failed in {elapsed_ms}ms: {error}"),
            }
        } else {
            self.payload.cancel();
            debug!("{url} cancelled");
        }

        let blank = NetworkPayload::new(self.payload.original_request().clone());
        callback(std::mem::replace(&mut self.payload, blank));
    }
}

impl Drop for NetworkOperation {
    fn drop(&mut self) {
        if self.callback.is_some() {
            self.conclude(Conclusion::Cancelled);
        }
    }
}

impl std::fmt::Debug for NetworkOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkOperation")
            .field("url", &self.payload.original_request().url.as_str())
            .field("state", &self.state())
            .field("retries", &self.current_retries)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

impl Cancelable for OperationHandle {
    fn cancel(&self) {
        OperationHandle::cancel(self);
    }

    fn is_cancelled(&self) -> bool {
        OperationHandle::is_cancelled(self)
    }
}

impl WorkUnit for NetworkOperation {
    type Handle = OperationHandle;

    fn handle(&self) -> OperationHandle {
        self.handle.clone()
    }

    fn run(self) -> BoxFuture<'static, ()> {
        Box::pin(self.start())
    }
}
