//! Streaming transport abstraction.
//!
//! A [`Transport`] performs exactly one physical attempt per call to
//! [`Transport::execute`] and reports its progress through an [`EventEmitter`]:
//! one `Response`, zero or more `Data` chunks, then exactly one `Completed`.

use std::sync::Arc;

use futures::future::BoxFuture;
use log::{debug, trace};

use super::registry::AttemptRegistry;
use crate::error_handling::{
    classify_reqwest_error, NetworkError, TransportError, TransportErrorKind,
};
use crate::models::{HttpRequest, ResponseHead};

/// Opaque identifier routing a transport attempt's events to its operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttemptId(pub(crate) u64);

impl std::fmt::Display for AttemptId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Progress of one transport attempt.
#[derive(Debug)]
pub enum TransportEvent {
    /// Status line and headers arrived.
    Response(ResponseHead),
    /// A chunk of the response body arrived.
    Data(Vec<u8>),
    /// The attempt ended, with a classified error on failure.
    Completed(Option<NetworkError>),
}

/// Something that can perform a single HTTP attempt.
pub trait Transport: Send + Sync + 'static {
    /// Starts one attempt for `request`.
    ///
    /// The returned future runs on its own task and may be aborted at any
    /// await point. It must report through `emitter` and finish by calling
    /// [`EventEmitter::complete`]; an emitter dropped without completing
    /// reports a lost connection.
    fn execute(&self, request: HttpRequest, emitter: EventEmitter) -> BoxFuture<'static, ()>;
}

/// Reports one attempt's events to whichever operation is registered for it.
///
/// Events for an attempt that has been aborted or already completed are
/// dropped silently.
pub struct EventEmitter {
    attempt: AttemptId,
    registry: Arc<AttemptRegistry>,
    completed: bool,
}

impl EventEmitter {
    pub(crate) fn new(attempt: AttemptId, registry: Arc<AttemptRegistry>) -> Self {
        Self {
            attempt,
            registry,
            completed: false,
        }
    }

    pub fn attempt(&self) -> AttemptId {
        self.attempt
    }

    /// Whether an operation is still listening for this attempt.
    pub fn is_live(&self) -> bool {
        self.registry.contains(self.attempt)
    }

    /// Reports the response head. Returns `false` if nobody is listening.
    pub fn response(&self, head: ResponseHead) -> bool {
        self.registry
            .route(self.attempt, TransportEvent::Response(head))
    }

    /// Reports a body chunk. Returns `false` if nobody is listening.
    pub fn data(&self, chunk: impl Into<Vec<u8>>) -> bool {
        self.registry
            .route(self.attempt, TransportEvent::Data(chunk.into()))
    }

    /// Reports the end of the attempt.
    pub fn complete(mut self, error: Option<NetworkError>) {
        self.completed = true;
        self.registry.complete(self.attempt, error);
    }
}

impl Drop for EventEmitter {
    fn drop(&mut self) {
        if !self.completed {
            self.registry.complete(
                self.attempt,
                Some(NetworkError::Transport(TransportError::new(
                    TransportErrorKind::ConnectionLost,
                    "transport attempt ended without completing",
                ))),
            );
        }
    }
}

/// Production transport backed by a `reqwest::Client`.
///
/// The body is streamed with `Response::chunk()`, so every chunk is forwarded
/// as soon as it arrives.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

impl Transport for HttpTransport {
    fn execute(&self, request: HttpRequest, emitter: EventEmitter) -> BoxFuture<'static, ()> {
        Box::pin(stream_attempt(self.client.clone(), request, emitter))
    }
}

async fn stream_attempt(client: reqwest::Client, request: HttpRequest, emitter: EventEmitter) {
    let attempt = emitter.attempt();
    let HttpRequest {
        method,
        url,
        headers,
        body,
    } = request;

    let mut builder = client.request(method, url).headers(headers);
    if let Some(body) = body {
        builder = builder.body(body);
    }

    let mut response = match builder.send().await {
        Ok(response) => response,
        Err(e) => {
            let error = classify_reqwest_error(&e);
            debug!("Attempt {attempt} failed before headers: {error}");
            emitter.complete(Some(error));
            return;
        }
    };

    let head = ResponseHead::from_response(&response);
    if !head.has_valid_status() {
        debug!("Attempt {attempt} got out-of-range status {}", head.status);
        emitter.complete(Some(NetworkError::InvalidResponse));
        return;
    }
    if !emitter.response(head) {
        return;
    }

    loop {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                trace!("Attempt {attempt} received {} bytes", chunk.len());
                if !emitter.data(chunk.to_vec()) {
                    return;
                }
            }
            Ok(None) => {
                emitter.complete(None);
                return;
            }
            Err(e) => {
                let error = classify_reqwest_error(&e);
                debug!("Attempt {attempt} failed while reading body: {error}");
                emitter.complete(Some(error));
                return;
            }
        }
    }
}
