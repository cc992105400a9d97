//! Scripted transport for deterministic session and operation tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::header::HeaderMap;
use reqwest::{StatusCode, Version};

use super::{EventEmitter, Transport};
use crate::error_handling::{NetworkError, TransportError, TransportErrorKind};
use crate::models::{HttpRequest, ResponseHead};

/// One step of a scripted attempt.
#[derive(Debug, Clone)]
pub(crate) enum Step {
    Head(u16),
    Chunk(&'static [u8]),
    Finish(Option<NetworkError>),
    Pause(Duration),
    /// Never completes; only an abort ends the attempt.
    Hang,
}

/// Plays one script per attempt, in order.
///
/// An attempt beyond the last script fails with `Other("script exhausted")`.
/// A script that runs out without `Finish` drops its emitter, which reports
/// a lost connection.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    scripts: Mutex<VecDeque<Vec<Step>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub(crate) fn new(scripts: Vec<Vec<Step>>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn attempts(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Transport for ScriptedTransport {
    fn execute(&self, request: HttpRequest, emitter: EventEmitter) -> BoxFuture<'static, ()> {
        let url = request.url.clone();
        self.requests.lock().unwrap().push(request);
        let script = self.scripts.lock().unwrap().pop_front().unwrap_or_else(|| {
            vec![Step::Finish(Some(NetworkError::Other(
                "script exhausted".into(),
            )))]
        });

        Box::pin(async move {
            for step in script {
                match step {
                    Step::Head(status) => {
                        emitter.response(ResponseHead {
                            status: StatusCode::from_u16(status).unwrap(),
                            version: Version::HTTP_11,
                            url: url.clone(),
                            headers: HeaderMap::new(),
                        });
                    }
                    Step::Chunk(bytes) => {
                        emitter.data(bytes);
                    }
                    Step::Finish(error) => {
                        emitter.complete(error);
                        return;
                    }
                    Step::Pause(delay) => tokio::time::sleep(delay).await,
                    Step::Hang => std::future::pending::<()>().await,
                }
            }
        })
    }
}

/// A complete 200 response carrying `body`.
pub(crate) fn ok(body: &'static [u8]) -> Vec<Step> {
    vec![Step::Head(200), Step::Chunk(body), Step::Finish(None)]
}

/// A response with `status` and `body`.
pub(crate) fn respond(status: u16, body: &'static [u8]) -> Vec<Step> {
    vec![Step::Head(status), Step::Chunk(body), Step::Finish(None)]
}

pub(crate) fn transport_error(kind: TransportErrorKind, message: &str) -> NetworkError {
    NetworkError::Transport(TransportError::new(kind, message))
}

/// An attempt that times out before any header arrives.
pub(crate) fn timeout() -> Vec<Step> {
    vec![Step::Finish(Some(transport_error(
        TransportErrorKind::TimedOut,
        "operation timed out",
    )))]
}

/// An attempt that streams `partial` bytes and then loses the connection.
pub(crate) fn dropped_after(partial: &'static [u8]) -> Vec<Step> {
    vec![
        Step::Head(200),
        Step::Chunk(partial),
        Step::Finish(Some(transport_error(
            TransportErrorKind::ConnectionLost,
            "connection reset by peer",
        ))),
    ]
}
