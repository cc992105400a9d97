//! The result record threaded through one logical request.
//!
//! A [`NetworkPayload`] is owned by exactly one network operation. The operation
//! fills it in as attempts progress and hands it to the terminal callback once.

use chrono::{DateTime, Utc};
use reqwest::StatusCode;

use crate::error_handling::NetworkError;
use crate::models::{HttpRequest, ResponseHead};

/// Result and timing record for one logical request.
#[derive(Debug, Clone)]
pub struct NetworkPayload {
    original_request: HttpRequest,
    pub(crate) request: HttpRequest,

    pub(crate) error: Option<NetworkError>,
    pub(crate) response: Option<ResponseHead>,
    pub(crate) body: Option<Vec<u8>>,

    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
}

impl NetworkPayload {
    pub fn new(request: HttpRequest) -> Self {
        Self {
            original_request: request.clone(),
            request,
            error: None,
            response: None,
            body: None,
            created_at: Utc::now(),
            started_at: None,
            ended_at: None,
        }
    }

    /// The request as it was when the operation was created.
    pub fn original_request(&self) -> &HttpRequest {
        &self.original_request
    }

    /// The request used for the latest attempt.
    pub fn current_request(&self) -> &HttpRequest {
        &self.request
    }

    pub fn error(&self) -> Option<&NetworkError> {
        self.error.as_ref()
    }

    pub fn response(&self) -> Option<&ResponseHead> {
        self.response.as_ref()
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.response.as_ref().map(|head| head.status)
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    pub fn into_body(self) -> Option<Vec<u8>> {
        self.body
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    /// Time between the first attempt's start and the terminal transition.
    ///
    /// `None` unless both timestamps are set, so always `None` for cancelled
    /// operations.
    pub fn elapsed(&self) -> Option<chrono::Duration> {
        Some(self.ended_at? - self.started_at?)
    }

    /// True for a finished operation without an error.
    pub fn is_success(&self) -> bool {
        self.ended_at.is_some() && self.error.is_none()
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.error, Some(NetworkError::Cancelled))
    }

    /// Resets per-attempt state before a transport attempt starts.
    ///
    /// The accumulation buffer always starts empty so bytes from an earlier
    /// attempt can never leak into a later one. `started_at` is only recorded
    /// for the first attempt.
    pub(crate) fn begin_attempt(&mut self) {
        self.response = None;
        self.error = None;
        self.body = Some(Vec::new());
        if self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
    }

    pub(crate) fn append(&mut self, chunk: &[u8]) {
        self.body.get_or_insert_with(Vec::new).extend_from_slice(chunk);
    }

    pub(crate) fn body_is_empty(&self) -> bool {
        self.body.as_ref().map_or(true, |body| body.is_empty())
    }

    /// Records the terminal outcome of a finished operation.
    ///
    /// Successful and endpoint-error payloads keep the accumulated body; every
    /// other failure discards the partial bytes.
    pub(crate) fn finish(&mut self, error: Option<NetworkError>) {
        match &error {
            None | Some(NetworkError::EndpointError { .. }) => {}
            Some(_) => self.body = None,
        }
        self.error = error;
        self.ended_at = Some(Utc::now());
    }

    /// Clears partial results of a cancelled operation.
    ///
    /// `ended_at` stays unset because the operation never reached a normal end.
    pub(crate) fn cancel(&mut self) {
        self.response = None;
        self.body = None;
        self.error = Some(NetworkError::Cancelled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_handling::{TransportError, TransportErrorKind};

    fn payload() -> NetworkPayload {
        NetworkPayload::new(HttpRequest::get("https://api.example.com/items").unwrap())
    }

    #[test]
    fn test_new_payload_is_blank() {
        let payload = payload();
        assert_eq!(payload.original_request(), payload.current_request());
        assert!(payload.error().is_none());
        assert!(payload.response().is_none());
        assert!(payload.body().is_none());
        assert!(payload.started_at().is_none());
        assert!(payload.ended_at().is_none());
        assert!(!payload.is_success());
    }

    #[test]
    fn test_begin_attempt_resets_buffer_but_keeps_start_time() {
        let mut payload = payload();
        payload.begin_attempt();
        let first_start = payload.started_at().unwrap();
        payload.append(b"partial");

        payload.begin_attempt();
        assert_eq!(payload.body(), Some(&b""[..]));
        assert_eq!(payload.started_at(), Some(first_start));
    }

    #[test]
    fn test_append_preserves_order() {
        let mut payload = payload();
        payload.begin_attempt();
        payload.append(b"hel");
        payload.append(b"lo");
        assert_eq!(payload.body(), Some(&b"hello"[..]));
        assert!(!payload.body_is_empty());
    }

    #[test]
    fn test_finish_success_sets_end_time() {
        let mut payload = payload();
        payload.begin_attempt();
        payload.append(b"ok");
        payload.finish(None);
        assert!(payload.is_success());
        assert_eq!(payload.body(), Some(&b"ok"[..]));
        assert!(payload.started_at().unwrap() <= payload.ended_at().unwrap());
        assert!(payload.elapsed().unwrap() >= chrono::Duration::zero());
    }

    #[test]
    fn test_finish_with_transport_error_discards_partial_body() {
        let mut payload = payload();
        payload.begin_attempt();
        payload.append(b"partial");
        payload.finish(Some(NetworkError::Transport(TransportError::new(
            TransportErrorKind::TlsHandshake,
            "bad record mac",
        ))));
        assert!(payload.body().is_none());
        assert!(payload.ended_at().is_some());
        assert!(!payload.is_success());
    }

    #[test]
    fn test_cancel_clears_results_and_leaves_end_unset() {
        let mut payload = payload();
        payload.begin_attempt();
        payload.append(b"partial");
        payload.cancel();
        assert!(payload.is_cancelled());
        assert!(payload.response().is_none());
        assert!(payload.body().is_none());
        assert!(payload.started_at().is_some());
        assert!(payload.ended_at().is_none());
        assert!(payload.elapsed().is_none());
    }
}
