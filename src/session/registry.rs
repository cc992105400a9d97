//! Attempt routing table.
//!
//! Maps each in-flight attempt to the event sink of the operation that started
//! it. The table is shared by every operation on a session and guarded by its
//! own lock; operations only ever hold the attempt id.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::trace;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::AbortHandle;

use super::transport::{AttemptId, TransportEvent};
use crate::error_handling::NetworkError;

struct Registration {
    sink: UnboundedSender<TransportEvent>,
    abort: Option<AbortHandle>,
}

#[derive(Default)]
pub(crate) struct AttemptRegistry {
    attempts: Mutex<HashMap<AttemptId, Registration>>,
}

impl AttemptRegistry {
    fn lock(&self) -> MutexGuard<'_, HashMap<AttemptId, Registration>> {
        self.attempts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn register(&self, attempt: AttemptId, sink: UnboundedSender<TransportEvent>) {
        self.lock()
            .insert(attempt, Registration { sink, abort: None });
    }

    /// Records how to abort the task serving `attempt`.
    ///
    /// Does nothing if the attempt already completed or was aborted.
    pub(crate) fn attach_abort(&self, attempt: AttemptId, abort: AbortHandle) {
        if let Some(registration) = self.lock().get_mut(&attempt) {
            registration.abort = Some(abort);
        }
    }

    pub(crate) fn contains(&self, attempt: AttemptId) -> bool {
        self.lock().contains_key(&attempt)
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    /// Forwards a non-terminal event. Returns `false` if nobody is listening.
    pub(crate) fn route(&self, attempt: AttemptId, event: TransportEvent) -> bool {
        let attempts = self.lock();
        match attempts.get(&attempt) {
            Some(registration) => registration.sink.send(event).is_ok(),
            None => {
                trace!("Dropping event for unregistered attempt {attempt}");
                false
            }
        }
    }

    /// Delivers the completion event and removes the registration.
    pub(crate) fn complete(&self, attempt: AttemptId, outcome: Option<NetworkError>) {
        let registration = self.lock().remove(&attempt);
        match registration {
            Some(registration) => {
                let _ = registration.sink.send(TransportEvent::Completed(outcome));
            }
            None => trace!("Dropping completion for unregistered attempt {attempt}"),
        }
    }

    /// Removes the registration and aborts the serving task, if any.
    ///
    /// Nothing is delivered to the sink.
    pub(crate) fn abort(&self, attempt: AttemptId) {
        let registration = self.lock().remove(&attempt);
        if let Some(Registration {
            abort: Some(abort), ..
        }) = registration
        {
            abort.abort();
        }
    }

    /// Completes every registered attempt with `outcome` and aborts its task.
    ///
    /// Returns the number of attempts aborted.
    pub(crate) fn abort_all(&self, outcome: NetworkError) -> usize {
        let drained: Vec<_> = self.lock().drain().collect();
        let count = drained.len();
        for (_, registration) in drained {
            let _ = registration
                .sink
                .send(TransportEvent::Completed(Some(outcome.clone())));
            if let Some(abort) = registration.abort {
                abort.abort();
            }
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn test_route_to_registered_sink() {
        let registry = AttemptRegistry::default();
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.register(AttemptId(1), tx);

        assert!(registry.route(AttemptId(1), TransportEvent::Data(b"abc".to_vec())));
        match rx.try_recv().unwrap() {
            TransportEvent::Data(bytes) => assert_eq!(bytes, b"abc"),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_unregistered_events_are_dropped() {
        let registry = AttemptRegistry::default();
        assert!(!registry.route(AttemptId(7), TransportEvent::Data(Vec::new())));
        registry.complete(AttemptId(7), None);
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_complete_removes_registration() {
        let registry = AttemptRegistry::default();
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.register(AttemptId(2), tx);
        registry.complete(AttemptId(2), Some(NetworkError::InvalidResponse));

        assert!(!registry.contains(AttemptId(2)));
        assert!(matches!(
            rx.try_recv().unwrap(),
            TransportEvent::Completed(Some(NetworkError::InvalidResponse))
        ));
        // Later events for the same attempt go nowhere.
        assert!(!registry.route(AttemptId(2), TransportEvent::Data(b"late".to_vec())));
    }

    #[test]
    fn test_abort_closes_sink_without_completion() {
        let registry = AttemptRegistry::default();
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.register(AttemptId(3), tx);
        registry.abort(AttemptId(3));

        assert!(!registry.contains(AttemptId(3)));
        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn test_abort_all_completes_every_sink() {
        let registry = AttemptRegistry::default();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        registry.register(AttemptId(4), tx1);
        registry.register(AttemptId(5), tx2);

        assert_eq!(registry.abort_all(NetworkError::Cancelled), 2);
        assert_eq!(registry.len(), 0);
        for rx in [&mut rx1, &mut rx2] {
            assert!(matches!(
                rx.try_recv().unwrap(),
                TransportEvent::Completed(Some(NetworkError::Cancelled))
            ));
        }
    }

    #[tokio::test]
    async fn test_abort_stops_serving_task() {
        let registry = AttemptRegistry::default();
        let (tx, _rx) = mpsc::unbounded_channel();
        registry.register(AttemptId(6), tx);
        let task = tokio::spawn(std::future::pending::<()>());
        registry.attach_abort(AttemptId(6), task.abort_handle());

        registry.abort(AttemptId(6));
        assert!(task.await.unwrap_err().is_cancelled());
    }
}
