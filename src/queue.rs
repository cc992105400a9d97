//! Bounded-concurrency work queue.
//!
//! Runs [`WorkUnit`]s with at most `max_concurrent` of them active at once.
//! Units waiting for a slot hold no transport resources. Queue-wide
//! cancellation cancels queued and running units alike; every unit is still
//! run to its end so its own completion contract (a network operation's
//! callback) is honoured.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::BoxFuture;
use log::{debug, info};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Something that can be asked to stop.
pub trait Cancelable: Send + Sync {
    fn cancel(&self);
    fn is_cancelled(&self) -> bool;
}

/// A unit of work the queue can schedule.
pub trait WorkUnit: Send + 'static {
    /// Handle used to cancel the unit once it has been handed to the queue.
    type Handle: Cancelable + Clone + 'static;

    fn handle(&self) -> Self::Handle;

    /// Runs the unit to its end. A cancelled unit must still return promptly.
    fn run(self) -> BoxFuture<'static, ()>;
}

struct QueueInner {
    permits: Arc<Semaphore>,
    max_concurrent: usize,
    tracker: TaskTracker,
    /// Cancelled by `cancel_all`; replaced so later submissions run normally.
    generation: Mutex<CancellationToken>,
    shut_down: AtomicBool,
}

/// Runs work units under a shared concurrency limit.
#[derive(Clone)]
pub struct WorkQueue {
    inner: Arc<QueueInner>,
}

impl WorkQueue {
    /// Creates a queue running at most `max_concurrent` units at once.
    ///
    /// A limit of zero is raised to one.
    pub fn new(max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            inner: Arc::new(QueueInner {
                permits: Arc::new(Semaphore::new(max_concurrent)),
                max_concurrent,
                tracker: TaskTracker::new(),
                generation: Mutex::new(CancellationToken::new()),
                shut_down: AtomicBool::new(false),
            }),
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.inner.max_concurrent
    }

    /// Number of units currently holding a concurrency slot.
    pub fn active(&self) -> usize {
        self.inner.max_concurrent - self.inner.permits.available_permits()
    }

    /// Number of submitted units that have not finished yet.
    pub fn pending(&self) -> usize {
        self.inner.tracker.len()
    }

    fn generation(&self) -> CancellationToken {
        self.inner
            .generation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Schedules `unit` and returns its handle.
    ///
    /// Must be called from within a Tokio runtime. After [`WorkQueue::shutdown`]
    /// the unit is cancelled before it runs.
    pub fn submit<U: WorkUnit>(&self, unit: U) -> U::Handle {
        let handle = unit.handle();
        if self.inner.shut_down.load(Ordering::Acquire) {
            debug!("Queue shut down, cancelling submitted unit");
            handle.cancel();
        }

        let cancelled = self.generation();
        let permits = Arc::clone(&self.inner.permits);
        let unit_handle = handle.clone();

        self.inner.tracker.spawn(async move {
            let permit = tokio::select! {
                biased;
                _ = cancelled.cancelled() => None,
                permit = permits.acquire_owned() => permit.ok(),
            };
            if permit.is_none() {
                unit_handle.cancel();
            }

            let mut run = unit.run();
            tokio::select! {
                biased;
                _ = &mut run => return,
                _ = cancelled.cancelled() => unit_handle.cancel(),
            }
            run.await;
        });

        handle
    }

    /// Cancels every queued and running unit.
    ///
    /// Units submitted afterwards are not affected.
    pub fn cancel_all(&self) {
        let previous = std::mem::replace(
            &mut *self
                .inner
                .generation
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
            CancellationToken::new(),
        );
        info!("Cancelling {} queued or running unit(s)", self.pending());
        previous.cancel();
    }

    /// Waits until every unit submitted so far has finished.
    pub async fn wait_idle(&self) {
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
        if !self.inner.shut_down.load(Ordering::Acquire) {
            self.inner.tracker.reopen();
        }
    }

    /// Stops accepting work and waits for submitted units to finish.
    pub async fn shutdown(&self) {
        self.inner.shut_down.store(true, Ordering::Release);
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
        info!("Work queue shut down");
    }
}

impl std::fmt::Debug for WorkQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkQueue")
            .field("max_concurrent", &self.inner.max_concurrent)
            .field("active", &self.active())
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[derive(Clone, Default)]
    struct Flag(Arc<AtomicBool>);

    impl Cancelable for Flag {
        fn cancel(&self) {
            self.0.store(true, Ordering::SeqCst);
        }

        fn is_cancelled(&self) -> bool {
            self.0.load(Ordering::SeqCst)
        }
    }

    /// Sleeps unless cancelled, tracking peak concurrency.
    struct Sleeper {
        flag: Flag,
        delay: Duration,
        running: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
        outcomes: Arc<Mutex<Vec<bool>>>,
    }

    impl WorkUnit for Sleeper {
        type Handle = Flag;

        fn handle(&self) -> Flag {
            self.flag.clone()
        }

        fn run(self) -> BoxFuture<'static, ()> {
            Box::pin(async move {
                let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(now, Ordering::SeqCst);

                let deadline = tokio::time::Instant::now() + self.delay;
                while !self.flag.is_cancelled() && tokio::time::Instant::now() < deadline {
                    tokio::time::sleep(Duration::from_millis(2)).await;
                }

                self.running.fetch_sub(1, Ordering::SeqCst);
                self.outcomes
                    .lock()
                    .unwrap()
                    .push(self.flag.is_cancelled());
            })
        }
    }

    struct Harness {
        running: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
        outcomes: Arc<Mutex<Vec<bool>>>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                running: Arc::default(),
                peak: Arc::default(),
                outcomes: Arc::default(),
            }
        }

        fn unit(&self, delay: Duration) -> Sleeper {
            Sleeper {
                flag: Flag::default(),
                delay,
                running: Arc::clone(&self.running),
                peak: Arc::clone(&self.peak),
                outcomes: Arc::clone(&self.outcomes),
            }
        }
    }

    #[tokio::test]
    async fn test_concurrency_limit_is_respected() {
        let harness = Harness::new();
        let queue = WorkQueue::new(2);
        for _ in 0..6 {
            queue.submit(harness.unit(Duration::from_millis(20)));
        }
        queue.wait_idle().await;

        assert_eq!(harness.peak.load(Ordering::SeqCst), 2);
        assert_eq!(harness.outcomes.lock().unwrap().len(), 6);
        assert_eq!(queue.active(), 0);
    }

    #[tokio::test]
    async fn test_cancel_all_reaches_queued_and_running_units() {
        let harness = Harness::new();
        let queue = WorkQueue::new(1);
        let handles: Vec<_> = (0..3)
            .map(|_| queue.submit(harness.unit(Duration::from_secs(30))))
            .collect();

        tokio::time::sleep(Duration::from_millis(10)).await;
        queue.cancel_all();
        queue.wait_idle().await;

        assert!(handles.iter().all(Cancelable::is_cancelled));
        let outcomes = harness.outcomes.lock().unwrap();
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes.iter().all(|cancelled| *cancelled));
    }

    #[tokio::test]
    async fn test_units_after_cancel_all_run_normally() {
        let harness = Harness::new();
        let queue = WorkQueue::new(1);
        queue.cancel_all();
        let handle = queue.submit(harness.unit(Duration::from_millis(1)));
        queue.wait_idle().await;

        assert!(!handle.is_cancelled());
        assert_eq!(*harness.outcomes.lock().unwrap(), vec![false]);
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_cancels_unit() {
        let harness = Harness::new();
        let queue = WorkQueue::new(1);
        queue.shutdown().await;

        let handle = queue.submit(harness.unit(Duration::from_secs(30)));
        assert!(handle.is_cancelled());
        queue.shutdown().await;
        assert_eq!(*harness.outcomes.lock().unwrap(), vec![true]);
    }

    #[test]
    fn test_zero_limit_is_raised_to_one() {
        assert_eq!(WorkQueue::new(0).max_concurrent(), 1);
    }
}
