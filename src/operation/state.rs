//! Operation lifecycle state shared between an operation and its handles.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

/// Lifecycle of a network operation.
///
/// `Finished` and `Cancelled` are terminal and absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OperationState {
    /// Constructed, not yet started.
    Created = 0,
    /// A transport attempt is in flight.
    Executing = 1,
    /// Between attempts, possibly waiting out a backoff delay.
    RetryPending = 2,
    /// Ended with success or a terminal error.
    Finished = 3,
    /// Ended by cancellation.
    Cancelled = 4,
}

impl OperationState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => OperationState::Created,
            1 => OperationState::Executing,
            2 => OperationState::RetryPending,
            3 => OperationState::Finished,
            _ => OperationState::Cancelled,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OperationState::Finished | OperationState::Cancelled)
    }

    /// Whether the operation occupies a concurrency slot.
    pub fn is_active(self) -> bool {
        matches!(self, OperationState::Executing | OperationState::RetryPending)
    }
}

/// Cloneable handle for observing and cancelling a network operation.
///
/// Cancelling through a handle is valid in any non-terminal state; it flips the
/// state to `Cancelled` at once and wakes the operation so it can abort its
/// attempt and deliver the cancelled payload.
#[derive(Debug, Clone)]
pub struct OperationHandle {
    state: Arc<AtomicU8>,
    token: CancellationToken,
}

impl OperationHandle {
    pub(crate) fn new() -> Self {
        Self {
            state: Arc::new(AtomicU8::new(OperationState::Created as u8)),
            token: CancellationToken::new(),
        }
    }

    pub fn state(&self) -> OperationState {
        OperationState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Requests cancellation. Returns `false` if the operation already ended.
    pub fn cancel(&self) -> bool {
        if self.advance(OperationState::Cancelled) {
            self.token.cancel();
            true
        } else {
            false
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.state() == OperationState::Cancelled
    }

    pub fn is_terminal(&self) -> bool {
        self.state().is_terminal()
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Moves from `from` to `to` only if the state is still `from`.
    pub(crate) fn transition(&self, from: OperationState, to: OperationState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Moves to `to` from any non-terminal state.
    pub(crate) fn advance(&self, to: OperationState) -> bool {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            if OperationState::from_u8(current).is_terminal() {
                return false;
            }
            match self.state.compare_exchange_weak(
                current,
                to as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_handle_is_created() {
        let handle = OperationHandle::new();
        assert_eq!(handle.state(), OperationState::Created);
        assert!(!handle.is_terminal());
        assert!(!handle.token().is_cancelled());
    }

    #[test]
    fn test_transition_requires_expected_state() {
        let handle = OperationHandle::new();
        assert!(handle.transition(OperationState::Created, OperationState::Executing));
        assert!(!handle.transition(OperationState::Created, OperationState::Executing));
        assert!(handle.state().is_active());
    }

    #[test]
    fn test_cancel_is_absorbing() {
        let handle = OperationHandle::new();
        assert!(handle.cancel());
        assert!(handle.is_cancelled());
        assert!(handle.token().is_cancelled());

        assert!(!handle.cancel());
        assert!(!handle.advance(OperationState::Finished));
        assert!(!handle.transition(OperationState::Cancelled, OperationState::Executing));
        assert_eq!(handle.state(), OperationState::Cancelled);
    }

    #[test]
    fn test_finished_cannot_be_cancelled() {
        let handle = OperationHandle::new();
        assert!(handle.advance(OperationState::Finished));
        assert!(!handle.cancel());
        assert!(!handle.token().is_cancelled());
        assert_eq!(handle.state(), OperationState::Finished);
    }

    #[test]
    fn test_clones_share_state() {
        let handle = OperationHandle::new();
        let observer = handle.clone();
        handle.cancel();
        assert!(observer.is_cancelled());
    }
}
