//! Lifecycle gating.

use std::sync::atomic::{AtomicU8, Ordering};

use thiserror::Error;

/// Lifecycle state of a cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Uninitialized,
    Available,
    Closed,
}

impl Status {
    fn from_u8(value: u8) -> Status {
        match value {
            0 => Status::Uninitialized,
            1 => Status::Available,
            _ => Status::Closed,
        }
    }
}

/// An operation was attempted in the wrong lifecycle state.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("cache is {actual:?}, operation requires {required:?}")]
pub struct LifecycleError {
    pub required: Status,
    pub actual: Status,
}

/// Monotonic lifecycle state machine over a single atomic word.
///
/// Transitions are Uninitialized -> Available -> Closed; there is no
/// reopen. Concurrent callers racing a transition either observe the old
/// state and complete, or see the new one.
#[derive(Debug)]
pub struct StatusGate {
    state: AtomicU8,
}

impl StatusGate {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(Status::Uninitialized as u8),
        }
    }

    pub fn status(&self) -> Status {
        Status::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Uninitialized -> Available.
    pub fn init(&self) -> Result<(), LifecycleError> {
        self.transition(Status::Uninitialized, Status::Available)
    }

    /// Available -> Closed.
    pub fn close(&self) -> Result<(), LifecycleError> {
        self.transition(Status::Available, Status::Closed)
    }

    /// Asserted at every operation entry, outside the store compute.
    pub fn check_available(&self) -> Result<(), LifecycleError> {
        match self.status() {
            Status::Available => Ok(()),
            actual => Err(LifecycleError {
                required: Status::Available,
                actual,
            }),
        }
    }

    fn transition(&self, from: Status, to: Status) -> Result<(), LifecycleError> {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|actual| LifecycleError {
                required: from,
                actual: Status::from_u8(actual),
            })
    }
}

impl Default for StatusGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_transitions_are_monotonic() {
        let gate = StatusGate::new();
        assert_eq!(gate.status(), Status::Uninitialized);
        assert!(gate.check_available().is_err());

        gate.init().unwrap();
        assert_eq!(gate.status(), Status::Available);
        gate.check_available().unwrap();

        gate.close().unwrap();
        assert_eq!(gate.status(), Status::Closed);
        assert!(gate.check_available().is_err());
    }

    #[test]
    fn test_no_reopen() {
        let gate = StatusGate::new();
        gate.init().unwrap();
        gate.close().unwrap();
        let error = gate.init().unwrap_err();
        assert_eq!(error.actual, Status::Closed);
    }

    #[test]
    fn test_double_init_fails() {
        let gate = StatusGate::new();
        gate.init().unwrap();
        assert!(gate.init().is_err());
    }

    #[test]
    fn test_close_before_init_fails() {
        let gate = StatusGate::new();
        let error = gate.close().unwrap_err();
        assert_eq!(error.required, Status::Available);
        assert_eq!(error.actual, Status::Uninitialized);
    }

    #[test]
    fn test_concurrent_init_admits_exactly_one() {
        let gate = Arc::new(StatusGate::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let gate = Arc::clone(&gate);
            handles.push(thread::spawn(move || gate.init().is_ok()));
        }
        let admitted = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(admitted, 1);
        assert_eq!(gate.status(), Status::Available);
    }
}
