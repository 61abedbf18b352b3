//! Consecutive-failure circuit breaker guarding the event bus.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Failures in a row before the breaker opens.
pub const DEFAULT_MAX_FAILURES: u32 = 5;

/// Time an open breaker waits before letting a trial send through.
pub const DEFAULT_RESET_TIMEOUT: Duration = Duration::from_secs(30);

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation.
    Closed,
    /// Rejecting sends until the reset timeout expires.
    Open,
    /// Reset timeout expired; the next outcome decides.
    HalfOpen,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    last_failure: Option<Instant>,
}

/// Opens after `max_failures` consecutive failures.
///
/// There is no background timer: the open to half-open transition happens
/// lazily inside [`CircuitBreaker::is_open`].
#[derive(Debug)]
pub struct CircuitBreaker {
    inner: Mutex<BreakerInner>,
    max_failures: u32,
    reset_timeout: Duration,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

impl CircuitBreaker {
    /// Creates a breaker with the default thresholds (5 failures, 30 seconds).
    #[must_use]
    pub fn new() -> Self {
        Self::with_settings(DEFAULT_MAX_FAILURES, DEFAULT_RESET_TIMEOUT)
    }

    /// Creates a breaker with custom thresholds.
    #[must_use]
    pub fn with_settings(max_failures: u32, reset_timeout: Duration) -> Self {
        Self {
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure: None,
            }),
            max_failures: max_failures.max(1),
            reset_timeout,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns true while sends must be rejected.
    pub fn is_open(&self) -> bool {
        let mut inner = self.lock();
        if inner.state == CircuitState::Open {
            let expired = inner.last_failure.is_none_or(|at| at.elapsed() >= self.reset_timeout);
            if expired {
                debug!("Circuit breaker reset timeout expired, entering half-open");
                inner.state = CircuitState::HalfOpen;
            }
        }
        inner.state == CircuitState::Open
    }

    /// Records a failed send.
    pub fn record_failure(&self) {
        let mut inner = self.lock();
        inner.failure_count = inner.failure_count.saturating_add(1);
        inner.last_failure = Some(Instant::now());

        match inner.state {
            CircuitState::HalfOpen => {
                warn!(failures = inner.failure_count, "Trial send failed, circuit breaker re-opened");
                inner.state = CircuitState::Open;
            }
            CircuitState::Closed if inner.failure_count >= self.max_failures => {
                warn!(failures = inner.failure_count, "Circuit breaker opened");
                inner.state = CircuitState::Open;
            }
            _ => {}
        }
    }

    /// Records a successful send.
    pub fn record_success(&self) {
        let mut inner = self.lock();
        inner.failure_count = 0;
        if inner.state != CircuitState::Closed {
            debug!(previous = ?inner.state, "Circuit breaker closed");
            inner.state = CircuitState::Closed;
        }
    }

    /// Current state, without evaluating the reset timeout.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Consecutive failures since the last success.
    pub fn failure_count(&self) -> u32 {
        self.lock().failure_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_opens_after_max_failures() {
        let breaker = CircuitBreaker::with_settings(3, Duration::from_secs(60));

        breaker.record_failure();
        breaker.record_failure();
        assert!(!breaker.is_open());
        assert_eq!(breaker.state(), CircuitState::Closed);

        breaker.record_failure();
        assert!(breaker.is_open());
        assert_eq!(breaker.failure_count(), 3);
    }

    #[test]
    fn test_success_resets_count() {
        let breaker = CircuitBreaker::with_settings(3, Duration::from_secs(60));
        breaker.record_failure();
        breaker.record_failure();
        breaker.record_success();
        breaker.record_failure();
        breaker.record_failure();
        assert!(!breaker.is_open());
    }

    #[test]
    fn test_half_open_after_timeout_then_close() {
        let breaker = CircuitBreaker::with_settings(2, Duration::from_millis(50));
        breaker.record_failure();
        breaker.record_failure();
        assert!(breaker.is_open());

        thread::sleep(Duration::from_millis(80));

        assert!(!breaker.is_open());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        breaker.record_success();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.failure_count(), 0);
    }

    #[test]
    fn test_half_open_failure_reopens() {
        let breaker = CircuitBreaker::with_settings(2, Duration::from_millis(50));
        breaker.record_failure();
        breaker.record_failure();
        thread::sleep(Duration::from_millis(80));
        assert!(!breaker.is_open());

        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(breaker.is_open());
    }
}
