//! Circuit breaker guarding calls into fulfillment provider APIs.
//!
//! Prevents one provider's outage from consuming request budget for the
//! others: repeated failures short-circuit quickly instead of piling up
//! latency behind a degraded upstream.
//!
//! # State Machine
//!
//! ```text
//! CLOSED → OPEN (consecutive failures >= threshold)
//! OPEN → HALF_OPEN (reset_after elapsed since last failure)
//! HALF_OPEN → CLOSED (probe call succeeds)
//! HALF_OPEN → OPEN (probe call fails)
//! ```
//!
//! Any success, from any state, resets the failure counter and closes the
//! circuit. Every guarded call runs under a bounded timeout; a timeout counts
//! as a failure so one hung call cannot stall the fast-fail guarantee.
//!
//! State is process-local. Horizontally-scaled instances each trip their own
//! breaker independently; there is no cross-process coordination.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    /// Calls flow normally.
    Closed,
    /// Calls are rejected without reaching the provider.
    Open,
    /// One probe call is allowed through to test recovery.
    HalfOpen,
}

impl std::fmt::Display for BreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive failures that trip the circuit.
    pub failure_threshold: u32,
    /// How long the circuit stays open before allowing a probe.
    pub reset_after: Duration,
    /// Upper bound on any single guarded call.
    pub call_timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_after: Duration::from_secs(60),
            call_timeout: Duration::from_secs(30),
        }
    }
}

/// Error returned by [`CircuitBreaker::execute`].
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// The circuit is open; the call was rejected without being attempted.
    #[error("circuit breaker '{name}' is open, retry in {}s", retry_after.as_secs())]
    Open {
        /// Breaker name (provider).
        name: String,
        /// Time remaining until a probe is allowed.
        retry_after: Duration,
    },

    /// The call exceeded the configured timeout. Counted as a failure.
    #[error("call through circuit breaker '{name}' timed out after {}s", timeout.as_secs())]
    Timeout {
        /// Breaker name (provider).
        name: String,
        /// The configured call timeout.
        timeout: Duration,
    },

    /// The call itself failed. Counted as a failure.
    #[error("{0}")]
    Inner(E),
}

#[derive(Debug)]
struct BreakerInner {
    state: BreakerState,
    failure_count: u32,
    last_failure: Option<Instant>,
}

/// Point-in-time view of a breaker, for the admin surface.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    /// Breaker name (provider).
    pub name: String,
    /// Current state.
    pub state: BreakerState,
    /// Consecutive failure count.
    pub failure_count: u32,
    /// Seconds since the last recorded failure, if any.
    pub seconds_since_last_failure: Option<u64>,
}

/// A three-state guard around calls to one provider.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Create a new breaker in the closed state.
    #[must_use]
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                failure_count: 0,
                last_failure: None,
            }),
        }
    }

    /// Breaker name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state, accounting for an elapsed open window.
    #[must_use]
    pub fn state(&self) -> BreakerState {
        let inner = self.lock();
        if inner.state == BreakerState::Open && self.open_elapsed(&inner) {
            BreakerState::HalfOpen
        } else {
            inner.state
        }
    }

    /// Run `operation` through the breaker.
    ///
    /// While open, fails fast with [`BreakerError::Open`] without invoking
    /// `operation` until `reset_after` has elapsed since the last failure, at
    /// which point a single probe is allowed through. Every invocation runs
    /// under `call_timeout`; timeouts count as failures.
    ///
    /// # Errors
    ///
    /// Returns [`BreakerError::Open`] on fast-fail, [`BreakerError::Timeout`]
    /// when the call exceeds the bound, or [`BreakerError::Inner`] wrapping
    /// the operation's own error.
    pub async fn execute<T, E, F, Fut>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let probing = self.admit()?;

        match tokio::time::timeout(self.config.call_timeout, operation()).await {
            Ok(Ok(value)) => {
                self.on_success();
                Ok(value)
            }
            Ok(Err(err)) => {
                self.on_failure(probing);
                Err(BreakerError::Inner(err))
            }
            Err(_elapsed) => {
                self.on_failure(probing);
                Err(BreakerError::Timeout {
                    name: self.name.clone(),
                    timeout: self.config.call_timeout,
                })
            }
        }
    }

    /// Snapshot for metrics/admin display.
    #[must_use]
    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.lock();
        BreakerSnapshot {
            name: self.name.clone(),
            state: inner.state,
            failure_count: inner.failure_count,
            seconds_since_last_failure: inner.last_failure.map(|at| at.elapsed().as_secs()),
        }
    }

    /// Decide whether a call may proceed; returns whether it is a half-open
    /// probe.
    fn admit<E>(&self) -> Result<bool, BreakerError<E>> {
        let mut inner = self.lock();
        match inner.state {
            BreakerState::Closed => Ok(false),
            BreakerState::HalfOpen => Ok(true),
            BreakerState::Open => {
                if self.open_elapsed(&inner) {
                    inner.state = BreakerState::HalfOpen;
                    tracing::info!(name = %self.name, "circuit breaker probing");
                    Ok(true)
                } else {
                    let elapsed = inner
                        .last_failure
                        .map_or(Duration::ZERO, |at| at.elapsed());
                    Err(BreakerError::Open {
                        name: self.name.clone(),
                        retry_after: self.config.reset_after.saturating_sub(elapsed),
                    })
                }
            }
        }
    }

    fn on_success(&self) {
        let mut inner = self.lock();
        let previous = inner.state;
        inner.failure_count = 0;
        inner.state = BreakerState::Closed;
        if previous != BreakerState::Closed {
            tracing::info!(name = %self.name, from = %previous, "circuit breaker closed");
        }
    }

    fn on_failure(&self, probing: bool) {
        let mut inner = self.lock();
        inner.failure_count += 1;
        inner.last_failure = Some(Instant::now());

        // A failed half-open probe re-opens immediately; in the closed state
        // the circuit trips once the consecutive-failure threshold is hit.
        let should_open =
            probing || inner.failure_count >= self.config.failure_threshold;
        if should_open && inner.state != BreakerState::Open {
            inner.state = BreakerState::Open;
            tracing::warn!(
                name = %self.name,
                failures = inner.failure_count,
                "circuit breaker opened"
            );
        }
    }

    fn open_elapsed(&self, inner: &BreakerInner) -> bool {
        inner
            .last_failure
            .is_some_and(|at| at.elapsed() >= self.config.reset_after)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerInner> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[derive(Debug, Error)]
    #[error("boom")]
    struct Boom;

    fn fast_config(threshold: u32, reset_ms: u64) -> BreakerConfig {
        BreakerConfig {
            failure_threshold: threshold,
            reset_after: Duration::from_millis(reset_ms),
            call_timeout: Duration::from_secs(1),
        }
    }

    async fn fail(breaker: &CircuitBreaker) {
        let result: Result<(), _> = breaker.execute(|| async { Err(Boom) }).await;
        assert!(matches!(
            result,
            Err(BreakerError::Inner(_) | BreakerError::Open { .. })
        ));
    }

    #[tokio::test]
    async fn test_initial_state_is_closed() {
        let breaker = CircuitBreaker::new("test", BreakerConfig::default());
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[tokio::test]
    async fn test_opens_after_threshold_consecutive_failures() {
        let breaker = CircuitBreaker::new("test", fast_config(3, 60_000));

        for _ in 0..3 {
            fail(&breaker).await;
        }
        assert_eq!(breaker.state(), BreakerState::Open);
    }

    #[tokio::test]
    async fn test_open_circuit_fails_fast_without_invoking() {
        let breaker = CircuitBreaker::new("test", fast_config(3, 60_000));
        for _ in 0..3 {
            fail(&breaker).await;
        }

        let invocations = AtomicU32::new(0);
        let result: Result<(), BreakerError<Boom>> = breaker
            .execute(|| {
                invocations.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            })
            .await;

        assert!(matches!(result, Err(BreakerError::Open { .. })));
        assert_eq!(invocations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_success_resets_failure_count() {
        let breaker = CircuitBreaker::new("test", fast_config(3, 60_000));
        fail(&breaker).await;
        fail(&breaker).await;

        let result: Result<(), BreakerError<Boom>> =
            breaker.execute(|| async { Ok(()) }).await;
        assert!(result.is_ok());
        assert_eq!(breaker.snapshot().failure_count, 0);

        // Two more failures must not trip the circuit; the count restarted.
        fail(&breaker).await;
        fail(&breaker).await;
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[tokio::test]
    async fn test_open_transitions_to_half_open_after_reset() {
        let breaker = CircuitBreaker::new("test", fast_config(2, 10));
        fail(&breaker).await;
        fail(&breaker).await;
        assert_eq!(breaker.state(), BreakerState::Open);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(breaker.state(), BreakerState::HalfOpen);

        // The probe is allowed through and a success closes the circuit.
        let result: Result<(), BreakerError<Boom>> =
            breaker.execute(|| async { Ok(()) }).await;
        assert!(result.is_ok());
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[tokio::test]
    async fn test_failed_probe_reopens_immediately() {
        let breaker = CircuitBreaker::new("test", fast_config(5, 200));
        // Trip with exactly the threshold.
        for _ in 0..5 {
            fail(&breaker).await;
        }
        assert_eq!(breaker.state(), BreakerState::Open);

        tokio::time::sleep(Duration::from_millis(250)).await;

        // Probe fails: straight back to open, no second probe allowed.
        fail(&breaker).await;
        let invocations = AtomicU32::new(0);
        let result: Result<(), BreakerError<Boom>> = breaker
            .execute(|| {
                invocations.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            })
            .await;
        assert!(matches!(result, Err(BreakerError::Open { .. })));
        assert_eq!(invocations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failure() {
        let config = BreakerConfig {
            failure_threshold: 1,
            reset_after: Duration::from_secs(60),
            call_timeout: Duration::from_millis(10),
        };
        let breaker = CircuitBreaker::new("test", config);

        let result: Result<(), BreakerError<Boom>> = breaker
            .execute(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(BreakerError::Timeout { .. })));
        assert_eq!(breaker.state(), BreakerState::Open);
    }

    #[tokio::test]
    async fn test_snapshot_reports_state() {
        let breaker = CircuitBreaker::new("printful", fast_config(2, 60_000));
        fail(&breaker).await;

        let snapshot = breaker.snapshot();
        assert_eq!(snapshot.name, "printful");
        assert_eq!(snapshot.state, BreakerState::Closed);
        assert_eq!(snapshot.failure_count, 1);
        assert!(snapshot.seconds_since_last_failure.is_some());
    }
}
