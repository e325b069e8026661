//! Per-backend circuit breaker with a sliding failure window (spec §4.5,
//! invariant I3).
//!
//! The teacher's `reasoning/circuit_breaker.rs` is a simple consecutive
//! failure counter; this extends it to a timestamped sliding window so
//! that failures aging out of the window stop counting towards the
//! threshold, and so only transient failures participate in the
//! tie-break (permanent/configuration failures never trip the breaker).

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::config::CircuitBreakerDefaults;
use crate::types::FailureClassification;

/// Observable breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CircuitStats {
    pub state: CircuitState,
    pub failures_in_window: u32,
}

struct Inner {
    state: CircuitState,
    opened_at: Option<Instant>,
    /// Only transient-classified failures are pushed here; successes are
    /// represented implicitly by the window aging them out.
    failures: VecDeque<Instant>,
    half_open_probe_in_flight: bool,
}

/// A single backend's circuit breaker.
pub struct CircuitBreaker {
    config: CircuitBreakerDefaults,
    inner: RwLock<Inner>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerDefaults) -> Self {
        Self {
            config,
            inner: RwLock::new(Inner {
                state: CircuitState::Closed,
                opened_at: None,
                failures: VecDeque::new(),
                half_open_probe_in_flight: false,
            }),
        }
    }

    fn prune(&self, inner: &mut Inner, now: Instant) {
        let window = self.config.window();
        while let Some(&front) = inner.failures.front() {
            if now.duration_since(front) > window {
                inner.failures.pop_front();
            } else {
                break;
            }
        }
    }

    /// Whether a call may proceed right now, advancing `OPEN -> HALF_OPEN`
    /// once the cooldown has elapsed.
    pub async fn allow(&self) -> bool {
        let now = Instant::now();
        let mut inner = self.inner.write().await;
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => {
                if inner.half_open_probe_in_flight {
                    false
                } else {
                    inner.half_open_probe_in_flight = true;
                    true
                }
            }
            CircuitState::Open => {
                let opened_at = inner.opened_at.unwrap_or(now);
                if now.duration_since(opened_at) >= self.config.cooldown() {
                    inner.state = CircuitState::HalfOpen;
                    inner.half_open_probe_in_flight = true;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Record the outcome of a call. `classification` is `None` for
    /// successes or for failures that should never count toward the
    /// breaker (spec §4.5: only `Transient` counts).
    pub async fn record_outcome(&self, success: bool, classification: Option<FailureClassification>) {
        let now = Instant::now();
        let mut inner = self.inner.write().await;
        self.prune(&mut inner, now);

        if inner.state == CircuitState::HalfOpen {
            inner.half_open_probe_in_flight = false;
            if success {
                inner.state = CircuitState::Closed;
                inner.failures.clear();
                inner.opened_at = None;
            } else {
                inner.state = CircuitState::Open;
                inner.opened_at = Some(now);
            }
            return;
        }

        if success {
            return;
        }

        if classification != Some(FailureClassification::Transient) {
            return;
        }

        inner.failures.push_back(now);
        if inner.state == CircuitState::Closed
            && inner.failures.len() as u32 >= self.config.failure_threshold
        {
            inner.state = CircuitState::Open;
            inner.opened_at = Some(now);
        }
    }

    pub async fn get_state(&self) -> CircuitState {
        self.inner.read().await.state
    }

    pub async fn get_stats(&self) -> CircuitStats {
        let now = Instant::now();
        let mut inner = self.inner.write().await;
        self.prune(&mut inner, now);
        CircuitStats {
            state: inner.state,
            failures_in_window: inner.failures.len() as u32,
        }
    }

    pub fn recovery_remaining(&self, opened_at: Instant) -> Duration {
        self.config
            .cooldown()
            .saturating_sub(Instant::now().duration_since(opened_at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CircuitBreakerDefaults {
        CircuitBreakerDefaults {
            failure_threshold: 3,
            window_ms: 60_000,
            cooldown_ms: 50,
        }
    }

    #[tokio::test]
    async fn stays_closed_below_threshold() {
        let breaker = CircuitBreaker::new(config());
        for _ in 0..2 {
            breaker
                .record_outcome(false, Some(FailureClassification::Transient))
                .await;
        }
        assert_eq!(breaker.get_state().await, CircuitState::Closed);
        assert!(breaker.allow().await);
    }

    #[tokio::test]
    async fn opens_at_threshold() {
        let breaker = CircuitBreaker::new(config());
        for _ in 0..3 {
            breaker
                .record_outcome(false, Some(FailureClassification::Transient))
                .await;
        }
        assert_eq!(breaker.get_state().await, CircuitState::Open);
        assert!(!breaker.allow().await);
    }

    #[tokio::test]
    async fn permanent_failures_never_trip_the_breaker() {
        let breaker = CircuitBreaker::new(config());
        for _ in 0..10 {
            breaker
                .record_outcome(false, Some(FailureClassification::Permanent))
                .await;
        }
        assert_eq!(breaker.get_state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn half_open_after_cooldown_and_closes_on_success() {
        let breaker = CircuitBreaker::new(config());
        for _ in 0..3 {
            breaker
                .record_outcome(false, Some(FailureClassification::Transient))
                .await;
        }
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(breaker.allow().await);
        assert_eq!(breaker.get_state().await, CircuitState::HalfOpen);
        breaker.record_outcome(true, None).await;
        assert_eq!(breaker.get_state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn half_open_reopens_on_failure() {
        let breaker = CircuitBreaker::new(config());
        for _ in 0..3 {
            breaker
                .record_outcome(false, Some(FailureClassification::Transient))
                .await;
        }
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(breaker.allow().await);
        breaker
            .record_outcome(false, Some(FailureClassification::Transient))
            .await;
        assert_eq!(breaker.get_state().await, CircuitState::Open);
    }

    #[tokio::test]
    async fn half_open_admits_exactly_one_probe() {
        let breaker = CircuitBreaker::new(config());
        for _ in 0..3 {
            breaker
                .record_outcome(false, Some(FailureClassification::Transient))
                .await;
        }
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(breaker.allow().await);
        assert_eq!(breaker.get_state().await, CircuitState::HalfOpen);
        assert!(!breaker.allow().await, "a second concurrent probe must be refused");
    }

    #[tokio::test]
    async fn window_ages_out_old_failures() {
        let mut short_window = config();
        short_window.window_ms = 20;
        let breaker = CircuitBreaker::new(short_window);
        breaker
            .record_outcome(false, Some(FailureClassification::Transient))
            .await;
        breaker
            .record_outcome(false, Some(FailureClassification::Transient))
            .await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        let stats = breaker.get_stats().await;
        assert_eq!(stats.failures_in_window, 0);
    }
}
