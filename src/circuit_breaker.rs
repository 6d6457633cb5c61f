//! Consecutive-failure circuit breaker for the routing provider.
//!
//! # State Machine
//!
//! ```text
//! Closed --[failure_threshold consecutive failures]--> Open
//! Open   --[recorded success]--> Closed
//! Open   --[cooldown elapsed, if configured]--> one probe allowed
//! ```
//!
//! Without a cooldown the breaker stays open for the rest of the session:
//! callers stop calling, so no success can close it again.

use crate::config::BreakerConfig;
use serde::Serialize;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CircuitState {
    Closed,
    Open,
}

#[derive(Debug)]
struct BreakerInner {
    consecutive_failures: u32,
    /// Set when the breaker opened, pushed forward on every probe
    opened_at: Option<Instant>,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    failure_threshold: u32,
    cooldown: Option<Duration>,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(config: &BreakerConfig) -> Self {
        CircuitBreaker {
            failure_threshold: config.failure_threshold.max(1),
            cooldown: config.cooldown(),
            inner: Mutex::new(BreakerInner {
                consecutive_failures: 0,
                opened_at: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        // The counter stays meaningful even if a holder panicked
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Whether a provider call may proceed.
    pub fn allow(&self) -> bool {
        let mut inner = self.lock();
        if inner.consecutive_failures < self.failure_threshold {
            return true;
        }

        match (self.cooldown, inner.opened_at) {
            (Some(cooldown), Some(opened_at)) if opened_at.elapsed() >= cooldown => {
                // Let exactly one caller probe; the rest wait for another cooldown
                inner.opened_at = Some(Instant::now());
                log::info!("Circuit breaker cooldown elapsed, allowing probe call");
                true
            }
            _ => false,
        }
    }

    pub fn record_outcome(&self, success: bool) {
        let mut inner = self.lock();
        if success {
            if inner.consecutive_failures >= self.failure_threshold {
                log::info!("Circuit breaker closed after successful call");
            }
            inner.consecutive_failures = 0;
            inner.opened_at = None;
            return;
        }

        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
        if inner.consecutive_failures == self.failure_threshold {
            inner.opened_at = Some(Instant::now());
            log::warn!(
                "Circuit breaker opened after {} consecutive provider failures",
                inner.consecutive_failures
            );
        } else if inner.consecutive_failures > self.failure_threshold {
            // failed probe restarts the cooldown
            inner.opened_at = Some(Instant::now());
        }
    }

    pub fn state(&self) -> CircuitState {
        if self.lock().consecutive_failures >= self.failure_threshold {
            CircuitState::Open
        } else {
            CircuitState::Closed
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(&BreakerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opens_after_exactly_three_failures() {
        let breaker = CircuitBreaker::default();

        breaker.record_outcome(false);
        breaker.record_outcome(false);
        assert!(breaker.allow());
        assert_eq!(breaker.state(), CircuitState::Closed);

        breaker.record_outcome(false);
        assert!(!breaker.allow());
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[test]
    fn test_success_interrupts_failure_streak() {
        let breaker = CircuitBreaker::default();

        breaker.record_outcome(false);
        breaker.record_outcome(false);
        breaker.record_outcome(true);
        breaker.record_outcome(false);
        breaker.record_outcome(false);

        assert!(breaker.allow());
        assert_eq!(breaker.consecutive_failures(), 2);
    }

    #[test]
    fn test_stays_open_until_success() {
        let breaker = CircuitBreaker::default();
        for _ in 0..3 {
            breaker.record_outcome(false);
        }

        for _ in 0..10 {
            assert!(!breaker.allow());
        }

        breaker.record_outcome(true);
        assert_eq!(breaker.consecutive_failures(), 0);
        assert!(breaker.allow());
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_cooldown_means_no_recovery() {
        let breaker = CircuitBreaker::default();
        for _ in 0..3 {
            breaker.record_outcome(false);
        }

        tokio::time::advance(Duration::from_secs(3600)).await;
        assert!(!breaker.allow());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_allows_single_probe() {
        let breaker = CircuitBreaker::new(&BreakerConfig {
            failure_threshold: 3,
            cooldown_secs: Some(30),
        });
        for _ in 0..3 {
            breaker.record_outcome(false);
        }
        assert!(!breaker.allow());

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(breaker.allow());
        // second caller in the same instant is still refused
        assert!(!breaker.allow());

        // failed probe keeps it open for another cooldown
        breaker.record_outcome(false);
        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(!breaker.allow());

        tokio::time::advance(Duration::from_secs(25)).await;
        assert!(breaker.allow());
        breaker.record_outcome(true);
        assert_eq!(breaker.state(), CircuitState::Closed);
    }
}
