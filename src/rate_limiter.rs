use crate::config::RateLimitConfig;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

/// Sliding-window admission gate for routing provider calls
///
/// # Behaviour
/// - Keeps a log of admission times inside the trailing window
/// - Entries at least `window` old are pruned before every check
/// - When the log is full the caller sleeps until the oldest entry
///   ages out (plus `safety_margin`), then re-checks
///
/// Shared between concurrent fill workers behind an `Arc`; only the
/// calling task is suspended while waiting.
pub struct RateLimiter {
    max_calls: usize,
    window: Duration,
    safety_margin: Duration,
    calls: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        RateLimiter {
            max_calls: config.max_calls.max(1),
            window: config.window(),
            safety_margin: config.safety_margin(),
            calls: Mutex::new(VecDeque::with_capacity(config.max_calls)),
        }
    }

    /// Wait until another call fits in the window, then record it.
    pub async fn admit(&self) {
        loop {
            let wait = {
                let mut calls = self.calls.lock().await;
                let now = Instant::now();
                prune(&mut calls, now, self.window);

                if calls.len() < self.max_calls {
                    calls.push_back(now);
                    return;
                }

                match calls.front() {
                    Some(&oldest) => {
                        (oldest + self.window + self.safety_margin).saturating_duration_since(now)
                    }
                    None => Duration::ZERO,
                }
            };

            log::debug!(
                "Rate limit reached ({} calls/{}s), waiting {:.1}s",
                self.max_calls,
                self.window.as_secs(),
                wait.as_secs_f64()
            );
            sleep(wait).await;
        }
    }

    /// Number of admissions still inside the trailing window
    pub async fn in_window(&self) -> usize {
        let mut calls = self.calls.lock().await;
        prune(&mut calls, Instant::now(), self.window);
        calls.len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(&RateLimitConfig::default())
    }
}

fn prune(calls: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(&oldest) = calls.front() {
        if now.saturating_duration_since(oldest) >= window {
            calls.pop_front();
        } else {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_admits_immediately_under_budget() {
        let limiter = RateLimiter::default();
        let start = Instant::now();

        for _ in 0..35 {
            limiter.admit().await;
        }

        assert_eq!(Instant::now(), start);
        assert_eq!(limiter.in_window().await, 35);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blocks_until_oldest_ages_out() {
        let limiter = RateLimiter::default();
        let start = Instant::now();

        for _ in 0..35 {
            limiter.admit().await;
        }
        limiter.admit().await;

        let waited = Instant::now() - start;
        assert!(waited >= Duration::from_secs(60));
        assert!(waited <= Duration::from_secs(61));
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_never_exceeds_window_budget() {
        let limiter = Arc::new(RateLimiter::default());
        let admitted = Arc::new(std::sync::Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for _ in 0..100 {
            let limiter = limiter.clone();
            let admitted = admitted.clone();
            handles.push(tokio::spawn(async move {
                limiter.admit().await;
                admitted.lock().unwrap().push(Instant::now());
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let mut times = admitted.lock().unwrap().clone();
        times.sort();
        assert_eq!(times.len(), 100);

        let window = Duration::from_secs(60);
        for (i, &t) in times.iter().enumerate() {
            let in_window = times[i..].iter().filter(|&&u| u - t < window).count();
            assert!(in_window <= 35, "{} admissions within 60s of {:?}", in_window, t);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_staggered_requests_prune_old_entries() {
        let limiter = RateLimiter::new(&RateLimitConfig {
            max_calls: 2,
            window_secs: 10,
            safety_margin_ms: 0,
        });

        limiter.admit().await;
        tokio::time::advance(Duration::from_secs(6)).await;
        limiter.admit().await;
        tokio::time::advance(Duration::from_secs(5)).await;

        // first entry is 11s old and gets pruned
        assert_eq!(limiter.in_window().await, 1);

        let before = Instant::now();
        limiter.admit().await;
        assert_eq!(Instant::now(), before);
    }
}
