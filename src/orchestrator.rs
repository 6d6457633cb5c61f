use crate::circuit_breaker::CircuitBreaker;
use crate::config::Config;
use crate::rate_limiter::RateLimiter;
use crate::route_fill::RouteFillClient;
use crate::types::{FillFailure, FillResult, Gap, Sample};
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;

/// Coordinates fill attempts for every gap of a finished track
///
/// # Flow per gap
/// 1. Circuit breaker refuses: `Unfilled(CircuitOpen)`, no call made
/// 2. Wait for rate limiter admission
/// 3. One provider call; the outcome is recorded on the breaker
///
/// At most `pool_size` gaps are in flight at once. Results come back in
/// completion order but are returned keyed by gap id, so callers never
/// depend on scheduling.
pub struct GapFiller<C> {
    client: C,
    limiter: Arc<RateLimiter>,
    breaker: Arc<CircuitBreaker>,
    pool_size: usize,
}

impl<C: RouteFillClient> GapFiller<C> {
    pub fn new(
        client: C,
        limiter: Arc<RateLimiter>,
        breaker: Arc<CircuitBreaker>,
        pool_size: usize,
    ) -> Self {
        GapFiller {
            client,
            limiter,
            breaker,
            pool_size: pool_size.max(1),
        }
    }

    /// Build with a fresh limiter and breaker owned by this filler
    pub fn from_config(client: C, config: &Config) -> Self {
        Self::new(
            client,
            Arc::new(RateLimiter::new(&config.rate_limit)),
            Arc::new(CircuitBreaker::new(&config.breaker)),
            config.pool_size.0,
        )
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Attempt every gap once, returning exactly one result per gap id.
    pub async fn fill_all(&self, gaps: &[Gap]) -> HashMap<u32, FillResult> {
        if gaps.is_empty() {
            return HashMap::new();
        }

        if !self.client.is_configured() {
            log::warn!(
                "Routing provider {} not configured, leaving {} gap(s) unfilled",
                self.client.name(),
                gaps.len()
            );
            return gaps
                .iter()
                .map(|gap| (gap.id, FillResult::unfilled(gap.id, FillFailure::NotConfigured)))
                .collect();
        }

        log::info!(
            "Filling {} gap(s) via {} with {} worker(s)",
            gaps.len(),
            self.client.name(),
            self.pool_size
        );

        let results: HashMap<u32, FillResult> = stream::iter(gaps.iter().cloned())
            .map(|gap| self.fill_one(gap))
            .buffer_unordered(self.pool_size)
            .map(|result| (result.gap_id, result))
            .collect()
            .await;

        let filled = results.values().filter(|r| r.is_filled()).count();
        log::info!(
            "Filled {}/{} gap(s), circuit breaker {:?}",
            filled,
            gaps.len(),
            self.breaker.state()
        );
        results
    }

    async fn fill_one(&self, gap: Gap) -> FillResult {
        if !self.breaker.allow() {
            log::debug!("Gap {} skipped: circuit breaker open", gap.id);
            return FillResult::unfilled(gap.id, FillFailure::CircuitOpen);
        }

        self.limiter.admit().await;

        match self
            .client
            .fetch_walking_path(gap.start_sample.coord(), gap.end_sample.coord())
            .await
        {
            Ok(path) => {
                self.breaker.record_outcome(true);
                log::debug!("Gap {} filled with {} path point(s)", gap.id, path.len());
                let timestamp = gap.start_sample.timestamp;
                let points = path
                    .into_iter()
                    .map(|coord| Sample::reconstructed(coord, timestamp))
                    .collect();
                FillResult::filled(gap.id, points)
            }
            Err(e) => {
                self.breaker.record_outcome(false);
                log::warn!("Gap {} fill failed: {}", gap.id, e);
                FillResult::unfilled(gap.id, e.into())
            }
        }
    }
}
