//! Retry wrapper for provider calls.
//!
//! [`RetryPolicy`] gives any [`Provider`] a bounded number of attempts
//! with full-jitter pacing: before attempt n+1 the policy sleeps for a
//! duration drawn uniformly from `[floor, window(n)]`, where the window
//! starts at the floor and triples per retry up to the ceiling. Drawing
//! the whole delay (rather than adding jitter on top of a fixed curve)
//! spreads concurrent retriers apart, which matters most under rate
//! limiting. Only errors [`ProviderError::is_transient`] deems
//! retryable are retried; a rate-limited response's suggested wait acts
//! as a lower bound on the drawn delay.

use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::Result;
use crate::provider::{ChunkStream, Provider};
use crate::types::{ChatRequest, ChatResponse};

/// Attempt and pacing bounds for a [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct RetryLimits {
    /// Total attempts, counting the first (default 4: one try plus
    /// three retries).
    pub attempts: u32,
    /// Smallest pause between attempts (default 250 ms).
    pub floor: Duration,
    /// Largest pause between attempts (default 20 s).
    pub ceiling: Duration,
}

impl Default for RetryLimits {
    fn default() -> Self {
        Self {
            attempts: 4,
            floor: Duration::from_millis(250),
            ceiling: Duration::from_secs(20),
        }
    }
}

/// A provider wrapper that retries transient failures.
pub struct RetryPolicy<P> {
    inner: P,
    limits: RetryLimits,
    /// Randomly-seeded hasher driving the jitter draw.
    draw: RandomState,
    /// Monotone counter mixed into every draw so repeated attempts at
    /// the same depth do not collide on a delay.
    ticks: AtomicU64,
}

impl<P: Provider> RetryPolicy<P> {
    /// Wrap a provider with the given limits.
    pub fn new(inner: P, limits: RetryLimits) -> Self {
        Self {
            inner,
            limits,
            draw: RandomState::new(),
            ticks: AtomicU64::new(0),
        }
    }

    /// Returns the configured limits.
    pub fn limits(&self) -> &RetryLimits {
        &self.limits
    }

    /// Returns a reference to the inner provider.
    pub fn inner(&self) -> &P {
        &self.inner
    }

    /// Draw the pause before the retry that follows attempt
    /// `finished_attempt` (1-based), honoring `at_least` when the
    /// provider asked for a specific wait.
    fn pause(&self, finished_attempt: u32, at_least: Option<Duration>) -> Duration {
        let window = self
            .limits
            .floor
            .saturating_mul(3u32.saturating_pow(finished_attempt.saturating_sub(1)))
            .min(self.limits.ceiling);
        let span_ms = window.saturating_sub(self.limits.floor).as_millis() as u64;

        let drawn_ms = if span_ms == 0 {
            0
        } else {
            let mut hasher = self.draw.build_hasher();
            hasher.write_u64(self.ticks.fetch_add(1, Ordering::Relaxed));
            hasher.write_u32(finished_attempt);
            hasher.finish() % (span_ms + 1)
        };

        let drawn = self.limits.floor + Duration::from_millis(drawn_ms);
        match at_least {
            Some(min) => drawn.max(min),
            None => drawn,
        }
    }
}

#[async_trait]
impl<P: Provider> Provider for RetryPolicy<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let err = match self.inner.complete(request).await {
                Ok(response) => {
                    if attempt > 1 {
                        debug!(provider = %self.inner.name(), attempt, "request recovered");
                    }
                    return Ok(response);
                }
                Err(err) => err,
            };

            if !err.is_transient() || attempt >= self.limits.attempts {
                return Err(err);
            }

            let delay = self.pause(attempt, err.suggested_delay());
            warn!(
                provider = %self.inner.name(),
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "transient provider error, will retry"
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn complete_stream(&self, request: &ChatRequest) -> Result<ChunkStream> {
        // Opening the stream is retried; mid-stream failures surface to
        // the consumer, whose agent layer re-issues the call.
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let err = match self.inner.complete_stream(request).await {
                Ok(stream) => return Ok(stream),
                Err(err) => err,
            };

            if !err.is_transient() || attempt >= self.limits.attempts {
                return Err(err);
            }

            let delay = self.pause(attempt, err.suggested_delay());
            warn!(
                provider = %self.inner.name(),
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "transient stream-open error, will retry"
            );
            tokio::time::sleep(delay).await;
        }
    }
}
