/*!
 * Per-source token bucket.
 *
 * A bucket holds up to `capacity` tokens and refills continuously at the
 * configured requests-per-minute rate. Every network call an adapter makes
 * consumes one token.
 */

use std::sync::Arc;
use std::time::Duration;

use log::debug;
use parking_lot::Mutex;

use chrono::{DateTime, Utc};

use crate::clock::Clock;

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: DateTime<Utc>,
}

/// Token bucket driven by an injected clock
#[derive(Debug)]
pub struct TokenBucket {
    state: Mutex<BucketState>,
    capacity: f64,
    refill_per_sec: f64,
    clock: Arc<dyn Clock>,
}

impl TokenBucket {
    /// Create a full bucket allowing `requests_per_minute` with `burst` capacity
    pub fn new(requests_per_minute: u32, burst: u32, clock: Arc<dyn Clock>) -> Self {
        let capacity = f64::from(burst.max(1));
        let now = clock.now();
        Self {
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: now,
            }),
            capacity,
            refill_per_sec: f64::from(requests_per_minute) / 60.0,
            clock,
        }
    }

    fn refill(&self, state: &mut BucketState) {
        let now = self.clock.now();
        let elapsed_ms = (now - state.last_refill).num_milliseconds();
        if elapsed_ms > 0 {
            let added = elapsed_ms as f64 / 1000.0 * self.refill_per_sec;
            state.tokens = (state.tokens + added).min(self.capacity);
            state.last_refill = now;
        }
    }

    /// Take a token if one is available
    pub fn try_acquire(&self) -> bool {
        let mut state = self.state.lock();
        self.refill(&mut state);
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Time until the next token becomes available
    pub fn time_until_available(&self) -> Duration {
        let mut state = self.state.lock();
        self.refill(&mut state);
        if state.tokens >= 1.0 || self.refill_per_sec <= 0.0 {
            return Duration::ZERO;
        }
        let missing = 1.0 - state.tokens;
        Duration::from_secs_f64(missing / self.refill_per_sec)
    }

    /// Tokens currently available (fractional)
    pub fn available(&self) -> f64 {
        let mut state = self.state.lock();
        self.refill(&mut state);
        state.tokens
    }

    /// Take a token, sleeping up to `max_wait` for one to appear.
    ///
    /// A zero `max_wait` never sleeps.
    pub async fn acquire_within(&self, max_wait: Duration) -> bool {
        let started = tokio::time::Instant::now();
        loop {
            if self.try_acquire() {
                return true;
            }
            let wait = self.time_until_available().max(Duration::from_millis(1));
            if started.elapsed() + wait > max_wait {
                return false;
            }
            debug!("Rate limit reached, waiting {:?} for a token", wait);
            tokio::time::sleep(wait).await;
        }
    }
}
