/*!
 * Fallback fetch coordination.
 *
 * The coordinator owns the adapters in priority order, each with its own
 * token bucket, and the shared script cache. A lookup consults the cache,
 * then the adapters; the first adapter in priority order that produces a
 * script wins even when a lower-priority adapter answers sooner.
 */

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use log::{debug, info, warn};
use parking_lot::Mutex;

use crate::app_config::{SourceConfig, SourcesConfig};
use crate::clock::Clock;
use crate::errors::{AcquisitionError, FetchError, SourceFailure};
use crate::sources::cache::{normalize_title, ScriptCache};
use crate::sources::rate_limit::TokenBucket;
use crate::sources::{create_source, RawScript, ScriptLocation, ScriptSource};

/// Rate and time limits for one adapter
#[derive(Debug, Clone)]
pub struct SourceLimits {
    /// Requests per minute; None means unlimited
    pub rate_limit: Option<u32>,
    /// Bucket capacity
    pub burst: u32,
    /// Longest wait for a token; zero skips the adapter at once
    pub max_wait: Duration,
    /// Timeout for each search or fetch call
    pub timeout: Duration,
}

impl Default for SourceLimits {
    fn default() -> Self {
        Self {
            rate_limit: None,
            burst: 1,
            max_wait: Duration::ZERO,
            timeout: Duration::from_secs(30),
        }
    }
}

impl From<&SourceConfig> for SourceLimits {
    fn from(config: &SourceConfig) -> Self {
        Self {
            rate_limit: config.rate_limit,
            burst: config.burst,
            max_wait: Duration::from_millis(config.max_wait_ms),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

#[derive(Debug)]
struct SourceSlot {
    source: Arc<dyn ScriptSource>,
    bucket: Option<TokenBucket>,
    max_wait: Duration,
    timeout: Duration,
}

impl SourceSlot {
    fn name(&self) -> &str {
        self.source.name()
    }

    async fn take_token(&self) -> Result<(), SourceFailure> {
        if let Some(bucket) = &self.bucket {
            if !bucket.acquire_within(self.max_wait).await {
                debug!("Skipping {}: rate limit exhausted", self.name());
                return Err(SourceFailure::Error(FetchError::RateLimited(self.name().to_string())));
            }
        }
        Ok(())
    }

    async fn search(&self, title: &str) -> Result<Vec<ScriptLocation>, SourceFailure> {
        self.take_token().await?;
        match tokio::time::timeout(self.timeout, self.source.search(title)).await {
            Ok(Ok(locations)) => Ok(locations),
            Ok(Err(e)) => Err(SourceFailure::Error(e)),
            Err(_) => Err(SourceFailure::Error(FetchError::Timeout(self.timeout))),
        }
    }

    /// Search, then fetch the first candidate
    async fn acquire(&self, title: &str) -> Result<RawScript, SourceFailure> {
        let locations = self.search(title).await?;
        let Some(location) = locations.into_iter().next() else {
            return Err(SourceFailure::NoMatch);
        };

        self.take_token().await?;
        let mut script = match tokio::time::timeout(self.timeout, self.source.fetch(&location)).await {
            Ok(Ok(script)) => script,
            Ok(Err(e)) => return Err(SourceFailure::Error(e)),
            Err(_) => return Err(SourceFailure::Error(FetchError::Timeout(self.timeout))),
        };

        if script.text.trim().is_empty() {
            return Err(SourceFailure::Error(FetchError::EmptyScript));
        }
        script.source = self.name().to_string();
        Ok(script)
    }
}

/// Multi-source script fetcher with cache, rate limits and fallback
#[derive(Debug)]
pub struct FetchCoordinator {
    slots: Vec<SourceSlot>,
    cache: Arc<ScriptCache>,
    clock: Arc<dyn Clock>,
    concurrent: bool,
    in_flight: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl FetchCoordinator {
    /// Create a coordinator without adapters
    pub fn new(cache: Arc<ScriptCache>, clock: Arc<dyn Clock>) -> Self {
        Self {
            slots: Vec::new(),
            cache,
            clock,
            concurrent: true,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Create a coordinator with the configured adapters, in priority order
    pub fn from_config(config: &SourcesConfig, cache: Arc<ScriptCache>, clock: Arc<dyn Clock>) -> Self {
        let mut coordinator = Self::new(cache, clock).concurrent(config.concurrent);
        for source_config in config.enabled_sources() {
            let source = create_source(source_config, &config.user_agent);
            coordinator = coordinator.with_source(source, SourceLimits::from(source_config));
        }
        coordinator
    }

    /// Append an adapter at the lowest priority so far
    pub fn with_source(mut self, source: Arc<dyn ScriptSource>, limits: SourceLimits) -> Self {
        let bucket = limits
            .rate_limit
            .map(|rpm| TokenBucket::new(rpm, limits.burst, self.clock.clone()));
        self.slots.push(SourceSlot {
            source,
            bucket,
            max_wait: limits.max_wait,
            timeout: limits.timeout,
        });
        self
    }

    /// Query all adapters at once (true) or one after another (false)
    pub fn concurrent(mut self, concurrent: bool) -> Self {
        self.concurrent = concurrent;
        self
    }

    /// The shared script cache
    pub fn cache(&self) -> &Arc<ScriptCache> {
        &self.cache
    }

    /// Adapter names in priority order
    pub fn source_names(&self) -> Vec<&str> {
        self.slots.iter().map(|slot| slot.name()).collect()
    }

    /// Get the script for `title` from the cache or the first adapter that has it
    pub async fn fetch_script(&self, title: &str) -> Result<RawScript, AcquisitionError> {
        if let Some(script) = self.cache.get(title) {
            return Ok(script);
        }

        let flight = Flight::join(self, normalize_title(title));
        let _guard = flight.lock.lock().await;
        // Filled by a concurrent caller while we waited
        if let Some(script) = self.cache.get(title) {
            return Ok(script);
        }
        self.acquire(title).await
    }

    /// Titles with an acquisition in progress or waiting for one
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().len()
    }

    /// Candidate locations from the first adapter that knows `title`
    pub async fn search(&self, title: &str) -> Result<Vec<ScriptLocation>, AcquisitionError> {
        let mut attempts = Vec::new();
        for slot in &self.slots {
            match slot.search(title).await {
                Ok(locations) if !locations.is_empty() => return Ok(locations),
                Ok(_) => attempts.push((slot.name().to_string(), SourceFailure::NoMatch)),
                Err(failure) => {
                    warn!("Search on {} failed: {}", slot.name(), failure);
                    attempts.push((slot.name().to_string(), failure));
                }
            }
        }
        Err(AcquisitionError::ScriptNotFound {
            title: title.to_string(),
            attempts,
        })
    }

    async fn acquire(&self, title: &str) -> Result<RawScript, AcquisitionError> {
        let outcome = if self.concurrent {
            self.acquire_concurrently(title).await
        } else {
            self.acquire_sequentially(title).await
        };

        match outcome {
            Ok(script) => {
                info!("Fetched '{}' from {} ({})", title, script.source, script.url);
                self.cache.put(title, script.clone());
                Ok(script)
            }
            Err(attempts) => {
                for (source, failure) in &attempts {
                    warn!("{} could not provide '{}': {}", source, title, failure);
                }
                Err(AcquisitionError::ScriptNotFound {
                    title: title.to_string(),
                    attempts,
                })
            }
        }
    }

    async fn acquire_sequentially(&self, title: &str) -> Result<RawScript, Vec<(String, SourceFailure)>> {
        let mut attempts = Vec::new();
        for slot in &self.slots {
            match slot.acquire(title).await {
                Ok(script) => return Ok(script),
                Err(failure) => attempts.push((slot.name().to_string(), failure)),
            }
        }
        Err(attempts)
    }

    async fn acquire_concurrently(&self, title: &str) -> Result<RawScript, Vec<(String, SourceFailure)>> {
        let mut pending: FuturesUnordered<_> = self
            .slots
            .iter()
            .enumerate()
            .map(|(index, slot)| async move { (index, slot.acquire(title).await) })
            .collect();

        let mut outcomes: Vec<Option<Result<RawScript, SourceFailure>>> = vec![None; self.slots.len()];

        while let Some((index, outcome)) = pending.next().await {
            outcomes[index] = Some(outcome);

            if let Some(winner) = decided_winner(&outcomes) {
                // Lower-priority adapters still running are dropped with `pending`
                if let Some(Ok(script)) = outcomes[winner].take() {
                    return Ok(script);
                }
            }
        }

        let attempts = self
            .slots
            .iter()
            .zip(outcomes)
            .filter_map(|(slot, outcome)| match outcome {
                Some(Err(failure)) => Some((slot.name().to_string(), failure)),
                _ => None,
            })
            .collect();
        Err(attempts)
    }

}

/// One caller's share of the per-title lock; leaving removes the map entry
/// once no other caller holds it, including when the caller is cancelled
struct Flight<'a> {
    coordinator: &'a FetchCoordinator,
    key: String,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl<'a> Flight<'a> {
    fn join(coordinator: &'a FetchCoordinator, key: String) -> Self {
        let lock = coordinator
            .in_flight
            .lock()
            .entry(key.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();
        Self { coordinator, key, lock }
    }
}

impl Drop for Flight<'_> {
    fn drop(&mut self) {
        let mut in_flight = self.coordinator.in_flight.lock();
        // Map entry plus our handle; anything more is another caller
        if Arc::strong_count(&self.lock) <= 2 {
            in_flight.remove(&self.key);
        }
    }
}

/// Index of the winning adapter once every higher-priority adapter has failed
fn decided_winner(outcomes: &[Option<Result<RawScript, SourceFailure>>]) -> Option<usize> {
    for (index, outcome) in outcomes.iter().enumerate() {
        match outcome {
            None => return None,
            Some(Ok(_)) => return Some(index),
            Some(Err(_)) => continue,
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn script(source: &str) -> RawScript {
        RawScript {
            title: "Heat".to_string(),
            source: source.to_string(),
            url: String::new(),
            text: "FADE IN:".to_string(),
            fetched_at: Utc::now(),
        }
    }

    #[test]
    fn test_decidedWinner_shouldWaitForHigherPriority() {
        let outcomes = vec![None, Some(Ok(script("b")))];
        assert_eq!(decided_winner(&outcomes), None);

        let outcomes = vec![Some(Err(SourceFailure::NoMatch)), Some(Ok(script("b")))];
        assert_eq!(decided_winner(&outcomes), Some(1));

        let outcomes = vec![Some(Ok(script("a"))), None];
        assert_eq!(decided_winner(&outcomes), Some(0));
    }
}
