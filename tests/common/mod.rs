/*!
 * Common test utilities for the bechdel test suite
 */

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use bechdel::clock::{Clock, ManualClock};
use bechdel::errors::FetchError;
use bechdel::sources::coordinator::SourceLimits;
use bechdel::sources::{FetchCoordinator, RawScript, ScriptCache, ScriptLocation, ScriptSource};

// Re-export the script fixtures
pub mod scripts;

/// What a mock source answers
#[derive(Debug, Clone)]
pub enum MockOutcome {
    /// Finds the title and returns this text
    Script(String),
    /// Searches fine but knows nothing
    NoMatch,
    /// Search fails with this error
    Fail(FetchError),
}

/// Script source with scripted answers and call counters
#[derive(Debug)]
pub struct MockSource {
    name: String,
    outcome: MockOutcome,
    delay: Duration,
    searches: AtomicUsize,
    fetches: AtomicUsize,
}

impl MockSource {
    pub fn new(name: &str, outcome: MockOutcome) -> Arc<Self> {
        Self::delayed(name, outcome, Duration::ZERO)
    }

    /// Every call sleeps for `delay` first
    pub fn delayed(name: &str, outcome: MockOutcome, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            outcome,
            delay,
            searches: AtomicUsize::new(0),
            fetches: AtomicUsize::new(0),
        })
    }

    pub fn with_script(name: &str, text: &str) -> Arc<Self> {
        Self::new(name, MockOutcome::Script(text.to_string()))
    }

    pub fn searches(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

#[async_trait]
impl ScriptSource for MockSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(&self, title: &str) -> Result<Vec<ScriptLocation>, FetchError> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        match &self.outcome {
            MockOutcome::Script(_) => Ok(vec![ScriptLocation {
                source: self.name.clone(),
                title: title.to_string(),
                url: format!("https://{}.test/{}", self.name, title.replace(' ', "-")),
            }]),
            MockOutcome::NoMatch => Ok(Vec::new()),
            MockOutcome::Fail(e) => Err(e.clone()),
        }
    }

    async fn fetch(&self, location: &ScriptLocation) -> Result<RawScript, FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        match &self.outcome {
            MockOutcome::Script(text) => RawScript::new(location, text.clone(), Utc::now()),
            MockOutcome::NoMatch => Err(FetchError::Http {
                status: 404,
                url: location.url.clone(),
            }),
            MockOutcome::Fail(e) => Err(e.clone()),
        }
    }
}

/// A manual clock and its trait-object handle
pub fn manual_clock() -> (Arc<ManualClock>, Arc<dyn Clock>) {
    let clock = Arc::new(ManualClock::default());
    let handle: Arc<dyn Clock> = clock.clone();
    (clock, handle)
}

/// Unlimited limits with a short timeout
pub fn unlimited() -> SourceLimits {
    SourceLimits {
        timeout: Duration::from_secs(2),
        ..SourceLimits::default()
    }
}

/// Coordinator over `sources` in the given priority order, one-week TTL
pub fn coordinator(sources: &[Arc<MockSource>], clock: Arc<dyn Clock>) -> FetchCoordinator {
    let cache = Arc::new(ScriptCache::new(Duration::from_secs(7 * 24 * 3600), clock.clone()));
    sources.iter().fold(FetchCoordinator::new(cache, clock), |coordinator, source| {
        coordinator.with_source(source.clone(), unlimited())
    })
}
