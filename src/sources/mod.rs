/*!
 * Script acquisition.
 *
 * Each external script repository is wrapped in a `ScriptSource` adapter.
 * The `FetchCoordinator` queries adapters in priority order behind a
 * shared `ScriptCache` and per-adapter token buckets:
 * - `imsdb`: Internet Movie Script Database
 * - `cinematheque`: Cinémathèque française
 */

use std::fmt::Debug;
use std::sync::Arc;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::app_config::{SourceConfig, SourceKind};
use crate::errors::FetchError;

pub mod cache;
pub mod cinematheque;
pub mod coordinator;
pub mod imsdb;
pub mod rate_limit;

pub use cache::{normalize_title, CacheStats, ScriptCache};
pub use coordinator::FetchCoordinator;
pub use rate_limit::TokenBucket;

static EXCESS_NEWLINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("Invalid newline regex"));

/// Where a script can be fetched from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptLocation {
    /// Adapter that produced this location
    pub source: String,
    /// Title as listed by the source
    pub title: String,
    /// Script page URL
    pub url: String,
}

/// Full script text together with its provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawScript {
    /// Title as listed by the source
    pub title: String,
    /// Adapter that produced the text
    pub source: String,
    /// Page the text was read from
    pub url: String,
    /// Script text, never empty
    pub text: String,
    /// When the text was downloaded
    pub fetched_at: DateTime<Utc>,
}

impl RawScript {
    /// Build a script for `location`; empty text is a fetch failure
    pub fn new(location: &ScriptLocation, text: String, fetched_at: DateTime<Utc>) -> Result<Self, FetchError> {
        if text.trim().is_empty() {
            return Err(FetchError::EmptyScript);
        }
        Ok(Self {
            title: location.title.clone(),
            source: location.source.clone(),
            url: location.url.clone(),
            text,
            fetched_at,
        })
    }
}

/// Contract every script repository adapter implements.
///
/// Adapters never retry and never sleep; the coordinator decides when they
/// may touch the network.
#[async_trait]
pub trait ScriptSource: Send + Sync + Debug {
    /// Stable name used for provenance
    fn name(&self) -> &str;

    /// Candidate locations for `title`, best first; empty when unknown
    async fn search(&self, title: &str) -> Result<Vec<ScriptLocation>, FetchError>;

    /// Download the script at `location`
    async fn fetch(&self, location: &ScriptLocation) -> Result<RawScript, FetchError>;
}

/// Build the adapter for a configured source
pub fn create_source(config: &SourceConfig, user_agent: &str) -> Arc<dyn ScriptSource> {
    let timeout = Duration::from_secs(config.timeout_secs);
    match config.kind {
        SourceKind::Imsdb => Arc::new(imsdb::Imsdb::new(user_agent, timeout)),
        SourceKind::Cinematheque => Arc::new(cinematheque::Cinematheque::new(user_agent, timeout)),
    }
}

/// HTTP client shared by the adapters
pub(crate) fn build_client(user_agent: &str, timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .user_agent(user_agent)
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// GET a page and return its body, mapping failures to `FetchError`
pub(crate) async fn get_page(client: &Client, url: &str, timeout: Duration) -> Result<String, FetchError> {
    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            FetchError::Timeout(timeout)
        } else {
            FetchError::Network(e.to_string())
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Http {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }

    response
        .text()
        .await
        .map_err(|e| FetchError::Network(e.to_string()))
}

/// Normalize scraped script text.
///
/// Line endings become `\n`, trailing spaces are stripped, and runs of three
/// or more newlines collapse to a single blank line.
pub fn clean_script_text(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    let stripped = unified
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n");
    EXCESS_NEWLINES.replace_all(&stripped, "\n\n").trim().to_string()
}
