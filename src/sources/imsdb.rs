/*!
 * Internet Movie Script Database adapter.
 *
 * Searching goes through `search.php`; script pages keep the text in the
 * first `<pre>` block. HTML extraction is kept in free functions so it can
 * be tested against saved markup.
 */

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use log::debug;
use reqwest::Client;
use scraper::{Html, Selector};
use url::Url;

use crate::errors::FetchError;
use crate::sources::{build_client, clean_script_text, get_page, RawScript, ScriptLocation, ScriptSource};

const BASE_URL: &str = "https://imsdb.com";

static RESULT_LINKS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("p a[href*='/Movie Scripts/']").expect("Invalid IMSDB result selector"));

static SCRIPT_BODY: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("pre").expect("Invalid IMSDB script selector"));

/// Internet Movie Script Database adapter
#[derive(Debug)]
pub struct Imsdb {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl Imsdb {
    /// Create an adapter for imsdb.com with the given User-Agent and request timeout
    pub fn new(user_agent: &str, timeout: Duration) -> Self {
        Self {
            client: build_client(user_agent, timeout),
            base_url: BASE_URL.to_string(),
            timeout,
        }
    }

    /// Point the adapter at another host (mirrors, local fixtures)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn search_url(&self, title: &str) -> Result<Url, FetchError> {
        Url::parse_with_params(&format!("{}/search.php", self.base_url), &[("query", title)])
            .map_err(|e| FetchError::Parse(format!("Invalid search URL: {}", e)))
    }
}

/// Script page path for a listed title: "The Matrix" becomes
/// `/scripts/Matrix,-The.html`
pub fn script_path(listed_title: &str) -> String {
    let trimmed = listed_title.trim();
    let reordered = match trimmed.get(..4) {
        Some(prefix) if prefix.eq_ignore_ascii_case("the ") => format!("{},-The", &trimmed[4..]),
        _ => trimmed.to_string(),
    };
    format!("/scripts/{}.html", reordered.replace(' ', "-"))
}

/// Extract candidate locations from a search results page
pub fn parse_search_results(html: &str, base_url: &str) -> Result<Vec<ScriptLocation>, FetchError> {
    let base = Url::parse(base_url).map_err(|e| FetchError::Parse(format!("Invalid base URL: {}", e)))?;
    let document = Html::parse_document(html);

    let mut locations = Vec::new();
    for link in document.select(&RESULT_LINKS) {
        let title = link.text().collect::<String>().trim().to_string();
        if title.is_empty() {
            continue;
        }
        let url = base
            .join(&script_path(&title))
            .map_err(|e| FetchError::Parse(format!("Invalid script path for '{}': {}", title, e)))?;
        locations.push(ScriptLocation {
            source: "imsdb".to_string(),
            title,
            url: url.to_string(),
        });
    }
    Ok(locations)
}

/// Extract the script text from a script page
pub fn extract_script_text(html: &str) -> Result<String, FetchError> {
    let document = Html::parse_document(html);
    let body = document
        .select(&SCRIPT_BODY)
        .next()
        .ok_or_else(|| FetchError::Parse("Could not find script content".to_string()))?;
    Ok(clean_script_text(&body.text().collect::<String>()))
}

#[async_trait]
impl ScriptSource for Imsdb {
    fn name(&self) -> &str {
        "imsdb"
    }

    async fn search(&self, title: &str) -> Result<Vec<ScriptLocation>, FetchError> {
        let url = self.search_url(title)?;
        debug!("Searching IMSDB: {}", url);
        let html = get_page(&self.client, url.as_str(), self.timeout).await?;
        parse_search_results(&html, &self.base_url)
    }

    async fn fetch(&self, location: &ScriptLocation) -> Result<RawScript, FetchError> {
        debug!("Fetching IMSDB script: {}", location.url);
        let html = get_page(&self.client, &location.url, self.timeout).await?;
        let text = extract_script_text(&html)?;
        RawScript::new(location, text, Utc::now())
    }
}
