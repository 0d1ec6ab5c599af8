/*!
 * Cinémathèque française script collection adapter.
 *
 * Search results are `article.search-result` entries; only those mentioning
 * a "scénario" are kept. The script body is `div.scenario-content`, with
 * paragraphs and line breaks turned into newlines.
 */

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use log::debug;
use reqwest::Client;
use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

use crate::errors::FetchError;
use crate::sources::{build_client, clean_script_text, get_page, RawScript, ScriptLocation, ScriptSource};

const BASE_URL: &str = "https://www.cinematheque.fr";

static RESULT_ARTICLES: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("article.search-result").expect("Invalid result selector"));

static RESULT_TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h3 a").expect("Invalid title selector"));

static SCRIPT_BODY: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.scenario-content").expect("Invalid script selector"));

/// Cinémathèque française script collection adapter
#[derive(Debug)]
pub struct Cinematheque {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl Cinematheque {
    /// Create an adapter for cinematheque.fr with the given User-Agent and request timeout
    pub fn new(user_agent: &str, timeout: Duration) -> Self {
        Self {
            client: build_client(user_agent, timeout),
            base_url: BASE_URL.to_string(),
            timeout,
        }
    }

    /// Point the adapter at another host
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

/// Extract script entries from a search results page.
///
/// Results that are not screenplays (films, events) are skipped.
pub fn parse_search_results(html: &str, base_url: &str) -> Result<Vec<ScriptLocation>, FetchError> {
    let base = Url::parse(base_url).map_err(|e| FetchError::Parse(format!("Invalid base URL: {}", e)))?;
    let document = Html::parse_document(html);

    let mut locations = Vec::new();
    for article in document.select(&RESULT_ARTICLES) {
        let text = article.text().collect::<String>().to_lowercase();
        if !text.contains("scénario") {
            continue;
        }
        let Some(link) = article.select(&RESULT_TITLE).next() else {
            continue;
        };
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let url = base
            .join(href)
            .map_err(|e| FetchError::Parse(format!("Invalid script link '{}': {}", href, e)))?;
        locations.push(ScriptLocation {
            source: "cinematheque".to_string(),
            title: link.text().collect::<String>().trim().to_string(),
            url: url.to_string(),
        });
    }
    Ok(locations)
}

/// Extract the script text; `<p>` and `<br>` become line breaks
pub fn extract_script_text(html: &str) -> Result<String, FetchError> {
    let document = Html::parse_document(html);
    let content = document
        .select(&SCRIPT_BODY)
        .next()
        .ok_or_else(|| FetchError::Parse("Could not find script content".to_string()))?;

    let mut text = String::new();
    for child in content.children() {
        match child.value() {
            Node::Text(t) => text.push_str(t),
            Node::Element(el) if el.name() == "br" => text.push('\n'),
            Node::Element(el) => {
                if let Some(element) = ElementRef::wrap(child) {
                    let inner = element.text().collect::<String>();
                    if el.name() == "p" {
                        text.push_str(inner.trim());
                        text.push('\n');
                    } else {
                        text.push_str(&inner);
                    }
                }
            }
            _ => {}
        }
    }
    Ok(clean_script_text(&text))
}

#[async_trait]
impl ScriptSource for Cinematheque {
    fn name(&self) -> &str {
        "cinematheque"
    }

    async fn search(&self, title: &str) -> Result<Vec<ScriptLocation>, FetchError> {
        let url = Url::parse_with_params(&format!("{}/rechercher/scenario", self.base_url), &[("q", title)])
            .map_err(|e| FetchError::Parse(format!("Invalid search URL: {}", e)))?;
        debug!("Searching Cinémathèque: {}", url);
        let html = get_page(&self.client, url.as_str(), self.timeout).await?;
        parse_search_results(&html, &self.base_url)
    }

    async fn fetch(&self, location: &ScriptLocation) -> Result<RawScript, FetchError> {
        debug!("Fetching Cinémathèque script: {}", location.url);
        let html = get_page(&self.client, &location.url, self.timeout).await?;
        let text = extract_script_text(&html)?;
        RawScript::new(location, text, Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parseSearchResults_shouldSkipNonScriptEntries() {
        let html = r#"
            <article class="search-result"><h3><a href="/film/123">Le Mépris</a></h3><span>Film</span></article>
            <article class="search-result"><h3><a href="/scenario/le-mepris">Le Mépris</a></h3><span>Scénario original</span></article>
        "#;
        let locations = parse_search_results(html, BASE_URL).unwrap();
        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].url, "https://www.cinematheque.fr/scenario/le-mepris");
        assert_eq!(locations[0].title, "Le Mépris");
    }

    #[test]
    fn test_extractScriptText_shouldTurnParagraphsIntoLines() {
        let html = r#"<div class="scenario-content"><p> CAMILLE </p><p>Tu m'aimes ?</p><br><br><br><br>PAUL<br>Oui.</div>"#;
        let text = extract_script_text(html).unwrap();
        assert_eq!(text, "CAMILLE\nTu m'aimes ?\n\nPAUL\nOui.");
    }
}
