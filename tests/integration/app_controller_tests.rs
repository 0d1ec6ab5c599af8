/*!
 * Integration tests for the application controller
 */

use std::sync::Arc;

use anyhow::Result;

use bechdel::analysis::names::NameTable;
use bechdel::analysis::BechdelAnalyzer;
use bechdel::app_config::Config;
use bechdel::errors::{ErrorClass, FetchError};
use bechdel::Controller;

use crate::common::{self, MockOutcome, MockSource, scripts};

fn controller(sources: &[Arc<MockSource>]) -> Controller {
    let config = Config::default();
    let (_, clock) = common::manual_clock();
    let coordinator = common::coordinator(sources, clock);
    let analyzer = BechdelAnalyzer::new(&config.analysis, Arc::new(NameTable::builtin()));
    Controller::from_parts(config, coordinator, analyzer)
}

/// Test the controller initialization with default config
#[test]
fn test_controller_withDefaultConfig_shouldInitialize() -> Result<()> {
    let controller = Controller::with_config(Config::default())?;
    assert!(controller.cache().is_empty());
    assert!(!controller.config().llm.enabled);
    Ok(())
}

#[test]
fn test_controller_withInvalidConfig_shouldFail() {
    let mut config = Config::default();
    config.cache.ttl_hours = 0;
    assert!(Controller::with_config(config).is_err());
}

#[test]
fn test_controller_withMissingNameTable_shouldFail() {
    let mut config = Config::default();
    config.analysis.names_table = Some("/nonexistent/names.json".into());
    assert!(Controller::with_config(config).is_err());
}

#[tokio::test]
async fn test_analyze_byTitle_shouldCarryProvenance() {
    let source = MockSource::with_script("mock", scripts::MISSION);
    let controller = controller(&[source]);

    let result = controller.analyze("The Matrix").await.unwrap();

    assert!(result.passes_test);
    let provenance = result.provenance.unwrap();
    assert_eq!(provenance.source, "mock");
    assert_eq!(provenance.url, "https://mock.test/The-Matrix");
}

#[tokio::test]
async fn test_analyze_withUnavailableSources_shouldReturnErrorNotResult() {
    let source = MockSource::new("down", MockOutcome::Fail(FetchError::Network("unreachable".into())));
    let controller = controller(&[source]);

    let err = controller.analyze("The Matrix").await.unwrap_err();
    assert_eq!(err.class(), ErrorClass::UpstreamUnavailable);
}

#[tokio::test]
async fn test_analyze_twice_shouldServeSecondFromCache() {
    let source = MockSource::with_script("mock", scripts::JOHNS_PLAN);
    let controller = controller(&[source.clone()]);

    let first = controller.analyze("Plans").await.unwrap();
    let second = controller.analyze("plans").await.unwrap();

    assert_eq!(first, second);
    assert_eq!(source.fetches(), 1);
    assert_eq!(controller.cache().stats().hits, 1);
}

#[tokio::test]
async fn test_analyzeText_shouldHaveNoProvenance() {
    let controller = controller(&[MockSource::new("none", MockOutcome::NoMatch)]);
    let result = controller.analyze_text(scripts::SINGLE_WOMAN).await;
    assert!(result.provenance.is_none());
    assert!(!result.passes_test);
}

#[tokio::test]
async fn test_fetchScript_andSearch_shouldUseSources() {
    let source = MockSource::with_script("mock", scripts::MISSION);
    let controller = controller(&[source]);

    let locations = controller.search("Heat").await.unwrap();
    assert_eq!(locations[0].source, "mock");

    let script = controller.fetch_script("Heat").await.unwrap();
    assert_eq!(script.text, scripts::MISSION);
}

/// Test that a controller without an LLM skips the connection check
#[test]
fn test_checkLlm_withoutProvider_shouldSucceed() -> Result<()> {
    let controller = Controller::with_config(Config::default())?;
    let result = tokio_test::block_on(async { controller.check_llm().await });
    assert!(result.is_ok());
    Ok(())
}
