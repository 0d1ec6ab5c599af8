/*!
 * Tests for fallback fetch coordination
 */

use std::sync::Arc;
use std::time::Duration;

use bechdel::errors::{AcquisitionError, ErrorClass, FetchError, SourceFailure};
use bechdel::sources::coordinator::SourceLimits;
use bechdel::sources::{FetchCoordinator, ScriptCache};

use crate::common::{self, MockOutcome, MockSource};

const TEXT: &str = "INT. ROOM - DAY\n\nANN\nHello.";

#[tokio::test]
async fn test_fetchScript_withSlowPrimary_shouldStillPreferPrimary() {
    let (_, clock) = common::manual_clock();
    let primary = MockSource::delayed("primary", MockOutcome::Script(TEXT.into()), Duration::from_millis(80));
    let secondary = MockSource::with_script("secondary", TEXT);
    let coordinator = common::coordinator(&[primary.clone(), secondary.clone()], clock);

    let script = coordinator.fetch_script("Heat").await.unwrap();

    assert_eq!(script.source, "primary");
    assert_eq!(secondary.searches(), 1);
}

#[tokio::test]
async fn test_fetchScript_withPrimaryMiss_shouldFallBack() {
    let (_, clock) = common::manual_clock();
    let primary = MockSource::new("primary", MockOutcome::NoMatch);
    let secondary = MockSource::with_script("secondary", TEXT);
    let coordinator = common::coordinator(&[primary, secondary], clock);

    let script = coordinator.fetch_script("Heat").await.unwrap();
    assert_eq!(script.source, "secondary");
    assert!(script.url.starts_with("https://secondary.test/"));
}

#[tokio::test]
async fn test_fetchScript_twiceWithinTtl_shouldNotCallSourcesAgain() {
    let (_, clock) = common::manual_clock();
    let source = MockSource::with_script("primary", TEXT);
    let coordinator = common::coordinator(&[source.clone()], clock);

    let first = coordinator.fetch_script("The Matrix").await.unwrap();
    let second = coordinator.fetch_script("the matrix (1999)").await.unwrap();

    assert_eq!(first, second);
    assert_eq!(source.searches(), 1);
    assert_eq!(source.fetches(), 1);
}

#[tokio::test]
async fn test_fetchScript_afterTtl_shouldFetchAgain() {
    let (manual, clock) = common::manual_clock();
    let source = MockSource::with_script("primary", TEXT);
    let coordinator = common::coordinator(&[source.clone()], clock);

    coordinator.fetch_script("Heat").await.unwrap();
    manual.advance(chrono::Duration::days(8));
    coordinator.fetch_script("Heat").await.unwrap();

    assert_eq!(source.fetches(), 2);
}

#[tokio::test]
async fn test_fetchScript_concurrentCallers_shouldShareOneAcquisition() {
    let (_, clock) = common::manual_clock();
    let source = MockSource::delayed("primary", MockOutcome::Script(TEXT.into()), Duration::from_millis(50));
    let coordinator = Arc::new(common::coordinator(&[source.clone()], clock));

    let (a, b) = tokio::join!(coordinator.fetch_script("Heat"), coordinator.fetch_script("HEAT"));

    assert_eq!(a.unwrap(), b.unwrap());
    assert_eq!(source.searches(), 1);
}

#[tokio::test]
async fn test_fetchScript_cancelledCaller_shouldNotLeaveTitleInFlight() {
    let (_, clock) = common::manual_clock();
    let source = MockSource::delayed("primary", MockOutcome::Script(TEXT.into()), Duration::from_millis(200));
    let coordinator = common::coordinator(&[source.clone()], clock);

    let cancelled = tokio::time::timeout(Duration::from_millis(20), coordinator.fetch_script("Heat")).await;
    assert!(cancelled.is_err());
    assert_eq!(coordinator.in_flight(), 0);

    let script = coordinator.fetch_script("Heat").await.unwrap();
    assert_eq!(script.source, "primary");
    assert_eq!(coordinator.in_flight(), 0);
}

#[tokio::test]
async fn test_fetchScript_withAllSourcesFailing_shouldBeUpstreamUnavailable() {
    let (_, clock) = common::manual_clock();
    let primary = MockSource::new("primary", MockOutcome::Fail(FetchError::Network("refused".into())));
    let secondary = MockSource::new("secondary", MockOutcome::Fail(FetchError::Http { status: 503, url: "x".into() }));
    let coordinator = common::coordinator(&[primary, secondary], clock);

    let err = coordinator.fetch_script("Heat").await.unwrap_err();

    let AcquisitionError::ScriptNotFound { attempts, .. } = &err;
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[0].0, "primary");
    assert_eq!(err.class(), ErrorClass::UpstreamUnavailable);
    assert!(coordinator.cache().is_empty());
}

#[tokio::test]
async fn test_fetchScript_withCleanMiss_shouldBeNotFound() {
    let (_, clock) = common::manual_clock();
    let primary = MockSource::new("primary", MockOutcome::NoMatch);
    let secondary = MockSource::new("secondary", MockOutcome::Fail(FetchError::Timeout(Duration::from_secs(1))));
    let coordinator = common::coordinator(&[primary, secondary], clock);

    let err = coordinator.fetch_script("Heat").await.unwrap_err();
    assert_eq!(err.class(), ErrorClass::NotFound);
}

#[tokio::test]
async fn test_fetchScript_withHangingSource_shouldTimeOutAndFallBack() {
    let (_, clock) = common::manual_clock();
    let hanging = MockSource::delayed("hanging", MockOutcome::Script(TEXT.into()), Duration::from_secs(5));
    let backup = MockSource::with_script("backup", TEXT);
    let cache = Arc::new(ScriptCache::new(Duration::from_secs(3600), clock.clone()));
    let coordinator = FetchCoordinator::new(cache, clock)
        .with_source(
            hanging,
            SourceLimits {
                timeout: Duration::from_millis(30),
                ..SourceLimits::default()
            },
        )
        .with_source(backup, common::unlimited());

    let script = coordinator.fetch_script("Heat").await.unwrap();
    assert_eq!(script.source, "backup");
}

#[tokio::test]
async fn test_fetchScript_withExhaustedBucket_shouldSkipUntilRefilled() {
    let (manual, clock) = common::manual_clock();
    let limited = MockSource::with_script("limited", TEXT);
    let backup = MockSource::with_script("backup", TEXT);
    let cache = Arc::new(ScriptCache::new(Duration::from_secs(3600), clock.clone()));
    let coordinator = FetchCoordinator::new(cache, clock)
        .with_source(
            limited.clone(),
            SourceLimits {
                rate_limit: Some(1),
                burst: 2,
                ..common::unlimited()
            },
        )
        .with_source(backup.clone(), common::unlimited());

    // Search and fetch use both tokens
    assert_eq!(coordinator.fetch_script("Alien").await.unwrap().source, "limited");
    assert_eq!(coordinator.fetch_script("Aliens").await.unwrap().source, "backup");
    assert_eq!(limited.searches(), 1);

    manual.advance(chrono::Duration::minutes(2));
    assert_eq!(coordinator.fetch_script("Alien 3").await.unwrap().source, "limited");
}

#[tokio::test]
async fn test_fetchScript_sequential_shouldNotTouchLowerPriorityOnSuccess() {
    let (_, clock) = common::manual_clock();
    let primary = MockSource::with_script("primary", TEXT);
    let secondary = MockSource::with_script("secondary", TEXT);
    let coordinator = common::coordinator(&[primary, secondary.clone()], clock).concurrent(false);

    assert_eq!(coordinator.fetch_script("Heat").await.unwrap().source, "primary");
    assert_eq!(secondary.searches(), 0);
}

#[tokio::test]
async fn test_fetchScript_withEmptyScript_shouldFallBack() {
    let (_, clock) = common::manual_clock();
    let blank = MockSource::new("blank", MockOutcome::Script("   \n".into()));
    let backup = MockSource::with_script("backup", TEXT);
    let coordinator = common::coordinator(&[blank, backup], clock);

    let script = coordinator.fetch_script("Heat").await.unwrap();
    assert_eq!(script.source, "backup");
}

#[tokio::test]
async fn test_search_shouldReturnFirstNonEmptyCandidates() {
    let (_, clock) = common::manual_clock();
    let primary = MockSource::new("primary", MockOutcome::NoMatch);
    let secondary = MockSource::with_script("secondary", TEXT);
    let coordinator = common::coordinator(&[primary, secondary], clock);

    let locations = coordinator.search("Heat").await.unwrap();
    assert_eq!(locations.len(), 1);
    assert_eq!(locations[0].source, "secondary");
    assert_eq!(coordinator.source_names(), vec!["primary", "secondary"]);
}

#[test]
fn test_sourceFailure_display_shouldDescribeFailure() {
    assert_eq!(SourceFailure::NoMatch.to_string(), "no match");
    assert!(SourceFailure::Error(FetchError::RateLimited("imsdb".into())).to_string().contains("imsdb"));
}
