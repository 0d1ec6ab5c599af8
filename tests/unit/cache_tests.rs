/*!
 * Tests for the script cache
 */

use std::time::Duration;

use chrono::Utc;

use bechdel::sources::{ScriptCache, ScriptLocation, RawScript, normalize_title};

use crate::common;

fn script(source: &str) -> RawScript {
    let location = ScriptLocation {
        source: source.to_string(),
        title: "The Matrix".to_string(),
        url: format!("https://{}.test/matrix", source),
    };
    RawScript::new(&location, "INT. ROOM - DAY".to_string(), Utc::now()).unwrap()
}

#[test]
fn test_normalizeTitle_withVariants_shouldCollide() {
    assert_eq!(normalize_title("The Matrix"), normalize_title("the matrix (1999)"));
    assert_eq!(normalize_title("Alien [1979]"), "alien");
    assert_eq!(normalize_title("Blade Runner 1982"), "blade runner");
    assert_eq!(normalize_title("  Mr.   Smith: Goes!  "), "mr smith goes");
}

#[test]
fn test_cache_get_withMissingKey_shouldReturnNone() {
    let (_, clock) = common::manual_clock();
    let cache = ScriptCache::new(Duration::from_secs(60), clock);
    assert!(cache.get("Heat").is_none());
    assert_eq!(cache.stats().misses, 1);
}

#[test]
fn test_cache_stats_shouldCountHitsAndExpired() {
    let (manual, clock) = common::manual_clock();
    let cache = ScriptCache::new(Duration::from_secs(60), clock);
    cache.put("Heat", script("imsdb"));

    assert!(cache.get("heat").is_some());
    manual.advance(chrono::Duration::seconds(61));
    assert!(cache.get("heat").is_none());

    let stats = cache.stats();
    assert_eq!(stats.entries, 1);
    assert_eq!(stats.expired, 1);
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);

    assert_eq!(cache.purge_expired(), 1);
    assert!(cache.is_empty());
}

#[test]
fn test_cache_withDirectory_shouldSurviveRestart() {
    let dir = tempfile::tempdir().unwrap();
    let (_, clock) = common::manual_clock();

    let first = ScriptCache::new(Duration::from_secs(3600), clock.clone()).with_directory(dir.path());
    first.put("The Matrix", script("cinematheque"));

    let second = ScriptCache::new(Duration::from_secs(3600), clock).with_directory(dir.path());
    let restored = second.get("the matrix (1999)").unwrap();
    assert_eq!(restored.source, "cinematheque");
    assert_eq!(second.len(), 1);
}

#[test]
fn test_cache_withDirectory_expiredSnapshot_shouldMiss() {
    let dir = tempfile::tempdir().unwrap();
    let (manual, clock) = common::manual_clock();

    let first = ScriptCache::new(Duration::from_secs(60), clock.clone()).with_directory(dir.path());
    first.put("Heat", script("imsdb"));
    manual.advance(chrono::Duration::minutes(5));

    let second = ScriptCache::new(Duration::from_secs(60), clock).with_directory(dir.path());
    assert!(second.get("Heat").is_none());
    assert_eq!(second.purge_expired(), 1);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_cache_clear_shouldRemoveSnapshots() {
    let dir = tempfile::tempdir().unwrap();
    let (_, clock) = common::manual_clock();
    let cache = ScriptCache::new(Duration::from_secs(60), clock).with_directory(dir.path());
    cache.put("Heat", script("imsdb"));
    cache.put("Alien", script("imsdb"));

    cache.clear();

    assert!(cache.is_empty());
    assert!(cache.get("Heat").is_none());
}
