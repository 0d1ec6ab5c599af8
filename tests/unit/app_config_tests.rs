/*!
 * Tests for configuration loading and validation
 */

use anyhow::Result;

use bechdel::app_config::{Config, SourceKind};
use bechdel::errors::ConfigError;

#[test]
fn test_loadOrCreate_withMissingFile_shouldWriteDefaults() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("conf.json");

    let config = Config::load_or_create(&path)?;
    assert!(path.exists());

    let reloaded = Config::from_file(&path)?;
    assert_eq!(reloaded.cache.ttl_hours, config.cache.ttl_hours);
    assert_eq!(reloaded.sources.available_sources.len(), 2);
    Ok(())
}

#[test]
fn test_fromFile_withSourceOverrides_shouldKeepOrder() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("conf.json");
    std::fs::write(
        &path,
        r#"{
            "sources": {
                "available_sources": [
                    { "type": "cinematheque", "rate_limit": null },
                    { "type": "imsdb", "enabled": false }
                ],
                "concurrent": false
            }
        }"#,
    )?;

    let config = Config::from_file(&path)?;
    let enabled: Vec<SourceKind> = config.sources.enabled_sources().map(|s| s.kind).collect();
    assert_eq!(enabled, vec![SourceKind::Cinematheque]);
    assert_eq!(config.sources.available_sources[0].rate_limit, None);
    assert!(!config.sources.concurrent);
    assert!(config.validate().is_ok());
    Ok(())
}

#[test]
fn test_fromFile_withMalformedJson_shouldFailToLoad() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("conf.json");
    std::fs::write(&path, "{ not json")?;

    assert!(matches!(Config::from_file(&path), Err(ConfigError::Load(_))));
    Ok(())
}

#[test]
fn test_validate_withOutOfRangeThresholds_shouldFail() {
    let mut config = Config::default();
    config.analysis.gender.majority_threshold = 0.3;
    assert!(matches!(config.validate(), Err(ConfigError::InvalidValue { .. })));

    let mut config = Config::default();
    config.analysis.topic.about_threshold = 0.0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.analysis.conversation.max_turn_gap = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.sources.available_sources[0].rate_limit = Some(0);
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_withZeroTtl_shouldFail() {
    let mut config = Config::default();
    config.cache.ttl_hours = 0;
    assert!(config.validate().is_err());
}
