use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, info, warn};

use crate::analysis::names::NameTable;
use crate::analysis::topic::LlmResponseCache;
use crate::analysis::{BechdelAnalyzer, BechdelResult};
use crate::app_config::Config;
use crate::clock::{Clock, SystemClock};
use crate::errors::AcquisitionError;
use crate::providers::{self, Provider, Sampling};
use crate::sources::{FetchCoordinator, RawScript, ScriptCache, ScriptLocation};

// @module: Application controller wiring acquisition to analysis

/// Entry point for analyzing movies by title or by text
#[derive(Debug)]
pub struct Controller {
    // @field: App configuration
    config: Config,
    coordinator: FetchCoordinator,
    analyzer: BechdelAnalyzer,
    provider: Option<Arc<dyn Provider>>,
}

impl Controller {
    /// Build every component from configuration
    pub fn with_config(config: Config) -> Result<Self> {
        config.validate().context("Invalid configuration")?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let ttl = Duration::from_secs(config.cache.ttl_hours * 3600);
        let mut cache = ScriptCache::new(ttl, Arc::clone(&clock));
        if let Some(directory) = config.cache.resolved_directory() {
            info!("Persisting scripts to {}", directory.display());
            cache = cache.with_directory(directory);
        }
        let coordinator = FetchCoordinator::from_config(&config.sources, Arc::new(cache), clock);

        let names = match &config.analysis.names_table {
            Some(path) => NameTable::from_json_file(path)
                .with_context(|| format!("Failed to load name table from {}", path.display()))?,
            None => NameTable::builtin(),
        };
        debug!("Name table {} with {} entries", names.version(), names.len());

        let provider = providers::create_provider(&config.llm).context("Failed to create LLM provider")?;
        let mut analyzer = BechdelAnalyzer::new(&config.analysis, Arc::new(names));
        if let Some(provider) = &provider {
            info!(
                "Using {} ({}) for uncertain classifications",
                config.llm.provider.display_name(),
                config.llm.get_model()
            );
            analyzer = analyzer.with_llm(
                Arc::clone(provider),
                Duration::from_secs(config.llm.timeout_secs),
                Arc::new(LlmResponseCache::new(config.llm.cache_size)),
            )
            .with_sampling(Sampling::from(&config.llm));
        }

        Ok(Self {
            config,
            coordinator,
            analyzer,
            provider,
        })
    }

    /// Assemble a controller from prebuilt parts
    pub fn from_parts(config: Config, coordinator: FetchCoordinator, analyzer: BechdelAnalyzer) -> Self {
        Self {
            config,
            coordinator,
            analyzer,
            provider: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &Arc<ScriptCache> {
        self.coordinator.cache()
    }

    /// Acquire a script by title and analyze it
    pub async fn analyze(&self, title: &str) -> Result<BechdelResult, AcquisitionError> {
        let script = self.coordinator.fetch_script(title).await?;
        info!("Analyzing '{}' from {}", script.title, script.source);
        Ok(self.analyzer.analyze_script(&script).await)
    }

    /// Analyze script text supplied directly
    pub async fn analyze_text(&self, text: &str) -> BechdelResult {
        self.analyzer.analyze_text(text).await
    }

    /// Candidate scripts from the first source that has any
    pub async fn search(&self, title: &str) -> Result<Vec<ScriptLocation>, AcquisitionError> {
        self.coordinator.search(title).await
    }

    /// Acquire a script without analyzing it
    pub async fn fetch_script(&self, title: &str) -> Result<RawScript, AcquisitionError> {
        self.coordinator.fetch_script(title).await
    }

    /// Check that the configured LLM answers; a no-op without one
    pub async fn check_llm(&self) -> Result<()> {
        let Some(provider) = &self.provider else {
            return Ok(());
        };
        match provider.test_connection().await {
            Ok(()) => {
                debug!("{} is reachable", provider.name());
                Ok(())
            }
            Err(e) => {
                warn!("{} is not reachable, falling back to rules: {}", provider.name(), e);
                Err(e).with_context(|| format!("Connection test for {} failed", provider.name()))
            }
        }
    }
}
