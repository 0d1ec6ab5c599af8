use serde::{Deserialize, Serialize};
use std::default::Default;
use std::path::{Path, PathBuf};

use log::warn;

use crate::analysis::conversation::ConversationConfig;
use crate::analysis::gender::GenderConfig;
use crate::analysis::topic::TopicConfig;
use crate::errors::ConfigError;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings. The configuration is read
/// once at startup and shared read-only afterwards.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    /// LLM backend used for tie-breaking and topic confirmation
    #[serde(default)]
    pub llm: LlmConfig,

    /// Script sources in priority order
    #[serde(default)]
    pub sources: SourcesConfig,

    /// Script cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Analysis thresholds
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// LLM provider type
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    // @provider: Ollama
    #[default]
    Ollama,
    // @provider: OpenAI
    OpenAI,
    // @provider: Anthropic
    Anthropic,
    // @provider: LM Studio (OpenAI-compatible local server)
    LMStudio,
}

impl LlmProvider {
    // @returns: Capitalized provider name
    pub fn display_name(&self) -> &str {
        match self {
            Self::Ollama => "Ollama",
            Self::OpenAI => "OpenAI",
            Self::Anthropic => "Anthropic",
            Self::LMStudio => "LM Studio",
        }
    }

    // @returns: Lowercase provider identifier
    pub fn to_lowercase_string(&self) -> String {
        match self {
            Self::Ollama => "ollama".to_string(),
            Self::OpenAI => "openai".to_string(),
            Self::Anthropic => "anthropic".to_string(),
            Self::LMStudio => "lmstudio".to_string(),
        }
    }

    fn requires_api_key(&self) -> bool {
        matches!(self, Self::OpenAI | Self::Anthropic)
    }
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_lowercase_string())
    }
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAI),
            "anthropic" => Ok(Self::Anthropic),
            "lmstudio" => Ok(Self::LMStudio),
            _ => Err(ConfigError::invalid("llm.provider", format!("unknown provider '{}'", s))),
        }
    }
}

/// LLM backend configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LlmConfig {
    /// Whether any LLM call is made at all
    #[serde(default)]
    pub enabled: bool,

    /// Provider to use
    #[serde(default)]
    pub provider: LlmProvider,

    /// Model name (e.g., "llama2", "gpt-4o-mini")
    #[serde(default = "String::new")]
    pub model: String,

    /// Service URL; empty means the provider default
    #[serde(default = "String::new")]
    pub endpoint: String,

    /// API key for hosted providers
    #[serde(default = "String::new")]
    pub api_key: String,

    /// Per-call timeout in seconds
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum number of cached topic responses
    #[serde(default = "default_llm_cache_size")]
    pub cache_size: usize,

    /// Temperature parameter for text generation (0.0 to 1.0)
    #[serde(default)]
    pub temperature: f32,

    /// Maximum tokens in a response
    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: u32,

    /// Retry count for server errors
    #[serde(default = "default_llm_max_retries")]
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: LlmProvider::default(),
            model: String::new(),
            endpoint: String::new(),
            api_key: String::new(),
            timeout_secs: default_llm_timeout_secs(),
            cache_size: default_llm_cache_size(),
            temperature: 0.0,
            max_tokens: default_llm_max_tokens(),
            max_retries: default_llm_max_retries(),
        }
    }
}

impl LlmConfig {
    /// Get the model, falling back to the provider default
    pub fn get_model(&self) -> String {
        if !self.model.is_empty() {
            return self.model.clone();
        }
        match self.provider {
            LlmProvider::Ollama => "llama2".to_string(),
            LlmProvider::OpenAI => "gpt-4o-mini".to_string(),
            LlmProvider::Anthropic => "claude-3-haiku-20240307".to_string(),
            // Placeholder; users should set to the loaded model name in LM Studio
            LlmProvider::LMStudio => "local-model".to_string(),
        }
    }

    /// Get the endpoint, falling back to the provider default
    pub fn get_endpoint(&self) -> String {
        if !self.endpoint.is_empty() {
            return self.endpoint.clone();
        }
        match self.provider {
            LlmProvider::Ollama => "http://localhost:11434".to_string(),
            LlmProvider::OpenAI => "https://api.openai.com/v1".to_string(),
            LlmProvider::Anthropic => "https://api.anthropic.com".to_string(),
            LlmProvider::LMStudio => "http://localhost:1234/v1".to_string(),
        }
    }
}

/// Known script sources
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Internet Movie Script Database
    Imsdb,
    /// Cinémathèque française script collection
    Cinematheque,
}

impl SourceKind {
    /// Stable identifier used in provenance and logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Imsdb => "imsdb",
            Self::Cinematheque => "cinematheque",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Per-source settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SourceConfig {
    /// Which adapter
    #[serde(rename = "type")]
    pub kind: SourceKind,

    /// Disabled sources are skipped entirely
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Requests per minute; None disables client-side limiting
    #[serde(default = "default_source_rate_limit")]
    pub rate_limit: Option<u32>,

    /// Bucket capacity (requests that may be sent back to back)
    #[serde(default = "default_source_burst")]
    pub burst: u32,

    /// How long to wait for a token before skipping the source; 0 skips at once
    #[serde(default)]
    pub max_wait_ms: u64,

    /// Timeout per search or fetch call, in seconds
    #[serde(default = "default_source_timeout_secs")]
    pub timeout_secs: u64,
}

impl SourceConfig {
    pub fn new(kind: SourceKind) -> Self {
        Self {
            kind,
            enabled: true,
            rate_limit: default_source_rate_limit(),
            burst: default_source_burst(),
            max_wait_ms: 0,
            timeout_secs: default_source_timeout_secs(),
        }
    }
}

/// Script source settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SourcesConfig {
    /// Sources in priority order, highest first
    #[serde(default = "default_available_sources")]
    pub available_sources: Vec<SourceConfig>,

    /// Query all sources at once instead of one after another
    #[serde(default = "default_true")]
    pub concurrent: bool,

    /// User-Agent header sent to script sites
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            available_sources: default_available_sources(),
            concurrent: true,
            user_agent: default_user_agent(),
        }
    }
}

impl SourcesConfig {
    /// Enabled sources in priority order
    pub fn enabled_sources(&self) -> impl Iterator<Item = &SourceConfig> {
        self.available_sources.iter().filter(|s| s.enabled)
    }
}

/// Script cache settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CacheConfig {
    /// Entry lifetime in hours
    #[serde(default = "default_cache_ttl_hours")]
    pub ttl_hours: u64,

    /// Write fetched scripts to disk as well as memory
    #[serde(default)]
    pub persist: bool,

    /// Directory for persisted scripts; defaults to the user cache dir
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_hours: default_cache_ttl_hours(),
            persist: false,
            directory: None,
        }
    }
}

impl CacheConfig {
    /// Directory to persist into, if persistence is on
    pub fn resolved_directory(&self) -> Option<PathBuf> {
        if !self.persist {
            return None;
        }
        self.directory
            .clone()
            .or_else(|| dirs::cache_dir().map(|dir| dir.join("bechdel").join("scripts")))
    }
}

/// Analysis settings
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct AnalysisConfig {
    /// JSON name table replacing the built-in one
    #[serde(default)]
    pub names_table: Option<PathBuf>,

    #[serde(default)]
    pub gender: GenderConfig,

    #[serde(default)]
    pub conversation: ConversationConfig,

    #[serde(default)]
    pub topic: TopicConfig,
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl std::str::FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            _ => Err(ConfigError::invalid("log_level", format!("unknown level '{}'", s))),
        }
    }
}

fn default_llm_timeout_secs() -> u64 {
    30
}

fn default_llm_cache_size() -> usize {
    128
}

fn default_llm_max_tokens() -> u32 {
    256
}

fn default_llm_max_retries() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

fn default_source_rate_limit() -> Option<u32> {
    // Both sites are small community archives; one request every two seconds
    Some(30)
}

fn default_source_burst() -> u32 {
    2
}

fn default_source_timeout_secs() -> u64 {
    30
}

fn default_available_sources() -> Vec<SourceConfig> {
    vec![
        SourceConfig::new(SourceKind::Imsdb),
        SourceConfig::new(SourceKind::Cinematheque),
    ]
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (compatible; MovieScriptBot/1.0)".to_string()
}

fn default_cache_ttl_hours() -> u64 {
    24 * 7
}

impl Config {
    /// Load configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&content)
            .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))
    }

    /// Load configuration, writing a default file first if none exists
    pub fn load_or_create(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            return Self::from_file(path);
        }

        warn!("Config file not found at '{}', creating default config.", path.display());
        let config = Config::default();
        let json = serde_json::to_string_pretty(&config)
            .map_err(|e| ConfigError::Load(e.to_string()))?;
        std::fs::write(path, json)
            .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
        Ok(config)
    }

    /// Apply the process environment on top of the file settings
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup.
    ///
    /// Recognized keys: `OLLAMA_MODEL`, `OLLAMA_HOST`, `OLLAMA_TIMEOUT`,
    /// `OLLAMA_CACHE_SIZE`, `LOG_LEVEL`. Setting `OLLAMA_HOST` enables the LLM.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(model) = lookup("OLLAMA_MODEL") {
            self.llm.model = model;
        }
        if let Some(host) = lookup("OLLAMA_HOST") {
            self.llm.provider = LlmProvider::Ollama;
            self.llm.endpoint = if host.starts_with("http://") || host.starts_with("https://") {
                host
            } else {
                format!("http://{}", host)
            };
            self.llm.enabled = true;
        }
        if let Some(timeout) = lookup("OLLAMA_TIMEOUT") {
            self.llm.timeout_secs = timeout
                .parse()
                .map_err(|_| ConfigError::invalid("OLLAMA_TIMEOUT", format!("'{}' is not a number", timeout)))?;
        }
        if let Some(size) = lookup("OLLAMA_CACHE_SIZE") {
            self.llm.cache_size = size
                .parse()
                .map_err(|_| ConfigError::invalid("OLLAMA_CACHE_SIZE", format!("'{}' is not a number", size)))?;
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            self.log_level = level.parse()?;
        }
        Ok(())
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sources.enabled_sources().next().is_none() {
            return Err(ConfigError::Missing("sources.available_sources (no enabled source)".to_string()));
        }
        for source in self.sources.enabled_sources() {
            if source.rate_limit == Some(0) {
                return Err(ConfigError::invalid(
                    &format!("sources.{}.rate_limit", source.kind),
                    "use null to disable rate limiting instead of 0",
                ));
            }
            if source.burst == 0 {
                return Err(ConfigError::invalid(&format!("sources.{}.burst", source.kind), "must be at least 1"));
            }
            if source.timeout_secs == 0 {
                return Err(ConfigError::invalid(&format!("sources.{}.timeout_secs", source.kind), "must be positive"));
            }
        }

        if self.cache.ttl_hours == 0 {
            return Err(ConfigError::invalid("cache.ttl_hours", "must be positive"));
        }

        if self.llm.enabled {
            if self.llm.timeout_secs == 0 {
                return Err(ConfigError::invalid("llm.timeout_secs", "must be positive"));
            }
            if self.llm.cache_size == 0 {
                return Err(ConfigError::invalid("llm.cache_size", "must be positive"));
            }
            if self.llm.provider.requires_api_key() && self.llm.api_key.is_empty() {
                return Err(ConfigError::Missing(format!(
                    "llm.api_key (required for {})",
                    self.llm.provider.display_name()
                )));
            }
        }

        self.analysis.gender.validate()?;
        self.analysis.conversation.validate()?;
        self.analysis.topic.validate()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_config_default_shouldValidate() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!(!config.llm.enabled);
        assert_eq!(config.sources.available_sources[0].kind, SourceKind::Imsdb);
    }

    #[test]
    fn test_config_validate_withoutSources_shouldFail() {
        let mut config = Config::default();
        for source in &mut config.sources.available_sources {
            source.enabled = false;
        }
        assert!(matches!(config.validate(), Err(ConfigError::Missing(_))));
    }

    #[test]
    fn test_config_validate_withHostedProviderAndNoKey_shouldFail() {
        let mut config = Config::default();
        config.llm.enabled = true;
        config.llm.provider = LlmProvider::Anthropic;
        assert!(config.validate().is_err());

        config.llm.api_key = "sk-test".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_applyOverrides_shouldReadOllamaVariables() {
        let env: HashMap<&str, &str> = [
            ("OLLAMA_MODEL", "mistral"),
            ("OLLAMA_HOST", "localhost:11434"),
            ("OLLAMA_TIMEOUT", "60"),
            ("OLLAMA_CACHE_SIZE", "256"),
            ("LOG_LEVEL", "DEBUG"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_overrides_from(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert!(config.llm.enabled);
        assert_eq!(config.llm.model, "mistral");
        assert_eq!(config.llm.endpoint, "http://localhost:11434");
        assert_eq!(config.llm.timeout_secs, 60);
        assert_eq!(config.llm.cache_size, 256);
        assert_eq!(config.log_level, LogLevel::Debug);
    }

    #[test]
    fn test_config_applyOverrides_withBadNumber_shouldFail() {
        let mut config = Config::default();
        let result = config.apply_overrides_from(|key| {
            (key == "OLLAMA_TIMEOUT").then(|| "soon".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_config_deserialize_withPartialJson_shouldFillDefaults() {
        let json = r#"{ "llm": { "enabled": true, "model": "llama3" }, "cache": { "ttl_hours": 2 } }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert!(config.llm.enabled);
        assert_eq!(config.llm.get_model(), "llama3");
        assert_eq!(config.llm.get_endpoint(), "http://localhost:11434");
        assert_eq!(config.cache.ttl_hours, 2);
        assert_eq!(config.sources.available_sources.len(), 2);
    }

    #[test]
    fn test_llmProvider_fromStr_shouldParseKnownNames() {
        assert_eq!("OpenAI".parse::<LlmProvider>().unwrap(), LlmProvider::OpenAI);
        assert_eq!("lmstudio".parse::<LlmProvider>().unwrap(), LlmProvider::LMStudio);
        assert!("gemini".parse::<LlmProvider>().is_err());
    }
}
