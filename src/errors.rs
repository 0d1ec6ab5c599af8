/*!
 * Error types for the bechdel application.
 *
 * Per-source fetch failures and LLM failures are recovered where they happen,
 * so most of these never cross a component boundary. The ones that do are
 * `AcquisitionError` (every script source exhausted) and `ConfigError`
 * (invalid settings at startup).
 */

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur when working with LLM provider APIs
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The call did not finish in time
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),
}

/// Failure of a single script source for a single request
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    /// Transport-level failure
    #[error("Network error: {0}")]
    Network(String),

    /// Non-success HTTP status
    #[error("HTTP {status} from {url}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Requested URL
        url: String,
    },

    /// The page did not have the expected structure
    #[error("Could not parse page: {0}")]
    Parse(String),

    /// The source answered but the script body was empty
    #[error("Script text is empty")]
    EmptyScript,

    /// The source's token bucket was exhausted
    #[error("Rate limit reached for {0}")]
    RateLimited(String),

    /// The call did not finish in time
    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

/// Why a single source did not produce a script
#[derive(Debug, Clone, PartialEq)]
pub enum SourceFailure {
    /// The source searched successfully but had no candidate
    NoMatch,
    /// The source failed
    Error(FetchError),
}

impl std::fmt::Display for SourceFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoMatch => write!(f, "no match"),
            Self::Error(e) => write!(f, "{}", e),
        }
    }
}

/// Coarse classification exposed to callers of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// No source knows the title
    NotFound,
    /// Every source failed before it could answer
    UpstreamUnavailable,
    /// Invalid settings
    Configuration,
}

/// Errors raised by script acquisition
#[derive(Error, Debug)]
pub enum AcquisitionError {
    /// Every source was tried and none produced a script
    #[error("No script found for '{title}' ({})", describe_attempts(.attempts))]
    ScriptNotFound {
        /// Title as requested
        title: String,
        /// Source name and outcome, in priority order
        attempts: Vec<(String, SourceFailure)>,
    },
}

impl AcquisitionError {
    /// Map to the error class reported to callers.
    ///
    /// A clean "no match" from any source means the title is unknown; if all
    /// sources failed outright the upstream is considered unavailable.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::ScriptNotFound { attempts, .. } => {
                let any_clean_miss = attempts
                    .iter()
                    .any(|(_, failure)| matches!(failure, SourceFailure::NoMatch));
                if any_clean_miss || attempts.is_empty() {
                    ErrorClass::NotFound
                } else {
                    ErrorClass::UpstreamUnavailable
                }
            }
        }
    }
}

fn describe_attempts(attempts: &[(String, SourceFailure)]) -> String {
    if attempts.is_empty() {
        return "no sources configured".to_string();
    }
    attempts
        .iter()
        .map(|(source, failure)| format!("{}: {}", source, failure))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Invalid or missing configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A value is outside its allowed range
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue {
        /// Dotted path of the setting
        field: String,
        /// What is wrong with it
        reason: String,
    },

    /// A required value is missing
    #[error("Missing required setting: {0}")]
    Missing(String),

    /// The configuration file could not be read or parsed
    #[error("Could not load configuration: {0}")]
    Load(String),
}

impl ConfigError {
    pub(crate) fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from an LLM provider
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Error from script acquisition
    #[error("Acquisition error: {0}")]
    Acquisition(#[from] AcquisitionError),

    /// Error from configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl AppError {
    /// Error class for reporting
    pub fn class(&self) -> Option<ErrorClass> {
        match self {
            Self::Acquisition(e) => Some(e.class()),
            Self::Config(_) => Some(ErrorClass::Configuration),
            _ => None,
        }
    }
}

// Utility functions for error conversion
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
