/*!
 * # bechdel - Bechdel test analysis for movie scripts
 *
 * Acquires a screenplay by title and decides whether it passes the Bechdel
 * test: at least two female characters who talk to each other about
 * something other than a man.
 *
 * ## Features
 *
 * - Script acquisition from several sites with fallback:
 *   - IMSDB
 *   - Cinémathèque
 * - Per-source token-bucket rate limits and a TTL script cache
 * - Rule-based gender and topic classification
 * - Optional LLM assistance for uncertain cases:
 *   - Ollama (local LLM)
 *   - OpenAI API and LM Studio
 *   - Anthropic API
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `sources`: Script acquisition:
 *   - `sources::imsdb`, `sources::cinematheque`: Site adapters
 *   - `sources::cache`: Script cache keyed by normalized title
 *   - `sources::rate_limit`: Token buckets
 *   - `sources::coordinator`: Priority fallback and single-flight
 * - `analysis`: The analysis pipeline:
 *   - `analysis::parser`: Screenplay parsing
 *   - `analysis::gender`: Character gender classification
 *   - `analysis::conversation`: Conversation extraction
 *   - `analysis::topic`: Topic classification
 *   - `analysis::verdict`: Verdict aggregation
 * - `app_controller`: Main application controller
 * - `providers`: Client implementations for LLM providers
 * - `clock`: Injectable time source
 * - `errors`: Custom error types for the application
 */

// Global lints configuration
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod analysis;
pub mod app_config;
pub mod app_controller;
pub mod clock;
pub mod errors;
pub mod providers;
pub mod sources;

// Re-export main types for easier usage
pub use analysis::{BechdelAnalyzer, BechdelResult};
pub use app_config::Config;
pub use app_controller::Controller;
pub use errors::{AcquisitionError, ErrorClass};
pub use sources::RawScript;
