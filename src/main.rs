// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, anyhow};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use indicatif::{ProgressBar, ProgressStyle};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, debug, error, info, warn};
use std::io::Write;
use std::path::{Path, PathBuf};

use bechdel::app_config::{self, Config, LlmProvider};
use bechdel::errors::{AcquisitionError, AppError};
use bechdel::{BechdelResult, Controller};

/// CLI Wrapper for LlmProvider to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLlmProvider {
    Ollama,
    OpenAI,
    Anthropic,
    LMStudio,
}

impl From<CliLlmProvider> for LlmProvider {
    fn from(cli_provider: CliLlmProvider) -> Self {
        match cli_provider {
            CliLlmProvider::Ollama => LlmProvider::Ollama,
            CliLlmProvider::OpenAI => LlmProvider::OpenAI,
            CliLlmProvider::Anthropic => LlmProvider::Anthropic,
            CliLlmProvider::LMStudio => LlmProvider::LMStudio,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch scripts by title and run the Bechdel test on each
    Analyze {
        /// Movie titles
        #[arg(value_name = "TITLE", required = true)]
        titles: Vec<String>,
    },

    /// Run the Bechdel test on a local script file
    AnalyzeFile {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },

    /// List candidate scripts for a title
    Search {
        #[arg(value_name = "TITLE")]
        title: String,
    },

    /// Fetch a script without analyzing it
    Fetch {
        #[arg(value_name = "TITLE")]
        title: String,

        /// Write the script text here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Inspect or maintain the script cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Generate shell completions for bechdel
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand, Debug)]
enum CacheAction {
    /// Remove expired entries
    Purge,
    /// Remove every entry
    Clear,
    /// Show entry counts
    Stats,
}

/// bechdel - Bechdel test analysis for movie scripts
///
/// Fetches screenplays from public script sites and checks whether two female
/// characters talk to each other about something other than a man.
#[derive(Parser, Debug)]
#[command(name = "bechdel")]
#[command(version = "0.1.0")]
#[command(about = "Check movie scripts against the Bechdel test")]
#[command(long_about = "bechdel fetches movie scripts and runs the Bechdel test on them.

EXAMPLES:
    bechdel analyze \"The Matrix\"                  # Fetch and analyze a script
    bechdel analyze Alien Heat Clueless          # Several titles with a progress bar
    bechdel --json analyze-file script.txt       # Analyze a local file, print JSON
    bechdel search \"Pulp Fiction\"                # List candidate scripts
    bechdel fetch Alien -o alien.txt             # Save a script
    bechdel cache stats                          # Inspect the script cache
    bechdel completions bash > bechdel.bash      # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. If the file doesn't exist,
    a default one is created. OLLAMA_MODEL, OLLAMA_HOST, OLLAMA_TIMEOUT,
    OLLAMA_CACHE_SIZE and LOG_LEVEL override the file.

SUPPORTED PROVIDERS:
    ollama    - Local Ollama server (default: llama2)
    openai    - OpenAI API (requires API key)
    anthropic - Anthropic Claude API (requires API key)
    lmstudio  - LM Studio local server (OpenAI-compatible on http://localhost:1234/v1)")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json", global = true)]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum, global = true)]
    log_level: Option<CliLogLevel>,

    /// LLM provider for uncertain classifications
    #[arg(short, long, value_enum, global = true)]
    provider: Option<CliLlmProvider>,

    /// Model name for the LLM provider
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Rules only, even if the configuration enables an LLM
    #[arg(long, global = true, conflicts_with = "provider")]
    no_llm: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI color for log level
    fn color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "1;31",
            Level::Warn => "1;33",
            Level::Info => "1;32",
            Level::Debug => "1;36",
            Level::Trace => "1;35",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let color = Self::color_for_level(record.level());
            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "\x1B[{}m{} {:<5} {}\x1B[0m",
                color,
                now,
                record.level(),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

fn level_filter(level: &app_config::LogLevel) -> LevelFilter {
    match level {
        app_config::LogLevel::Error => LevelFilter::Error,
        app_config::LogLevel::Warn => LevelFilter::Warn,
        app_config::LogLevel::Info => LevelFilter::Info,
        app_config::LogLevel::Debug => LevelFilter::Debug,
        app_config::LogLevel::Trace => LevelFilter::Trace,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Trace so the configured level below is the only filter
    CustomLogger::init(LevelFilter::Trace)?;
    log::set_max_level(LevelFilter::Info);

    let cli = CommandLineOptions::parse();

    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = CommandLineOptions::command();
        generate(*shell, &mut cmd, "bechdel", &mut std::io::stdout());
        return Ok(());
    }

    let config = load_config(&cli)?;
    log::set_max_level(level_filter(&config.log_level));

    let controller = Controller::with_config(config)?;
    if let Err(e) = controller.check_llm().await {
        warn!("{:#}", e);
    }

    match cli.command {
        Commands::Analyze { titles } => run_analyze(&controller, &titles, cli.json).await,
        Commands::AnalyzeFile { path } => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read script file: {}", path.display()))?;
            let result = controller.analyze_text(&text).await;
            print_result(&path.display().to_string(), &result, cli.json)
        }
        Commands::Search { title } => {
            let locations = controller.search(&title).await.map_err(report)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&locations)?);
            } else {
                for location in locations {
                    println!("{}\t{}\t{}", location.source, location.title, location.url);
                }
            }
            Ok(())
        }
        Commands::Fetch { title, output } => {
            let script = controller.fetch_script(&title).await.map_err(report)?;
            info!("Fetched '{}' from {} ({})", script.title, script.source, script.url);
            match output {
                Some(path) => write_script(&path, &script.text)?,
                None => println!("{}", script.text),
            }
            Ok(())
        }
        Commands::Cache { action } => {
            let cache = controller.cache();
            match action {
                CacheAction::Purge => info!("Purged {} expired entries", cache.purge_expired()),
                CacheAction::Clear => {
                    cache.clear();
                    info!("Cache cleared");
                }
                CacheAction::Stats => {
                    let stats = cache.stats();
                    if cli.json {
                        println!("{}", serde_json::to_string_pretty(&stats)?);
                    } else {
                        println!("entries: {} (expired: {})", stats.entries, stats.expired);
                        match cache.directory() {
                            Some(dir) => println!("directory: {}", dir.display()),
                            None => println!("directory: none (memory only)"),
                        }
                    }
                }
            }
            Ok(())
        }
        Commands::Completions { .. } => Ok(()),
    }
}

fn load_config(cli: &CommandLineOptions) -> Result<Config> {
    let path = Path::new(&cli.config_path);
    let mut config = Config::load_or_create(path)
        .with_context(|| format!("Failed to load config file: {}", cli.config_path))?;

    config
        .apply_env_overrides()
        .context("Invalid environment override")?;

    if let Some(provider) = &cli.provider {
        config.llm.provider = provider.clone().into();
        config.llm.enabled = true;
    }
    if let Some(model) = &cli.model {
        config.llm.model = model.clone();
    }
    if cli.no_llm {
        config.llm.enabled = false;
    }
    if let Some(log_level) = &cli.log_level {
        config.log_level = log_level.clone().into();
    }

    config.validate().context("Configuration validation failed")?;
    Ok(config)
}

async fn run_analyze(controller: &Controller, titles: &[String], json: bool) -> Result<()> {
    let progress = (titles.len() > 1).then(|| {
        let bar = ProgressBar::new(titles.len() as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        bar
    });

    let mut failures = 0;
    for title in titles {
        if let Some(bar) = &progress {
            bar.set_message(title.clone());
        }
        match controller.analyze(title).await {
            Ok(result) => {
                let printed = match &progress {
                    Some(bar) => bar.suspend(|| print_result(title, &result, json)),
                    None => print_result(title, &result, json),
                };
                printed?;
            }
            Err(e) => {
                failures += 1;
                error!("{}: {}", title, report(e));
            }
        }
        if let Some(bar) = &progress {
            bar.inc(1);
        }
    }
    if let Some(bar) = progress {
        bar.finish_and_clear();
    }

    if failures == titles.len() {
        return Err(anyhow!("No script could be acquired"));
    }
    Ok(())
}

/// Log an acquisition failure with its class and hand it on as an anyhow error
fn report(e: AcquisitionError) -> anyhow::Error {
    let e = AppError::from(e);
    if let Some(class) = e.class() {
        debug!("Failure class: {:?}", class);
    }
    anyhow!(e)
}

fn print_result(label: &str, result: &BechdelResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result).context("Failed to serialize result")?);
        return Ok(());
    }

    let verdict = if result.passes_test { "PASS" } else { "FAIL" };
    println!("{}: {}", label, verdict);
    if let Some(provenance) = &result.provenance {
        println!("  source: {} ({})", provenance.source, provenance.url);
    }
    println!("  female characters: {}", result.female_characters.join(", "));
    println!("  female conversations: {}", result.qualifying_conversations);
    for reason in &result.failure_reasons {
        println!("  - {}", reason);
    }
    Ok(())
}

fn write_script(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    std::fs::write(path, text).with_context(|| format!("Failed to write script to {}", path.display()))?;
    info!("Success: {}", path.display());
    Ok(())
}
