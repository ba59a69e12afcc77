//! Insight CLI
//!
//! Main entry point for the insight command-line tool.
//! Analyses conversations, stores them in a local embedding index and
//! answers questions about them.

mod commands;

use clap::{Parser, Subcommand};
use commands::{
    AnalyzeCommand, AssistCommand, ChatCommand, ClearCommand, IngestCommand, PromptsCommand,
    RecordCommand, SearchCommand,
};
use insight_core::{config::AppConfig, logging, AppResult};
use std::path::PathBuf;

/// Insight - structured insight from conversations, with a local knowledge index
#[derive(Parser, Debug)]
#[command(name = "insight")]
#[command(about = "Structured insight from conversations, with a local knowledge index", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "INSIGHT_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "INSIGHT_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Completion provider (ollama, openai)
    #[arg(short, long, global = true, env = "INSIGHT_PROVIDER")]
    provider: Option<String>,

    /// Model identifier
    #[arg(short, long, global = true, env = "INSIGHT_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Extract insight from a conversation without storing it
    Analyze(AnalyzeCommand),

    /// Analyse a conversation and store it in the knowledge index
    Ingest(IngestCommand),

    /// Search stored conversations
    Search(SearchCommand),

    /// Show or delete a stored record
    Record(RecordCommand),

    /// Remove every stored record
    Clear(ClearCommand),

    /// Ask the agent about stored conversations
    Chat(ChatCommand),

    /// Sales assistance for a customer conversation
    Assist(AssistCommand),

    /// List prompt definitions
    Prompts(PromptsCommand),
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Analyze(_) => "analyze",
            Commands::Ingest(_) => "ingest",
            Commands::Search(_) => "search",
            Commands::Record(_) => "record",
            Commands::Clear(_) => "clear",
            Commands::Chat(_) => "chat",
            Commands::Assist(_) => "assist",
            Commands::Prompts(_) => "prompts",
        }
    }
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    // Load configuration, reading the config file of the requested workspace
    let config = AppConfig::load_from(cli.workspace.clone(), cli.config.clone())?;

    // Apply CLI overrides
    let mut config = config.with_overrides(
        cli.workspace,
        cli.config,
        cli.provider,
        cli.model,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );
    config.log_json |= cli.log_json;

    // Initialize logging with final configuration
    logging::init_logging(config.log_level.as_deref(), config.no_color, config.log_json)?;

    tracing::info!("Insight CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Provider: {}", config.provider);
    tracing::debug!("Model: {}", config.model);

    // Ensure .insight directory exists
    config.ensure_insight_dir()?;

    let _span = tracing::info_span!("command", name = cli.command.name()).entered();

    // Route to command handlers
    let result = match cli.command {
        Commands::Analyze(cmd) => cmd.execute(&config).await,
        Commands::Ingest(cmd) => cmd.execute(&config).await,
        Commands::Search(cmd) => cmd.execute(&config).await,
        Commands::Record(cmd) => cmd.execute(&config).await,
        Commands::Clear(cmd) => cmd.execute(&config).await,
        Commands::Chat(cmd) => cmd.execute(&config).await,
        Commands::Assist(cmd) => cmd.execute(&config).await,
        Commands::Prompts(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!(kind = %e.kind(), "Command failed: {}", e),
    }

    result
}
