//! Configuration management for the Insight engine.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Built-in defaults
//! - Config files (.insight/config.yaml)
//! - Environment variables
//! - Command-line flags
//!
//! The configuration is workspace-centric, with all durable state stored in
//! `.insight/`. Component sections (`engine.*`) are plain values handed to
//! each component's constructor; nothing here is a process-wide singleton.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Completion providers the factory knows how to build.
pub const KNOWN_PROVIDERS: [&str; 2] = ["ollama", "openai"];

/// Embedding providers the embedding factory knows how to build.
pub const KNOWN_EMBEDDING_PROVIDERS: [&str; 3] = ["mock", "ollama", "openai"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .insight/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Completion provider (e.g., "ollama", "openai")
    pub provider: String,

    /// Completion model identifier
    pub model: String,

    /// API key for the completion provider
    pub api_key: Option<String>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Emit logs as JSON lines
    pub log_json: bool,

    /// LLM provider configurations
    pub llm: Option<LlmConfig>,

    /// Component settings
    pub engine: EngineConfig,
}

/// LLM configuration from config.yaml.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(rename = "activeProvider")]
    pub active_provider: String,

    pub providers: HashMap<String, ProviderConfig>,
}

/// Provider-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProviderConfig {
    OpenAI {
        #[serde(rename = "apiKeyEnv")]
        api_key_env: String,
        model: String,
        endpoint: Option<String>,
    },
    Ollama {
        endpoint: String,
        model: String,
        timeout: Option<u64>,
    },
}

impl ProviderConfig {
    /// Endpoint override for this provider, if any.
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            ProviderConfig::OpenAI { endpoint, .. } => endpoint.as_deref(),
            ProviderConfig::Ollama { endpoint, .. } => Some(endpoint.as_str()),
        }
    }

    /// Model configured for this provider.
    pub fn model(&self) -> &str {
        match self {
            ProviderConfig::OpenAI { model, .. } | ProviderConfig::Ollama { model, .. } => model,
        }
    }
}

/// Settings for every engine component.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingConfig,
    pub index: IndexConfig,
    pub analysis: AnalysisConfig,
    pub agent: AgentConfig,
    pub sales: SalesConfig,
    pub retry: RetryConfig,
}

impl EngineConfig {
    /// Check component settings that would otherwise fail silently at runtime.
    ///
    /// Provider names are checked by [`AppConfig::validate`], since injected
    /// collaborators may not come from configuration at all.
    pub fn validate(&self) -> AppResult<()> {
        let chunking = &self.chunking;
        if chunking.chunk_overlap >= chunking.chunk_size {
            return Err(AppError::Config(format!(
                "engine.chunking.chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunking.chunk_overlap, chunking.chunk_size
            )));
        }

        let agent = &self.agent;
        if agent.max_iterations == 0 {
            return Err(AppError::Config(
                "engine.agent.max_iterations must be at least 1".to_string(),
            ));
        }
        // whole exchanges only, so eviction never leaves a leading agent turn
        if agent.history_window < 2 || agent.history_window % 2 != 0 {
            return Err(AppError::Config(format!(
                "engine.agent.history_window ({}) must be a positive even number of turns",
                agent.history_window
            )));
        }
        if agent.search_top_k == 0 {
            return Err(AppError::Config(
                "engine.agent.search_top_k must be at least 1".to_string(),
            ));
        }

        if self.sales.search_top_k == 0 {
            return Err(AppError::Config(
                "engine.sales.search_top_k must be at least 1".to_string(),
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(AppError::Config(
                "engine.retry.max_attempts must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

/// Chunking strategy, selected by configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkStrategy {
    /// Only the first separator, then hard character cuts
    Character,
    /// Separators tried in priority order
    #[default]
    Recursive,
    /// Recursive, with sizes expressed in estimated tokens
    Token,
}

/// Chunker settings. Sizes are characters, or estimated tokens for
/// [`ChunkStrategy::Token`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChunkingConfig {
    pub strategy: ChunkStrategy,

    /// Maximum segment size
    pub chunk_size: usize,

    /// Shared context between consecutive segments
    pub chunk_overlap: usize,

    /// Separators in priority order; `""` splits between characters
    pub separators: Vec<String>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            strategy: ChunkStrategy::Recursive,
            chunk_size: 2000,
            chunk_overlap: 200,
            separators: default_separators(),
        }
    }
}

/// Paragraph, line, sentence, word, character.
pub fn default_separators() -> Vec<String> {
    ["\n\n", "\n", ". ", "? ", "! ", " ", ""]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Embedding provider settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Provider name: "mock", "openai", "ollama"
    pub provider: String,

    /// Model identifier (provider-specific)
    pub model: String,

    /// Embedding vector dimensions; also the index dimension
    pub dimensions: usize,

    /// Optional endpoint override
    pub endpoint: Option<String>,

    /// Environment variable holding the API key (openai)
    #[serde(rename = "apiKeyEnv")]
    pub api_key_env: Option<String>,

    /// Maximum batch size for embedding requests
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "mock".to_string(),
            model: "trigram-v1".to_string(),
            dimensions: 384,
            endpoint: None,
            api_key_env: None,
            batch_size: 100,
        }
    }
}

/// Record store settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IndexConfig {
    /// SQLite file; defaults to `.insight/index.sqlite`
    pub path: Option<PathBuf>,

    /// Keep everything in memory (nothing survives the process)
    pub in_memory: bool,
}

/// Analysis pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Texts longer than this (characters) are chunked first
    pub chunk_threshold_chars: usize,

    /// Segments extracted concurrently
    pub extraction_concurrency: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            chunk_threshold_chars: 4000,
            extraction_concurrency: 4,
        }
    }
}

/// Conversational agent settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentConfig {
    /// Hard ceiling on tool invocations per chat turn
    pub max_iterations: usize,

    /// Turns kept per session (user and agent turns count separately)
    pub history_window: usize,

    /// Hits requested per search_database call
    pub search_top_k: usize,

    /// Characters of each hit shown in an observation
    pub snippet_chars: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            history_window: 10,
            search_top_k: 5,
            snippet_chars: 400,
        }
    }
}

/// Sales-assist pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SalesConfig {
    /// Similar past cases retrieved
    pub search_top_k: usize,

    /// Characters of each case shown to the model
    pub snippet_chars: usize,
}

impl Default for SalesConfig {
    fn default() -> Self {
        Self {
            search_top_k: 5,
            snippet_chars: 600,
        }
    }
}

/// Retry and timeout policy for external calls.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts including the first one
    pub max_attempts: u32,

    /// First backoff delay, doubled per attempt
    pub base_delay_ms: u64,

    /// Upper bound for a single backoff delay
    pub max_delay_ms: u64,

    /// Total time budget across attempts
    pub max_elapsed_secs: u64,

    /// Timeout applied to every single call
    pub timeout_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 2000,
            max_delay_ms: 60_000,
            max_elapsed_secs: 120,
            timeout_secs: 60,
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFile {
    llm: Option<LlmConfig>,
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
    engine: Option<EngineConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
    json: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider: "ollama".to_string(), // Local-first default
            model: "llama3.2".to_string(),
            api_key: None,
            log_level: None,
            verbose: false,
            no_color: false,
            log_json: false,
            llm: None,
            engine: EngineConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the YAML file and environment variables.
    ///
    /// Environment variables:
    /// - `INSIGHT_WORKSPACE`: Override workspace path
    /// - `INSIGHT_CONFIG`: Path to config file
    /// - `INSIGHT_PROVIDER`: Completion provider
    /// - `INSIGHT_MODEL`: Model identifier
    /// - `INSIGHT_API_KEY`: API key
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use insight_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Workspace: {:?}", config.workspace);
    /// ```
    pub fn load() -> AppResult<Self> {
        Self::load_from(None, None)
    }

    /// Like [`AppConfig::load`], with an explicit workspace and config file
    /// taking precedence over their environment variables.
    pub fn load_from(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        if let Some(workspace) = workspace.or_else(|| std::env::var_os("INSIGHT_WORKSPACE").map(PathBuf::from)) {
            config.workspace = workspace;
        }

        if let Some(config_file) = config_file.or_else(|| std::env::var_os("INSIGHT_CONFIG").map(PathBuf::from)) {
            config.config_file = Some(config_file);
        }

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = config
            .config_file
            .clone()
            .unwrap_or_else(|| config.insight_dir().join("config.yaml"));

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override YAML config
        if let Ok(provider) = std::env::var("INSIGHT_PROVIDER") {
            config.provider = provider;
        }

        if let Ok(model) = std::env::var("INSIGHT_MODEL") {
            config.model = model;
        }

        if let Ok(key) = std::env::var("INSIGHT_API_KEY") {
            config.api_key = Some(key);
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        self.merge_yaml_str(&contents)
            .map_err(|e| AppError::Config(format!("Failed to parse config file {:?}: {}", path, e)))
    }

    fn merge_yaml_str(&self, contents: &str) -> Result<Self, serde_yaml::Error> {
        let config_file: ConfigFile = serde_yaml::from_str(contents)?;

        let mut result = self.clone();

        if let Some(ws) = config_file.workspace {
            if let Some(path) = ws.path {
                result.workspace = PathBuf::from(path);
            }
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
            if let Some(json) = logging.json {
                result.log_json = json;
            }
        }

        if let Some(llm) = config_file.llm {
            result.provider = llm.active_provider.clone();

            if let Some(provider_config) = llm.providers.get(&llm.active_provider) {
                result.model = provider_config.model().to_string();
            }

            result.llm = Some(llm);
        }

        if let Some(engine) = config_file.engine {
            result.engine = engine;
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over environment variables and the file.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(provider) = provider {
            self.provider = provider;
        }

        if let Some(model) = model {
            self.model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .insight directory.
    pub fn insight_dir(&self) -> PathBuf {
        self.workspace.join(".insight")
    }

    /// Ensure the .insight directory exists.
    pub fn ensure_insight_dir(&self) -> AppResult<()> {
        let dir = self.insight_dir();
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| {
                AppError::Config(format!("Failed to create .insight directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// SQLite file holding records and sessions.
    pub fn index_path(&self) -> PathBuf {
        self.engine
            .index
            .path
            .clone()
            .unwrap_or_else(|| self.insight_dir().join("index.sqlite"))
    }

    /// Get the configuration of a named provider.
    pub fn get_provider_config(&self, provider: &str) -> Option<ProviderConfig> {
        self.llm
            .as_ref()
            .and_then(|llm| llm.providers.get(provider).cloned())
    }

    /// Endpoint of the active completion provider, if configured.
    pub fn provider_endpoint(&self) -> Option<String> {
        self.get_provider_config(&self.provider)
            .and_then(|pc| pc.endpoint().map(str::to_string))
    }

    /// Resolve the completion API key from config or environment.
    pub fn resolve_api_key(&self, provider: &str) -> Option<String> {
        if let Some(ref key) = self.api_key {
            return Some(key.clone());
        }

        match self.get_provider_config(provider) {
            Some(ProviderConfig::OpenAI { api_key_env, .. }) => std::env::var(&api_key_env).ok(),
            _ => None,
        }
    }

    /// Resolve the embedding API key from its configured environment variable,
    /// falling back to the completion key.
    pub fn resolve_embedding_api_key(&self) -> Option<String> {
        self.engine
            .embedding
            .api_key_env
            .as_ref()
            .and_then(|var| std::env::var(var).ok())
            .or_else(|| self.resolve_api_key(&self.engine.embedding.provider))
    }

    /// Validate configuration for the active provider and every component.
    pub fn validate(&self) -> AppResult<()> {
        let provider = self.provider.as_str();
        if !KNOWN_PROVIDERS.contains(&provider) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                provider,
                KNOWN_PROVIDERS.join(", ")
            )));
        }

        if let Some(ProviderConfig::OpenAI { api_key_env, .. }) = self.get_provider_config(provider)
        {
            if self.api_key.is_none() && std::env::var(&api_key_env).is_err() {
                return Err(AppError::Config(format!(
                    "API key not found in environment variable: {}",
                    api_key_env
                )));
            }
        }

        let embedding = &self.engine.embedding;
        if !KNOWN_EMBEDDING_PROVIDERS.contains(&embedding.provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown embedding provider: {}. Supported: {}",
                embedding.provider,
                KNOWN_EMBEDDING_PROVIDERS.join(", ")
            )));
        }
        if embedding.dimensions == 0 {
            return Err(AppError::Config(
                "engine.embedding.dimensions must be greater than 0".to_string(),
            ));
        }

        self.engine.validate()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.provider, "ollama");
        assert_eq!(config.model, "llama3.2");
        assert!(!config.verbose);
        assert_eq!(config.engine.chunking.chunk_size, 2000);
        assert_eq!(config.engine.chunking.chunk_overlap, 200);
        assert_eq!(config.engine.agent.max_iterations, 5);
        assert_eq!(config.engine.embedding.provider, "mock");
    }

    #[test]
    fn test_index_path_defaults_into_insight_dir() {
        let config = AppConfig::default();
        assert!(config.index_path().ends_with(".insight/index.sqlite"));
    }

    #[test]
    fn test_with_overrides() {
        let config = AppConfig::default();
        let overridden = config.with_overrides(
            None,
            None,
            Some("openai".to_string()),
            Some("gpt-4o-mini".to_string()),
            None,
            true,
            false,
        );

        assert_eq!(overridden.provider, "openai");
        assert_eq!(overridden.model, "gpt-4o-mini");
        assert!(overridden.verbose);
        assert_eq!(overridden.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_merge_yaml_engine_sections() {
        let yaml = r#"
llm:
  activeProvider: ollama
  providers:
    ollama:
      endpoint: "http://localhost:11434"
      model: "mistral"
logging:
  level: warn
  json: true
engine:
  chunking:
    strategy: token
    chunk_size: 500
    chunk_overlap: 50
  agent:
    max_iterations: 3
"#;
        let merged = AppConfig::default().merge_yaml_str(yaml).unwrap();
        assert_eq!(merged.model, "mistral");
        assert_eq!(merged.log_level.as_deref(), Some("warn"));
        assert!(merged.log_json);
        assert_eq!(merged.engine.chunking.strategy, ChunkStrategy::Token);
        assert_eq!(merged.engine.chunking.chunk_size, 500);
        assert_eq!(merged.engine.chunking.separators, default_separators());
        assert_eq!(merged.engine.agent.max_iterations, 3);
        assert_eq!(merged.engine.agent.history_window, 10);
        assert_eq!(
            merged.provider_endpoint().as_deref(),
            Some("http://localhost:11434")
        );
    }

    #[test]
    fn test_validate_unknown_provider() {
        let mut config = AppConfig::default();
        config.provider = "unknown".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_ollama() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_overlap_not_smaller_than_size() {
        let mut config = AppConfig::default();
        config.engine.chunking.chunk_overlap = config.engine.chunking.chunk_size;
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_iterations() {
        let mut config = AppConfig::default();
        config.engine.agent.max_iterations = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_search_depth() {
        let mut config = AppConfig::default();
        config.engine.agent.search_top_k = 0;
        assert!(matches!(config.validate(), Err(AppError::Config(_))));

        let mut config = AppConfig::default();
        config.engine.sales.search_top_k = 0;
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_validate_requires_whole_exchanges_in_window() {
        let mut engine = EngineConfig::default();
        engine.agent.history_window = 5;
        assert!(matches!(engine.validate(), Err(AppError::Config(_))));

        engine.agent.history_window = 0;
        assert!(engine.validate().is_err());

        engine.agent.history_window = 2;
        assert!(engine.validate().is_ok());
    }

    #[test]
    fn test_load_from_reads_workspace_config() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".insight")).unwrap();
        std::fs::write(
            dir.path().join(".insight/config.yaml"),
            "engine:\n  agent:\n    history_window: 6\n",
        )
        .unwrap();

        let config = AppConfig::load_from(Some(dir.path().to_path_buf()), None).unwrap();
        assert_eq!(config.workspace, dir.path());
        assert_eq!(config.engine.agent.history_window, 6);
    }

    #[test]
    fn test_load_from_missing_workspace_fails() {
        let err = AppConfig::load_from(Some(PathBuf::from("/definitely/not/here")), None).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
