//! Configuration management for Mosaic.
//!
//! Configuration is merged from, in increasing precedence:
//! - built-in defaults
//! - the workspace config file (`.mosaic/config.yaml`)
//! - environment variables (`MOSAIC_*`)
//! - command-line flags
//!
//! Every tuning constant used by ranking and citation attribution lives
//! here so it can be adjusted per knowledge base.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

const KNOWN_PROVIDERS: &[&str] = &["ollama"];
const KNOWN_EMBEDDERS: &[&str] = &["trigram", "ollama"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .mosaic/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Generator provider (e.g. "ollama")
    pub provider: String,

    /// Generator model identifier
    pub model: String,

    /// Log level override
    pub log_level: Option<String>,

    /// Emit logs as JSON lines
    pub log_json: bool,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    pub generator: GeneratorConfig,
    pub embeddings: EmbeddingsConfig,
    pub retrieval: RetrievalConfig,
    pub ranking: RankingConfig,
    pub citations: CitationConfig,
}

/// Answer generator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GeneratorConfig {
    pub endpoint: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    /// Prompt definition id used to build the generator request
    pub prompt: String,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            temperature: 0.7,
            max_tokens: 1024,
            timeout_secs: 60,
            prompt: "rag-answer".to_string(),
        }
    }
}

/// One embedding collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct EmbedderConfig {
    /// "trigram" (offline, deterministic) or "ollama"
    pub provider: String,
    pub model: String,
    pub dimensions: usize,
    pub endpoint: Option<String>,
    pub timeout_secs: u64,
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            provider: "trigram".to_string(),
            model: "trigram-v1".to_string(),
            dimensions: 384,
            endpoint: None,
            timeout_secs: 30,
        }
    }
}

/// Text and cross-modal (text-to-image) embedders.
///
/// The two live in different vector spaces; the image store is only ever
/// queried with vectors from `cross_modal`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct EmbeddingsConfig {
    pub text: EmbedderConfig,
    pub cross_modal: EmbedderConfig,
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            text: EmbedderConfig::default(),
            cross_modal: EmbedderConfig {
                model: "trigram-clip".to_string(),
                dimensions: 512,
                ..EmbedderConfig::default()
            },
        }
    }
}

/// Retrieval and session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetrievalConfig {
    /// Vector store directory, relative to the workspace unless absolute
    pub store_path: PathBuf,
    /// Ranked items handed to the generator as numbered context blocks
    pub max_context_items: usize,
    /// Default result count for plain searches
    pub max_results: usize,
    /// Upper bound for each per-modality store query
    pub query_timeout_ms: u64,
    /// Conversation turns kept per session
    pub session_capacity: usize,
    /// Conversation turns replayed into the prompt
    pub history_turns: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from(".mosaic/lancedb"),
            max_context_items: 5,
            max_results: 10,
            query_timeout_ms: 5_000,
            session_capacity: 10,
            history_turns: 3,
        }
    }
}

/// Deduplication and score boost constants.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct RankingConfig {
    /// Leading characters hashed into the dedup fingerprint
    pub fingerprint_chars: usize,
    pub length_boost_cap: f32,
    pub length_boost_divisor: f32,
    pub page_boost: f32,
    pub timestamp_boost: f32,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            fingerprint_chars: 100,
            length_boost_cap: 1.1,
            length_boost_divisor: 10_000.0,
            page_boost: 0.05,
            timestamp_boost: 0.05,
        }
    }
}

/// Implicit citation attribution settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct CitationConfig {
    /// Cosine similarity an item must exceed to be cited implicitly
    pub similarity_threshold: f32,
    /// Top-ranked items compared against the answer
    pub candidate_pool: usize,
    /// Maximum implicit citations
    pub max_implicit: usize,
}

impl Default for CitationConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.3,
            candidate_pool: 5,
            max_implicit: 3,
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    llm: Option<LlmSection>,
    embeddings: Option<EmbeddingsConfig>,
    retrieval: Option<RetrievalConfig>,
    ranking: Option<RankingConfig>,
    citations: Option<CitationConfig>,
    workspace: Option<WorkspaceSection>,
    logging: Option<LoggingSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LlmSection {
    provider: Option<String>,
    model: Option<String>,
    #[serde(flatten)]
    generator: GeneratorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceSection {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingSection {
    level: Option<String>,
    color: Option<bool>,
    json: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider: "ollama".to_string(),
            model: "llama3.2".to_string(),
            log_level: None,
            log_json: false,
            verbose: false,
            no_color: false,
            generator: GeneratorConfig::default(),
            embeddings: EmbeddingsConfig::default(),
            retrieval: RetrievalConfig::default(),
            ranking: RankingConfig::default(),
            citations: CitationConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the workspace config file and
    /// environment variables.
    ///
    /// Environment variables:
    /// - `MOSAIC_WORKSPACE`: Override workspace path
    /// - `MOSAIC_CONFIG`: Path to config file
    /// - `MOSAIC_PROVIDER`: Generator provider
    /// - `MOSAIC_MODEL`: Generator model
    /// - `MOSAIC_ENDPOINT`: Generator endpoint
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(workspace) = std::env::var("MOSAIC_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }

        if let Ok(config_file) = std::env::var("MOSAIC_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
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
            .unwrap_or_else(|| config.mosaic_dir().join("config.yaml"));

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        if let Ok(provider) = std::env::var("MOSAIC_PROVIDER") {
            config.provider = provider;
        }

        if let Ok(model) = std::env::var("MOSAIC_MODEL") {
            config.model = model;
        }

        if let Ok(endpoint) = std::env::var("MOSAIC_ENDPOINT") {
            config.generator.endpoint = Some(endpoint);
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge a YAML configuration file into this config.
    ///
    /// Sections present in the file replace the corresponding section;
    /// fields missing inside a section take their defaults.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(path) = file.workspace.and_then(|ws| ws.path) {
            result.workspace = PathBuf::from(path);
        }

        if let Some(logging) = file.logging {
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

        if let Some(llm) = file.llm {
            if let Some(provider) = llm.provider {
                result.provider = provider;
            }
            if let Some(model) = llm.model {
                result.model = model;
            }
            result.generator = llm.generator;
        }

        if let Some(embeddings) = file.embeddings {
            result.embeddings = embeddings;
        }
        if let Some(retrieval) = file.retrieval {
            result.retrieval = retrieval;
        }
        if let Some(ranking) = file.ranking {
            result.ranking = ranking;
        }
        if let Some(citations) = file.citations {
            result.citations = citations;
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over environment variables and the config file.
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

    /// Get the path to the .mosaic directory.
    pub fn mosaic_dir(&self) -> PathBuf {
        self.workspace.join(".mosaic")
    }

    /// Ensure the .mosaic directory exists.
    pub fn ensure_mosaic_dir(&self) -> AppResult<()> {
        let dir = self.mosaic_dir();
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| {
                AppError::Config(format!("Failed to create .mosaic directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// Resolved vector store directory.
    pub fn store_path(&self) -> PathBuf {
        if self.retrieval.store_path.is_absolute() {
            self.retrieval.store_path.clone()
        } else {
            self.workspace.join(&self.retrieval.store_path)
        }
    }

    /// Directory holding user prompt definitions.
    pub fn prompts_dir(&self) -> PathBuf {
        self.mosaic_dir().join("prompts")
    }

    /// Validate provider names and tuning constants.
    pub fn validate(&self) -> AppResult<()> {
        if !KNOWN_PROVIDERS.contains(&self.provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                self.provider,
                KNOWN_PROVIDERS.join(", ")
            )));
        }

        for (role, embedder) in [
            ("text", &self.embeddings.text),
            ("crossModal", &self.embeddings.cross_modal),
        ] {
            if !KNOWN_EMBEDDERS.contains(&embedder.provider.as_str()) {
                return Err(AppError::Config(format!(
                    "Unknown {} embedding provider: {}. Supported: {}",
                    role,
                    embedder.provider,
                    KNOWN_EMBEDDERS.join(", ")
                )));
            }
            if embedder.dimensions == 0 {
                return Err(AppError::Config(format!(
                    "{} embedding dimensions must be greater than zero",
                    role
                )));
            }
        }

        if self.retrieval.max_results == 0 || self.retrieval.max_context_items == 0 {
            return Err(AppError::Config(
                "maxResults and maxContextItems must be at least 1".to_string(),
            ));
        }

        if self.retrieval.session_capacity == 0 {
            return Err(AppError::Config(
                "sessionCapacity must be at least 1".to_string(),
            ));
        }

        let threshold = self.citations.similarity_threshold;
        if !(-1.0..=1.0).contains(&threshold) {
            return Err(AppError::Config(format!(
                "similarityThreshold must be within [-1, 1], got {}",
                threshold
            )));
        }

        if self.ranking.length_boost_divisor <= 0.0 {
            return Err(AppError::Config(
                "lengthBoostDivisor must be positive".to_string(),
            ));
        }

        Ok(())
    }
}
